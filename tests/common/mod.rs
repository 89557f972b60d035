// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, Utc};
use fiscus::application::LedgerService;
use fiscus::domain::{
    self, Account, AccountId, Amount, Customer, CustomerKind, Transaction, TransactionType,
};
use fiscus::storage::WriteOutcome;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Noon UTC on the given day
pub fn noon(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(12, 0, 0).unwrap().and_utc()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn days_ago(days: u64) -> NaiveDate {
    today() - Days::new(days)
}

pub fn individual(cpf: &str) -> CustomerKind {
    CustomerKind::Individual { cpf: cpf.into() }
}

pub fn corporate(cnpj: &str) -> CustomerKind {
    CustomerKind::Corporate { cnpj: cnpj.into() }
}

/// Test fixture: customers and history placed in the past.
///
/// Production code always stamps "now", so back-dated rows go straight
/// through the repository.
pub struct Backdated;

impl Backdated {
    /// Store a customer registered on `since`, without onboarding.
    pub async fn customer(
        service: &LedgerService,
        name: &str,
        cpf: &str,
        since: NaiveDate,
    ) -> Result<Customer> {
        let customer = Customer::try_new(name, individual(cpf), "555-0100")?.with_created_at(since);
        service.repository().save_customer(&customer).await?;
        Ok(customer)
    }

    /// Apply a transaction dated `date`, keeping the live balance in step.
    pub async fn transaction(
        service: &LedgerService,
        account_id: AccountId,
        kind: TransactionType,
        amount: Amount,
        date: NaiveDate,
    ) -> Result<Transaction> {
        let account = service.get_account(account_id).await?;
        let (updated, transaction) =
            domain::apply_transaction(&account, kind, amount, None, noon(date))?;

        match service
            .repository()
            .commit_transaction(&updated, &transaction)
            .await?
        {
            WriteOutcome::Committed => Ok(transaction),
            WriteOutcome::VersionConflict => anyhow::bail!("unexpected version conflict"),
        }
    }

    /// Open an account with `opening` as initial balance.
    pub async fn account(
        service: &LedgerService,
        customer: &Customer,
        number: &str,
        opening: Amount,
    ) -> Result<Account> {
        Ok(service
            .create_account(customer.id, "Test Bank", "0001", number, opening)
            .await?)
    }
}
