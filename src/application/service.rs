use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::{
    self, Account, AccountId, Address, AddressId, Amount, Customer, CustomerId, CustomerKind,
    IntegrityReport, Transaction, TransactionType, build_integrity_report, checked_total,
    generate_account_number,
};
use crate::storage::{InsertOutcome, Repository, WriteOutcome};

use super::{AppError, LedgerSettings};

/// How many times a transaction is recomputed when the account keeps
/// changing underneath it.
pub const MAX_APPLY_ATTEMPTS: usize = 3;

/// Description of the credit that funds every new customer's first account.
pub const OPENING_DEPOSIT_DESCRIPTION: &str = "Initial deposit";

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
pub struct LedgerService {
    pub(crate) repo: Repository,
    settings: LedgerSettings,
}

/// Result of onboarding a customer
pub struct OnboardingResult {
    pub customer: Customer,
    pub account: Account,
    pub opening_transaction: Transaction,
}

/// Result of applying a transaction
pub struct TransactionResult {
    pub transaction: Transaction,
    /// The account as stored after the transaction
    pub account: Account,
}

impl LedgerService {
    /// Create a new ledger service with the given repository and default settings.
    pub fn new(repo: Repository) -> Self {
        Self::with_settings(repo, LedgerSettings::default())
    }

    pub fn with_settings(repo: Repository, settings: LedgerSettings) -> Self {
        Self { repo, settings }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Underlying store, for maintenance and fixtures.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // ========================
    // Customer operations
    // ========================

    /// Register a customer and open their first account, funded with the
    /// configured opening deposit.
    pub async fn create_customer(
        &self,
        name: &str,
        kind: CustomerKind,
        phone: &str,
    ) -> Result<OnboardingResult, AppError> {
        let customer = Customer::try_new(name, kind, phone)?;
        let account = Account::new(
            customer.id,
            self.settings.bank_name.clone(),
            self.settings.agency.clone(),
            generate_account_number(),
        );
        let (account, opening_transaction) = domain::apply_transaction(
            &account,
            TransactionType::Credit,
            self.settings.opening_deposit,
            Some(OPENING_DEPOSIT_DESCRIPTION.to_string()),
            current_instant(),
        )?;

        match self
            .repo
            .save_onboarding(&customer, &account, &opening_transaction)
            .await?
        {
            InsertOutcome::Inserted => {}
            InsertOutcome::DuplicateDocument => return Err(duplicate_document(&customer.kind)),
        }
        info!(
            customer_id = %customer.id,
            kind = customer.kind.code(),
            account_id = %account.id,
            opening_deposit = %opening_transaction.amount,
            "Customer onboarded"
        );

        Ok(OnboardingResult {
            customer,
            account,
            opening_transaction,
        })
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        self.repo
            .get_customer(id)
            .await?
            .ok_or_else(|| AppError::CustomerNotFound(id.to_string()))
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        Ok(self.repo.list_customers().await?)
    }

    /// Change a customer's name and phone. Type, document and registration
    /// date never change.
    pub async fn update_customer(
        &self,
        id: CustomerId,
        name: &str,
        phone: &str,
    ) -> Result<Customer, AppError> {
        let mut customer = self.get_customer(id).await?;
        let updated = Customer::try_new(name, customer.kind.clone(), phone)?;
        customer.name = updated.name;
        customer.phone = updated.phone;

        self.repo.update_customer(&customer).await?;
        Ok(customer)
    }

    /// Delete a customer that owns no accounts. Its addresses go with it.
    pub async fn delete_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        let customer = self.get_customer(id).await?;

        let accounts = self.repo.count_accounts_for_customer(id).await?;
        if accounts > 0 {
            return Err(AppError::CustomerHasAccounts(id.to_string()));
        }

        self.repo.delete_customer(id).await?;
        info!(customer_id = %id, "Customer deleted");
        Ok(customer)
    }

    /// Sum of the live balances of all the customer's accounts.
    pub async fn customer_balance(&self, id: CustomerId) -> Result<Amount, AppError> {
        self.get_customer(id).await?;
        let accounts = self.repo.list_accounts_for_customer(id).await?;
        checked_total(accounts.iter().map(|a| a.balance))
            .ok_or_else(|| domain::LedgerError::AmountOverflow.into())
    }

    // ========================
    // Address operations
    // ========================

    pub async fn add_address(
        &self,
        customer_id: CustomerId,
        street: &str,
        city: &str,
        state: &str,
        zip_code: &str,
    ) -> Result<Address, AppError> {
        self.get_customer(customer_id).await?;

        let address = Address::try_new(customer_id, street, city, state, zip_code)?;
        self.repo.save_address(&address).await?;
        Ok(address)
    }

    pub async fn get_address(&self, id: AddressId) -> Result<Address, AppError> {
        self.repo
            .get_address(id)
            .await?
            .ok_or_else(|| AppError::AddressNotFound(id.to_string()))
    }

    /// List addresses, optionally only those of one customer.
    pub async fn list_addresses(
        &self,
        customer_id: Option<CustomerId>,
    ) -> Result<Vec<Address>, AppError> {
        match customer_id {
            Some(id) => Ok(self.repo.list_addresses_for_customer(id).await?),
            None => Ok(self.repo.list_addresses().await?),
        }
    }

    pub async fn update_address(
        &self,
        id: AddressId,
        street: &str,
        city: &str,
        state: &str,
        zip_code: &str,
    ) -> Result<Address, AppError> {
        let existing = self.get_address(id).await?;

        let mut address = Address::try_new(existing.customer_id, street, city, state, zip_code)?;
        address.id = existing.id;

        self.repo.update_address(&address).await?;
        Ok(address)
    }

    pub async fn delete_address(&self, id: AddressId) -> Result<Address, AppError> {
        let address = self.get_address(id).await?;
        self.repo.delete_address(id).await?;
        Ok(address)
    }

    // ========================
    // Account operations
    // ========================

    /// Open an account for an existing customer. The opening balance becomes
    /// the account's initial balance.
    pub async fn create_account(
        &self,
        customer_id: CustomerId,
        bank: &str,
        agency: &str,
        number: &str,
        opening_balance: Amount,
    ) -> Result<Account, AppError> {
        self.get_customer(customer_id).await?;
        validate_opening_balance(opening_balance)?;

        let account = Account::new(
            customer_id,
            required("bank", bank)?,
            required("agency", agency)?,
            required("number", number)?,
        )
        .with_opening_balance(opening_balance);

        self.repo.save_account(&account).await?;
        info!(account_id = %account.id, customer_id = %customer_id, "Account created");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    /// List accounts, optionally only those of one customer.
    pub async fn list_accounts(
        &self,
        customer_id: Option<CustomerId>,
    ) -> Result<Vec<Account>, AppError> {
        match customer_id {
            Some(id) => Ok(self.repo.list_accounts_for_customer(id).await?),
            None => Ok(self.repo.list_accounts().await?),
        }
    }

    /// Edit an account's details. Only allowed before its first transaction;
    /// the new opening balance replaces both the initial and the live balance.
    pub async fn update_account(
        &self,
        id: AccountId,
        bank: &str,
        agency: &str,
        number: &str,
        opening_balance: Amount,
    ) -> Result<Account, AppError> {
        let mut account = self.get_account(id).await?;

        if self.repo.account_has_transactions(id).await? {
            return Err(AppError::AccountHasTransactions(id.to_string()));
        }
        validate_opening_balance(opening_balance)?;

        account.bank = required("bank", bank)?;
        account.agency = required("agency", agency)?;
        account.number = required("number", number)?;
        account.initial_balance = opening_balance;
        account.balance = opening_balance;

        self.write_account(account).await
    }

    /// Deactivate an account. Its history stays in place.
    pub async fn delete_account(&self, id: AccountId) -> Result<Account, AppError> {
        let mut account = self.get_account(id).await?;
        if !account.is_active() {
            return Ok(account);
        }

        account.deactivate();
        let account = self.write_account(account).await?;
        info!(account_id = %id, "Account deactivated");
        Ok(account)
    }

    async fn write_account(&self, mut account: Account) -> Result<Account, AppError> {
        match self.repo.update_account(&account).await? {
            WriteOutcome::Committed => {
                account.version += 1;
                Ok(account)
            }
            WriteOutcome::VersionConflict => {
                warn!(account_id = %account.id, "Account changed during update");
                Err(AppError::ConcurrentModification(account.id.to_string()))
            }
        }
    }

    // ========================
    // Transaction operations
    // ========================

    /// Credit or debit an account.
    ///
    /// The new balance and the transaction record are stored together, and
    /// only if the account's version is still the one the balance was
    /// computed from. On a version clash the account is re-read and the
    /// transaction recomputed, up to `MAX_APPLY_ATTEMPTS` times.
    pub async fn apply_transaction(
        &self,
        account_id: AccountId,
        kind: TransactionType,
        amount: Amount,
        description: Option<String>,
    ) -> Result<TransactionResult, AppError> {
        for attempt in 1..=MAX_APPLY_ATTEMPTS {
            let account = self.get_account(account_id).await?;

            let (updated, transaction) = domain::apply_transaction(
                &account,
                kind,
                amount,
                description.clone(),
                current_instant(),
            )
            .inspect_err(|e| debug!(account_id = %account_id, error = %e, "Transaction rejected"))?;

            match self.repo.commit_transaction(&updated, &transaction).await? {
                WriteOutcome::Committed => {
                    info!(
                        account_id = %account_id,
                        transaction_id = %transaction.id,
                        kind = %kind,
                        amount = %amount,
                        balance = %updated.balance,
                        "Transaction applied"
                    );
                    let mut account = updated;
                    account.version += 1;
                    return Ok(TransactionResult {
                        transaction,
                        account,
                    });
                }
                WriteOutcome::VersionConflict => {
                    warn!(account_id = %account_id, attempt, "Account changed while applying transaction");
                }
            }
        }

        Err(AppError::ConcurrentModification(account_id.to_string()))
    }

    /// All transactions, in date order.
    pub async fn list_transactions(&self) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_transactions().await?)
    }

    pub async fn list_transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, AppError> {
        self.get_account(account_id).await?;
        Ok(self.repo.list_transactions_for_account(account_id).await?)
    }

    pub async fn list_transactions_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Transaction>, AppError> {
        self.get_customer(customer_id).await?;
        Ok(self.repo.list_transactions_for_customer(customer_id).await?)
    }

    /// Balance of an account as it stood at `instant`, rebuilt from history.
    pub async fn balance_as_of(
        &self,
        account_id: AccountId,
        instant: DateTime<Utc>,
    ) -> Result<Amount, AppError> {
        let account = self.get_account(account_id).await?;
        let transactions = self
            .repo
            .list_transactions_for_account_up_to(account_id, instant)
            .await?;
        Ok(domain::balance_as_of(&account, &transactions, instant)?)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Replay every account's history and compare it with the live balance.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let accounts = self.repo.list_accounts().await?;
        let transactions = self.repo.list_transactions().await?;
        let report = build_integrity_report(&accounts, &transactions);

        if !report.is_healthy() {
            warn!(
                mismatches = report.mismatches.len(),
                orphans = report.orphan_transactions,
                "Ledger integrity check found issues"
            );
        }
        Ok(report)
    }
}

/// Transaction timestamps are kept at microsecond precision, which is what storage holds.
pub(crate) fn current_instant() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn validate_opening_balance(amount: Amount) -> Result<(), AppError> {
    if amount < Decimal::ZERO {
        return Err(AppError::Validation(
            "Opening balance cannot be negative".to_string(),
        ));
    }
    Ok(())
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is mandatory", field)));
    }
    Ok(value.to_string())
}

fn duplicate_document(kind: &CustomerKind) -> AppError {
    match kind {
        CustomerKind::Individual { cpf } => AppError::CpfAlreadyExists(cpf.clone()),
        CustomerKind::Corporate { cnpj } => AppError::CnpjAlreadyExists(cnpj.clone()),
    }
}
