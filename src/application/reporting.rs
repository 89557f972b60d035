use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{
    self, Account, Address, Amount, Customer, CustomerId, FeeWindow, LedgerError, Transaction,
    checked_total, count_movements, fee_windows, format_report_date, primary_address_label,
    total_fee, transactions_in_window,
};

use super::{AppError, LedgerService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBalanceReport {
    pub customer_name: String,
    pub customer_since: String,
    pub address: String,
    pub credit_movements: u64,
    pub debit_movements: u64,
    pub total_movements: u64,
    pub fee_paid: Amount,
    pub initial_balance: Amount,
    pub current_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBalancePeriodReport {
    pub period: String,
    pub customer_name: String,
    pub customer_since: String,
    pub address: String,
    pub credit_movements: u64,
    pub debit_movements: u64,
    pub total_movements: u64,
    /// Cumulative fee over the full history, not just the period
    pub fee_paid: Amount,
    pub initial_balance: Amount,
    pub current_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomersBalanceSummaryReport {
    pub report_date: String,
    pub customers: Vec<CustomerBalanceSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBalanceSummary {
    pub customer_name: String,
    pub customer_since: String,
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRevenueReport {
    pub start_date: String,
    pub end_date: String,
    pub customers: Vec<CustomerRevenue>,
    pub total_revenue: Amount,
}

/// Gross transaction volume of one customer: credits and debits are both
/// counted as positive amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRevenue {
    pub customer_name: String,
    pub transaction_count: u64,
    pub total_amount: Amount,
}

// ========================
// Report assembly
// ========================

/// Initial and live balance summed over a customer's accounts.
fn summed_balances(accounts: &[Account]) -> Result<(Amount, Amount), AppError> {
    let initial = checked_total(accounts.iter().map(|a| a.initial_balance));
    let current = checked_total(accounts.iter().map(|a| a.balance));
    initial.zip(current).ok_or_else(out_of_range)
}

fn out_of_range() -> AppError {
    LedgerError::AmountOverflow.into()
}

fn require_accounts(customer: &Customer, accounts: &[Account]) -> Result<(), AppError> {
    if accounts.is_empty() {
        return Err(AppError::NoAccountsFound(customer.id.to_string()));
    }
    Ok(())
}

/// Current position of a customer. `transactions` is the full history of
/// all their accounts.
pub fn build_customer_balance_report(
    customer: &Customer,
    addresses: &[Address],
    accounts: &[Account],
    transactions: &[Transaction],
    today: NaiveDate,
) -> Result<CustomerBalanceReport, AppError> {
    require_accounts(customer, accounts)?;

    let (initial_balance, current_balance) = summed_balances(accounts)?;
    let movements = count_movements(transactions);

    Ok(CustomerBalanceReport {
        customer_name: customer.name.clone(),
        customer_since: customer.since_label(),
        address: primary_address_label(addresses),
        credit_movements: movements.credits,
        debit_movements: movements.debits,
        total_movements: movements.total(),
        fee_paid: total_fee(customer.created_at, transactions, today),
        initial_balance,
        current_balance,
    })
}

/// Like [`build_customer_balance_report`] but movement counts only cover
/// `[start, end]`. The fee still comes from the full history in
/// `transactions`; only the counts are narrowed to the period.
pub fn build_customer_balance_period_report(
    customer: &Customer,
    addresses: &[Address],
    accounts: &[Account],
    transactions: &[Transaction],
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<CustomerBalancePeriodReport, AppError> {
    validate_range(start, end)?;
    require_accounts(customer, accounts)?;

    let (initial_balance, current_balance) = summed_balances(accounts)?;
    let movements = count_movements(transactions_in_window(transactions, start, end));

    Ok(CustomerBalancePeriodReport {
        period: format!("{} to {}", format_report_date(start), format_report_date(end)),
        customer_name: customer.name.clone(),
        customer_since: customer.since_label(),
        address: primary_address_label(addresses),
        credit_movements: movements.credits,
        debit_movements: movements.debits,
        total_movements: movements.total(),
        fee_paid: total_fee(customer.created_at, transactions, today),
        initial_balance,
        current_balance,
    })
}

/// A customer's balance at the end of `date`, summed across accounts.
/// Customers without accounts contribute zero.
pub fn build_balance_summary_entry(
    customer: &Customer,
    accounts: &[Account],
    transactions: &[Transaction],
    date: NaiveDate,
) -> Result<CustomerBalanceSummary, AppError> {
    let instant = domain::end_of_day(date);
    let balances = accounts
        .iter()
        .map(|account| domain::balance_as_of(account, transactions, instant))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CustomerBalanceSummary {
        customer_name: customer.name.clone(),
        customer_since: customer.since_label(),
        balance: checked_total(balances).ok_or_else(out_of_range)?,
    })
}

/// Gross volume of a customer's transactions whose day falls in `[start, end]`.
/// Returns `None` when nothing falls in the range.
pub fn build_customer_revenue(
    customer: &Customer,
    transactions: &[Transaction],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Option<CustomerRevenue>, AppError> {
    let in_range = transactions_in_window(transactions, start, end);
    if in_range.is_empty() {
        return Ok(None);
    }

    Ok(Some(CustomerRevenue {
        customer_name: customer.name.clone(),
        transaction_count: in_range.len() as u64,
        total_amount: checked_total(in_range.iter().map(|t| t.amount)).ok_or_else(out_of_range)?,
    }))
}

pub fn build_company_revenue_report(
    start: NaiveDate,
    end: NaiveDate,
    customers: Vec<CustomerRevenue>,
) -> Result<CompanyRevenueReport, AppError> {
    let total_revenue =
        checked_total(customers.iter().map(|c| c.total_amount)).ok_or_else(out_of_range)?;
    Ok(CompanyRevenueReport {
        start_date: format_report_date(start),
        end_date: format_report_date(end),
        customers,
        total_revenue,
    })
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if start > end {
        return Err(AppError::Validation(format!(
            "Start date {} is after end date {}",
            start, end
        )));
    }
    Ok(())
}

// ========================
// Report use cases
// ========================

/// Everything a customer-level report needs, read in one go.
struct CustomerLedger {
    customer: Customer,
    addresses: Vec<Address>,
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
}

impl LedgerService {
    async fn load_customer_ledger(&self, customer_id: CustomerId) -> Result<CustomerLedger, AppError> {
        let customer = self.get_customer(customer_id).await?;
        let accounts = self.repo.list_accounts_for_customer(customer_id).await?;
        if accounts.is_empty() {
            return Err(AppError::NoAccountsFound(customer_id.to_string()));
        }
        let addresses = self.repo.list_addresses_for_customer(customer_id).await?;

        let mut transactions = Vec::new();
        for account in &accounts {
            transactions.extend(self.repo.list_transactions_for_account(account.id).await?);
        }

        Ok(CustomerLedger {
            customer,
            addresses,
            accounts,
            transactions,
        })
    }

    /// Current balance report for one customer.
    pub async fn customer_balance_report(
        &self,
        customer_id: CustomerId,
    ) -> Result<CustomerBalanceReport, AppError> {
        let ledger = self.load_customer_ledger(customer_id).await?;
        info!(customer_id = %customer_id, "Generating customer balance report");

        build_customer_balance_report(
            &ledger.customer,
            &ledger.addresses,
            &ledger.accounts,
            &ledger.transactions,
            today(),
        )
    }

    /// Balance report for one customer with movements restricted to `[start, end]`.
    pub async fn customer_balance_period_report(
        &self,
        customer_id: CustomerId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CustomerBalancePeriodReport, AppError> {
        let ledger = self.load_customer_ledger(customer_id).await?;
        info!(customer_id = %customer_id, %start, %end, "Generating customer period report");

        build_customer_balance_period_report(
            &ledger.customer,
            &ledger.addresses,
            &ledger.accounts,
            &ledger.transactions,
            start,
            end,
            today(),
        )
    }

    /// Cumulative service fee of a customer since registration.
    pub async fn total_fee(&self, customer_id: CustomerId) -> Result<Amount, AppError> {
        let customer = self.get_customer(customer_id).await?;
        let transactions = self.repo.list_transactions_for_customer(customer_id).await?;
        Ok(total_fee(customer.created_at, &transactions, today()))
    }

    /// Window-by-window breakdown of a customer's fee.
    pub async fn fee_breakdown(&self, customer_id: CustomerId) -> Result<Vec<FeeWindow>, AppError> {
        let customer = self.get_customer(customer_id).await?;
        let transactions = self.repo.list_transactions_for_customer(customer_id).await?;
        Ok(fee_windows(customer.created_at, &transactions, today()))
    }

    /// Every customer's balance as of the end of `date` (default: today).
    pub async fn balance_summary_report(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<CustomersBalanceSummaryReport, AppError> {
        let date = date.unwrap_or_else(today);
        let instant = domain::end_of_day(date);
        info!(%date, "Generating balance summary report");

        let mut customers = Vec::new();
        for customer in self.repo.list_customers().await? {
            let accounts = self.repo.list_accounts_for_customer(customer.id).await?;
            let mut transactions = Vec::new();
            for account in &accounts {
                transactions.extend(
                    self.repo
                        .list_transactions_for_account_up_to(account.id, instant)
                        .await?,
                );
            }
            customers.push(build_balance_summary_entry(
                &customer,
                &accounts,
                &transactions,
                date,
            )?);
        }

        Ok(CustomersBalanceSummaryReport {
            report_date: format_report_date(date),
            customers,
        })
    }

    /// Gross transaction volume per customer over `[start, end]`.
    pub async fn company_revenue_report(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CompanyRevenueReport, AppError> {
        validate_range(start, end)?;
        info!(%start, %end, "Generating company revenue report");

        let mut revenues = Vec::new();
        for customer in self.repo.list_customers().await? {
            let transactions = self.repo.list_transactions_for_customer(customer.id).await?;
            if let Some(revenue) = build_customer_revenue(&customer, &transactions, start, end)? {
                revenues.push(revenue);
            }
        }

        build_company_revenue_report(start, end, revenues)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Days};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::domain::{CustomerKind, NO_ADDRESS, TransactionType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn noon(day: NaiveDate) -> DateTime<Utc> {
        day.and_hms_opt(12, 0, 0).unwrap().and_utc()
    }

    fn customer(name: &str, since: NaiveDate) -> Customer {
        Customer::new(
            name.into(),
            CustomerKind::Individual {
                cpf: Uuid::new_v4().to_string(),
            },
            "555-0100".into(),
        )
        .with_created_at(since)
    }

    fn tx(account: &Account, kind: TransactionType, amount: Amount, day: NaiveDate) -> Transaction {
        Transaction::new(account.id, kind, amount, noon(day))
    }

    #[test]
    fn test_balance_report_example() {
        let today = date(2024, 6, 30);
        let ana = customer("Ana", date(2024, 6, 1));
        let mut account =
            Account::new(ana.id, "Bank", "0001", "1").with_opening_balance(dec!(1000.00));
        account.balance = dec!(1200.00);
        let transactions = vec![
            tx(&account, TransactionType::Credit, dec!(300.00), today - Days::new(10)),
            tx(&account, TransactionType::Debit, dec!(100.00), today - Days::new(5)),
        ];

        let report =
            build_customer_balance_report(&ana, &[], &[account], &transactions, today).unwrap();

        assert_eq!(report.customer_name, "Ana");
        assert_eq!(report.customer_since, "01/06/2024");
        assert_eq!(report.address, NO_ADDRESS);
        assert_eq!(report.credit_movements, 1);
        assert_eq!(report.debit_movements, 1);
        assert_eq!(report.total_movements, 2);
        assert_eq!(report.initial_balance, dec!(1000.00));
        assert_eq!(report.current_balance, dec!(1200.00));
        assert_eq!(report.fee_paid, dec!(2.00));
    }

    #[test]
    fn test_balance_report_sums_accounts_and_uses_first_address() {
        let today = date(2024, 6, 30);
        let ana = customer("Ana", date(2024, 6, 1));
        let first = Account::new(ana.id, "Bank", "0001", "1").with_opening_balance(dec!(10));
        let second = Account::new(ana.id, "Bank", "0001", "2").with_opening_balance(dec!(5.5));
        let home = Address::try_new(ana.id, "Rua A", "Recife", "PE", "50000").unwrap();
        let office = Address::try_new(ana.id, "Rua B", "Recife", "PE", "50001").unwrap();

        let report = build_customer_balance_report(
            &ana,
            &[home.clone(), office],
            &[first, second],
            &[],
            today,
        )
        .unwrap();

        assert_eq!(report.initial_balance, dec!(15.5));
        assert_eq!(report.current_balance, dec!(15.5));
        assert_eq!(report.address, home.one_line());
        assert_eq!(report.fee_paid, Decimal::ZERO);
    }

    #[test]
    fn test_reports_without_accounts_fail() {
        let ana = customer("Ana", date(2024, 6, 1));
        let today = date(2024, 6, 30);

        assert!(matches!(
            build_customer_balance_report(&ana, &[], &[], &[], today),
            Err(AppError::NoAccountsFound(_))
        ));
        assert!(matches!(
            build_customer_balance_period_report(&ana, &[], &[], &[], today, today, today),
            Err(AppError::NoAccountsFound(_))
        ));
    }

    #[test]
    fn test_period_fee_uses_full_history_quirk() {
        // Movement counts follow the period, but the fee is charged on every
        // transaction since registration. Reproduced on purpose.
        let since = date(2024, 1, 1);
        let today = date(2024, 1, 20);
        let ana = customer("Ana", since);
        let account = Account::new(ana.id, "Bank", "0001", "1");
        let transactions: Vec<Transaction> = (1..=12)
            .map(|d| tx(&account, TransactionType::Credit, dec!(1), date(2024, 1, d)))
            .collect();

        let report = build_customer_balance_period_report(
            &ana,
            &[],
            &[account],
            &transactions,
            date(2024, 1, 10),
            date(2024, 1, 12),
            today,
        )
        .unwrap();

        assert_eq!(report.total_movements, 3);
        assert_eq!(report.credit_movements, 3);
        // 12 transactions in the first window -> 0.75 each
        assert_eq!(report.fee_paid, dec!(9.00));
        assert_eq!(report.period, "10/01/2024 to 12/01/2024");
    }

    #[test]
    fn test_period_report_rejects_inverted_range() {
        let ana = customer("Ana", date(2024, 1, 1));
        let account = Account::new(ana.id, "Bank", "0001", "1");
        assert!(matches!(
            build_customer_balance_period_report(
                &ana,
                &[],
                &[account],
                &[],
                date(2024, 2, 1),
                date(2024, 1, 1),
                date(2024, 3, 1),
            ),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_summary_entry_reconstructs_historic_balance() {
        let ana = customer("Ana", date(2024, 1, 1));
        let mut account = Account::new(ana.id, "Bank", "0001", "1").with_opening_balance(dec!(100));
        account.balance = dec!(130);
        let transactions = vec![
            tx(&account, TransactionType::Credit, dec!(50), date(2024, 1, 10)),
            tx(&account, TransactionType::Debit, dec!(20), date(2024, 1, 20)),
        ];

        let on = |d| {
            build_balance_summary_entry(&ana, &[account.clone()], &transactions, d)
                .unwrap()
                .balance
        };
        assert_eq!(on(date(2024, 1, 9)), dec!(100));
        assert_eq!(on(date(2024, 1, 10)), dec!(150));
        assert_eq!(on(date(2024, 1, 31)), dec!(130));
    }

    #[test]
    fn test_summary_entry_without_accounts_is_zero() {
        let ana = customer("Ana", date(2024, 1, 1));
        let entry = build_balance_summary_entry(&ana, &[], &[], date(2024, 1, 1)).unwrap();
        assert_eq!(entry.balance, Decimal::ZERO);
        assert_eq!(entry.customer_since, "01/01/2024");
    }

    #[test]
    fn test_revenue_is_gross_and_skips_idle_customers() {
        let start = date(2024, 3, 1);
        let end = date(2024, 3, 31);
        let ana = customer("Ana", date(2024, 1, 1));
        let bia = customer("Bia", date(2024, 1, 1));
        let ana_account = Account::new(ana.id, "Bank", "0001", "1");
        let bia_account = Account::new(bia.id, "Bank", "0001", "2");

        let ana_txs = vec![
            tx(&ana_account, TransactionType::Credit, dec!(100), date(2024, 3, 1)),
            tx(&ana_account, TransactionType::Debit, dec!(40), date(2024, 3, 31)),
            tx(&ana_account, TransactionType::Credit, dec!(999), date(2024, 4, 1)),
        ];
        let bia_txs = vec![tx(&bia_account, TransactionType::Credit, dec!(5), date(2024, 2, 29))];

        let revenues: Vec<CustomerRevenue> = [
            build_customer_revenue(&ana, &ana_txs, start, end).unwrap(),
            build_customer_revenue(&bia, &bia_txs, start, end).unwrap(),
        ]
        .into_iter()
        .flatten()
        .collect();

        let report = build_company_revenue_report(start, end, revenues).unwrap();
        assert_eq!(report.customers.len(), 1);
        assert_eq!(report.customers[0].customer_name, "Ana");
        assert_eq!(report.customers[0].transaction_count, 2);
        assert_eq!(report.customers[0].total_amount, dec!(140));
        assert_eq!(report.total_revenue, dec!(140));
        assert_eq!(report.start_date, "01/03/2024");
        assert_eq!(report.end_date, "31/03/2024");
    }

    #[test]
    fn test_balances_out_of_decimal_range_fail_cleanly() {
        let ana = customer("Ana", date(2024, 1, 1));
        let first = Account::new(ana.id, "Bank", "0001", "1").with_opening_balance(Decimal::MAX);
        let second = Account::new(ana.id, "Bank", "0001", "2").with_opening_balance(dec!(1));

        let accounts = [first, second];
        assert!(matches!(
            build_customer_balance_report(&ana, &[], &accounts, &[], date(2024, 1, 2)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            build_balance_summary_entry(&ana, &accounts, &[], date(2024, 1, 2)),
            Err(AppError::Validation(_))
        ));

        let revenues = vec![
            CustomerRevenue {
                customer_name: "Ana".into(),
                transaction_count: 1,
                total_amount: Decimal::MAX,
            },
            CustomerRevenue {
                customer_name: "Bia".into(),
                transaction_count: 1,
                total_amount: dec!(1),
            },
        ];
        assert!(matches!(
            build_company_revenue_report(date(2024, 1, 1), date(2024, 1, 2), revenues),
            Err(AppError::Validation(_))
        ));
    }
}
