use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, AccountStatus, Address, AddressId, Customer, CustomerId, CustomerKind,
    Transaction, TransactionType,
};

use super::MIGRATION_001_INITIAL;

const CUSTOMER_COLUMNS: &str = "id, name, customer_type, cpf, cnpj, phone, created_at";
const ADDRESS_COLUMNS: &str = "id, customer_id, street, city, state, zip_code";
const ACCOUNT_COLUMNS: &str =
    "id, customer_id, bank, agency, number, initial_balance, balance, status, version";
const TRANSACTION_COLUMNS: &str = "id, account_id, transaction_type, amount, date, description";

/// Outcome of a version-checked account write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed,
    /// The account changed (or vanished) since it was read; nothing was written.
    VersionConflict,
}

/// Outcome of inserting a new customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another customer already holds the CPF or CNPJ; nothing was written.
    DuplicateDocument,
}

/// Repository for persisting and querying customers, addresses, accounts and transactions.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Customer operations
    // ========================

    /// Store a new customer. A CPF or CNPJ that is already registered is
    /// reported as [`InsertOutcome::DuplicateDocument`], not as an error.
    pub async fn save_customer(&self, customer: &Customer) -> Result<InsertOutcome> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        Self::insert_customer(&mut conn, customer).await
    }

    async fn insert_customer(
        conn: &mut sqlx::SqliteConnection,
        customer: &Customer,
    ) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO customers (id, name, customer_type, cpf, cnpj, phone, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer.id.to_string())
        .bind(&customer.name)
        .bind(customer.kind.code())
        .bind(customer.kind.cpf())
        .bind(customer.kind.cnpj())
        .bind(&customer.phone)
        .bind(customer.created_at.to_string())
        .execute(conn)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(InsertOutcome::DuplicateDocument)
            }
            Err(e) => Err(e).context("Failed to save customer"),
        }
    }

    /// Store a new customer, their first account and its opening transaction
    /// as one unit. On a duplicate document nothing is written.
    pub async fn save_onboarding(
        &self,
        customer: &Customer,
        account: &Account,
        transaction: &Transaction,
    ) -> Result<InsertOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        if Self::insert_customer(&mut tx, customer).await? == InsertOutcome::DuplicateDocument {
            tx.rollback().await.context("Failed to roll back transaction")?;
            return Ok(InsertOutcome::DuplicateDocument);
        }
        Self::insert_account(&mut tx, account).await?;
        Self::insert_transaction(&mut tx, transaction).await?;

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(InsertOutcome::Inserted)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let query = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch customer")?;

        row.as_ref().map(Self::row_to_customer).transpose()
    }

    /// List all customers, oldest first.
    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        let query = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY created_at, rowid");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list customers")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    /// Update the mutable customer fields (name and phone).
    pub async fn update_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query("UPDATE customers SET name = ?, phone = ? WHERE id = ?")
            .bind(&customer.name)
            .bind(&customer.phone)
            .bind(customer.id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update customer")?;
        Ok(())
    }

    /// Physically delete a customer and its addresses.
    pub async fn delete_customer(&self, id: CustomerId) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM addresses WHERE customer_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete customer addresses")?;

        sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete customer")?;

        tx.commit().await.context("Failed to commit customer deletion")?;
        Ok(())
    }

    fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer> {
        let id_str: String = row.get("id");
        let type_str: String = row.get("customer_type");
        let cpf: Option<String> = row.get("cpf");
        let cnpj: Option<String> = row.get("cnpj");
        let created_at_str: String = row.get("created_at");

        Ok(Customer {
            id: Uuid::parse_str(&id_str).context("Invalid customer ID")?,
            name: row.get("name"),
            kind: CustomerKind::from_parts(&type_str, cpf.as_deref(), cnpj.as_deref())
                .with_context(|| format!("Invalid stored customer {id_str}"))?,
            phone: row.get("phone"),
            created_at: NaiveDate::from_str(&created_at_str)
                .context("Invalid customer created_at date")?,
        })
    }

    // ========================
    // Address operations
    // ========================

    pub async fn save_address(&self, address: &Address) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO addresses (id, customer_id, street, city, state, zip_code)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(address.id.to_string())
        .bind(address.customer_id.to_string())
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip_code)
        .execute(&self.pool)
        .await
        .context("Failed to save address")?;
        Ok(())
    }

    pub async fn get_address(&self, id: AddressId) -> Result<Option<Address>> {
        let query = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch address")?;

        row.as_ref().map(Self::row_to_address).transpose()
    }

    pub async fn list_addresses(&self) -> Result<Vec<Address>> {
        let query = format!("SELECT {ADDRESS_COLUMNS} FROM addresses ORDER BY rowid");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list addresses")?;

        rows.iter().map(Self::row_to_address).collect()
    }

    /// Addresses of a customer in the order they were recorded.
    pub async fn list_addresses_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Address>> {
        let query =
            format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE customer_id = ? ORDER BY rowid");
        let rows = sqlx::query(&query)
            .bind(customer_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list addresses for customer")?;

        rows.iter().map(Self::row_to_address).collect()
    }

    pub async fn update_address(&self, address: &Address) -> Result<()> {
        sqlx::query("UPDATE addresses SET street = ?, city = ?, state = ?, zip_code = ? WHERE id = ?")
            .bind(&address.street)
            .bind(&address.city)
            .bind(&address.state)
            .bind(&address.zip_code)
            .bind(address.id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update address")?;
        Ok(())
    }

    pub async fn delete_address(&self, id: AddressId) -> Result<()> {
        sqlx::query("DELETE FROM addresses WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete address")?;
        Ok(())
    }

    fn row_to_address(row: &sqlx::sqlite::SqliteRow) -> Result<Address> {
        let id_str: String = row.get("id");
        let customer_str: String = row.get("customer_id");

        Ok(Address {
            id: Uuid::parse_str(&id_str).context("Invalid address ID")?,
            customer_id: Uuid::parse_str(&customer_str).context("Invalid address customer ID")?,
            street: row.get("street"),
            city: row.get("city"),
            state: row.get("state"),
            zip_code: row.get("zip_code"),
        })
    }

    // ========================
    // Account operations
    // ========================

    pub async fn save_account(&self, account: &Account) -> Result<()> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        Self::insert_account(&mut conn, account).await
    }

    async fn insert_account(conn: &mut sqlx::SqliteConnection, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, customer_id, bank, agency, number, initial_balance, balance, status, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.customer_id.to_string())
        .bind(&account.bank)
        .bind(&account.agency)
        .bind(&account.number)
        .bind(account.initial_balance.to_string())
        .bind(account.balance.to_string())
        .bind(account.status.as_str())
        .bind(account.version)
        .execute(conn)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY rowid");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// All accounts of a customer, active or not.
    pub async fn list_accounts_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Account>> {
        let query =
            format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE customer_id = ? ORDER BY rowid");
        let rows = sqlx::query(&query)
            .bind(customer_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts for customer")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    pub async fn count_accounts_for_customer(&self, customer_id: CustomerId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM accounts WHERE customer_id = ?")
            .bind(customer_id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count accounts")?;

        Ok(row.get("count"))
    }

    /// Write every mutable account field, provided the stored version still
    /// equals `account.version`. The stored version is bumped on success.
    pub async fn update_account(&self, account: &Account) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET bank = ?, agency = ?, number = ?, initial_balance = ?, balance = ?, status = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(&account.bank)
        .bind(&account.agency)
        .bind(&account.number)
        .bind(account.initial_balance.to_string())
        .bind(account.balance.to_string())
        .bind(account.status.as_str())
        .bind(account.id.to_string())
        .bind(account.version)
        .execute(&self.pool)
        .await
        .context("Failed to update account")?;

        Ok(if result.rows_affected() == 0 {
            WriteOutcome::VersionConflict
        } else {
            WriteOutcome::Committed
        })
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let customer_str: String = row.get("customer_id");
        let initial_str: String = row.get("initial_balance");
        let balance_str: String = row.get("balance");
        let status_str: String = row.get("status");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            customer_id: Uuid::parse_str(&customer_str).context("Invalid account customer ID")?,
            bank: row.get("bank"),
            agency: row.get("agency"),
            number: row.get("number"),
            initial_balance: parse_decimal(&initial_str).context("Invalid initial balance")?,
            balance: parse_decimal(&balance_str).context("Invalid balance")?,
            status: AccountStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid account status: {}", status_str))?,
            version: row.get("version"),
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Persist a new balance for `account` and the transaction that produced it
    /// as one unit. `account.version` must be the version the balance was
    /// computed from; if another writer got there first nothing is stored.
    pub async fn commit_transaction(
        &self,
        account: &Account,
        transaction: &Transaction,
    ) -> Result<WriteOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(account.balance.to_string())
        .bind(account.id.to_string())
        .bind(account.version)
        .execute(&mut *tx)
        .await
        .context("Failed to update account balance")?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.context("Failed to roll back transaction")?;
            return Ok(WriteOutcome::VersionConflict);
        }

        Self::insert_transaction(&mut tx, transaction).await?;

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(WriteOutcome::Committed)
    }

    async fn insert_transaction(
        conn: &mut sqlx::SqliteConnection,
        transaction: &Transaction,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, account_id, transaction_type, amount, date, description)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.account_id.to_string())
        .bind(transaction.kind.as_str())
        .bind(transaction.amount.to_string())
        .bind(format_timestamp(&transaction.date))
        .bind(&transaction.description)
        .execute(conn)
        .await
        .context("Failed to save transaction")?;
        Ok(())
    }

    /// List all transactions, in date order.
    pub async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY date, rowid");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    pub async fn list_transactions_for_account(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE account_id = ? ORDER BY date, rowid"
        );
        let rows = sqlx::query(&query)
            .bind(account_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions for account")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Transactions of an account dated at or before `instant`.
    pub async fn list_transactions_for_account_up_to(
        &self,
        account_id: AccountId,
        instant: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE account_id = ? AND date <= ? ORDER BY date, rowid"
        );
        let rows = sqlx::query(&query)
            .bind(account_id.to_string())
            .bind(format_timestamp(&instant))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions up to date")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Transactions across all accounts of a customer.
    pub async fn list_transactions_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.account_id, t.transaction_type, t.amount, t.date, t.description
            FROM transactions t
            JOIN accounts a ON a.id = t.account_id
            WHERE a.customer_id = ?
            ORDER BY t.date, t.rowid
            "#,
        )
        .bind(customer_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for customer")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    pub async fn account_has_transactions(&self, account_id: AccountId) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE account_id = ?) as has_any",
        )
        .bind(account_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to check account transactions")?;

        Ok(row.get::<i64, _>("has_any") != 0)
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let account_str: String = row.get("account_id");
        let type_str: String = row.get("transaction_type");
        let amount_str: String = row.get("amount");
        let date_str: String = row.get("date");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            account_id: Uuid::parse_str(&account_str).context("Invalid transaction account ID")?,
            kind: TransactionType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", type_str))?,
            amount: parse_decimal(&amount_str).context("Invalid transaction amount")?,
            date: DateTime::parse_from_rfc3339(&date_str)
                .context("Invalid transaction date")?
                .with_timezone(&Utc),
            description: row.get("description"),
        })
    }
}

/// Fixed-width UTC timestamps, so that text order in SQL is time order.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("not a decimal: {s}"))
}
