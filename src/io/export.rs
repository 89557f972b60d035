use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{Account, Customer, CustomerId, Transaction, format_amount};

/// Full statement of one customer, as written by the JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerStatement {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub customer: Customer,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export a customer's transactions, across all accounts, to CSV format
    pub async fn export_statement_csv<W: Write>(
        &self,
        customer_id: CustomerId,
        writer: W,
    ) -> Result<usize> {
        let accounts = self.service.list_accounts(Some(customer_id)).await?;
        let transactions = self.service.list_transactions_for_customer(customer_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "account",
            "type",
            "amount",
            "description",
        ])?;

        let mut count = 0;
        for transaction in &transactions {
            let account_number = accounts
                .iter()
                .find(|a| a.id == transaction.account_id)
                .map(|a| a.number.clone())
                .unwrap_or_else(|| transaction.account_id.to_string());

            csv_writer.write_record([
                transaction.id.to_string(),
                transaction.date.to_rfc3339(),
                account_number,
                transaction.kind.as_str().to_string(),
                format_amount(transaction.amount),
                transaction.description.clone().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export a customer's statement as a JSON document
    pub async fn export_statement_json<W: Write>(
        &self,
        customer_id: CustomerId,
        mut writer: W,
    ) -> Result<CustomerStatement> {
        let customer = self.service.get_customer(customer_id).await?;
        let accounts = self.service.list_accounts(Some(customer_id)).await?;
        let transactions = self.service.list_transactions_for_customer(customer_id).await?;

        let statement = CustomerStatement {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            customer,
            accounts,
            transactions,
        };

        write_json(&statement, &mut writer)?;
        Ok(statement)
    }
}

/// Write any serializable value (typically a report) as pretty JSON
pub fn write_json<T: Serialize, W: Write>(value: &T, mut writer: W) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
