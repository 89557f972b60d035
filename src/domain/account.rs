use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, CustomerId};

pub type AccountId = Uuid;

/// Lifecycle of an account. Accounts are never physically removed;
/// deleting one moves it to `Inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(AccountStatus::Active),
            "inactive" => Some(AccountStatus::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub customer_id: CustomerId,
    pub bank: String,
    pub agency: String,
    pub number: String,
    /// Balance when the account was opened; anchor for historical reconstruction
    pub initial_balance: Amount,
    /// Live balance, moved by every transaction
    pub balance: Amount,
    pub status: AccountStatus,
    /// Optimistic concurrency token, bumped on every balance write
    pub version: i64,
}

impl Account {
    pub fn new(
        customer_id: CustomerId,
        bank: impl Into<String>,
        agency: impl Into<String>,
        number: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            bank: bank.into(),
            agency: agency.into(),
            number: number.into(),
            initial_balance: Decimal::ZERO,
            balance: Decimal::ZERO,
            status: AccountStatus::Active,
            version: 0,
        }
    }

    /// Open the account with a non-zero balance. Sets both the anchor and the live balance.
    pub fn with_opening_balance(mut self, amount: Amount) -> Self {
        self.initial_balance = amount;
        self.balance = amount;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn deactivate(&mut self) {
        self.status = AccountStatus::Inactive;
    }
}

/// Short account number derived from a fresh UUID, as used for onboarding accounts.
pub fn generate_account_number() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}
