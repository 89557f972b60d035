use thiserror::Error;

use crate::domain::{AccountId, Amount, CustomerValidationError, LedgerError, ParseAmountError};

/// Broad error categories. Each maps to one stable status signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InsufficientBalance,
    ValidationFailed,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Address not found: {0}")]
    AddressNotFound(String),

    #[error("No accounts found for customer {0}")]
    NoAccountsFound(String),

    #[error("CPF already exists: {0}")]
    CpfAlreadyExists(String),

    #[error("CNPJ already exists: {0}")]
    CnpjAlreadyExists(String),

    #[error("Customer {0} still owns accounts and cannot be deleted")]
    CustomerHasAccounts(String),

    #[error("Account {0} already has transactions and cannot be edited")]
    AccountHasTransactions(String),

    #[error("Account {0} was modified concurrently, please retry")]
    ConcurrentModification(String),

    #[error("Insufficient balance in account {account_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account_id: AccountId,
        balance: Amount,
        requested: Amount,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CustomerNotFound(_)
            | Self::AccountNotFound(_)
            | Self::AddressNotFound(_)
            | Self::NoAccountsFound(_) => ErrorKind::NotFound,
            Self::CpfAlreadyExists(_)
            | Self::CnpjAlreadyExists(_)
            | Self::CustomerHasAccounts(_)
            | Self::AccountHasTransactions(_)
            | Self::ConcurrentModification(_) => ErrorKind::Conflict,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::Validation(_) => ErrorKind::ValidationFailed,
            Self::Database(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::InsufficientBalance => 422,
            ErrorKind::ValidationFailed => 400,
            ErrorKind::Internal => 500,
        }
    }

    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorKind::ValidationFailed => "VALIDATION_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// Process exit code used by the command-line front end.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Internal => 1,
            ErrorKind::NotFound => 2,
            ErrorKind::Conflict => 3,
            ErrorKind::InsufficientBalance => 4,
            ErrorKind::ValidationFailed => 5,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                account_id,
                balance,
                requested,
            } => AppError::InsufficientBalance {
                account_id,
                balance,
                requested,
            },
            LedgerError::NonPositiveAmount(_) | LedgerError::AmountOverflow => {
                AppError::Validation(err.to_string())
            }
        }
    }
}

impl From<CustomerValidationError> for AppError {
    fn from(err: CustomerValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<ParseAmountError> for AppError {
    fn from(err: ParseAmountError) -> Self {
        AppError::Validation(err.to_string())
    }
}
