use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use super::{Account, AccountId, Amount, Transaction, TransactionType};

/// Apply a credit or debit to an account.
///
/// Returns the account with its new balance together with the transaction
/// that records the movement, stamped with `now`. The input account is left
/// untouched, so a rejected debit never leaves a half-applied state behind.
/// Debits fail when `amount > balance`; a debit of exactly the balance
/// succeeds and leaves the account at zero.
pub fn apply_transaction(
    account: &Account,
    kind: TransactionType,
    amount: Amount,
    description: Option<String>,
    now: DateTime<Utc>,
) -> Result<(Account, Transaction), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount(amount));
    }

    let new_balance = match kind {
        TransactionType::Credit => account
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?,
        TransactionType::Debit => {
            if amount > account.balance {
                return Err(LedgerError::InsufficientBalance {
                    account_id: account.id,
                    balance: account.balance,
                    requested: amount,
                });
            }
            account
                .balance
                .checked_sub(amount)
                .ok_or(LedgerError::AmountOverflow)?
        }
    };

    let mut updated = account.clone();
    updated.balance = new_balance;

    let mut transaction = Transaction::new(account.id, kind, amount, now);
    if let Some(desc) = description {
        transaction = transaction.with_description(desc);
    }

    Ok((updated, transaction))
}

/// Balance implied by an initial balance and a set of transactions:
/// initial + credits - debits.
pub fn replay_balance<'a>(
    initial_balance: Amount,
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> Result<Amount, LedgerError> {
    transactions
        .into_iter()
        .try_fold(initial_balance, |balance, t| {
            balance.checked_add(t.signed_amount())
        })
        .ok_or(LedgerError::AmountOverflow)
}

/// Reconstruct an account's balance as of `instant` (inclusive) by replaying
/// its transactions from the initial balance. Independent of the live balance.
pub fn balance_as_of(
    account: &Account,
    transactions: &[Transaction],
    instant: DateTime<Utc>,
) -> Result<Amount, LedgerError> {
    replay_balance(
        account.initial_balance,
        transactions
            .iter()
            .filter(|t| t.account_id == account.id && t.date <= instant),
    )
}

/// Transactions whose calendar day falls within `[start, end]`, both inclusive.
pub fn transactions_in_window(
    transactions: &[Transaction],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<&Transaction> {
    transactions
        .iter()
        .filter(|t| {
            let day = t.day();
            start <= day && day <= end
        })
        .collect()
}

/// Last representable instant of a calendar day, for "as of date" queries.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_micro_opt(23, 59, 59, 999_999)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Credit/debit movement counts over a set of transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementCounts {
    pub credits: u64,
    pub debits: u64,
}

impl MovementCounts {
    pub fn total(&self) -> u64 {
        self.credits + self.debits
    }
}

pub fn count_movements<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> MovementCounts {
    transactions
        .into_iter()
        .fold(MovementCounts::default(), |mut counts, t| {
            match t.kind {
                TransactionType::Credit => counts.credits += 1,
                TransactionType::Debit => counts.debits += 1,
            }
            counts
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient balance in account {account_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account_id: AccountId,
        balance: Amount,
        requested: Amount,
    },

    #[error("Transaction amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error("Amount is too large: the resulting balance is out of range")]
    AmountOverflow,
}
