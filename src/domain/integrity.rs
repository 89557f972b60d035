use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Account, AccountId, Amount, Transaction, replay_balance};

/// An account whose live balance disagrees with its replayed history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceMismatch {
    pub account_id: AccountId,
    pub live_balance: Amount,
    pub replayed_balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub account_count: usize,
    pub transaction_count: usize,
    /// Stored transactions with a zero or negative amount
    pub invalid_amounts: usize,
    /// Transactions pointing at an account that does not exist
    pub orphan_transactions: usize,
    pub negative_balances: Vec<AccountId>,
    pub mismatches: Vec<BalanceMismatch>,
    /// Accounts whose history cannot be replayed within the decimal range
    pub unreplayable: Vec<AccountId>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.invalid_amounts == 0
            && self.orphan_transactions == 0
            && self.negative_balances.is_empty()
            && self.mismatches.is_empty()
            && self.unreplayable.is_empty()
    }
}

/// Check that every account's live balance equals initial balance plus its
/// full transaction history.
pub fn build_integrity_report(accounts: &[Account], transactions: &[Transaction]) -> IntegrityReport {
    let mut by_account: HashMap<AccountId, Vec<&Transaction>> = HashMap::new();
    for transaction in transactions {
        by_account
            .entry(transaction.account_id)
            .or_default()
            .push(transaction);
    }

    let mut mismatches = Vec::new();
    let mut negative_balances = Vec::new();
    let mut unreplayable = Vec::new();

    for account in accounts {
        let history = by_account.remove(&account.id).unwrap_or_default();
        match replay_balance(account.initial_balance, history) {
            Ok(replayed) if replayed != account.balance => mismatches.push(BalanceMismatch {
                account_id: account.id,
                live_balance: account.balance,
                replayed_balance: replayed,
            }),
            Ok(_) => {}
            Err(_) => unreplayable.push(account.id),
        }
        if account.balance < Decimal::ZERO {
            negative_balances.push(account.id);
        }
    }

    IntegrityReport {
        account_count: accounts.len(),
        transaction_count: transactions.len(),
        invalid_amounts: transactions
            .iter()
            .filter(|t| t.amount <= Decimal::ZERO)
            .count(),
        // Whatever is left in the map belongs to no known account
        orphan_transactions: by_account.values().map(Vec::len).sum(),
        negative_balances,
        mismatches,
        unreplayable,
    }
}
