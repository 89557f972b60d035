//! Service fee schedule.
//!
//! Fees are charged per transaction, at a rate that depends on how many
//! transactions the customer made inside each 30-day window counted from the
//! day they became a customer. Busy windows get a cheaper rate.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Amount, Transaction};

/// Length of a fee window in days.
pub const FEE_WINDOW_DAYS: u64 = 30;

/// Per-transaction fee for a window with `count` transactions.
///
/// | transactions in window | fee each |
/// |------------------------|----------|
/// | up to 10               | 1.00     |
/// | 11 to 20               | 0.75     |
/// | more than 20           | 0.50     |
pub fn fee_per_transaction(count: u64) -> Amount {
    match count {
        0..=10 => Decimal::new(100, 2),
        11..=20 => Decimal::new(75, 2),
        _ => Decimal::new(50, 2),
    }
}

/// One 30-day window of the fee schedule, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeWindow {
    pub start: NaiveDate,
    /// Exclusive
    pub end: NaiveDate,
    pub transaction_count: u64,
    pub fee_per_transaction: Amount,
}

impl FeeWindow {
    pub fn fee(&self) -> Amount {
        self.fee_per_transaction * Decimal::from(self.transaction_count)
    }
}

/// Break the customer's history into consecutive 30-day windows starting on
/// `customer_since`, up to and including the window that contains `today`.
///
/// Every window counts from the whole transaction slice handed in. Callers
/// pass the full history, not a report-period subset.
pub fn fee_windows(
    customer_since: NaiveDate,
    transactions: &[Transaction],
    today: NaiveDate,
) -> Vec<FeeWindow> {
    let days: Vec<NaiveDate> = transactions.iter().map(Transaction::day).collect();
    let mut windows = Vec::new();
    let mut start = customer_since;

    while start <= today {
        let Some(end) = start.checked_add_days(Days::new(FEE_WINDOW_DAYS)) else {
            break;
        };
        let transaction_count = days.iter().filter(|d| start <= **d && **d < end).count() as u64;

        windows.push(FeeWindow {
            start,
            end,
            transaction_count,
            fee_per_transaction: fee_per_transaction(transaction_count),
        });
        start = end;
    }

    windows
}

/// Cumulative fee owed since the customer joined.
pub fn total_fee(customer_since: NaiveDate, transactions: &[Transaction], today: NaiveDate) -> Amount {
    fee_windows(customer_since, transactions, today)
        .iter()
        .map(FeeWindow::fee)
        .sum()
}
