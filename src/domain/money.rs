use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Monetary amounts are exact decimals, never binary floating point.
/// Values keep whatever scale they were created with; formatting rounds to cents.
pub type Amount = Decimal;

/// Format an amount as a two-decimal string.
/// Example: 50 -> "50.00", -12.345 -> "-12.35"
pub fn format_amount(amount: Amount) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

/// Parse a decimal string into an amount.
/// Example: "50.00" -> 50.00, "12.5" -> 12.5, "100" -> 100
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::Empty);
    }
    // Reject exponent notation and thousands separators up front;
    // Decimal::from_str would accept some of them.
    if !input
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(ParseAmountError::InvalidFormat(input.to_string()));
    }

    Decimal::from_str(input).map_err(|_| ParseAmountError::InvalidFormat(input.to_string()))
}

/// Sum of amounts, or `None` when the total does not fit in a `Decimal`.
pub fn checked_total(amounts: impl IntoIterator<Item = Amount>) -> Option<Amount> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
}

/// Parse an amount that must be strictly positive (transaction magnitudes).
pub fn parse_positive_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let amount = parse_amount(input)?;
    if amount <= Decimal::ZERO {
        return Err(ParseAmountError::NotPositive(format_amount(amount)));
    }
    Ok(amount)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid money format: {0}")]
    InvalidFormat(String),

    #[error("amount must be positive, got {0}")]
    NotPositive(String),
}
