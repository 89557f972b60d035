use rust_decimal::Decimal;

/// Tunables for customer onboarding.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Credit applied to the first account of every new customer
    pub opening_deposit: Decimal,
    /// Bank name for accounts opened during onboarding
    pub bank_name: String,
    /// Agency code for accounts opened during onboarding
    pub agency: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            opening_deposit: Decimal::new(10000, 2),
            bank_name: "Fiscus Bank".to_string(),
            agency: "0001".to_string(),
        }
    }
}
