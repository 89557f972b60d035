use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CustomerId, CustomerValidationError, customer::require};

pub type AddressId = Uuid;

/// Shown in reports when a customer has no address on record.
pub const NO_ADDRESS: &str = "Address not provided";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub street: String,
    pub city: String,
    /// Two-letter state code
    pub state: String,
    pub zip_code: String,
}

impl Address {
    pub fn try_new(
        customer_id: CustomerId,
        street: &str,
        city: &str,
        state: &str,
        zip_code: &str,
    ) -> Result<Self, CustomerValidationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            customer_id,
            street: require("street", street)?,
            city: require("city", city)?,
            state: require("state", state)?.to_uppercase(),
            zip_code: require("zip code", zip_code)?,
        })
    }

    /// Single-line rendering used in reports.
    pub fn one_line(&self) -> String {
        format!(
            "{}, {}, {}, {}",
            self.street, self.city, self.state, self.zip_code
        )
    }
}

/// Report label for a customer's primary (first recorded) address.
pub fn primary_address_label(addresses: &[Address]) -> String {
    addresses
        .first()
        .map(Address::one_line)
        .unwrap_or_else(|| NO_ADDRESS.to_string())
}
