use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type CustomerId = Uuid;

/// Legal classification of a customer. The tax document travels with the
/// variant, so an individual can never carry a CNPJ and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CustomerKind {
    /// Pessoa física (PF), identified by CPF
    Individual { cpf: String },
    /// Pessoa jurídica (PJ), identified by CNPJ
    Corporate { cnpj: String },
}

impl CustomerKind {
    /// Short type tag used in storage and on the command line.
    pub fn code(&self) -> &'static str {
        match self {
            CustomerKind::Individual { .. } => "PF",
            CustomerKind::Corporate { .. } => "PJ",
        }
    }

    /// The tax document number for this kind of customer.
    pub fn document(&self) -> &str {
        match self {
            CustomerKind::Individual { cpf } => cpf,
            CustomerKind::Corporate { cnpj } => cnpj,
        }
    }

    pub fn cpf(&self) -> Option<&str> {
        match self {
            CustomerKind::Individual { cpf } => Some(cpf),
            CustomerKind::Corporate { .. } => None,
        }
    }

    pub fn cnpj(&self) -> Option<&str> {
        match self {
            CustomerKind::Individual { .. } => None,
            CustomerKind::Corporate { cnpj } => Some(cnpj),
        }
    }

    /// Build a kind from a type tag plus the two optional documents, as they
    /// arrive from user input or from a storage row. Only the document matching
    /// the tag is looked at.
    pub fn from_parts(
        code: &str,
        cpf: Option<&str>,
        cnpj: Option<&str>,
    ) -> Result<Self, CustomerValidationError> {
        let present = |doc: Option<&str>| {
            doc.map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
        };

        match code.trim().to_uppercase().as_str() {
            "PF" => present(cpf)
                .map(|cpf| CustomerKind::Individual { cpf })
                .ok_or(CustomerValidationError::MissingCpf),
            "PJ" => present(cnpj)
                .map(|cnpj| CustomerKind::Corporate { cnpj })
                .ok_or(CustomerValidationError::MissingCnpj),
            other => Err(CustomerValidationError::UnknownType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub kind: CustomerKind,
    pub phone: String,
    /// Day the customer was registered; anchors the fee windows.
    pub created_at: NaiveDate,
}

impl Customer {
    pub fn new(name: String, kind: CustomerKind, phone: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            kind,
            phone,
            created_at: Utc::now().date_naive(),
        }
    }

    /// Validate raw input and build a new customer.
    pub fn try_new(
        name: &str,
        kind: CustomerKind,
        phone: &str,
    ) -> Result<Self, CustomerValidationError> {
        let name = require("name", name)?;
        let phone = require("phone", phone)?;
        Ok(Self::new(name, kind, phone))
    }

    pub fn with_created_at(mut self, created_at: NaiveDate) -> Self {
        self.created_at = created_at;
        self
    }

    /// "Customer since" label used in reports.
    pub fn since_label(&self) -> String {
        format_report_date(self.created_at)
    }
}

/// Dates in reports are rendered day-first.
pub fn format_report_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<String, CustomerValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CustomerValidationError::MissingField(field));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustomerValidationError {
    #[error("{0} is mandatory")]
    MissingField(&'static str),

    #[error("CPF is required for individual (PF) customers")]
    MissingCpf,

    #[error("CNPJ is required for corporate (PJ) customers")]
    MissingCnpj,

    #[error("unknown customer type '{0}' (expected PF or PJ)")]
    UnknownType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_parts_individual() {
        let kind = CustomerKind::from_parts("pf", Some("12345678900"), Some("ignored")).unwrap();
        assert_eq!(
            kind,
            CustomerKind::Individual {
                cpf: "12345678900".into()
            }
        );
        assert_eq!(kind.code(), "PF");
        assert_eq!(kind.cpf(), Some("12345678900"));
        assert_eq!(kind.cnpj(), None);
    }

    #[test]
    fn test_kind_from_parts_corporate() {
        let kind = CustomerKind::from_parts("PJ", None, Some("12345678000199")).unwrap();
        assert_eq!(kind.code(), "PJ");
        assert_eq!(kind.document(), "12345678000199");
        assert_eq!(kind.cpf(), None);
    }

    #[test]
    fn test_kind_requires_matching_document() {
        assert_eq!(
            CustomerKind::from_parts("PF", None, Some("12345678000199")),
            Err(CustomerValidationError::MissingCpf)
        );
        assert_eq!(
            CustomerKind::from_parts("PJ", Some("12345678900"), Some("  ")),
            Err(CustomerValidationError::MissingCnpj)
        );
    }

    #[test]
    fn test_kind_rejects_unknown_type() {
        assert!(matches!(
            CustomerKind::from_parts("XX", Some("1"), None),
            Err(CustomerValidationError::UnknownType(_))
        ));
    }

    #[test]
    fn test_try_new_requires_name_and_phone() {
        let kind = CustomerKind::Individual { cpf: "1".into() };
        assert_eq!(
            Customer::try_new(" ", kind.clone(), "555").unwrap_err(),
            CustomerValidationError::MissingField("name")
        );
        assert_eq!(
            Customer::try_new("Ana", kind.clone(), "").unwrap_err(),
            CustomerValidationError::MissingField("phone")
        );

        let customer = Customer::try_new(" Ana ", kind, "555").unwrap();
        assert_eq!(customer.name, "Ana");
        assert_eq!(customer.created_at, Utc::now().date_naive());
    }

    #[test]
    fn test_since_label_is_day_first() {
        let customer = Customer::new(
            "Ana".into(),
            CustomerKind::Individual { cpf: "1".into() },
            "555".into(),
        )
        .with_created_at(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(customer.since_label(), "07/03/2024");
    }
}
