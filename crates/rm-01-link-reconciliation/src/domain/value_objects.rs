//! Value objects for linked-entity reconciliation
//!
//! Category tags carried by association records and the content fields of
//! each shared sub-entity family.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized, comparable key for a sub-entity's content.
///
/// Two records are the same sub-entity iff their signatures are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature(pub Vec<String>);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join("|"))
    }
}

/// Group of links inside which the principal rule applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(pub &'static str);

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Address link type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressUse {
    Residential,
    Commercial,
    Correspondence,
}

impl AddressUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
            Self::Correspondence => "correspondence",
        }
    }
}

/// Contact channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Phone,
    Mobile,
    Email,
    Other,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Mobile => "mobile",
            Self::Email => "email",
            Self::Other => "other",
        }
    }
}

/// Document type. Documents dedupe by type, not content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Cpf,
    Rg,
    Cnpj,
    Cnh,
    Ctps,
    Pis,
    Passport,
    StateRegistration,
    MunicipalRegistration,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpf => "cpf",
            Self::Rg => "rg",
            Self::Cnpj => "cnpj",
            Self::Cnh => "cnh",
            Self::Ctps => "ctps",
            Self::Pis => "pis",
            Self::Passport => "passport",
            Self::StateRegistration => "state_registration",
            Self::MunicipalRegistration => "municipal_registration",
            Self::Other => "other",
        }
    }
}

/// Address content
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFields {
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub complement: String,
    #[serde(default)]
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "BR".to_string()
}

impl AddressFields {
    /// Minimal address used mostly by fixtures.
    pub fn new(street: &str, number: &str, city: &str, state: &str, postal_code: &str) -> Self {
        Self {
            street: street.to_string(),
            number: number.to_string(),
            complement: String::new(),
            district: String::new(),
            city: city.to_string(),
            state: state.to_string(),
            postal_code: postal_code.to_string(),
            country: default_country(),
        }
    }
}

/// Contact content
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ContactFields {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            label: None,
        }
    }
}

/// Document content
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFields {
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_on: Option<NaiveDate>,
}

impl DocumentFields {
    pub fn new(number: &str) -> Self {
        Self {
            number: number.to_string(),
            issuer: None,
            issued_on: None,
        }
    }
}
