//! Per-family reconciliation policies
//!
//! One generic engine handles addresses, contacts and documents. The rule
//! differences between them live here: how content is normalized, what the
//! signature is made of, how links are partitioned and how many principals a
//! partition needs.

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::SubEntityKind;
use std::fmt::Debug;
use std::hash::Hash;

use super::errors::ContentError;
use super::signature::{address_signature, contact_signature, document_signature};
use super::value_objects::{
    AddressFields, AddressUse, ContactFields, ContactKind, DocumentFields, DocumentType,
    PartitionKey, Signature,
};

/// How many links of a non-empty partition may be flagged principal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrincipalRule {
    /// Exactly one whenever the partition is non-empty.
    ExactlyOne,
    /// Zero or one.
    AtMostOne,
}

/// Rules for one family of shared sub-entities.
///
/// Implemented by zero-sized markers; the engine is generic over them.
pub trait LinkPolicy:
    Clone + Copy + Default + Debug + PartialEq + Eq + Send + Sync + 'static
{
    /// Sub-entity content fields.
    type Content: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Tag carried by the association record.
    type Category: Copy + Debug + Eq + Hash + Serialize + DeserializeOwned + Send + Sync + 'static;

    const KIND: SubEntityKind;
    const PRINCIPAL_RULE: PrincipalRule;

    /// Field-group key for error payloads.
    fn field_key() -> &'static str {
        Self::KIND.field_key()
    }

    /// Canonicalize content, rejecting values the family cannot store.
    fn normalize(
        category: Self::Category,
        content: Self::Content,
    ) -> Result<Self::Content, ContentError>;

    fn signature(category: Self::Category, content: &Self::Content) -> Signature;

    fn partition(category: Self::Category, content: &Self::Content) -> PartitionKey;
}

/// Address family: partitioned by address use, exactly one principal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Addresses;

/// Contact family: partitioned by contact kind, at most one principal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Contacts;

/// Document family: a single partition, exactly one principal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Documents;

impl LinkPolicy for Addresses {
    type Content = AddressFields;
    type Category = AddressUse;

    const KIND: SubEntityKind = SubEntityKind::Address;
    const PRINCIPAL_RULE: PrincipalRule = PrincipalRule::ExactlyOne;

    fn normalize(
        _category: AddressUse,
        content: AddressFields,
    ) -> Result<AddressFields, ContentError> {
        let street = required(&content.street, "street")?;
        let city = required(&content.city, "city")?;

        let state = content.state.trim().to_uppercase();
        if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ContentError::InvalidState(content.state));
        }

        let postal_code: String = content
            .postal_code
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        if postal_code.len() != 8 {
            return Err(ContentError::PostalCodeLength {
                digits: postal_code.len(),
            });
        }

        let country = match content.country.trim() {
            "" => "BR".to_string(),
            other => other.to_uppercase(),
        };

        Ok(AddressFields {
            street,
            number: content.number.trim().to_string(),
            complement: content.complement.trim().to_string(),
            district: content.district.trim().to_string(),
            city,
            state,
            postal_code,
            country,
        })
    }

    fn signature(_category: AddressUse, content: &AddressFields) -> Signature {
        address_signature(content)
    }

    fn partition(category: AddressUse, _content: &AddressFields) -> PartitionKey {
        PartitionKey(category.as_str())
    }
}

impl LinkPolicy for Contacts {
    type Content = ContactFields;
    type Category = ContactKind;

    const KIND: SubEntityKind = SubEntityKind::Contact;
    const PRINCIPAL_RULE: PrincipalRule = PrincipalRule::AtMostOne;

    fn normalize(kind: ContactKind, content: ContactFields) -> Result<ContactFields, ContentError> {
        let value = match kind {
            ContactKind::Email => normalize_email(&content.value)?,
            ContactKind::Phone | ContactKind::Mobile => {
                let digits: String = content.value.chars().filter(char::is_ascii_digit).collect();
                if !(8..=13).contains(&digits.len()) {
                    return Err(ContentError::PhoneLength {
                        digits: digits.len(),
                    });
                }
                digits
            }
            ContactKind::Other => required(&content.value, "value")?,
        };

        let label = content
            .label
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty());

        Ok(ContactFields { value, label })
    }

    fn signature(kind: ContactKind, content: &ContactFields) -> Signature {
        contact_signature(kind, content)
    }

    fn partition(kind: ContactKind, _content: &ContactFields) -> PartitionKey {
        PartitionKey(kind.as_str())
    }
}

impl LinkPolicy for Documents {
    type Content = DocumentFields;
    type Category = DocumentType;

    const KIND: SubEntityKind = SubEntityKind::Document;
    const PRINCIPAL_RULE: PrincipalRule = PrincipalRule::ExactlyOne;

    fn normalize(
        _doc_type: DocumentType,
        content: DocumentFields,
    ) -> Result<DocumentFields, ContentError> {
        Ok(DocumentFields {
            number: required(&content.number, "number")?,
            issuer: content
                .issuer
                .map(|issuer| issuer.trim().to_string())
                .filter(|issuer| !issuer.is_empty()),
            issued_on: content.issued_on,
        })
    }

    fn signature(doc_type: DocumentType, _content: &DocumentFields) -> Signature {
        document_signature(doc_type)
    }

    fn partition(_doc_type: DocumentType, _content: &DocumentFields) -> PartitionKey {
        PartitionKey("documents")
    }
}

fn required(raw: &str, field: &'static str) -> Result<String, ContentError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ContentError::Required { field });
    }
    Ok(trimmed.to_string())
}

fn normalize_email(raw: &str) -> Result<String, ContentError> {
    let value = raw.trim().to_lowercase();
    let mut parts = value.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(ContentError::InvalidEmail(raw.to_string())),
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return Err(ContentError::InvalidEmail(raw.to_string()));
    }
    Ok(value)
}
