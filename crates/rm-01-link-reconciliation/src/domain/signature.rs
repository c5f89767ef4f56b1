//! Signature builder
//!
//! Pure, total functions producing comparable keys for sub-entity content.
//! The same builder is applied to submitted payload items and to persisted
//! sub-entities, so both sides of the diff compare on equal terms.

use super::value_objects::{AddressFields, ContactFields, ContactKind, DocumentType, Signature};

/// Lower-case, trim and collapse inner whitespace.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Street, number, complement, city, state and postal code.
pub fn address_signature(fields: &AddressFields) -> Signature {
    Signature(vec![
        normalize_text(&fields.street),
        normalize_text(&fields.number),
        normalize_text(&fields.complement),
        normalize_text(&fields.city),
        normalize_text(&fields.state),
        normalize_text(&fields.postal_code),
    ])
}

/// Contact kind plus value.
pub fn contact_signature(kind: ContactKind, fields: &ContactFields) -> Signature {
    Signature(vec![kind.as_str().to_string(), normalize_text(&fields.value)])
}

/// Documents dedupe by type only.
pub fn document_signature(doc_type: DocumentType) -> Signature {
    Signature(vec![doc_type.as_str().to_string()])
}
