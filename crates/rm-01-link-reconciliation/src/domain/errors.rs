//! Error types for linked-entity reconciliation
//!
//! Validation problems are collected as [`Violation`]s and reported together,
//! before anything is written. Storage failures never cross the API boundary
//! as their own type; see [`crate::api::ErrorPayload`].

use shared_types::{LinkId, ParentRef, SubEntityId};
use std::fmt;
use thiserror::Error;

use super::value_objects::PartitionKey;

/// Field-group key for errors that do not belong to a sub-entity family.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Category-specific normalization failure for one sub-entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("postal code must have 8 digits, got {digits}")]
    PostalCodeLength { digits: usize },

    #[error("state must be a 2-letter code, got {0:?}")]
    InvalidState(String),

    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error("phone number must have between 8 and 13 digits, got {digits}")]
    PhoneLength { digits: usize },
}

/// One client-correctable rule failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("duplicate id in request: {0}")]
    DuplicateId(LinkId),

    #[error("referenced link does not belong to this parent: {0}")]
    ForeignLink(LinkId),

    #[error("item {index}: content already registered, reuse its id ({existing})")]
    AlreadyRegistered { index: usize, existing: LinkId },

    #[error("item {index}: duplicate entry in payload (same as item {first})")]
    DuplicateEntry { index: usize, first: usize },

    #[error("item {index}: link {link_id} cannot be re-pointed to another sub-entity")]
    SubEntityMismatch { index: usize, link_id: LinkId },

    #[error("item {index}: sub-entity {sub_entity_id} is already linked by {existing}")]
    SubEntityAlreadyLinked {
        index: usize,
        sub_entity_id: SubEntityId,
        existing: LinkId,
    },

    #[error("item {index}: links the same sub-entity as item {first}")]
    DuplicateSubEntity { index: usize, first: usize },

    #[error("item {index}: content differs from linked sub-entity {sub_entity_id}")]
    LinkedContentMismatch {
        index: usize,
        sub_entity_id: SubEntityId,
    },

    #[error("principal required ({partition})")]
    PrincipalRequired { partition: PartitionKey },

    #[error("multiple principal not allowed ({partition}: {count})")]
    MultiplePrincipal { partition: PartitionKey, count: usize },

    #[error("link {link_id}: content already registered by live link {existing}")]
    SignatureTaken { link_id: LinkId, existing: LinkId },

    #[error("item {index}: {source}")]
    InvalidContent { index: usize, source: ContentError },

    #[error("too many items: {count} > {max}")]
    TooManyItems { count: usize, max: usize },
}

/// All violations found for one submitted list, grouped under its field key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field_key: &'static str,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(field_key: &'static str, violations: Vec<Violation>) -> Self {
        Self {
            field_key,
            violations,
        }
    }

    pub fn single(field_key: &'static str, violation: Violation) -> Self {
        Self::new(field_key, vec![violation])
    }

    /// Human-readable messages, in detection order.
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_key, self.messages().join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Failures raised by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A row read or written by the transaction changed before commit.
    #[error("concurrent modification of {row}")]
    Conflict { row: String },

    /// A referenced row is missing (referential integrity broken).
    #[error("missing row: {0}")]
    MissingRow(String),

    /// Backend unreachable or refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// How the HTTP collaborator should classify a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorClass {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

/// Top-level error of every engine operation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("parent not found: {0}")]
    ParentNotFound(ParentRef),

    #[error("link not found: {0}")]
    LinkNotFound(LinkId),

    #[error("sub-entity not found: {0}")]
    SubEntityNotFound(SubEntityId),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("concurrent modification detected, please retry")]
    Conflict,

    #[error("storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::Conflict,
            other => Self::Storage(other),
        }
    }
}

impl ReconcileError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::InvalidState(_) => ErrorClass::BadRequest,
            Self::ParentNotFound(_) | Self::LinkNotFound(_) | Self::SubEntityNotFound(_) => {
                ErrorClass::NotFound
            }
            Self::Conflict => ErrorClass::Conflict,
            Self::Storage(_) => ErrorClass::Internal,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}
