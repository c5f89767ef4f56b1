//! # Parent Entities
//!
//! Records that own collections of shared sub-entities, and the small amount
//! of state the reconciliation engine needs from them.

use crate::ids::ActorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Wall-clock instant used for audit and soft-delete columns.
pub type Timestamp = DateTime<Utc>;

/// Kind of record that can own links to shared sub-entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    Person,
    Organization,
    Branch,
}

impl ParentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Branch => "branch",
        }
    }
}

/// Typed reference to a parent entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParentRef {
    pub kind: ParentKind,
    pub id: Uuid,
}

impl ParentRef {
    pub fn new(kind: ParentKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn person(id: Uuid) -> Self {
        Self::new(ParentKind::Person, id)
    }

    pub fn organization(id: Uuid) -> Self {
        Self::new(ParentKind::Organization, id)
    }

    pub fn branch(id: Uuid) -> Self {
        Self::new(ParentKind::Branch, id)
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// The slice of a parent record the engine reads and writes.
///
/// Everything else about a person or organization belongs to the CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRecord {
    pub parent: ParentRef,
    /// Logical deletion mark. `None` while the parent is live.
    pub deleted_at: Option<Timestamp>,
    pub updated_by: Option<ActorId>,
}

impl ParentRecord {
    pub fn new(parent: ParentRef) -> Self {
        Self {
            parent,
            deleted_at: None,
            updated_by: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Family of shared sub-entity a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubEntityKind {
    Address,
    Contact,
    Document,
}

impl SubEntityKind {
    /// Field-group key used in error payloads and request routing.
    pub fn field_key(&self) -> &'static str {
        match self {
            Self::Address => "enderecos",
            Self::Contact => "contatos",
            Self::Document => "documentos",
        }
    }

    /// Resolve a field-group key back to its family.
    pub fn from_field_key(key: &str) -> Option<Self> {
        match key {
            "enderecos" => Some(Self::Address),
            "contatos" => Some(Self::Contact),
            "documentos" => Some(Self::Document),
            _ => None,
        }
    }
}

impl fmt::Display for SubEntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_key())
    }
}
