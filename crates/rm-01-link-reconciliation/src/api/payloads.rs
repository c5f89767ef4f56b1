//! Request/response payloads
//!
//! Errors leave the engine only as an [`ErrorPayload`]: messages grouped under
//! a field key (`enderecos`, `contatos`, `documentos` or `non_field_errors`).

use serde::{Deserialize, Serialize};
use shared_types::{ActorId, LinkId, ParentRef, SubEntityId};
use std::collections::BTreeMap;

use crate::domain::entities::{LinkView, ReconcileOutcome, SubmittedItem};
use crate::domain::errors::{ReconcileError, NON_FIELD_ERRORS};
use crate::domain::policy::LinkPolicy;

// ============================================================
// INCOMING REQUESTS
// ============================================================

/// Full desired list of one family for one parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ReconcileRequest<P: LinkPolicy> {
    pub parent: ParentRef,
    pub actor: ActorId,
    #[serde(default)]
    pub items: Vec<SubmittedItem<P>>,
}

/// Explicit restore of one soft-deleted link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreLinkRequest {
    pub parent: ParentRef,
    pub link_id: LinkId,
    pub actor: ActorId,
}

// ============================================================
// OUTGOING RESPONSES
// ============================================================

/// Live links after a reconciliation, with what changed.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
pub struct ReconcileResponse<P: LinkPolicy> {
    pub links: Vec<LinkView<P>>,
    pub created: Vec<LinkId>,
    pub updated: Vec<LinkId>,
    pub deleted: Vec<LinkId>,
    pub unchanged: usize,
    pub orphans_collected: Vec<SubEntityId>,
}

impl<P: LinkPolicy> From<ReconcileOutcome<P>> for ReconcileResponse<P> {
    fn from(outcome: ReconcileOutcome<P>) -> Self {
        Self {
            links: outcome.links,
            created: outcome.created,
            updated: outcome.updated,
            deleted: outcome.deleted,
            unchanged: outcome.unchanged,
            orphans_collected: outcome.orphans_collected,
        }
    }
}

/// Field-grouped error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// HTTP-equivalent status (400, 404, 409, 500).
    pub status: u16,
    pub class: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ErrorPayload {
    /// Payload for a problem not tied to any engine error (e.g. a malformed request).
    pub fn bad_request(message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(NON_FIELD_ERRORS.to_string(), vec![message.into()]);
        Self {
            status: 400,
            class: "bad_request".to_string(),
            errors,
        }
    }

    /// Payload for a failure outside the engine (e.g. encoding a response).
    pub fn internal(message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(NON_FIELD_ERRORS.to_string(), vec![message.into()]);
        Self {
            status: 500,
            class: "internal".to_string(),
            errors,
        }
    }

    /// Messages under one field key.
    pub fn messages(&self, key: &str) -> &[String] {
        self.errors.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl From<&ReconcileError> for ErrorPayload {
    fn from(err: &ReconcileError) -> Self {
        let class = err.class();
        let mut errors = BTreeMap::new();
        match err {
            ReconcileError::Validation(validation) => {
                errors.insert(validation.field_key.to_string(), validation.messages());
            }
            other => {
                errors.insert(NON_FIELD_ERRORS.to_string(), vec![other.to_string()]);
            }
        }
        Self {
            status: class.status_code(),
            class: class.as_str().to_string(),
            errors,
        }
    }
}

impl From<ReconcileError> for ErrorPayload {
    fn from(err: ReconcileError) -> Self {
        Self::from(&err)
    }
}
