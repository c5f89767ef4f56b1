//! API boundary types
//!
//! Serde payloads exchanged with the HTTP collaborator (or the runtime's
//! command loop standing in for it).

pub mod payloads;

pub use payloads::{ErrorPayload, ReconcileRequest, ReconcileResponse, RestoreLinkRequest};
