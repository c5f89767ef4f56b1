//! Application layer for linked-entity reconciliation
//!
//! - `service`: the inbound API implementation (transactions, retry, logging)
//! - `reconciler`: validate/plan/apply inside one transaction
//! - `orphan_collector`: soft-deletes sub-entities left without live links
//! - `cascade_restore`: parent deletion cascade and time-window restore

pub mod cascade_restore;
pub mod orphan_collector;
pub mod reconciler;
pub mod service;

pub use service::ReconciliationService;
