//! # RM-01: Linked-Entity Reconciliation
//!
//! Reconciles a client-submitted list of sub-records (addresses, contacts,
//! documents) for one parent against the persisted association records.
//!
//! ## Architecture
//!
//! - **Domain**: Links, sub-entities, signatures, category policies, invariant validator
//! - **Algorithms**: Diff planner, restore-window correlation
//! - **Ports**: Inbound (`LinkReconciliationApi`, `ParentLifecycleApi`) and Outbound
//!   (`RecordStore`, `LinkTransaction`, `ParentTransaction`, `TimeSource`)
//! - **Application**: Reconciliation service, orphan collector, cascade restore
//! - **Adapters**: In-memory transactional store, clocks
//! - **API**: Request/response payloads and the field-grouped error payload
//!
//! ## Invariants (after every successful reconciliation)
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Single principal per partition | `domain::invariants`, `algorithms::diff` |
//! | No duplicate signatures per parent | `domain::invariants` |
//! | No orphaned live sub-entities | `application::orphan_collector` |
//! | All-or-nothing application | `RecordStore::transaction` |

pub mod adapters;
pub mod algorithms;
pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::{InMemoryRecordStore, ManualClock, SystemTimeSource};
pub use application::service::ReconciliationService;
pub use config::ReconcilerConfig;
pub use domain::entities::*;
pub use domain::errors::*;
pub use domain::policy::{Addresses, Contacts, Documents, LinkPolicy, PrincipalRule};
pub use domain::value_objects::*;
pub use ports::inbound::{LinkReconciliationApi, ParentLifecycleApi};
pub use ports::outbound::{
    LinkChanges, LinkTransaction, ParentTransaction, RecordStore, StoreTransaction, TimeSource,
};
