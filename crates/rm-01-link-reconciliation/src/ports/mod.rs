//! Ports module for linked-entity reconciliation
//!
//! Defines inbound (API) and outbound (SPI) port traits.

pub mod inbound;
pub mod outbound;

pub use inbound::{LinkReconciliationApi, ParentLifecycleApi};
pub use outbound::{
    LinkChanges, LinkTransaction, ParentTransaction, RecordStore, StoreTransaction, TimeSource,
};
