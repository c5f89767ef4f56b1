//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound port traits: an in-memory transactional record
//! store and the time sources.

mod clock;
mod memory_store;

pub use clock::{ManualClock, SystemTimeSource};
pub use memory_store::{InMemoryRecordStore, MemoryTransaction};
