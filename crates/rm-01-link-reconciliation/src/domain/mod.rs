//! Domain module for linked-entity reconciliation
//!
//! Contains entities, value objects, errors, the signature builder, the
//! per-family policies and the invariant validator. No I/O lives here.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod policy;
pub mod signature;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use value_objects::*;
