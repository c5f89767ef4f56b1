//! # Shared Types Crate
//!
//! Vocabulary shared by every records-management crate in the workspace.
//!
//! ## Design Principles
//!
//! - **Stable identifiers**: association records and shared sub-entities are
//!   addressed by UUID newtypes so the client can round-trip them safely.
//! - **Typed parents**: a parent is always a `(kind, id)` pair; the engine never
//!   sees a bare UUID for a parent.
//! - **Soft deletion**: every record carries an optional deletion timestamp
//!   instead of being removed.

pub mod entities;
pub mod ids;

pub use entities::*;
pub use ids::*;
