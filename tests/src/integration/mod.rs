//! # Integration Tests
//!
//! Exercise the engine through its public API over the in-memory store.

#[cfg(test)]
mod fixtures;

pub mod cascade;
pub mod flows;
pub mod runtime;
