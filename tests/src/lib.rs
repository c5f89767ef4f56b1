//! # Records Test Suite
//!
//! Cross-crate tests for the reconciliation engine and its runtime.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs     # Shared store/service/clock setup
//!     ├── flows.rs        # End-to-end reconciliation scenarios
//!     ├── cascade.rs      # Parent deletion and time-window restore
//!     ├── concurrency.rs  # Conflicting transactions and retries
//!     ├── properties.rs   # Randomized invariant checks
//!     └── runtime.rs      # JSON command loop
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p rm-tests
//!
//! # By category
//! cargo test -p rm-tests integration::cascade::
//!
//! # Benchmarks
//! cargo bench -p rm-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
