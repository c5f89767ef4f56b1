//! # Records Runtime
//!
//! Hosts the linked-entity reconciliation engine over the in-memory record
//! store and exposes it as a line-oriented JSON command loop.
//!
//! ## Modules
//!
//! - `config/` - Runtime configuration with environment overrides
//! - `commands/` - Command decoding and dispatch to the reconciliation service
//!
//! ## Startup Sequence
//!
//! 1. Install the tracing subscriber (stderr, so stdout carries only responses)
//! 2. Load configuration (defaults, then environment)
//! 3. Create the store and service
//! 4. Answer one command per stdin line until input closes

pub mod commands;
pub mod config;

pub use commands::{CommandError, CommandProcessor, CommandResponse, Operation};
pub use config::{load_config, RuntimeConfig};
