//! # Runtime Configuration
//!
//! Engine settings plus the log level, overridable from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `RM_RESTORE_WINDOW_SECS` | `reconciler.restore_window_secs` |
//! | `RM_MAX_ITEMS_PER_REQUEST` | `reconciler.max_items_per_request` |
//! | `RM_RETRY_ON_CONFLICT` | `reconciler.retry_on_conflict` |
//! | `RM_LOG_LEVEL` | `log_level` |
//!
//! Unparseable values keep the default and log a warning.

use std::str::FromStr;

use rm_01_link_reconciliation::ReconcilerConfig;
use tracing::{info, warn, Level};

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Reconciliation engine settings.
    pub reconciler: ReconcilerConfig,
    /// Maximum level emitted by the subscriber.
    pub log_level: Level,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reconciler: ReconcilerConfig::default(),
            log_level: Level::INFO,
        }
    }
}

/// Load configuration from the process environment.
pub fn load_config() -> RuntimeConfig {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration from an arbitrary variable lookup.
pub fn load_config_from<F>(lookup: F) -> RuntimeConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = RuntimeConfig::default();

    if let Some(secs) = parse_var::<i64, _>(&lookup, "RM_RESTORE_WINDOW_SECS") {
        if secs < 0 {
            warn!(secs, "RM_RESTORE_WINDOW_SECS must not be negative, keeping default");
        } else {
            config.reconciler.restore_window_secs = secs;
        }
    }
    if let Some(max) = parse_var::<usize, _>(&lookup, "RM_MAX_ITEMS_PER_REQUEST") {
        if max == 0 {
            warn!("RM_MAX_ITEMS_PER_REQUEST must be at least 1, keeping default");
        } else {
            config.reconciler.max_items_per_request = max;
        }
    }
    if let Some(retry) = parse_var::<bool, _>(&lookup, "RM_RETRY_ON_CONFLICT") {
        config.reconciler.retry_on_conflict = retry;
    }
    if let Some(level) = parse_var::<Level, _>(&lookup, "RM_LOG_LEVEL") {
        config.log_level = level;
    }

    info!(
        restore_window_secs = config.reconciler.restore_window_secs,
        max_items_per_request = config.reconciler.max_items_per_request,
        retry_on_conflict = config.reconciler.retry_on_conflict,
        log_level = %config.log_level,
        "Configuration loaded"
    );
    config
}

/// Log level only, read before the subscriber exists. `RUST_LOG`, when set,
/// takes precedence in the binary.
pub fn log_level_from_env() -> Level {
    std::env::var("RM_LOG_LEVEL")
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(Level::INFO)
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}
