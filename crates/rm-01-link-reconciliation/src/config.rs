//! Configuration for the reconciliation engine

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Half-width of the cascade restore window (seconds)
    pub restore_window_secs: i64,
    /// Maximum items accepted in one submitted list
    pub max_items_per_request: usize,
    /// Retry a reconciliation once when the commit detects a concurrent write
    pub retry_on_conflict: bool,
}

impl ReconcilerConfig {
    /// Restore margin as a duration.
    pub fn restore_window(&self) -> Duration {
        Duration::seconds(self.restore_window_secs)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            restore_window_secs: 5,
            max_items_per_request: 200,
            retry_on_conflict: true,
        }
    }
}
