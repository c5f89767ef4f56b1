//! Restore Window Correlation
//!
//! Soft-deletes cascaded from a parent carry no batch id. They are matched to
//! the parent's deletion by timestamp proximity: anything deleted within
//! `[T - margin, T + margin]` of the parent's own deletion time `T`.

use chrono::Duration;
use shared_types::Timestamp;

/// Closed time interval around a parent's deletion timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestoreWindow {
    anchor: Timestamp,
    margin: Duration,
}

impl RestoreWindow {
    pub fn new(anchor: Timestamp, margin: Duration) -> Self {
        Self {
            anchor,
            margin: margin.abs(),
        }
    }

    pub fn anchor(&self) -> Timestamp {
        self.anchor
    }

    pub fn start(&self) -> Timestamp {
        self.anchor - self.margin
    }

    pub fn end(&self) -> Timestamp {
        self.anchor + self.margin
    }

    /// Inclusive on both bounds.
    pub fn contains(&self, at: Timestamp) -> bool {
        self.start() <= at && at <= self.end()
    }

    /// Absolute distance from the anchor.
    pub fn distance(&self, at: Timestamp) -> Duration {
        (at - self.anchor).abs()
    }

    /// Keep the candidates deleted inside the window, closest to the anchor first.
    ///
    /// Ties keep their input order.
    pub fn rank<T, F>(&self, candidates: Vec<T>, deleted_at: F) -> Vec<T>
    where
        F: Fn(&T) -> Option<Timestamp>,
    {
        let mut ranked: Vec<(Duration, T)> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let at = deleted_at(&candidate)?;
                self.contains(at).then(|| (self.distance(at), candidate))
            })
            .collect();
        ranked.sort_by_key(|(distance, _)| *distance);
        ranked.into_iter().map(|(_, candidate)| candidate).collect()
    }
}
