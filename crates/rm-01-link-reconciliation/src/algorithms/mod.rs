//! Algorithms module for linked-entity reconciliation
//!
//! Contains:
//! - Diff planner (before-set + validated submission -> ordered mutation steps)
//! - Restore window correlation for cascade restore

pub mod diff;
pub mod restore_window;

pub use diff::{
    plan_reconciliation, LinkCreate, LinkUpdate, PlanStep, ReconcilePlan, SubEntitySource,
};
pub use restore_window::RestoreWindow;
