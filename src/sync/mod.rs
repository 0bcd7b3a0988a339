//! Sync module - planning và applying giữa hai vaults.

pub mod apply;
pub mod planner;

pub use apply::{apply_plan, ApplyStats};
pub use planner::{SyncPlan, SyncPlanner, SYNC_FIELD};
