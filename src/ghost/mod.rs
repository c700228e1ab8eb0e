//! Ghost (forecast) demand.
//!
//! - [`GhostPool`]: speculative tasks, disjoint from the pending batch
//! - [`trial_insertion`]: non-committing best interior slot in one vehicle
//! - [`promote`]: ghost to confirmed task
//! - [`nearest_eligible`]: append-only binding to the nearest vehicle with room

mod forecast;
mod pool;

pub use forecast::{nearest_eligible, promote, trial_insertion, GhostTrial};
pub use pool::GhostPool;
