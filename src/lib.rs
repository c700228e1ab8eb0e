//! # u-dispatch
//!
//! Real-time dispatch engine for capacity-constrained fleets: greedy
//! cheapest insertion of incoming tasks, batched intake, and speculative
//! "ghost" demand that can be trial-inserted and later promoted.
//!
//! ## Modules
//!
//! - [`models`]: Domain types (Task, Vehicle, Fleet)
//! - [`distance`]: Distance/duration matrix and incremental matrix cache
//! - [`evaluation`]: Weighted route cost and feasibility predicates
//! - [`insertion`]: Cheapest-insertion search across the fleet
//! - [`batch`]: Size/time-triggered batching of incoming tasks
//! - [`ghost`]: Ghost pool, trial insertion, promotion
//! - [`constructive`]: Nearest-neighbor seeding of initial routes
//! - [`dispatch`]: The [`Dispatcher`](dispatch::Dispatcher) tying it together
//! - [`config`], [`error`], [`seed`]: Configuration, errors, demo data

pub mod batch;
pub mod config;
pub mod constructive;
pub mod dispatch;
pub mod distance;
pub mod error;
pub mod evaluation;
pub mod ghost;
pub mod insertion;
pub mod models;
pub mod seed;

pub use error::DispatchError;
