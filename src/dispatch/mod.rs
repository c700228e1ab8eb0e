//! The dispatcher: the engine's public surface.
//!
//! Owns the fleet, matrix cache, batch coordinator, ghost pool, and task
//! registry, and serializes every route mutation.

mod dispatcher;
mod snapshot;

pub use dispatcher::{Dispatcher, RouteProposal};
pub use snapshot::{FleetSnapshot, TaskSummary, VehicleSummary};
