//! Domain model types for real-time dispatch.
//!
//! Tasks with demands and time windows, vehicles owning their routes and
//! progress pointers, and the fleet that holds them all.

mod fleet;
mod task;
mod vehicle;

pub use fleet::Fleet;
pub use task::{
    Location, Task, TaskId, TaskKind, TimeWindow, BASELINE_PRIORITY, SPECULATIVE_PRIORITY,
};
pub use vehicle::{Vehicle, VehicleId};
