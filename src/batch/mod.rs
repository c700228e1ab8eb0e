//! Batched task intake.
//!
//! - [`BatchCoordinator`]: buffers tasks and flushes on count or time
//! - [`Clock`]: time source ([`SystemClock`], [`ManualClock`])

mod clock;
mod coordinator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{BatchCoordinator, BatchState, FlushReport, PendingBatch};
