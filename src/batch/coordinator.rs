//! Count/time triggered batching of incoming tasks.
//!
//! Tasks accumulate until either `size_threshold` tasks are pending or
//! `time_threshold` has elapsed since the last flush. A flush swaps the
//! buffer out under the lock, so tasks arriving mid-flush land in a fresh
//! buffer, then hands each task to the assignment callback in arrival order.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::config::BatchConfig;
use crate::error::DispatchError;
use crate::models::{Task, TaskId, VehicleId};

use super::Clock;

/// Coordinator state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Nothing pending.
    Idle,
    /// At least one task buffered, no threshold crossed yet.
    Accumulating,
    /// A flush is running.
    Flushing,
}

/// Buffered tasks and the time of the last flush.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    tasks: Vec<Task>,
    last_flush: Instant,
}

impl PendingBatch {
    fn new(now: Instant) -> Self {
        Self {
            tasks: Vec::new(),
            last_flush: now,
        }
    }

    /// Buffered tasks in arrival order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// When the last non-empty flush finished.
    pub fn last_flush(&self) -> Instant {
        self.last_flush
    }
}

/// Outcome of one flush. Every flushed task appears exactly once.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Tasks committed, with the vehicle that took them, in arrival order.
    pub assigned: Vec<(TaskId, VehicleId)>,
    /// Tasks that could not be placed, with the reason.
    pub unassigned: Vec<(TaskId, DispatchError)>,
}

impl FlushReport {
    /// Number of tasks processed.
    pub fn len(&self) -> usize {
        self.assigned.len() + self.unassigned.len()
    }

    /// Returns `true` if the flush had nothing to do.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct FlushingGuard<'a>(&'a AtomicBool);

impl Drop for FlushingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Buffers confirmed tasks and flushes them through an assignment callback.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use u_dispatch::batch::{BatchCoordinator, ManualClock};
/// use u_dispatch::config::BatchConfig;
/// use u_dispatch::models::{Location, Task};
///
/// let config = BatchConfig::default().with_size_threshold(2);
/// let batch = BatchCoordinator::new(config, Arc::new(ManualClock::new()));
/// let task = |id: &str| Task::new(id, Location::new(0.0, 0.0), 1, 0, 10).unwrap();
///
/// assert!(batch.submit(task("A"), |_| Ok(1)).is_none());
/// let report = batch.submit(task("B"), |_| Ok(1)).unwrap();
/// assert_eq!(report.assigned.len(), 2);
/// assert_eq!(batch.pending_len(), 0);
/// ```
pub struct BatchCoordinator {
    config: BatchConfig,
    clock: Arc<dyn Clock>,
    pending: Mutex<PendingBatch>,
    flushing: AtomicBool,
    gate: Mutex<()>,
}

impl BatchCoordinator {
    /// Creates an idle coordinator; the flush timer starts now.
    pub fn new(config: BatchConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            config,
            clock,
            pending: Mutex::new(PendingBatch::new(now)),
            flushing: AtomicBool::new(false),
            gate: Mutex::new(()),
        }
    }

    /// Flush thresholds.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, PendingBatch> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn state(&self) -> BatchState {
        if self.flushing.load(Ordering::SeqCst) {
            BatchState::Flushing
        } else if self.lock().tasks.is_empty() {
            BatchState::Idle
        } else {
            BatchState::Accumulating
        }
    }

    /// Number of buffered tasks.
    pub fn pending_len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Copy of the pending buffer.
    pub fn pending(&self) -> PendingBatch {
        self.lock().clone()
    }

    /// Returns `true` if a task with this id is buffered.
    pub fn contains(&self, task_id: &str) -> bool {
        self.lock().tasks.iter().any(|t| t.id().as_str() == task_id)
    }

    fn is_due(&self, pending: &PendingBatch) -> bool {
        pending.tasks.len() >= self.config.size_threshold
            || self.clock.now().saturating_duration_since(pending.last_flush)
                >= self.config.time_threshold()
    }

    /// Buffers `task`; if a threshold is now crossed, flushes synchronously.
    pub fn submit<F>(&self, task: Task, assign: F) -> Option<FlushReport>
    where
        F: FnMut(&Task) -> Result<VehicleId, DispatchError>,
    {
        let due = {
            let mut pending = self.lock();
            pending.tasks.push(task);
            self.is_due(&pending)
        };
        due.then(|| self.flush(assign))
    }

    /// Flushes if the time threshold has passed and something is pending.
    pub fn poll<F>(&self, assign: F) -> Option<FlushReport>
    where
        F: FnMut(&Task) -> Result<VehicleId, DispatchError>,
    {
        let due = {
            let pending = self.lock();
            !pending.tasks.is_empty() && self.is_due(&pending)
        };
        due.then(|| self.flush(assign))
    }

    /// Runs `assign` on every buffered task in arrival order, then resets
    /// the timer. A failing task is recorded and the rest still run.
    /// Flushing an empty buffer does nothing.
    pub fn flush<F>(&self, mut assign: F) -> FlushReport
    where
        F: FnMut(&Task) -> Result<VehicleId, DispatchError>,
    {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let batch = mem::take(&mut self.lock().tasks);
        if batch.is_empty() {
            return FlushReport::default();
        }

        self.flushing.store(true, Ordering::SeqCst);
        let _flushing = FlushingGuard(&self.flushing);
        tracing::info!(size = batch.len(), "flushing batch");

        let mut report = FlushReport::default();
        for task in &batch {
            match assign(task) {
                Ok(vehicle_id) => report.assigned.push((task.id().clone(), vehicle_id)),
                Err(err) => {
                    tracing::warn!(task_id = %task.id(), error = %err, "task left unassigned");
                    report.unassigned.push((task.id().clone(), err));
                }
            }
        }

        self.lock().last_flush = self.clock.now();
        tracing::info!(
            assigned = report.assigned.len(),
            unassigned = report.unassigned.len(),
            "batch flushed"
        );
        report
    }

    /// Drops every buffered task and restarts the timer.
    pub fn clear(&self) {
        let mut pending = self.lock();
        pending.tasks.clear();
        pending.last_flush = self.clock.now();
    }
}
