//! Error types for the dispatch engine.

use std::fmt;

use thiserror::Error;

use crate::models::{TaskId, VehicleId};

/// Why a task ended up unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnassignedReason {
    /// There are no vehicles at all.
    EmptyFleet,
    /// Every vehicle/position was rejected by capacity or constraints.
    NoFeasiblePosition,
    /// No vehicle has spare capacity for the task's demand.
    NoEligibleVehicle,
    /// Confirming the task would push its vehicle past capacity.
    OverCapacity,
}

impl fmt::Display for UnassignedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnassignedReason::EmptyFleet => f.write_str("fleet is empty"),
            UnassignedReason::NoFeasiblePosition => f.write_str("no feasible insertion position"),
            UnassignedReason::NoEligibleVehicle => f.write_str("no vehicle has enough capacity"),
            UnassignedReason::OverCapacity => f.write_str("vehicle capacity would be exceeded"),
        }
    }
}

/// Errors surfaced by the dispatch engine.
///
/// Normal infeasibility is reported as [`DispatchError::InfeasibleAssignment`]
/// so callers can park the task and retry; it is never a crash condition.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("task {task_id} is unassigned: {reason}")]
    InfeasibleAssignment {
        task_id: TaskId,
        reason: UnassignedReason,
    },

    #[error("fleet changed during commit, gave up after {attempts} attempts")]
    StaleCommit { attempts: u32 },

    #[error("unknown vehicle: {0}")]
    UnknownVehicle(VehicleId),

    #[error("unknown ghost task: {0}")]
    UnknownGhost(TaskId),

    #[error("invalid task {task_id}: {reason}")]
    InvalidTask { task_id: TaskId, reason: String },

    #[error("invalid route for vehicle {vehicle_id}: {reason}")]
    InvalidRoute {
        vehicle_id: VehicleId,
        reason: String,
    },

    #[error("matrix provider failed: {0}")]
    Matrix(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DispatchError {
    pub(crate) fn unassigned(task_id: &TaskId, reason: UnassignedReason) -> Self {
        Self::InfeasibleAssignment {
            task_id: task_id.clone(),
            reason,
        }
    }

    /// Returns `true` if the task simply could not be placed.
    pub fn is_unassigned(&self) -> bool {
        matches!(self, Self::InfeasibleAssignment { .. })
    }

    /// Returns `true` if retrying later may succeed without any change.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StaleCommit { .. } | Self::Matrix(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unassigned() {
        let err = DispatchError::unassigned(&TaskId::new("T1"), UnassignedReason::EmptyFleet);
        assert_eq!(err.to_string(), "task T1 is unassigned: fleet is empty");
        assert!(err.is_unassigned());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_stale_commit_is_transient() {
        let err = DispatchError::StaleCommit { attempts: 3 };
        assert!(err.is_transient());
        assert!(err.to_string().contains("3 attempts"));
    }
}
