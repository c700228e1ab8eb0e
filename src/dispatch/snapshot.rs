//! Serializable views of dispatcher state.

use serde::Serialize;

use crate::models::{Location, Task, TaskId, TaskKind, VehicleId};

/// One vehicle as shown on a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSummary {
    pub id: VehicleId,
    pub name: Option<String>,
    pub route: Vec<TaskId>,
    pub capacity: i32,
    pub load: i32,
    pub progress_index: usize,
    /// Cost of the untraversed suffix, rounded to two decimals.
    pub route_cost: f64,
}

/// One task as shown on a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub location: Location,
    pub kind: TaskKind,
    pub confirmed: bool,
    pub perishable: bool,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id().clone(),
            location: *task.location(),
            kind: task.kind(),
            confirmed: task.is_confirmed(),
            perishable: task.is_perishable(),
        }
    }
}

/// Point-in-time view of the whole dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSnapshot {
    pub version: u64,
    pub vehicles: Vec<VehicleSummary>,
    pub tasks: Vec<TaskSummary>,
    pub ghosts: Vec<TaskSummary>,
    pub pending: usize,
}

impl FleetSnapshot {
    /// Serializes the snapshot as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(2.0), 2.0);
    }

    #[test]
    fn test_to_json() {
        let snapshot = FleetSnapshot {
            version: 3,
            vehicles: vec![VehicleSummary {
                id: 1,
                name: Some("Truck 1".into()),
                route: vec![TaskId::new("D"), TaskId::new("A")],
                capacity: 10,
                load: 2,
                progress_index: 0,
                route_cost: 4.5,
            }],
            tasks: Vec::new(),
            ghosts: Vec::new(),
            pending: 0,
        };
        let json = snapshot.to_json();
        assert!(json.contains(r#""route":["D","A"]"#));
        assert!(json.contains(r#""route_cost":4.5"#));
    }
}
