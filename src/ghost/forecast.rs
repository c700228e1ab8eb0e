//! Trial insertion, promotion, and nearest-eligible binding of ghost tasks.
//!
//! A ghost is forecast demand. It can be trial-inserted into one vehicle
//! without committing anything, promoted to a confirmed task, or bound to
//! the nearest vehicle with spare capacity by appending it to that route.

use crate::distance::MatrixPair;
use crate::evaluation::{score, FeasibilityCheck};
use crate::insertion::trial_route;
use crate::models::{Fleet, Task, Vehicle};

/// Result of a ghost trial insertion. Nothing is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct GhostTrial {
    /// The best route found, or the current route if nothing beat it.
    pub route: Vec<Task>,
    /// Where the ghost went; `None` when the route is unchanged.
    pub position: Option<usize>,
    /// Cost of `route`.
    pub cost: f64,
    /// Cost of the current route under the same weighting.
    pub baseline_cost: f64,
}

impl GhostTrial {
    /// Returns `true` if some insertion beat the current route.
    pub fn improved(&self) -> bool {
        self.position.is_some()
    }

    /// The proposed route.
    pub fn into_route(self) -> Vec<Task> {
        self.route
    }
}

/// Finds the cheapest feasible interior slot for `ghost` in `vehicle`.
///
/// Interior means strictly after the current (anchor) stop and strictly
/// before the last stop. Trials are scored with the ghost's own
/// perishability. Only a trial cheaper than the current route is proposed.
///
/// # Examples
///
/// ```
/// use u_dispatch::distance::{Edge, MatrixPair};
/// use u_dispatch::evaluation::Feasibility;
/// use u_dispatch::ghost::trial_insertion;
/// use u_dispatch::models::{Location, Task, Vehicle};
///
/// let at = Location::new(0.0, 0.0);
/// let vehicle = Vehicle::new(1, 10).with_route(vec![
///     Task::depot("D", at),
///     Task::new("A", at, 1, 0, 100).unwrap(),
/// ]);
/// let ghost = Task::new("G", at, 1, 0, 100).unwrap().speculative();
///
/// let mut m = MatrixPair::new();
/// m.insert("D", "A", Edge::new(10.0, 0.0));
/// m.insert("D", "G", Edge::new(1.0, 0.0));
/// m.insert("G", "A", Edge::new(1.0, 0.0));
///
/// let trial = trial_insertion(&vehicle, &ghost, &m, &Feasibility::Permissive);
/// assert_eq!(trial.position, Some(1));
/// assert_eq!(vehicle.route().len(), 2);
/// ```
pub fn trial_insertion(
    vehicle: &Vehicle,
    ghost: &Task,
    matrix: &MatrixPair,
    feasibility: &dyn FeasibilityCheck,
) -> GhostTrial {
    let route = vehicle.route();
    let perishable = ghost.is_perishable();
    let baseline_cost = score(route, matrix, perishable);

    let mut best = GhostTrial {
        route: route.to_vec(),
        position: None,
        cost: baseline_cost,
        baseline_cost,
    };

    let first = (vehicle.progress_index() + 1).max(1);
    for position in first..route.len() {
        let trial = trial_route(route, position, ghost);
        if !feasibility.is_feasible(&trial, vehicle, matrix) {
            continue;
        }
        let cost = score(&trial, matrix, perishable);
        if cost < best.cost {
            best.route = trial;
            best.position = Some(position);
            best.cost = cost;
        }
    }
    best
}

/// Turns a ghost into a confirmed task with baseline priority.
pub fn promote(mut task: Task) -> Task {
    task.confirm();
    task
}

/// Index of the nearest vehicle that can take `ghost`'s demand.
///
/// Eligibility counts every untraversed stop, ghosts already bound
/// included, against capacity. Distance runs from the vehicle's last stop
/// (or its reported position) to the ghost; ties go to the earlier vehicle.
/// Vehicles with no known position rank last.
pub fn nearest_eligible(fleet: &Fleet, ghost: &Task) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, vehicle) in fleet.vehicles().iter().enumerate() {
        if vehicle.reserved_load() + ghost.demand() > vehicle.capacity() {
            continue;
        }
        let distance = vehicle
            .tail_location()
            .map_or(f64::INFINITY, |at| at.distance_to(ghost.location()));
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}
