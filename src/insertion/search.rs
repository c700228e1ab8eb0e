//! Cheapest (vehicle, position) insertion across the fleet.
//!
//! # Algorithm
//!
//! For every vehicle and every allowed position, build the trial route and
//! score it with the perishable flag of the trial. The global minimum wins;
//! ties go to the earlier vehicle, then the earlier position.
//!
//! # Complexity
//!
//! O(V × L²) per task where V = vehicles and L = route length: each of the
//! L + 1 trials copies and scores an L + 1 stop route. Fine for small
//! per-batch fan-out, not for large fleets with long routes.

use std::ops::RangeInclusive;

use rayon::prelude::*;

use crate::distance::MatrixPair;
use crate::error::{DispatchError, UnassignedReason};
use crate::evaluation::{route_is_perishable, score, FeasibilityCheck};
use crate::models::{Fleet, Task, Vehicle, VehicleId};

/// The winning slot of a search, tied to the fleet version it was found on.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertionPlan {
    /// Chosen vehicle.
    pub vehicle_id: VehicleId,
    /// Index of that vehicle in fleet order.
    pub vehicle_index: usize,
    /// Route position the task goes to.
    pub position: usize,
    /// Route cost after insertion.
    pub cost: f64,
    /// Fleet version the plan was computed against.
    pub version: u64,
}

/// Builds `route[..position] + task + route[position..]`.
pub fn trial_route(route: &[Task], position: usize, task: &Task) -> Vec<Task> {
    let mut trial = Vec::with_capacity(route.len() + 1);
    trial.extend_from_slice(&route[..position]);
    trial.push(task.clone());
    trial.extend_from_slice(&route[position..]);
    trial
}

/// Insertion search over a fleet snapshot.
///
/// # Examples
///
/// ```
/// use u_dispatch::distance::MatrixPair;
/// use u_dispatch::evaluation::Feasibility;
/// use u_dispatch::insertion::InsertionSearch;
/// use u_dispatch::models::{Fleet, Location, Task, Vehicle};
///
/// let at = Location::new(0.0, 0.0);
/// let mut fleet = Fleet::new(vec![Vehicle::new(1, 10).with_route(vec![Task::depot("DEPOT", at)])]);
/// let matrix = MatrixPair::new();
/// let feasibility = Feasibility::Permissive;
///
/// let t1 = Task::new("T1", at, 1, 0, 100).unwrap();
/// let plan = InsertionSearch::new(&matrix, &feasibility).insert(&mut fleet, &t1).unwrap();
/// assert_eq!(plan.vehicle_id, 1);
/// let ids: Vec<_> = fleet.vehicles()[0].route().iter().map(|t| t.id().as_str()).collect();
/// assert_eq!(ids, vec!["DEPOT", "T1"]);
/// ```
pub struct InsertionSearch<'a> {
    matrix: &'a MatrixPair,
    feasibility: &'a dyn FeasibilityCheck,
    protect_anchor: bool,
    parallel: bool,
}

impl<'a> InsertionSearch<'a> {
    /// Creates a sequential search that never inserts before the current stop.
    pub fn new(matrix: &'a MatrixPair, feasibility: &'a dyn FeasibilityCheck) -> Self {
        Self {
            matrix,
            feasibility,
            protect_anchor: true,
            parallel: false,
        }
    }

    /// With `false`, position 0 (before the anchor) is also tried.
    pub fn with_anchor_protection(mut self, protect: bool) -> Self {
        self.protect_anchor = protect;
        self
    }

    /// Evaluates vehicles on the rayon pool.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Positions at which a task may be inserted into `vehicle`'s route.
    ///
    /// With anchor protection the current stop and everything before it
    /// stay fixed; an empty route accepts position 0 only.
    pub fn positions(&self, vehicle: &Vehicle) -> RangeInclusive<usize> {
        let len = vehicle.route().len();
        if len == 0 || !self.protect_anchor {
            return 0..=len;
        }
        (vehicle.progress_index() + 1).min(len)..=len
    }

    /// Cheapest feasible `(position, cost)` for `task` in `vehicle`.
    ///
    /// Vehicles whose committed load cannot absorb the task are skipped.
    pub fn best_for_vehicle(&self, vehicle: &Vehicle, task: &Task) -> Option<(usize, f64)> {
        if vehicle.load() + task.committed_demand() > vehicle.capacity() {
            return None;
        }
        let route = vehicle.route();
        let perishable = task.is_perishable() || route_is_perishable(route);

        let mut best: Option<(usize, f64)> = None;
        for position in self.positions(vehicle) {
            let trial = trial_route(route, position, task);
            if !self.feasibility.is_feasible(&trial, vehicle, self.matrix) {
                continue;
            }
            let cost = score(&trial, self.matrix, perishable);
            if best.is_none_or(|(_, b)| cost < b) {
                best = Some((position, cost));
            }
        }
        best
    }

    /// Finds the cheapest slot without touching the fleet.
    pub fn find(&self, fleet: &Fleet, task: &Task) -> Result<InsertionPlan, DispatchError> {
        if fleet.is_empty() {
            return Err(DispatchError::unassigned(task.id(), UnassignedReason::EmptyFleet));
        }

        let per_vehicle: Vec<Option<(usize, f64)>> = if self.parallel {
            fleet
                .vehicles()
                .par_iter()
                .map(|v| self.best_for_vehicle(v, task))
                .collect()
        } else {
            fleet
                .vehicles()
                .iter()
                .map(|v| self.best_for_vehicle(v, task))
                .collect()
        };

        let mut best: Option<(usize, usize, f64)> = None;
        for (vehicle_index, candidate) in per_vehicle.into_iter().enumerate() {
            if let Some((position, cost)) = candidate {
                if best.is_none_or(|(_, _, b)| cost < b) {
                    best = Some((vehicle_index, position, cost));
                }
            }
        }

        let (vehicle_index, position, cost) = best.ok_or_else(|| {
            DispatchError::unassigned(task.id(), UnassignedReason::NoFeasiblePosition)
        })?;
        Ok(InsertionPlan {
            vehicle_id: fleet.vehicles()[vehicle_index].id(),
            vehicle_index,
            position,
            cost,
            version: fleet.version(),
        })
    }

    /// Finds the cheapest slot and splices the task in.
    pub fn insert(&self, fleet: &mut Fleet, task: &Task) -> Result<InsertionPlan, DispatchError> {
        let plan = self.find(fleet, task)?;
        fleet.splice(plan.vehicle_index, plan.position, task.clone());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{Edge, EuclideanProvider, MatrixProvider};
    use crate::evaluation::Feasibility;
    use crate::models::Location;
    use proptest::prelude::*;

    fn at(x: f64) -> Location {
        Location::new(x, 0.0)
    }

    fn task(id: &str, x: f64, demand: i32) -> Task {
        Task::new(id, at(x), demand, 0, 1000).expect("valid")
    }

    fn ids(vehicle: &Vehicle) -> Vec<String> {
        vehicle.route().iter().map(|t| t.id().to_string()).collect()
    }

    #[test]
    fn test_trial_route() {
        let route = vec![task("A", 0.0, 1), task("B", 1.0, 1)];
        let trial = trial_route(&route, 1, &task("X", 0.5, 1));
        let names: Vec<_> = trial.iter().map(|t| t.id().as_str()).collect();
        assert_eq!(names, vec!["A", "X", "B"]);
    }

    #[test]
    fn test_empty_fleet() {
        let mut fleet = Fleet::default();
        let m = MatrixPair::new();
        let f = Feasibility::Permissive;
        let err = InsertionSearch::new(&m, &f)
            .insert(&mut fleet, &task("T", 0.0, 1))
            .expect_err("no vehicles");
        assert!(matches!(
            err,
            DispatchError::InfeasibleAssignment {
                reason: UnassignedReason::EmptyFleet,
                ..
            }
        ));
    }

    #[test]
    fn test_single_depot_route() {
        let mut fleet = Fleet::new(vec![Vehicle::new(1, 10).with_route(vec![Task::depot("DEPOT", at(0.0))])]);
        let m = MatrixPair::new();
        let f = Feasibility::Permissive;
        let plan = InsertionSearch::new(&m, &f)
            .insert(&mut fleet, &task("T1", 1.0, 1))
            .expect("assigned");
        assert_eq!(plan.position, 1);
        assert_eq!(ids(&fleet.vehicles()[0]), vec!["DEPOT", "T1"]);
        assert_eq!(fleet.version(), 1);
    }

    #[test]
    fn test_unprotected_tie_takes_position_zero() {
        let mut fleet = Fleet::new(vec![Vehicle::new(1, 10).with_route(vec![Task::depot("DEPOT", at(0.0))])]);
        let m = MatrixPair::new();
        let f = Feasibility::Permissive;
        let plan = InsertionSearch::new(&m, &f)
            .with_anchor_protection(false)
            .insert(&mut fleet, &task("T1", 1.0, 1))
            .expect("assigned");
        assert_eq!(plan.position, 0);
    }

    #[test]
    fn test_picks_cheapest_vehicle() {
        let near = vec![Task::depot("D1", at(10.0))];
        let far = vec![Task::depot("D2", at(0.0))];
        let mut fleet = Fleet::new(vec![
            Vehicle::new(1, 10).with_route(far),
            Vehicle::new(2, 10).with_route(near),
        ]);
        let new_task = task("T", 9.0, 1);
        let mut all = fleet.routed_tasks();
        all.push(new_task.clone());
        let m = EuclideanProvider::default().get(&all).expect("matrix");
        let f = Feasibility::Permissive;
        let plan = InsertionSearch::new(&m, &f)
            .insert(&mut fleet, &new_task)
            .expect("assigned");
        assert_eq!(plan.vehicle_id, 2);
        // 1.0 distance + 0.5 * 1.0 duration
        assert!((plan.cost - 1.5).abs() < 1e-10);
    }

    #[test]
    fn test_tie_goes_to_first_vehicle() {
        let mut fleet = Fleet::new(vec![
            Vehicle::new(5, 10).with_route(vec![Task::depot("D", at(0.0))]),
            Vehicle::new(6, 10).with_route(vec![Task::depot("D", at(0.0))]),
        ]);
        let m = MatrixPair::new();
        let f = Feasibility::Permissive;
        let plan = InsertionSearch::new(&m, &f)
            .with_parallelism(true)
            .insert(&mut fleet, &task("T", 1.0, 1))
            .expect("assigned");
        assert_eq!(plan.vehicle_id, 5);
    }

    #[test]
    fn test_best_middle_position() {
        let route = vec![Task::depot("D", at(0.0)), task("A", 2.0, 1), task("B", 4.0, 1)];
        let mut fleet = Fleet::new(vec![Vehicle::new(1, 10).with_route(route)]);
        let x = task("X", 3.0, 1);
        let mut all = fleet.routed_tasks();
        all.push(x.clone());
        let m = EuclideanProvider::default().get(&all).expect("matrix");
        let f = Feasibility::Permissive;
        let plan = InsertionSearch::new(&m, &f).insert(&mut fleet, &x).expect("assigned");
        assert_eq!(plan.position, 2);
        assert_eq!(ids(&fleet.vehicles()[0]), vec!["D", "A", "X", "B"]);
    }

    #[test]
    fn test_full_vehicle_skipped() {
        let full = vec![Task::depot("D1", at(0.0)), task("A", 0.0, 1)];
        let mut fleet = Fleet::new(vec![
            Vehicle::new(1, 1).with_route(full),
            Vehicle::new(2, 10).with_route(vec![Task::depot("D2", at(50.0))]),
        ]);
        let m = MatrixPair::new();
        let f = Feasibility::Permissive;
        let plan = InsertionSearch::new(&m, &f)
            .insert(&mut fleet, &task("T", 0.0, 1))
            .expect("assigned");
        assert_eq!(plan.vehicle_id, 2);
    }

    #[test]
    fn test_no_feasible_position() {
        let mut fleet = Fleet::new(vec![Vehicle::new(1, 1).with_route(vec![Task::depot("D", at(0.0))])]);
        let m = MatrixPair::new();
        let f = Feasibility::Permissive;
        let err = InsertionSearch::new(&m, &f)
            .insert(&mut fleet, &task("T", 0.0, 2))
            .expect_err("too heavy");
        assert!(matches!(
            err,
            DispatchError::InfeasibleAssignment {
                reason: UnassignedReason::NoFeasiblePosition,
                ..
            }
        ));
        assert_eq!(fleet.version(), 0);
    }

    #[test]
    fn test_custom_predicate_rejects_positions() {
        let route = vec![Task::depot("D", at(0.0)), task("A", 2.0, 1)];
        let mut fleet = Fleet::new(vec![Vehicle::new(1, 10).with_route(route)]);
        // only allow appending at the end
        let f = Feasibility::custom(|route, _, _| route.last().is_some_and(|t| t.id().as_str() == "X"));
        let m = MatrixPair::new();
        let plan = InsertionSearch::new(&m, &f)
            .insert(&mut fleet, &task("X", 1.0, 1))
            .expect("assigned");
        assert_eq!(plan.position, 2);
    }

    #[test]
    fn test_respects_progress() {
        let route = vec![Task::depot("D", at(0.0)), task("A", 1.0, 1), task("B", 2.0, 1)];
        let mut vehicle = Vehicle::new(1, 10).with_route(route);
        vehicle.advance();
        let m = MatrixPair::new();
        let f = Feasibility::Permissive;
        let search = InsertionSearch::new(&m, &f);
        assert_eq!(search.positions(&vehicle), 2..=3);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let vehicles: Vec<Vehicle> = (0..6)
            .map(|i| {
                Vehicle::new(i, 10).with_route(vec![
                    Task::depot(format!("D{i}"), at(i as f64 * 3.0)),
                    task(&format!("S{i}"), i as f64 * 3.0 + 1.0, 1),
                ])
            })
            .collect();
        let fleet = Fleet::new(vehicles);
        let x = task("X", 7.2, 1);
        let mut all = fleet.routed_tasks();
        all.push(x.clone());
        let m = EuclideanProvider::default().get(&all).expect("matrix");
        let f = Feasibility::Permissive;
        let seq = InsertionSearch::new(&m, &f).find(&fleet, &x).expect("plan");
        let par = InsertionSearch::new(&m, &f)
            .with_parallelism(true)
            .find(&fleet, &x)
            .expect("plan");
        assert_eq!(seq, par);
    }

    proptest! {
        #[test]
        fn prop_insertion_keeps_order_and_capacity(
            demands in proptest::collection::vec(1i32..4, 0..6),
            xs in proptest::collection::vec(0.0f64..50.0, 6),
            capacities in proptest::collection::vec(1i32..12, 1..4),
            new_demand in 1i32..4,
            new_x in 0.0f64..50.0,
        ) {
            let vehicles: Vec<Vehicle> = capacities
                .iter()
                .enumerate()
                .map(|(vi, &capacity)| {
                    let mut route = vec![Task::depot(format!("D{vi}"), at(0.0))];
                    let mut load = 0;
                    for (i, &d) in demands.iter().enumerate() {
                        if load + d <= capacity {
                            load += d;
                            route.push(task(&format!("V{vi}S{i}"), xs[i], d));
                        }
                    }
                    Vehicle::new(vi, capacity).with_route(route)
                })
                .collect();
            let mut fleet = Fleet::new(vehicles);
            let before = fleet.clone();
            let x = task("X", new_x, new_demand);
            let mut all = fleet.routed_tasks();
            all.push(x.clone());
            let m = EuclideanProvider::default().get(&all).expect("matrix");
            let f = Feasibility::Permissive;

            match InsertionSearch::new(&m, &f).insert(&mut fleet, &x) {
                Ok(plan) => {
                    let after = &fleet.vehicles()[plan.vehicle_index];
                    prop_assert!(after.load() <= after.capacity());
                    let old = &before.vehicles()[plan.vehicle_index];
                    prop_assert_eq!(after.route().len(), old.route().len() + 1);
                    let kept: Vec<_> = after.route().iter().filter(|t| t.id().as_str() != "X").collect();
                    let original: Vec<_> = old.route().iter().collect();
                    prop_assert_eq!(kept, original);
                }
                Err(err) => {
                    prop_assert!(err.is_unassigned());
                    prop_assert!(before
                        .vehicles()
                        .iter()
                        .all(|v| v.load() + new_demand > v.capacity()));
                }
            }
        }
    }

    #[test]
    fn test_plan_cost_matches_score() {
        let mut fleet = Fleet::new(vec![Vehicle::new(1, 10).with_route(vec![Task::depot("D", at(0.0))])]);
        let x = task("X", 2.0, 1).with_perishable(true);
        let mut m = MatrixPair::new();
        m.insert("D", "X", Edge::new(2.0, 2.0));
        let f = Feasibility::Permissive;
        let plan = InsertionSearch::new(&m, &f).insert(&mut fleet, &x).expect("assigned");
        assert!((plan.cost - 1.5 * 3.0).abs() < 1e-10);
    }
}
