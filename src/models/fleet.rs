//! Fleet state: the authoritative set of vehicles and their routes.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::{Location, Task, TaskKind, Vehicle, VehicleId};

/// All vehicles plus a version counter bumped by every mutation.
///
/// Mutation is crate-internal: routes change only through insertion commits,
/// ghost binding and promotion, route replacement, and progress updates.
/// The version lets a search detect that its snapshot went stale before
/// committing.
///
/// # Examples
///
/// ```
/// use u_dispatch::models::{Fleet, Location, Task, Vehicle};
///
/// let depot = Task::depot("DEPOT", Location::new(0.0, 0.0));
/// let fleet = Fleet::new(vec![
///     Vehicle::new(1, 10).with_route(vec![depot.clone()]),
///     Vehicle::new(2, 10).with_route(vec![depot]),
/// ]);
/// assert_eq!(fleet.len(), 2);
/// assert_eq!(fleet.version(), 0);
/// assert!(fleet.vehicle(2).is_some());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fleet {
    vehicles: Vec<Vehicle>,
    #[serde(skip)]
    version: u64,
}

impl Fleet {
    /// Creates a fleet from vehicles in dispatch order.
    pub fn new(vehicles: Vec<Vehicle>) -> Self {
        Self {
            vehicles,
            version: 0,
        }
    }

    /// Vehicles in dispatch order (the insertion tie-break order).
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Number of vehicles.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// Returns `true` if the fleet has no vehicles.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Monotonic mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Finds a vehicle by id.
    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id() == id)
    }

    /// Index of a vehicle in dispatch order.
    pub fn index_of(&self, id: VehicleId) -> Option<usize> {
        self.vehicles.iter().position(|v| v.id() == id)
    }

    /// Every distinct task referenced by some route, first occurrence wins.
    pub fn routed_tasks(&self) -> Vec<Task> {
        let mut seen = FxHashSet::default();
        self.vehicles
            .iter()
            .flat_map(|v| v.route().iter())
            .filter(|t| seen.insert(t.id().clone()))
            .cloned()
            .collect()
    }

    /// Locates a routed task: `(vehicle index, route position)`.
    pub fn find_task(&self, task_id: &str) -> Option<(usize, usize)> {
        self.vehicles
            .iter()
            .enumerate()
            .find_map(|(vi, v)| v.position_of(task_id).map(|pos| (vi, pos)))
    }

    /// Sum of committed loads across the fleet.
    pub fn total_load(&self) -> i32 {
        self.vehicles.iter().map(Vehicle::load).sum()
    }

    /// Same fleet, version counter set to `version`.
    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub(crate) fn splice(&mut self, vehicle_index: usize, position: usize, task: Task) {
        self.vehicles[vehicle_index].insert(position, task);
        self.bump();
    }

    pub(crate) fn append(&mut self, vehicle_index: usize, task: Task) {
        self.vehicles[vehicle_index].push(task);
        self.bump();
    }

    pub(crate) fn replace_route(&mut self, vehicle_index: usize, route: Vec<Task>) {
        self.vehicles[vehicle_index].replace_route(route);
        self.bump();
    }

    pub(crate) fn set_location(&mut self, vehicle_index: usize, location: Location) {
        self.vehicles[vehicle_index].set_location(location);
        self.bump();
    }

    pub(crate) fn advance(&mut self, vehicle_index: usize) -> bool {
        let moved = self.vehicles[vehicle_index].advance();
        if moved {
            self.bump();
        }
        moved
    }

    /// Flips every routed copy of `task_id` to confirmed. Returns how many
    /// stops changed.
    pub(crate) fn confirm_task(&mut self, task_id: &str) -> usize {
        let mut changed = 0;
        for vehicle in &mut self.vehicles {
            for stop in vehicle.route_mut() {
                if stop.id().as_str() == task_id && !stop.is_confirmed() {
                    stop.confirm();
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.bump();
        }
        changed
    }

    pub(crate) fn set_kind(&mut self, task_id: &str, kind: TaskKind) {
        for vehicle in &mut self.vehicles {
            for stop in vehicle.route_mut() {
                if stop.id().as_str() == task_id {
                    stop.set_kind(kind);
                }
            }
        }
        self.bump();
    }

    fn bump(&mut self) {
        self.version += 1;
    }
}
