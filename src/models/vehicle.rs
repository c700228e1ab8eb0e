//! Vehicle type owning its route and progress pointer.

use serde::{Deserialize, Serialize};

use super::{Location, Task};

/// Vehicle identifier.
pub type VehicleId = usize;

/// A capacity-constrained vehicle with an ordered route.
///
/// The first stop is conventionally the depot/anchor. `progress_index`
/// points at the stop the vehicle is currently at; everything from there on
/// is the untraversed suffix.
///
/// # Examples
///
/// ```
/// use u_dispatch::models::{Location, Task, Vehicle};
///
/// let depot = Task::depot("DEPOT", Location::new(0.0, 0.0));
/// let v = Vehicle::new(1, 10).with_route(vec![depot]);
/// assert_eq!(v.id(), 1);
/// assert_eq!(v.capacity(), 10);
/// assert_eq!(v.remaining_capacity(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    id: VehicleId,
    #[serde(default)]
    name: Option<String>,
    capacity: i32,
    #[serde(default)]
    route: Vec<Task>,
    #[serde(default)]
    progress_index: usize,
    #[serde(default)]
    current_location: Option<Location>,
}

impl Vehicle {
    /// Creates a vehicle with an empty route.
    pub fn new(id: VehicleId, capacity: i32) -> Self {
        Self {
            id,
            name: None,
            capacity,
            route: Vec::new(),
            progress_index: 0,
            current_location: None,
        }
    }

    /// Sets a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the initial route.
    pub fn with_route(mut self, route: Vec<Task>) -> Self {
        self.route = route;
        self
    }

    /// Sets the last reported position.
    pub fn with_location(mut self, location: Location) -> Self {
        self.current_location = Some(location);
        self
    }

    /// Vehicle ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Maximum committed load.
    pub fn capacity(&self) -> i32 {
        self.capacity
    }

    /// The full route, traversed stops included.
    pub fn route(&self) -> &[Task] {
        &self.route
    }

    /// Index of the stop the vehicle is currently at.
    pub fn progress_index(&self) -> usize {
        self.progress_index
    }

    /// Last reported position.
    pub fn current_location(&self) -> Option<&Location> {
        self.current_location.as_ref()
    }

    /// Stops from the current one to the end of the route.
    pub fn untraversed(&self) -> &[Task] {
        let start = self.progress_index.min(self.route.len());
        &self.route[start..]
    }

    /// Committed load over the untraversed suffix. Ghost stops do not count.
    pub fn load(&self) -> i32 {
        self.untraversed().iter().map(Task::committed_demand).sum()
    }

    /// Load over the untraversed suffix including ghost stops already
    /// bound to this vehicle.
    pub fn reserved_load(&self) -> i32 {
        self.untraversed().iter().map(Task::demand).sum()
    }

    /// Capacity left after the committed load.
    pub fn remaining_capacity(&self) -> i32 {
        self.capacity - self.load()
    }

    /// The final stop of the route.
    pub fn last_stop(&self) -> Option<&Task> {
        self.route.last()
    }

    /// Where the vehicle ends up: its last stop, else its reported position.
    pub fn tail_location(&self) -> Option<&Location> {
        self.last_stop()
            .map(Task::location)
            .or(self.current_location.as_ref())
    }

    /// Position of the task with the given id in the route.
    pub fn position_of(&self, task_id: &str) -> Option<usize> {
        self.route.iter().position(|t| t.id().as_str() == task_id)
    }

    pub(crate) fn insert(&mut self, position: usize, task: Task) {
        self.route.insert(position, task);
    }

    pub(crate) fn push(&mut self, task: Task) {
        self.route.push(task);
    }

    pub(crate) fn replace_route(&mut self, route: Vec<Task>) {
        self.route = route;
        self.progress_index = self.progress_index.min(self.route.len().saturating_sub(1));
    }

    pub(crate) fn route_mut(&mut self) -> &mut [Task] {
        &mut self.route
    }

    pub(crate) fn set_location(&mut self, location: Location) {
        self.current_location = Some(location);
    }

    /// Moves to the next stop. Returns `false` at the end of the route.
    pub(crate) fn advance(&mut self) -> bool {
        if self.progress_index + 1 >= self.route.len() {
            return false;
        }
        self.progress_index += 1;
        self.current_location = Some(*self.route[self.progress_index].location());
        true
    }
}
