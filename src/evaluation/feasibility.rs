//! Pluggable route feasibility predicates.

use std::fmt;
use std::sync::Arc;

use crate::distance::MatrixPair;
use crate::models::{Task, Vehicle};

/// Decides whether a candidate route may be assigned to a vehicle.
///
/// Searches call this for every trial; implementations must be pure.
pub trait FeasibilityCheck: Send + Sync {
    /// Returns `true` if `route` is acceptable for `vehicle`.
    ///
    /// `route` is the full candidate route; only stops from the vehicle's
    /// `progress_index` on are still ahead of it.
    fn is_feasible(&self, route: &[Task], vehicle: &Vehicle, matrix: &MatrixPair) -> bool;
}

/// Custom predicate signature.
pub type FeasibilityFn = dyn Fn(&[Task], &Vehicle, &MatrixPair) -> bool + Send + Sync;

/// Built-in feasibility variants.
///
/// # Examples
///
/// ```
/// use u_dispatch::distance::MatrixPair;
/// use u_dispatch::evaluation::{Feasibility, FeasibilityCheck};
/// use u_dispatch::models::{Location, Task, Vehicle};
///
/// let at = Location::new(0.0, 0.0);
/// let vehicle = Vehicle::new(1, 2);
/// let route = vec![Task::depot("D", at), Task::new("A", at, 3, 0, 10).unwrap()];
/// let m = MatrixPair::new();
///
/// assert!(Feasibility::Permissive.is_feasible(&route, &vehicle, &m));
/// assert!(!Feasibility::CapacityOnly.is_feasible(&route, &vehicle, &m));
/// ```
#[derive(Clone, Default)]
pub enum Feasibility {
    /// Accepts every route.
    #[default]
    Permissive,
    /// Committed load ahead of the vehicle must fit its capacity.
    CapacityOnly,
    /// Capacity plus every time window along the untraversed suffix.
    CapacityTimeWindow,
    /// Caller-supplied predicate.
    Custom(Arc<FeasibilityFn>),
}

impl Feasibility {
    /// Wraps a closure as a custom predicate.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[Task], &Vehicle, &MatrixPair) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }
}

impl fmt::Debug for Feasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feasibility::Permissive => f.write_str("Permissive"),
            Feasibility::CapacityOnly => f.write_str("CapacityOnly"),
            Feasibility::CapacityTimeWindow => f.write_str("CapacityTimeWindow"),
            Feasibility::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl FeasibilityCheck for Feasibility {
    fn is_feasible(&self, route: &[Task], vehicle: &Vehicle, matrix: &MatrixPair) -> bool {
        match self {
            Feasibility::Permissive => true,
            Feasibility::CapacityOnly => within_capacity(route, vehicle),
            Feasibility::CapacityTimeWindow => {
                within_capacity(route, vehicle) && within_time_windows(route, vehicle, matrix)
            }
            Feasibility::Custom(f) => f(route, vehicle, matrix),
        }
    }
}

fn ahead<'a>(route: &'a [Task], vehicle: &Vehicle) -> &'a [Task] {
    &route[vehicle.progress_index().min(route.len())..]
}

/// Committed demand ahead of the vehicle fits its capacity.
pub fn within_capacity(route: &[Task], vehicle: &Vehicle) -> bool {
    let load: i32 = ahead(route, vehicle).iter().map(Task::committed_demand).sum();
    load <= vehicle.capacity()
}

/// Demand ahead of the vehicle fits its capacity, ghost stops included.
///
/// Bound ghosts hold their slot, so promoting any of them later cannot
/// overload the vehicle.
pub fn within_reserved_capacity(route: &[Task], vehicle: &Vehicle) -> bool {
    let load: i32 = ahead(route, vehicle).iter().map(Task::demand).sum();
    load <= vehicle.capacity()
}

/// Walks the untraversed suffix from time 0 at the current stop, waiting at
/// early arrivals, and fails on the first arrival after a window closes.
pub fn within_time_windows(route: &[Task], vehicle: &Vehicle, matrix: &MatrixPair) -> bool {
    let stops = ahead(route, vehicle);
    let Some(first) = stops.first() else {
        return true;
    };
    let mut clock = first.window().waiting_time(0.0);
    for leg in stops.windows(2) {
        let (prev, next) = (&leg[0], &leg[1]);
        let arrival = clock + matrix.lookup(prev.id().as_str(), next.id().as_str()).duration;
        if next.window().is_violated(arrival) {
            return false;
        }
        clock = arrival + next.window().waiting_time(arrival);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Edge;
    use crate::models::Location;

    fn at() -> Location {
        Location::new(0.0, 0.0)
    }

    fn task(id: &str, demand: i32, earliest: i64, latest: i64) -> Task {
        Task::new(id, at(), demand, earliest, latest).expect("valid")
    }

    fn matrix() -> MatrixPair {
        let mut m = MatrixPair::new();
        m.insert("D", "A", Edge::new(5.0, 5.0));
        m.insert("A", "B", Edge::new(5.0, 5.0));
        m
    }

    #[test]
    fn test_capacity_ignores_ghosts() {
        let v = Vehicle::new(1, 3);
        let route = vec![Task::depot("D", at()), task("A", 3, 0, 100), task("G", 5, 0, 100).speculative()];
        assert!(within_capacity(&route, &v));
    }

    #[test]
    fn test_reserved_capacity_counts_ghosts() {
        let v = Vehicle::new(1, 4);
        let route = vec![Task::depot("D", at()), task("A", 3, 0, 100), task("G", 2, 0, 100).speculative()];
        assert!(within_capacity(&route, &v));
        assert!(!within_reserved_capacity(&route, &v));
        assert!(within_reserved_capacity(&route[..2], &v));
    }

    #[test]
    fn test_capacity_ignores_traversed_prefix() {
        let route = vec![Task::depot("D", at()), task("A", 3, 0, 100), task("B", 2, 0, 100)];
        let mut v = Vehicle::new(1, 2).with_route(route.clone());
        assert!(!within_capacity(&route, &v));
        v.advance();
        v.advance();
        assert!(within_capacity(&route, &v));
    }

    #[test]
    fn test_time_windows_ok_with_waiting() {
        let v = Vehicle::new(1, 10);
        // arrive A at 5, wait to 20, arrive B at 25
        let route = vec![Task::depot("D", at()), task("A", 1, 20, 30), task("B", 1, 0, 25)];
        assert!(within_time_windows(&route, &v, &matrix()));
    }

    #[test]
    fn test_time_windows_violated() {
        let v = Vehicle::new(1, 10);
        let route = vec![Task::depot("D", at()), task("A", 1, 20, 30), task("B", 1, 0, 24)];
        assert!(!within_time_windows(&route, &v, &matrix()));
        assert!(!Feasibility::CapacityTimeWindow.is_feasible(&route, &v, &matrix()));
        assert!(Feasibility::CapacityOnly.is_feasible(&route, &v, &matrix()));
    }

    #[test]
    fn test_custom() {
        let max_two = Feasibility::custom(|route, _, _| route.len() <= 2);
        let v = Vehicle::new(1, 10);
        let m = MatrixPair::new();
        assert!(max_two.is_feasible(&[task("A", 1, 0, 1)], &v, &m));
        assert!(!max_two.is_feasible(
            &[task("A", 1, 0, 1), task("B", 1, 0, 1), task("C", 1, 0, 1)],
            &v,
            &m
        ));
        assert_eq!(format!("{max_two:?}"), "Custom(..)");
    }
}
