//! Nearest-neighbor initial route construction.
//!
//! Builds routes greedily: from each vehicle's last stop, always visit the
//! nearest unrouted task that still fits the vehicle's capacity. When nothing
//! fits (or the stop limit is hit), move to the next vehicle.
//!
//! # Complexity
//!
//! O(n² × V) where n = number of tasks and V = number of vehicles.
//!
//! This stands in for a full time-windowed solver when seeding routes; the
//! dynamic engine then maintains them by insertion.

use crate::models::{Task, TaskId, Vehicle};

/// Fills `vehicles` with nearest-neighbor routes over `tasks`.
///
/// Each vehicle should already hold its anchor stop. Tasks are appended, so
/// existing stops keep their order. Returns the ids of tasks left unrouted.
///
/// # Arguments
///
/// * `vehicles`: Fleet in dispatch order, each with an anchor stop
/// * `tasks`: Candidate tasks
/// * `max_stops`: Optional cap on tasks added per vehicle
///
/// # Examples
///
/// ```
/// use u_dispatch::constructive::nearest_neighbor_routes;
/// use u_dispatch::models::{Location, Task, Vehicle};
///
/// let task = |id: &str, x: f64| Task::new(id, Location::new(x, 0.0), 10, 0, 100).unwrap();
/// let tasks = vec![task("C", 3.0), task("A", 1.0), task("B", 2.0)];
/// let mut vehicles = vec![Vehicle::new(0, 30).with_route(vec![Task::depot("D", Location::new(0.0, 0.0))])];
///
/// let unrouted = nearest_neighbor_routes(&mut vehicles, &tasks, None);
/// assert!(unrouted.is_empty());
/// let ids: Vec<_> = vehicles[0].route().iter().map(|t| t.id().as_str()).collect();
/// assert_eq!(ids, vec!["D", "A", "B", "C"]);
/// ```
pub fn nearest_neighbor_routes(
    vehicles: &mut [Vehicle],
    tasks: &[Task],
    max_stops: Option<usize>,
) -> Vec<TaskId> {
    let mut routed = vec![false; tasks.len()];

    for vehicle in vehicles.iter_mut() {
        let Some(mut current) = vehicle.tail_location().copied() else {
            continue;
        };
        let mut load = vehicle.reserved_load();
        let mut added = 0;

        loop {
            if max_stops.is_some_and(|limit| added >= limit) {
                break;
            }
            let mut best: Option<(usize, f64)> = None;
            for (i, task) in tasks.iter().enumerate() {
                if routed[i] || load + task.demand() > vehicle.capacity() {
                    continue;
                }
                let d = current.distance_to(task.location());
                if best.is_none_or(|(_, b)| d < b) {
                    best = Some((i, d));
                }
            }

            match best {
                Some((next, _)) => {
                    routed[next] = true;
                    load += tasks[next].demand();
                    current = *tasks[next].location();
                    vehicle.push(tasks[next].clone());
                    added += 1;
                }
                None => break,
            }
        }

        if routed.iter().all(|&r| r) {
            break;
        }
    }

    tasks
        .iter()
        .enumerate()
        .filter(|(i, _)| !routed[*i])
        .map(|(_, t)| t.id().clone())
        .collect()
}
