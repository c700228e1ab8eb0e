//! Reproducible demo data for seeding and tests.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::constructive::nearest_neighbor_routes;
use crate::models::{Fleet, Location, Task, TaskKind, Vehicle};

/// Shape of the generated demo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Number of vehicles.
    pub vehicles: usize,
    /// Number of confirmed tasks.
    pub tasks: usize,
    /// Number of ghost tasks.
    pub ghosts: usize,
    /// Capacity of every vehicle.
    pub capacity: i32,
    /// Tasks routed per vehicle up front.
    pub stops_per_vehicle: usize,
    /// Shared depot location.
    pub depot: Location,
    /// Bounding box `(min, max)` for task locations.
    pub area: (Location, Location),
    /// RNG seed.
    pub seed: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            vehicles: 6,
            tasks: 20,
            ghosts: 9,
            capacity: 10,
            stops_per_vehicle: 4,
            depot: Location::new(77.5946, 12.9716),
            area: (Location::new(77.58, 12.93), Location::new(77.64, 13.02)),
            seed: 42,
        }
    }
}

/// Generated fleet, intake tasks, and ghost forecast.
#[derive(Debug, Clone)]
pub struct SeedData {
    /// Vehicles with depot anchors and initial routes.
    pub fleet: Fleet,
    /// Every confirmed task, routed or not.
    pub tasks: Vec<Task>,
    /// Forecast (unconfirmed) tasks.
    pub ghosts: Vec<Task>,
}

/// Uniform point in the box spanned by the two corners, in either order.
fn random_location(rng: &mut StdRng, area: &(Location, Location)) -> Location {
    let (a, b) = area;
    Location::new(
        rng.random_range(a.lon.min(b.lon)..=a.lon.max(b.lon)),
        rng.random_range(a.lat.min(b.lat)..=a.lat.max(b.lat)),
    )
}

fn random_kind(rng: &mut StdRng) -> TaskKind {
    if rng.random_bool(0.5) {
        TaskKind::Pickup
    } else {
        TaskKind::Dropoff
    }
}

/// Generates a demo fleet.
///
/// Confirmed tasks get demand 1..=3, a 0..500 window, and random
/// perishability; ghosts have demand 1 and a 0..1000 window. Initial routes
/// come from [`nearest_neighbor_routes`] over a shuffled task list.
///
/// # Examples
///
/// ```
/// use u_dispatch::seed::{seed_demo, SeedConfig};
///
/// let data = seed_demo(&SeedConfig::default());
/// assert_eq!(data.fleet.len(), 6);
/// assert_eq!(data.tasks.len(), 20);
/// assert!(data.ghosts.iter().all(|g| !g.is_confirmed()));
/// ```
pub fn seed_demo(config: &SeedConfig) -> SeedData {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut tasks = Vec::with_capacity(config.tasks);
    for i in 0..config.tasks {
        let location = random_location(&mut rng, &config.area);
        let demand = rng.random_range(1..=3);
        let Some(task) = Task::new(format!("T{:02}", i + 1), location, demand, 0, 500) else {
            continue;
        };
        let perishable = rng.random_bool(0.5);
        let priority = rng.random_range(0.5..=1.0);
        tasks.push(
            task.with_perishable(perishable)
                .with_kind(random_kind(&mut rng))
                .with_priority(priority),
        );
    }

    let mut ghosts = Vec::with_capacity(config.ghosts);
    for i in 0..config.ghosts {
        let location = random_location(&mut rng, &config.area);
        let Some(ghost) = Task::new(format!("G{:02}", i + 1), location, 1, 0, 1000) else {
            continue;
        };
        let perishable = rng.random_bool(0.4);
        let priority = rng.random_range(0.6..=0.9);
        ghosts.push(
            ghost
                .speculative()
                .with_perishable(perishable)
                .with_kind(random_kind(&mut rng))
                .with_priority(priority),
        );
    }

    let mut vehicles: Vec<Vehicle> = (1..=config.vehicles)
        .map(|id| {
            Vehicle::new(id, config.capacity)
                .with_name(format!("Truck {id}"))
                .with_location(config.depot)
                .with_route(vec![Task::depot(format!("DEPOT_{id}"), config.depot)])
        })
        .collect();

    let mut order = tasks.clone();
    order.shuffle(&mut rng);
    let unrouted = nearest_neighbor_routes(&mut vehicles, &order, Some(config.stops_per_vehicle));
    tracing::debug!(
        vehicles = vehicles.len(),
        tasks = tasks.len(),
        unrouted = unrouted.len(),
        "seeded demo fleet"
    );

    SeedData {
        fleet: Fleet::new(vehicles),
        tasks,
        ghosts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_reproducible() {
        let a = seed_demo(&SeedConfig::default());
        let b = seed_demo(&SeedConfig::default());
        assert_eq!(a.tasks, b.tasks);
        assert_eq!(a.fleet.vehicles(), b.fleet.vehicles());
    }

    #[test]
    fn test_seed_respects_capacity_and_stops() {
        let data = seed_demo(&SeedConfig::default());
        for v in data.fleet.vehicles() {
            assert!(v.load() <= v.capacity());
            assert!(v.route().len() <= 1 + 4);
            assert_eq!(v.route()[0].kind(), TaskKind::Depot);
        }
    }

    #[test]
    fn test_seed_tasks_valid() {
        let data = seed_demo(&SeedConfig {
            tasks: 50,
            ..SeedConfig::default()
        });
        assert_eq!(data.tasks.len(), 50);
        for t in &data.tasks {
            assert!(t.validate().is_ok());
            assert!((1..=3).contains(&t.demand()));
        }
        for g in &data.ghosts {
            assert!(!g.is_confirmed());
        }
    }

    #[test]
    fn test_seed_area_corners_any_order() {
        let config = SeedConfig::default();
        let (lo, hi) = config.area;
        let data = seed_demo(&SeedConfig {
            area: (hi, lo),
            ..config
        });
        assert_eq!(data.tasks.len(), 20);
        for t in &data.tasks {
            let at = t.location();
            assert!((lo.lon..=hi.lon).contains(&at.lon));
            assert!((lo.lat..=hi.lat).contains(&at.lat));
        }
    }

    #[test]
    fn test_seed_degenerate_area() {
        let corner = Location::new(1.0, 2.0);
        let data = seed_demo(&SeedConfig {
            area: (corner, corner),
            ..SeedConfig::default()
        });
        assert!(data.tasks.iter().all(|t| *t.location() == corner));
    }

    #[test]
    fn test_seed_no_task_routed_twice() {
        let data = seed_demo(&SeedConfig::default());
        let routed: usize = data.fleet.vehicles().iter().map(|v| v.route().len() - 1).sum();
        assert_eq!(routed, data.fleet.routed_tasks().len() - data.fleet.len());
    }
}
