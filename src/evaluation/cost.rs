//! Route cost model.
//!
//! Each leg costs `weight(destination) * (distance + 0.5 * duration)`:
//!
//! - destination is a ghost (unconfirmed) stop: weight 0.2
//! - else, the route is flagged perishable: weight 1.5
//! - else: weight 1.0
//!
//! Unknown legs contribute zero. [`score`] is pure and lock-free, so trial
//! evaluations may call it concurrently.

use crate::distance::MatrixPair;
use crate::models::{Task, TaskId};

/// Weight of a leg ending at a ghost stop.
pub const SPECULATIVE_WEIGHT: f64 = 0.2;

/// Weight of a leg on a perishable route.
pub const PERISHABLE_WEIGHT: f64 = 1.5;

/// Weight of an ordinary leg.
pub const BASE_WEIGHT: f64 = 1.0;

/// Multiplier applied to leg duration.
pub const DURATION_FACTOR: f64 = 0.5;

/// Weight of the leg arriving at `destination`.
pub fn stop_weight(destination: &Task, perishable: bool) -> f64 {
    if !destination.is_confirmed() {
        SPECULATIVE_WEIGHT
    } else if perishable {
        PERISHABLE_WEIGHT
    } else {
        BASE_WEIGHT
    }
}

/// Returns `true` if any stop of `route` is perishable.
pub fn route_is_perishable(route: &[Task]) -> bool {
    route.iter().any(Task::is_perishable)
}

/// Scores an ordered stop sequence. Routes with fewer than two stops cost 0.
///
/// # Examples
///
/// ```
/// use u_dispatch::distance::{Edge, MatrixPair};
/// use u_dispatch::evaluation::score;
/// use u_dispatch::models::{Location, Task};
///
/// let at = Location::new(0.0, 0.0);
/// let route = vec![
///     Task::depot("D", at),
///     Task::new("A", at, 1, 0, 100).unwrap(),
/// ];
/// let mut m = MatrixPair::new();
/// m.insert("D", "A", Edge::new(10.0, 4.0));
///
/// assert!((score(&route, &m, false) - 12.0).abs() < 1e-10);
/// assert!((score(&route, &m, true) - 18.0).abs() < 1e-10);
/// ```
pub fn score(route: &[Task], matrix: &MatrixPair, perishable: bool) -> f64 {
    route
        .windows(2)
        .map(|leg| leg_cost(&leg[0], &leg[1], matrix, perishable))
        .sum()
}

fn leg_cost(from: &Task, to: &Task, matrix: &MatrixPair, perishable: bool) -> f64 {
    let edge = matrix.lookup(from.id().as_str(), to.id().as_str());
    stop_weight(to, perishable) * (edge.distance + DURATION_FACTOR * edge.duration)
}

/// One scored leg.
#[derive(Debug, Clone, PartialEq)]
pub struct LegCost {
    /// Origin stop.
    pub from: TaskId,
    /// Destination stop.
    pub to: TaskId,
    /// Weight from the destination stop.
    pub weight: f64,
    /// Weighted cost of the leg.
    pub cost: f64,
    /// `false` when the matrix had no entry and zero was assumed.
    pub known: bool,
}

/// Per-leg view of a score, for tracing and diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostBreakdown {
    /// Scored legs in route order.
    pub legs: Vec<LegCost>,
    /// Sum of leg costs; equals [`score`] on the same input.
    pub total: f64,
}

impl CostBreakdown {
    /// Legs the matrix did not know.
    pub fn unknown_legs(&self) -> impl Iterator<Item = &LegCost> {
        self.legs.iter().filter(|leg| !leg.known)
    }

    /// Emits one `warn` event per unknown leg.
    pub fn trace_unknown(&self) {
        for leg in self.unknown_legs() {
            tracing::warn!(from = %leg.from, to = %leg.to, "no matrix entry, assuming zero cost");
        }
    }
}

/// Same computation as [`score`], keeping each leg.
pub fn score_breakdown(route: &[Task], matrix: &MatrixPair, perishable: bool) -> CostBreakdown {
    let legs: Vec<LegCost> = route
        .windows(2)
        .map(|leg| {
            let (from, to) = (&leg[0], &leg[1]);
            LegCost {
                from: from.id().clone(),
                to: to.id().clone(),
                weight: stop_weight(to, perishable),
                cost: leg_cost(from, to, matrix, perishable),
                known: matrix.get(from.id().as_str(), to.id().as_str()).is_some(),
            }
        })
        .collect();
    let total = legs.iter().map(|leg| leg.cost).sum();
    CostBreakdown { legs, total }
}
