//! Constructive heuristics for building initial routes.
//!
//! - [`nearest_neighbor_routes`]: Greedy nearest-neighbor with capacity, O(n²V)

mod nearest_neighbor;

pub use nearest_neighbor::nearest_neighbor_routes;
