//! Dynamic insertion of new tasks into live routes.
//!
//! - [`InsertionSearch`]: cheapest (vehicle, position) over the whole fleet
//! - [`trial_route`]: hypothetical route with one extra stop

mod search;

pub use search::{trial_route, InsertionPlan, InsertionSearch};
