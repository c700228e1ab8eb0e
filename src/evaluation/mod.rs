//! Route cost scoring and feasibility checking.

mod cost;
mod feasibility;

pub use cost::{
    route_is_perishable, score, score_breakdown, stop_weight, CostBreakdown, LegCost,
    BASE_WEIGHT, DURATION_FACTOR, PERISHABLE_WEIGHT, SPECULATIVE_WEIGHT,
};
pub use feasibility::{
    within_capacity, within_reserved_capacity, within_time_windows, Feasibility,
    FeasibilityCheck, FeasibilityFn,
};
