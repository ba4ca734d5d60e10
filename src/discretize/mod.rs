//! Discretization of continuous forecasts and mapping onto meeting dates.

pub mod buckets;
pub mod calendar;

pub use buckets::{
    discretize, DiscretizationConfig, DiscretizedDistribution, MAX_ABS_MEAN_BPS, MAX_GRID_BUCKETS, PRUNE_FLOOR, STEP_BPS,
};
pub use calendar::{allocate_to_meetings, decay_weights, AllocationConfig, MeetingAllocation, MeetingProbability};
