pub mod stride;
pub mod tracker;

pub use stride::{CadenceState, StrideEstimate, StrideEstimator, MAX_STRIDE_CM, MIN_STRIDE_CM};
pub use tracker::{
    DeadReckoningTracker, StepRecord, TrackedPath, TrackedPoint, TrackerObserver, TrackerState,
};
