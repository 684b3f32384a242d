//! Flow-queue store for marker tracking across synchronized camera views.
//!
//! A [`TrackingStore`] keeps the work-list of [`FlowQueue`] records and the
//! per-marker pixel trajectories in one container file.

pub mod integration;
pub mod tracking;

pub use integration::{
    FlowQueueBuilder, FlowSource, IntoTrajectory, PipelineError, TrackingPipeline,
};
pub use tracking::{
    ErrorKind, FlowQueue, MarkerPositions, QueueFilter, Result, SENTINEL, StoreConfig, StoreState,
    TrackingError, TrackingSession, TrackingStore, TrajectoryRepository,
};
