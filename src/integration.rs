//! Integration module for connecting external trackers with the store.
//!
//! This module provides the trait an optical-flow backend implements to
//! produce pixel trajectories, and a pipeline that drives it over the pending
//! flow queues of a [`TrackingStore`](crate::TrackingStore).

mod builder;
mod pipeline;
mod source;

pub use builder::FlowQueueBuilder;
pub use pipeline::{PipelineError, TrackingPipeline};
pub use source::{FlowSource, IntoTrajectory};
