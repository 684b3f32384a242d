//! Trait for optical-flow tracking backends.

use ndarray::Array2;

use crate::tracking::FlowQueue;

/// Trait for trackers that follow a marker point through video frames.
///
/// Implement this trait to connect any optical-flow backend to the store.
///
/// # Example
///
/// ```
/// use markertrack_rs::{FlowQueue, FlowSource};
/// use ndarray::Array2;
///
/// struct StillMarker;
///
/// impl FlowSource for StillMarker {
///     type Trajectory = Array2<i64>;
///     type Error = std::convert::Infallible;
///
///     fn track(&mut self, queue: &FlowQueue) -> Result<Array2<i64>, Self::Error> {
///         let point = queue.point();
///         Ok(Array2::from_shape_fn((queue.frame_count(), 2), |(_, j)| {
///             i64::from(point[j])
///         }))
///     }
/// }
/// ```
pub trait FlowSource {
    /// Point list produced by the backend.
    type Trajectory: IntoTrajectory;

    /// Error type for tracking failures.
    type Error;

    /// Track `queue.point()` over the queue's frame span.
    ///
    /// # Returns
    /// One `(x, y)` point per frame in `[start_frame, end_frame)`.
    fn track(&mut self, queue: &FlowQueue) -> Result<Self::Trajectory, Self::Error>;
}

/// Helper trait for converting backend-specific point lists to trajectories.
pub trait IntoTrajectory {
    /// Convert into an `(N, 2)` trajectory array.
    fn into_trajectory(self) -> Array2<i64>;
}

impl IntoTrajectory for Array2<i64> {
    fn into_trajectory(self) -> Array2<i64> {
        self
    }
}

impl IntoTrajectory for Vec<[i64; 2]> {
    fn into_trajectory(self) -> Array2<i64> {
        Array2::from_shape_fn((self.len(), 2), |(i, j)| self[i][j])
    }
}
