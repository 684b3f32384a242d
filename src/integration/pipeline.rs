//! TrackingPipeline for running a tracker over pending flow queues.

use thiserror::Error;
use tracing::info;

use crate::tracking::{QueueFilter, TrackingError, TrackingStore};

use super::{FlowSource, IntoTrajectory};

/// Failure while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError<E> {
    /// The flow source could not track a queue.
    #[error("flow source failed: {0}")]
    Source(E),
    /// The store rejected a trajectory or queue update.
    #[error(transparent)]
    Store(#[from] TrackingError),
}

/// Drives a `FlowSource` over the pending queues of a store.
///
/// Each queue is tracked, its trajectory written into the container, and the
/// queue upserted back with `done` set.
pub struct TrackingPipeline<S: FlowSource> {
    source: S,
    video_length: usize,
}

impl<S: FlowSource> TrackingPipeline<S> {
    /// Create a pipeline for a video of `video_length` frames.
    pub fn new(source: S, video_length: usize) -> Self {
        Self {
            source,
            video_length,
        }
    }

    /// Track every queue selected by `filter`.
    ///
    /// The store must be acquired. Progress is upserted after each queue, so
    /// queues finished before a failure stay marked done.
    ///
    /// # Returns
    /// The number of queues tracked.
    pub fn run(
        &mut self,
        store: &mut TrackingStore,
        filter: &QueueFilter,
    ) -> Result<usize, PipelineError<S::Error>> {
        let pending = store.get_flow_queues(filter)?;
        let total = pending.len();

        for mut queue in pending {
            let trajectory = self
                .source
                .track(&queue)
                .map_err(PipelineError::Source)?
                .into_trajectory();
            store.save_pixel_flow_trajectory(
                trajectory.view(),
                &queue,
                Some(self.video_length),
                false,
            )?;
            queue.set_done(true);
            store.append(queue)?;
        }

        info!(queues = total, "tracked pending flow queues");
        Ok(total)
    }

    /// Get a reference to the underlying flow source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a mutable reference to the underlying flow source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn video_length(&self) -> usize {
        self.video_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{FlowQueue, MarkerPositions};
    use ndarray::Array2;

    struct MockSource {
        calls: usize,
    }

    impl FlowSource for MockSource {
        type Trajectory = Array2<i64>;
        type Error = std::convert::Infallible;

        fn track(&mut self, queue: &FlowQueue) -> Result<Array2<i64>, Self::Error> {
            self.calls += 1;
            Ok(Array2::from_elem((queue.frame_count(), 2), 7))
        }
    }

    struct FailingSource;

    impl FlowSource for FailingSource {
        type Trajectory = Array2<i64>;
        type Error = String;

        fn track(&mut self, _queue: &FlowQueue) -> Result<Array2<i64>, Self::Error> {
            Err("lost the marker".to_string())
        }
    }

    /// Backend that reports plain point lists, drifting one pixel per frame.
    struct DriftingSource;

    impl FlowSource for DriftingSource {
        type Trajectory = Vec<[i64; 2]>;
        type Error = std::convert::Infallible;

        fn track(&mut self, queue: &FlowQueue) -> Result<Vec<[i64; 2]>, Self::Error> {
            let point = queue.point();
            Ok((0..queue.frame_count() as i64)
                .map(|i| [i64::from(point.x) + i, i64::from(point.y)])
                .collect())
        }
    }

    #[test]
    fn test_point_list_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TrackingStore::new(dir.path().join("t.db"), MarkerPositions::default());
        store.enter().unwrap();
        store.append(FlowQueue::new([10, 20], 2, 5, 0, 0, "a").unwrap()).unwrap();

        let mut pipeline = TrackingPipeline::new(DriftingSource, 6);
        assert_eq!(pipeline.run(&mut store, &QueueFilter::new()).unwrap(), 1);

        let queue = &store.queues().unwrap()[0];
        assert!(queue.done());
        let full = store.load_pixel_flow_trajectory(queue, true).unwrap();
        let expected: Array2<i64> =
            ndarray::array![[-1, -1], [-1, -1], [10, 20], [11, 20], [12, 20], [-1, -1]];
        assert_eq!(full, expected);
        store.exit().unwrap();
    }

    #[test]
    fn test_tracking_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TrackingStore::new(dir.path().join("t.db"), MarkerPositions::default());
        store.enter().unwrap();
        store.append(FlowQueue::new([1, 1], 0, 5, 0, 0, "a").unwrap()).unwrap();
        store.append(FlowQueue::new([2, 2], 2, 6, 1, 0, "b").unwrap()).unwrap();
        store
            .append(FlowQueue::new([3, 3], 0, 4, 1, 1, "c").unwrap().with_done(true))
            .unwrap();

        let mut pipeline = TrackingPipeline::new(MockSource { calls: 0 }, 10);
        let tracked = pipeline.run(&mut store, &QueueFilter::new()).unwrap();

        assert_eq!(tracked, 2);
        assert_eq!(pipeline.source().calls, 2);
        assert!(store.all_done().unwrap());

        let queue = &store.queues().unwrap()[1];
        let full = store.load_pixel_flow_trajectory(queue, true).unwrap();
        assert_eq!(full.dim(), (10, 2));
        assert_eq!(full[[1, 0]], -1);
        assert_eq!(full[[2, 0]], 7);
        assert_eq!(full[[6, 1]], -1);

        // Nothing left to do on a second pass.
        assert_eq!(pipeline.run(&mut store, &QueueFilter::new()).unwrap(), 0);
        store.exit().unwrap();
    }

    #[test]
    fn test_source_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TrackingStore::new(dir.path().join("t.db"), MarkerPositions::default());
        store.enter().unwrap();
        store.append(FlowQueue::new([1, 1], 0, 5, 0, 0, "a").unwrap()).unwrap();

        let mut pipeline = TrackingPipeline::new(FailingSource, 10);
        let err = pipeline.run(&mut store, &QueueFilter::new()).unwrap_err();

        assert!(matches!(err, PipelineError::Source(ref message) if message == "lost the marker"));
        assert!(!store.all_done().unwrap());
    }

    #[test]
    fn test_requires_acquired_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TrackingStore::new(dir.path().join("t.db"), MarkerPositions::default());

        let mut pipeline = TrackingPipeline::new(MockSource { calls: 0 }, 10);
        let err = pipeline.run(&mut store, &QueueFilter::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Store(TrackingError::NotAcquired)));
    }
}
