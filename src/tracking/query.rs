//! Filters for selecting flow queues from a store.

use crate::tracking::flow_queue::FlowQueue;

/// Conjunction of optional queue filters.
///
/// Unset filters match everything. Finished queues are skipped unless
/// `force_run_all` is set.
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub camera: Option<u32>,
    pub start_frame: Option<u32>,
    pub tag: Option<String>,
    pub force_run_all: bool,
}

impl QueueFilter {
    /// Filter matching every pending queue.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(mut self, camera: u32) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn start_frame(mut self, start_frame: u32) -> Self {
        self.start_frame = Some(start_frame);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Include queues already marked done.
    pub fn force_run_all(mut self, force: bool) -> Self {
        self.force_run_all = force;
        self
    }

    pub fn matches(&self, queue: &FlowQueue) -> bool {
        if self.camera.is_some_and(|camera| queue.camera() != camera) {
            return false;
        }
        if self
            .start_frame
            .is_some_and(|frame| queue.start_frame() != frame)
        {
            return false;
        }
        if let Some(tag) = &self.tag {
            if queue.tag() != *tag {
                return false;
            }
        }
        self.force_run_all || !queue.done()
    }

    /// Clone out the matching queues, preserving order.
    pub fn select(&self, queues: &[FlowQueue]) -> Vec<FlowQueue> {
        queues.iter().filter(|q| self.matches(q)).cloned().collect()
    }
}
