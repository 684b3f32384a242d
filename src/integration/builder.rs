//! Builder for creating FlowQueue records.

use crate::tracking::{FlowQueue, Result};

/// Builder for creating `FlowQueue` records field by field.
#[derive(Debug, Clone, Default)]
pub struct FlowQueueBuilder {
    point: [i32; 2],
    start_frame: u32,
    end_frame: u32,
    camera: u32,
    z_index: i32,
    label: String,
    done: bool,
}

impl FlowQueueBuilder {
    /// Create a new flow queue builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pixel coordinate of the marker in the first frame.
    pub fn point(mut self, x: i32, y: i32) -> Self {
        self.point = [x, y];
        self
    }

    /// Set the frame span `[start_frame, end_frame)`.
    pub fn span(mut self, start_frame: u32, end_frame: u32) -> Self {
        self.start_frame = start_frame;
        self.end_frame = end_frame;
        self
    }

    pub fn camera(mut self, camera: u32) -> Self {
        self.camera = camera;
        self
    }

    /// Set the marker position index along the rod.
    pub fn z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    /// Build the final `FlowQueue`, validating every field.
    pub fn build(self) -> Result<FlowQueue> {
        Ok(FlowQueue::new(
            self.point,
            self.start_frame,
            self.end_frame,
            self.camera,
            self.z_index,
            self.label,
        )?
        .with_done(self.done))
    }
}
