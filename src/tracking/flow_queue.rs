//! Flow queue: one marker segment to be tracked over a span of video frames.

use std::ops::Range;

use nalgebra::Point2;

use crate::tracking::error::{Result, TrackingError};

/// Maximum encoded length of a marker label.
pub const MAX_LABEL_BYTES: usize = 10;

/// One marker-segment tracking task.
///
/// `point`, `camera`, `z_index` and `label` identify the queue and cannot be
/// changed once constructed; only the frame span and `done` flag move.
///
/// ```compile_fail
/// use markertrack_rs::FlowQueue;
///
/// let mut queue = FlowQueue::new([4, 2], 0, 10, 0, 1, "m0").unwrap();
/// queue.camera = 3;
/// ```
#[derive(Debug, Clone)]
pub struct FlowQueue {
    point: Point2<i32>,
    start_frame: u32,
    end_frame: u32,
    camera: u32,
    z_index: i32,
    label: String,
    done: bool,
}

impl FlowQueue {
    /// Create a pending queue covering frames `[start_frame, end_frame)`.
    pub fn new(
        point: impl Into<Point2<i32>>,
        start_frame: u32,
        end_frame: u32,
        camera: u32,
        z_index: i32,
        label: impl Into<String>,
    ) -> Result<Self> {
        let label = label.into();
        check_row_int("start_frame", start_frame)?;
        check_row_int("end_frame", end_frame)?;
        check_row_int("camera", camera)?;
        if start_frame > end_frame {
            return Err(TrackingError::invalid(
                "start_frame",
                format!("start frame {start_frame} is after end frame {end_frame}"),
            ));
        }
        validate_label(&label)?;

        Ok(Self {
            point: point.into(),
            start_frame,
            end_frame,
            camera,
            z_index,
            label,
            done: false,
        })
    }

    /// Same queue with the `done` flag set.
    pub fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    pub fn point(&self) -> Point2<i32> {
        self.point
    }

    pub fn camera(&self) -> u32 {
        self.camera
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn start_frame(&self) -> u32 {
        self.start_frame
    }

    pub fn end_frame(&self) -> u32 {
        self.end_frame
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn set_start_frame(&mut self, frame: u32) -> Result<()> {
        check_row_int("start_frame", frame)?;
        self.start_frame = frame;
        Ok(())
    }

    pub fn set_end_frame(&mut self, frame: u32) -> Result<()> {
        check_row_int("end_frame", frame)?;
        self.end_frame = frame;
        Ok(())
    }

    pub fn set_done(&mut self, done: bool) {
        self.done = done;
    }

    /// Number of frames in the span, zero if the span is inverted.
    pub fn frame_count(&self) -> usize {
        self.end_frame.saturating_sub(self.start_frame) as usize
    }

    /// Frame span as a row range into a full-length trajectory.
    pub fn frame_range(&self) -> Range<usize> {
        self.start_frame as usize..self.end_frame as usize
    }

    /// Whether `frame` lies in the closed span `[start_frame, end_frame]`.
    pub fn covers(&self, frame: u32) -> bool {
        self.start_frame <= frame && frame <= self.end_frame
    }

    /// Camera-independent grouping key, `z{z_index}-{label}`.
    pub fn tag(&self) -> String {
        format!("z{}-{}", self.z_index, self.label)
    }

    /// Container group holding this queue's trajectories.
    ///
    /// The point is not part of the group: queues sharing camera, z-index and
    /// label share trajectory storage.
    pub fn trajectory_group(&self) -> String {
        format!(
            "/trajectory/camera_{}/z_{}/label_{}",
            self.camera, self.z_index, self.label
        )
    }

    /// Dataset path for the trajectory stored under `prefix`.
    pub fn storage_path(&self, prefix: &str) -> String {
        format!("{}/{}", self.trajectory_group(), prefix)
    }

    /// Full field comparison, `done` included.
    pub fn same_state(&self, other: &FlowQueue) -> bool {
        self == other && self.done == other.done
    }
}

/// Queues are the same logical task regardless of progress: `done` is ignored.
impl PartialEq for FlowQueue {
    fn eq(&self, other: &Self) -> bool {
        self.point == other.point
            && self.start_frame == other.start_frame
            && self.end_frame == other.end_frame
            && self.camera == other.camera
            && self.z_index == other.z_index
            && self.label == other.label
    }
}

impl Eq for FlowQueue {}

/// Frames and camera ids are stored as i32 in the queue table.
fn check_row_int(field: &'static str, value: u32) -> Result<()> {
    if i32::try_from(value).is_err() {
        return Err(TrackingError::invalid(
            field,
            format!("{value} exceeds {}", i32::MAX),
        ));
    }
    Ok(())
}

fn validate_label(label: &str) -> Result<()> {
    if label.len() > MAX_LABEL_BYTES {
        return Err(TrackingError::invalid(
            "label",
            format!(
                "{:?} is {} bytes, at most {MAX_LABEL_BYTES} allowed",
                label,
                label.len()
            ),
        ));
    }
    if label.contains('\0') {
        return Err(TrackingError::invalid("label", "contains a NUL byte"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::error::ErrorKind;

    #[test]
    fn test_fields_read_back() {
        let queue = FlowQueue::new([120, 340], 5, 90, 2, -3, "tip").unwrap();

        assert_eq!(queue.point(), Point2::new(120, 340));
        assert_eq!(queue.start_frame(), 5);
        assert_eq!(queue.end_frame(), 90);
        assert_eq!(queue.camera(), 2);
        assert_eq!(queue.z_index(), -3);
        assert_eq!(queue.label(), "tip");
        assert!(!queue.done());
        assert_eq!(queue.frame_count(), 85);
    }

    #[test]
    fn test_rejects_long_label() {
        let err = FlowQueue::new([0, 0], 0, 1, 0, 0, "abcdefghijk").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(matches!(err, TrackingError::InvalidField { field: "label", .. }));

        // Exactly ten bytes fits the fixed-width column.
        assert!(FlowQueue::new([0, 0], 0, 1, 0, 0, "abcdefghij").is_ok());
    }

    #[test]
    fn test_rejects_nul_in_label() {
        assert!(FlowQueue::new([0, 0], 0, 1, 0, 0, "a\0b").is_err());
    }

    #[test]
    fn test_rejects_inverted_span() {
        let err = FlowQueue::new([0, 0], 20, 10, 0, 0, "m").unwrap_err();
        assert!(matches!(
            err,
            TrackingError::InvalidField {
                field: "start_frame",
                ..
            }
        ));
    }

    #[test]
    fn test_mutable_fields() {
        let mut queue = FlowQueue::new([1, 1], 0, 10, 0, 0, "m0").unwrap();
        queue.set_start_frame(3).unwrap();
        queue.set_end_frame(8).unwrap();
        queue.set_done(true);

        assert_eq!(queue.frame_range(), 3..8);
        assert!(queue.done());
    }

    #[test]
    fn test_rejects_values_beyond_row_range() {
        let err = FlowQueue::new([0, 0], 0, 3_000_000_000, 0, 0, "m").unwrap_err();
        assert!(matches!(err, TrackingError::InvalidField { field: "end_frame", .. }));

        let err = FlowQueue::new([0, 0], 0, 10, 3_000_000_000, 0, "m").unwrap_err();
        assert!(matches!(err, TrackingError::InvalidField { field: "camera", .. }));

        let max = i32::MAX as u32;
        let mut queue = FlowQueue::new([0, 0], 0, max, max, 0, "m").unwrap();
        assert!(queue.set_end_frame(max + 1).is_err());
        assert!(queue.set_start_frame(max + 1).is_err());
        assert_eq!(queue.frame_range(), 0..max as usize);
    }

    #[test]
    fn test_equality_ignores_done() {
        let a = FlowQueue::new([1, 1], 0, 10, 0, 0, "m0").unwrap();
        let b = a.clone().with_done(true);

        assert_eq!(a, b);
        assert!(!a.same_state(&b));
        assert!(a.same_state(&a.clone()));

        let moved = FlowQueue::new([1, 2], 0, 10, 0, 0, "m0").unwrap();
        assert_ne!(a, moved);
    }

    #[test]
    fn test_tag_and_paths() {
        let queue = FlowQueue::new([7, 9], 0, 10, 1, 4, "left").unwrap();

        assert_eq!(queue.tag(), "z4-left");
        assert_eq!(queue.trajectory_group(), "/trajectory/camera_1/z_4/label_left");
        assert_eq!(
            queue.storage_path("xy"),
            "/trajectory/camera_1/z_4/label_left/xy"
        );
    }

    #[test]
    fn test_storage_path_ignores_point() {
        let a = FlowQueue::new([1, 1], 0, 10, 0, 0, "m0").unwrap();
        let b = FlowQueue::new([5, 5], 0, 10, 0, 0, "m0").unwrap();
        assert_eq!(a.storage_path("xy"), b.storage_path("xy"));
    }

    #[test]
    fn test_covers_closed_span() {
        let queue = FlowQueue::new([0, 0], 10, 50, 0, 0, "m").unwrap();
        assert!(queue.covers(10));
        assert!(queue.covers(50));
        assert!(!queue.covers(9));
        assert!(!queue.covers(51));
    }
}
