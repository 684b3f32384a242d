//! Pixel-trajectory datasets, one per (camera, z-index, label).
//!
//! Each dataset is an `(N, 2)` integer array with one `(x, y)` row per video
//! frame. Frames without a sample hold [`SENTINEL`].

use std::ops::Range;

use ndarray::{Array2, ArrayView2, s};
use rusqlite::Connection;

use crate::tracking::container::{self, Dataset};
use crate::tracking::error::{Result, TrackingError};
use crate::tracking::flow_queue::FlowQueue;

/// Marks a frame with no known sample.
pub const SENTINEL: i64 = -1;

/// Reads and writes trajectories inside an acquired container.
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryRepository<'a> {
    conn: &'a Connection,
    unit: &'a str,
}

impl<'a> TrajectoryRepository<'a> {
    pub(crate) fn new(conn: &'a Connection, unit: &'a str) -> Self {
        Self { conn, unit }
    }

    /// Whether a dataset exists at the queue's storage path.
    pub fn exists(&self, queue: &FlowQueue, prefix: &str) -> Result<bool> {
        container::has_dataset(self.conn, &queue.storage_path(prefix))
    }

    /// Unit-of-measure attribute of the stored dataset, if any.
    pub fn unit(&self, queue: &FlowQueue, prefix: &str) -> Result<Option<String>> {
        Ok(container::read_dataset(self.conn, &queue.storage_path(prefix))?
            .map(|dataset| dataset.unit))
    }

    /// Write a trajectory for `queue`.
    ///
    /// A missing dataset is created with `size` rows of [`SENTINEL`], so
    /// `size` is required the first time a path is written. When given for an
    /// existing dataset it must equal the stored length.
    ///
    /// With `full_trajectory` the data replaces the whole dataset and must
    /// match its shape. Otherwise it must have one row per frame of the
    /// queue's span and is written into `[start_frame, end_frame)`.
    pub fn save(
        &self,
        data: ArrayView2<'_, i64>,
        queue: &FlowQueue,
        size: Option<usize>,
        prefix: &str,
        full_trajectory: bool,
    ) -> Result<()> {
        let path = queue.storage_path(prefix);
        let mut dataset = match container::read_dataset(self.conn, &path)? {
            Some(dataset) => {
                let stored = dataset.data.nrows();
                if let Some(requested) = size {
                    if requested != stored {
                        return Err(TrackingError::SizeMismatch {
                            path,
                            stored,
                            requested,
                        });
                    }
                }
                dataset
            }
            None => {
                let size = size.ok_or_else(|| TrackingError::MissingSize { path: path.clone() })?;
                Dataset {
                    data: Array2::from_elem((size, 2), SENTINEL),
                    unit: self.unit.to_string(),
                }
            }
        };

        if full_trajectory {
            if data.dim() != dataset.data.dim() {
                return Err(TrackingError::ShapeMismatch {
                    path,
                    expected: dataset.data.dim(),
                    got: data.dim(),
                });
            }
            dataset.data.assign(&data);
        } else {
            let rows = span_rows(queue, &path, dataset.data.nrows())?;
            let expected = (rows.len(), 2);
            if data.dim() != expected {
                return Err(TrackingError::ShapeMismatch {
                    path,
                    expected,
                    got: data.dim(),
                });
            }
            dataset.data.slice_mut(s![rows, ..]).assign(&data);
        }

        container::write_dataset(self.conn, &path, &dataset)
    }

    /// Read the full trajectory, or only the rows of the queue's span.
    pub fn load(
        &self,
        queue: &FlowQueue,
        prefix: &str,
        full_trajectory: bool,
    ) -> Result<Array2<i64>> {
        let path = queue.storage_path(prefix);
        let dataset = container::read_dataset(self.conn, &path)?
            .ok_or_else(|| TrackingError::TrajectoryNotFound(path.clone()))?;

        if full_trajectory {
            return Ok(dataset.data);
        }
        let rows = span_rows(queue, &path, dataset.data.nrows())?;
        Ok(dataset.data.slice(s![rows, ..]).to_owned())
    }

    /// Drop the dataset so the path can be re-created with another length.
    pub fn delete(&self, queue: &FlowQueue, prefix: &str) -> Result<bool> {
        container::delete_dataset(self.conn, &queue.storage_path(prefix))
    }

    /// Invalidate the part of `queue`'s span on one side of `frame`.
    ///
    /// Forward trims clear `[frame, end_frame)` and end the span at `frame`;
    /// reverse trims clear `[start_frame, frame)` and start the span there.
    /// Returns the queue with its adjusted span.
    pub fn trim(
        &self,
        queue: &FlowQueue,
        frame: u32,
        prefix: &str,
        reverse: bool,
    ) -> Result<FlowQueue> {
        if !queue.covers(frame) {
            return Err(TrackingError::invalid(
                "frame",
                format!(
                    "{frame} is outside [{}, {}]",
                    queue.start_frame(),
                    queue.end_frame()
                ),
            ));
        }

        let relative = (frame - queue.start_frame()) as usize;
        let mut trajectory = self.load(queue, prefix, false)?;
        if reverse {
            trajectory.slice_mut(s![..relative, ..]).fill(SENTINEL);
        } else {
            trajectory.slice_mut(s![relative.., ..]).fill(SENTINEL);
        }
        self.save(trajectory.view(), queue, None, prefix, false)?;

        let mut trimmed = queue.clone();
        if reverse {
            trimmed.set_start_frame(frame)?;
        } else {
            trimmed.set_end_frame(frame)?;
        }
        Ok(trimmed)
    }
}

fn span_rows(queue: &FlowQueue, path: &str, len: usize) -> Result<Range<usize>> {
    let rows = queue.frame_range();
    if rows.start > rows.end || rows.end > len {
        return Err(TrackingError::SpanOutOfRange {
            path: path.to_string(),
            start: queue.start_frame(),
            end: queue.end_frame(),
            len,
        });
    }
    Ok(rows)
}
