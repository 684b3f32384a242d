//! Fixed-width binary row layout of the persisted queue table.
//!
//! Little-endian, 35 bytes per row:
//!
//! | bytes  | field                   |
//! |--------|-------------------------|
//! | 0..8   | point (2 x i32)         |
//! | 8..12  | start_frame (i32)       |
//! | 12..16 | end_frame (i32)         |
//! | 16..20 | camera (i32)            |
//! | 20..24 | z_index (i32)           |
//! | 24..34 | label (NUL-padded)      |
//! | 34     | done (0 or 1)           |

use crate::tracking::error::{Result, TrackingError};
use crate::tracking::flow_queue::{FlowQueue, MAX_LABEL_BYTES};

/// Size of one encoded row in bytes.
pub const ROW_SIZE: usize = 6 * 4 + MAX_LABEL_BYTES + 1;

const LABEL_OFFSET: usize = 24;
const DONE_OFFSET: usize = LABEL_OFFSET + MAX_LABEL_BYTES;

/// Encode a queue into its fixed-width row.
pub fn encode_row(queue: &FlowQueue) -> [u8; ROW_SIZE] {
    let mut row = [0u8; ROW_SIZE];
    let point = queue.point();
    let ints = [
        point.x,
        point.y,
        queue.start_frame() as i32,
        queue.end_frame() as i32,
        queue.camera() as i32,
        queue.z_index(),
    ];
    for (i, value) in ints.iter().enumerate() {
        row[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }

    let label = queue.label().as_bytes();
    row[LABEL_OFFSET..LABEL_OFFSET + label.len()].copy_from_slice(label);
    row[DONE_OFFSET] = u8::from(queue.done());
    row
}

/// Decode a fixed-width row back into a queue.
pub fn decode_row(row: &[u8]) -> Result<FlowQueue> {
    if row.len() != ROW_SIZE {
        return Err(TrackingError::Corrupt(format!(
            "queue row is {} bytes, expected {ROW_SIZE}",
            row.len()
        )));
    }

    let int_at = |i: usize| {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&row[i * 4..i * 4 + 4]);
        i32::from_le_bytes(buf)
    };
    let non_negative = |field: &'static str, value: i32| {
        u32::try_from(value)
            .map_err(|_| TrackingError::Corrupt(format!("negative {field} {value} in queue row")))
    };

    let point = [int_at(0), int_at(1)];
    let start_frame = non_negative("start_frame", int_at(2))?;
    let end_frame = non_negative("end_frame", int_at(3))?;
    let camera = non_negative("camera", int_at(4))?;
    let z_index = int_at(5);

    let raw_label = &row[LABEL_OFFSET..DONE_OFFSET];
    let label_len = raw_label
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(MAX_LABEL_BYTES);
    let label = std::str::from_utf8(&raw_label[..label_len])
        .map_err(|e| TrackingError::Corrupt(format!("label is not utf-8: {e}")))?;

    let done = match row[DONE_OFFSET] {
        0 => false,
        1 => true,
        other => {
            return Err(TrackingError::Corrupt(format!(
                "done flag byte {other} is not a boolean"
            )));
        }
    };

    Ok(FlowQueue::new(point, start_frame, end_frame, camera, z_index, label)?.with_done(done))
}
