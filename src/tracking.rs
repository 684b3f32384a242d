mod container;
mod error;
mod flow_queue;
mod marker_positions;
mod query;
mod record_schema;
mod store_state;
mod tracking_data;
mod trajectory;

pub use error::{ErrorKind, Result, TrackingError};
pub use flow_queue::{FlowQueue, MAX_LABEL_BYTES};
pub use marker_positions::MarkerPositions;
pub use query::QueueFilter;
pub use record_schema::{ROW_SIZE, decode_row, encode_row};
pub use store_state::StoreState;
pub use tracking_data::{StoreConfig, TrackingSession, TrackingStore};
pub use trajectory::{SENTINEL, TrajectoryRepository};
