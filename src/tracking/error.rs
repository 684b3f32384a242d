//! Error type shared by the tracking store and trajectory repository.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a [`TrackingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad field value, shape or length. Never retried.
    Validation,
    /// Operation invoked outside the acquired scope, or a second acquisition.
    Lifecycle,
    /// Missing container or trajectory dataset.
    NotFound,
    /// Failure in the underlying container file.
    Storage,
}

/// Errors produced by the tracking store.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("shape mismatch at {path}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        path: String,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("size mismatch at {path}: stored {stored} frames, requested {requested}")]
    SizeMismatch {
        path: String,
        stored: usize,
        requested: usize,
    },

    #[error("trajectory size is required to create dataset {path}")]
    MissingSize { path: String },

    #[error("frame span [{start}, {end}) exceeds {len} stored frames at {path}")]
    SpanOutOfRange {
        path: String,
        start: u32,
        end: u32,
        len: usize,
    },

    #[error("tracking store is not acquired")]
    NotAcquired,

    #[error("container {} is already acquired", .path.display())]
    AlreadyAcquired { path: PathBuf },

    #[error("container not found: {}", .0.display())]
    ContainerNotFound(PathBuf),

    #[error("trajectory dataset not found: {0}")]
    TrajectoryNotFound(String),

    #[error("corrupt container: {0}")]
    Corrupt(String),

    #[error("container error: {0}")]
    Container(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackingError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidField { .. }
            | Self::ShapeMismatch { .. }
            | Self::SizeMismatch { .. }
            | Self::MissingSize { .. }
            | Self::SpanOutOfRange { .. } => ErrorKind::Validation,
            Self::NotAcquired | Self::AlreadyAcquired { .. } => ErrorKind::Lifecycle,
            Self::ContainerNotFound(_) | Self::TrajectoryNotFound(_) => ErrorKind::NotFound,
            Self::Corrupt(_) | Self::Container(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackingError>;
