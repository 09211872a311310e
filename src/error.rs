//! Error types for the frame appender.
//!
//! `AppendError` groups failures by the phase of the run that produced them:
//!
//! - **`Initialization`**: the container could not be created, truncated, or
//!   switched into SWMR-write mode (permission denied, another writer holds the
//!   writer lock, unsupported flag combination).
//! - **`Schema` / `SchemaRejected`**: the dataset declaration was refused by the
//!   library or is internally inconsistent (bad chunk shape, bad extents).
//! - **`Write` / `ShapeMismatch`**: growing the extent or writing the hyperslab
//!   failed, or the frame buffer does not fit the write window.
//! - **`ValueOverflow`**: the next increment would leave the `i32` range.
//! - **`Flush`**: publishing the frame to durable storage failed.
//! - **`Config` / `Configuration`**: layered configuration could not be loaded
//!   or failed validation.
//! - **`Reader` / `Verification`**: a SWMR reader could not follow the container
//!   or found frames that break the drift rule.
//!
//! None of these are recovered locally. Every variant is fatal and travels out
//! of the run with `?`.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the appender error type.
pub type AppResult<T> = std::result::Result<T, AppendError>;

/// Underlying cause of an initialization failure: the HDF5 library or the
/// writer lock file.
pub type InitSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum AppendError {
    #[error("Failed to initialize container {}: {source}", .path.display())]
    Initialization {
        path: PathBuf,
        #[source]
        source: InitSource,
    },

    #[error("Dataset schema error: {0}")]
    Schema(String),

    #[error("Dataset '{name}' rejected by storage library: {source}")]
    SchemaRejected {
        name: String,
        #[source]
        source: hdf5::Error,
    },

    #[error("Write failed at frame {frame}: {source}")]
    Write {
        frame: usize,
        #[source]
        source: hdf5::Error,
    },

    #[error("Frame buffer does not fit write window: {0}")]
    ShapeMismatch(String),

    #[error("Frame value overflow: {0}")]
    ValueOverflow(String),

    #[error("Flush failed ({context}): {source}")]
    Flush {
        context: String,
        #[source]
        source: hdf5::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Reader failed on {}: {source}", .path.display())]
    Reader {
        path: PathBuf,
        #[source]
        source: hdf5::Error,
    },

    #[error("Frame verification failed: {0}")]
    Verification(String),
}

impl From<figment::Error> for AppendError {
    fn from(value: figment::Error) -> Self {
        AppendError::Config(Box::new(value))
    }
}

impl From<ndarray::ShapeError> for AppendError {
    fn from(value: ndarray::ShapeError) -> Self {
        AppendError::ShapeMismatch(value.to_string())
    }
}

impl AppendError {
    /// Every failure aborts the run; there is no retry path.
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// Short name of the phase that failed, for structured logs.
    pub fn phase(&self) -> &'static str {
        match self {
            AppendError::Initialization { .. } => "initialization",
            AppendError::Schema(_) | AppendError::SchemaRejected { .. } => "schema",
            AppendError::Write { .. }
            | AppendError::ShapeMismatch(_)
            | AppendError::ValueOverflow(_) => "write",
            AppendError::Flush { .. } => "flush",
            AppendError::Config(_) | AppendError::Configuration(_) => "config",
            AppendError::Reader { .. } | AppendError::Verification(_) => "reader",
        }
    }
}
