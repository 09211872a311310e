//! # frame_appender
//!
//! Appends incrementing `i32` frames to an extensible, chunked HDF5 dataset
//! while the file is in single-writer/multiple-reader (SWMR) mode, flushing
//! after every frame so concurrent readers can follow along.
//!
//! Chunk storage, extent bookkeeping and SWMR consistency are provided by
//! libhdf5 through the `hdf5` crate; this library only drives the call
//! sequence.
//!
//! ## Crate Structure
//!
//! - **`appender`**: `FrameAppender`, the extend → write → flush → sleep loop.
//! - **`container`**: file creation with truncation, SWMR switch, flush, close.
//! - **`dataset`**: the `[N, rows, cols]` chunked dataset and its growth.
//! - **`frame`** / **`window`**: the in-memory frame and the hyperslab it
//!   is written to.
//! - **`reader`**: `SwmrReader` for following or verifying a container.
//! - **`config`**: layered Figment configuration.
//! - **`logging`**: tracing subscriber setup.
//! - **`error`**: `AppendError`.

pub mod appender;
pub mod config;
pub mod container;
pub mod dataset;
pub mod error;
pub mod frame;
pub mod logging;
pub mod reader;
pub mod window;

pub use appender::{AppenderState, FrameAppender, FrameReport, RunEvent, RunSummary};
pub use config::{AppendConfig, ConfigOverrides};
pub use error::{AppResult, AppendError};
pub use reader::SwmrReader;
