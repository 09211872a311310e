//! The extensible, chunked frame dataset.
//!
//! Shape is `[N, rows, cols]` with every dimension unlimited and `N` starting
//! at zero. Only `N` is ever grown.

use hdf5::{Dataset, Group};
use tracing::debug;

use crate::config::ChunkShape;
use crate::error::{AppResult, AppendError};
use crate::frame::{FrameBuffer, FrameShape};
use crate::window::WriteWindow;

#[derive(Debug)]
pub struct FrameDataset {
    dataset: Dataset,
    name: String,
    frame_shape: FrameShape,
}

impl FrameDataset {
    /// Declare the `i32` dataset `name` under `parent`.
    ///
    /// Initial extent is `[0, rows, cols]`, maximum extent is unlimited in all
    /// three dimensions, and the chunk shape is fixed here for the dataset's
    /// lifetime.
    pub fn define(
        parent: &Group,
        name: &str,
        frame_shape: FrameShape,
        chunk: ChunkShape,
    ) -> AppResult<Self> {
        if frame_shape.is_empty() {
            return Err(AppendError::Schema(format!(
                "frame shape {}x{} has a zero dimension",
                frame_shape.rows, frame_shape.cols
            )));
        }
        let [depth, rows, cols] = chunk.dims();
        if depth == 0 || rows == 0 || cols == 0 {
            return Err(AppendError::Schema(format!(
                "chunk shape {:?} has a zero dimension",
                chunk.dims()
            )));
        }

        let dataset = parent
            .new_dataset::<i32>()
            .chunk((depth, rows, cols))
            .shape((0.., frame_shape.rows.., frame_shape.cols..))
            .create(name)
            .map_err(|source| AppendError::SchemaRejected {
                name: name.to_string(),
                source,
            })?;

        debug!(dataset = name, chunk = ?chunk.dims(), "dataset declared");

        Ok(Self {
            dataset,
            name: name.to_string(),
            frame_shape,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_shape(&self) -> FrameShape {
        self.frame_shape
    }

    /// Current shape as reported by the library.
    pub fn shape(&self) -> Vec<usize> {
        self.dataset.shape()
    }

    /// Number of frames currently allocated (leading dimension).
    pub fn extent(&self) -> usize {
        self.dataset.shape().first().copied().unwrap_or(0)
    }

    pub fn chunk_shape(&self) -> Option<Vec<usize>> {
        self.dataset.chunk()
    }

    /// Grow the leading dimension by `frames` and return the new extent.
    pub fn extend_leading(&self, frames: usize) -> AppResult<usize> {
        let current = self.extent();
        let next = current + frames;
        self.dataset
            .resize((next, self.frame_shape.rows, self.frame_shape.cols))
            .map_err(|source| AppendError::Write {
                frame: current,
                source,
            })?;
        Ok(next)
    }

    /// Write `frame` into the region selected by `window`.
    ///
    /// The window must be one frame deep, match the frame's trailing shape,
    /// and lie inside the current extent.
    pub fn write_frame(&self, window: &WriteWindow, frame: &FrameBuffer) -> AppResult<()> {
        let expected = [1, self.frame_shape.rows, self.frame_shape.cols];
        if window.extent() != expected || frame.shape() != self.frame_shape {
            return Err(AppendError::ShapeMismatch(format!(
                "window {:?} / frame {}x{} vs dataset frame {:?}",
                window.extent(),
                frame.shape().rows,
                frame.shape().cols,
                expected
            )));
        }
        let extent = self.extent();
        if window.required_extent() > extent {
            return Err(AppendError::ShapeMismatch(format!(
                "window at frame {} is outside extent {}",
                window.frame(),
                extent
            )));
        }

        self.dataset
            .write_slice(frame.as_slab()?, window.selection())
            .map_err(|source| AppendError::Write {
                frame: window.frame(),
                source,
            })
    }
}
