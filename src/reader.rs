//! SWMR reader for a container another process is still appending to.
//!
//! Opens with `READONLY | SWMR_READ`, refreshes dataset metadata on demand and
//! reads whole frames. Shapes are always snapshotted before a read so a
//! concurrent extent change cannot confuse the selection.

use std::path::{Path, PathBuf};

use hdf5::{Dataset, File, OpenMode};
use ndarray::{Array2, Array3};
use tracing::{debug, trace};

use crate::error::{AppResult, AppendError};
use crate::frame::FrameBuffer;

pub struct SwmrReader {
    // dataset is declared first so it is released before the file
    dataset: Dataset,
    _file: File,
    path: PathBuf,
}

impl SwmrReader {
    /// Open `path` read-only in SWMR-read mode and look up `dataset`.
    pub fn open(path: &Path, dataset: &str) -> AppResult<Self> {
        let reader_err = |source| AppendError::Reader {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open_as(path, OpenMode::ReadSWMR).map_err(reader_err)?;
        let dataset = file.dataset(dataset).map_err(reader_err)?;
        debug!(path = %path.display(), shape = ?dataset.shape(), "SWMR reader attached");
        Ok(Self {
            dataset,
            _file: file,
            path: path.to_path_buf(),
        })
    }

    fn reader_err(&self, source: hdf5::Error) -> AppendError {
        AppendError::Reader {
            path: self.path.clone(),
            source,
        }
    }

    /// Pull the writer's latest flushed metadata.
    pub fn refresh(&self) -> AppResult<()> {
        self.dataset
            .refresh()
            .map_err(|source| self.reader_err(source))?;
        trace!(shape = ?self.dataset.shape(), "refreshed");
        Ok(())
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dataset.shape()
    }

    /// Leading extent, i.e. frames visible to this reader.
    pub fn extent(&self) -> usize {
        self.dataset.shape().first().copied().unwrap_or(0)
    }

    pub fn chunk_shape(&self) -> Option<Vec<usize>> {
        self.dataset.chunk()
    }

    /// Whether the stored element type is native signed 32-bit.
    pub fn is_i32(&self) -> AppResult<bool> {
        let dtype = self
            .dataset
            .dtype()
            .map_err(|source| self.reader_err(source))?;
        Ok(dtype.is::<i32>())
    }

    fn trailing_dims(shape: &[usize]) -> AppResult<(usize, usize)> {
        match shape {
            [_, rows, cols] => Ok((*rows, *cols)),
            other => Err(AppendError::Verification(format!(
                "expected a 3-D dataset, found shape {:?}",
                other
            ))),
        }
    }

    /// Read frame `index` as a `rows x cols` block.
    pub fn read_frame(&self, index: usize) -> AppResult<Array2<i32>> {
        let shape = self.shape();
        let (rows, cols) = Self::trailing_dims(&shape)?;
        if index >= shape[0] {
            return Err(AppendError::Verification(format!(
                "frame {} is beyond visible extent {}",
                index, shape[0]
            )));
        }
        self.dataset
            .read_slice((index, 0..rows, 0..cols))
            .map_err(|source| self.reader_err(source))
    }

    /// Read the first `count` frames.
    pub fn read_frames(&self, count: usize) -> AppResult<Array3<i32>> {
        let shape = self.shape();
        let (rows, cols) = Self::trailing_dims(&shape)?;
        if count > shape[0] {
            return Err(AppendError::Verification(format!(
                "requested {} frames, only {} visible",
                count, shape[0]
            )));
        }
        if count == 0 {
            return Ok(Array3::zeros((0, rows, cols)));
        }
        self.dataset
            .read_slice((0..count, 0..rows, 0..cols))
            .map_err(|source| self.reader_err(source))
    }

    /// Read every visible frame.
    pub fn read_all(&self) -> AppResult<Array3<i32>> {
        self.read_frames(self.extent())
    }

    /// Check the first `count` frames against the drift rule: frame `i`
    /// holds `initial` incremented `i + 1` times.
    pub fn verify_first(&self, initial: &FrameBuffer, count: usize) -> AppResult<usize> {
        let frames = self.read_frames(count)?;
        for (index, stored) in frames.outer_iter().enumerate() {
            let expected = initial.after_increments(index + 1)?;
            let actual: Vec<i32> = stored.iter().copied().collect();
            if actual != expected {
                return Err(AppendError::Verification(format!(
                    "frame {}: expected {:?}, found {:?}",
                    index, expected, actual
                )));
            }
        }
        Ok(count)
    }

    /// Check every visible frame. Returns the number verified.
    pub fn verify_frames(&self, initial: &FrameBuffer) -> AppResult<usize> {
        self.verify_first(initial, self.extent())
    }
}
