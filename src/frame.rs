//! In-memory frame buffer.
//!
//! A frame is a `rows x cols` block of `i32` held as a flat row-major vector.
//! The appender mutates one buffer in place for the whole run: every pass adds
//! one to each element and never resets it, so stored values drift upward by
//! one per frame.

use ndarray::{ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, AppendError};

/// Trailing dimensions of every frame (`rows x cols`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameShape {
    pub rows: usize,
    pub cols: usize,
}

impl FrameShape {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of elements in one frame.
    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FrameShape {
    fn default() -> Self {
        Self::new(3, 2)
    }
}

/// The mutable frame the appender writes on every iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    shape: FrameShape,
    values: Vec<i32>,
}

impl FrameBuffer {
    /// Build a buffer from its initial values.
    ///
    /// Fails with [`AppendError::ShapeMismatch`] when `values` does not hold
    /// exactly `shape.len()` elements.
    pub fn new(shape: FrameShape, values: Vec<i32>) -> AppResult<Self> {
        if values.len() != shape.len() {
            return Err(AppendError::ShapeMismatch(format!(
                "frame {}x{} needs {} values, got {}",
                shape.rows,
                shape.cols,
                shape.len(),
                values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Add one to every element.
    ///
    /// Fails with [`AppendError::ValueOverflow`] and leaves the buffer
    /// unchanged if any element is already `i32::MAX`.
    pub fn increment(&mut self) -> AppResult<()> {
        if self.values.contains(&i32::MAX) {
            return Err(AppendError::ValueOverflow(format!(
                "increment would exceed {} in {:?}",
                i32::MAX,
                self.values
            )));
        }
        for value in &mut self.values {
            *value += 1;
        }
        Ok(())
    }

    /// Values the buffer holds after `increments` calls to [`increment`](Self::increment).
    ///
    /// The frame written at iteration `i` is `after_increments(i + 1)`.
    pub fn after_increments(&self, increments: usize) -> AppResult<Vec<i32>> {
        let overflow = || {
            AppendError::ValueOverflow(format!(
                "{increments} increments of {:?} leave the i32 range",
                self.values
            ))
        };
        let delta = i32::try_from(increments).map_err(|_| overflow())?;
        self.values
            .iter()
            .map(|v| v.checked_add(delta).ok_or_else(overflow))
            .collect()
    }

    /// Largest element after `increments` more increments, or `None` on overflow.
    pub fn peak_after(&self, increments: usize) -> Option<i32> {
        let delta = i32::try_from(increments).ok()?;
        self.values.iter().max().and_then(|v| v.checked_add(delta))
    }

    /// Borrow the buffer as a `rows x cols` block.
    pub fn as_view(&self) -> AppResult<ArrayView2<'_, i32>> {
        Ok(ArrayView2::from_shape(
            (self.shape.rows, self.shape.cols),
            &self.values,
        )?)
    }

    /// Borrow the buffer as a single `1 x rows x cols` slab, the shape of a
    /// write window.
    pub fn as_slab(&self) -> AppResult<ArrayView3<'_, i32>> {
        Ok(ArrayView3::from_shape(
            (1, self.shape.rows, self.shape.cols),
            &self.values,
        )?)
    }
}
