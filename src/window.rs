//! Hyperslab descriptor for the next frame write.

use std::ops::Range;

use crate::frame::FrameShape;

/// Rectangular `offset + extent` selection inside the 3-D dataset.
///
/// The extent is always one frame deep; only the leading offset moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteWindow {
    offset: [usize; 3],
    extent: [usize; 3],
}

impl WriteWindow {
    /// Window covering frame `index`: offset `(index, 0, 0)`, extent
    /// `(1, rows, cols)`.
    pub fn at_frame(index: usize, shape: FrameShape) -> Self {
        Self {
            offset: [index, 0, 0],
            extent: [1, shape.rows, shape.cols],
        }
    }

    /// Move the window to another frame, keeping its extent.
    pub fn set_offset(&mut self, index: usize) {
        self.offset = [index, 0, 0];
    }

    pub fn offset(&self) -> [usize; 3] {
        self.offset
    }

    pub fn extent(&self) -> [usize; 3] {
        self.extent
    }

    /// Frame index the window targets.
    pub fn frame(&self) -> usize {
        self.offset[0]
    }

    /// Smallest leading extent the dataset needs for this window to be valid.
    pub fn required_extent(&self) -> usize {
        self.offset[0] + self.extent[0]
    }

    /// Selection in the form `hdf5::Container::write_slice` accepts.
    pub fn selection(&self) -> (Range<usize>, Range<usize>, Range<usize>) {
        let [i, j, k] = self.offset;
        let [di, dj, dk] = self.extent;
        (i..i + di, j..j + dj, k..k + dk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_tracks_iteration_index() {
        let mut window = WriteWindow::at_frame(0, FrameShape::default());
        assert_eq!(window.offset(), [0, 0, 0]);
        assert_eq!(window.extent(), [1, 3, 2]);

        window.set_offset(7);
        assert_eq!(window.offset(), [7, 0, 0]);
        assert_eq!(window.extent(), [1, 3, 2]);
        assert_eq!(window.required_extent(), 8);
    }

    #[test]
    fn selection_covers_exactly_one_frame() {
        let window = WriteWindow::at_frame(4, FrameShape::new(3, 2));
        assert_eq!(window.selection(), (4..5, 0..3, 0..2));
    }
}
