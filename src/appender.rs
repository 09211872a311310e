//! Frame Appender
//!
//! Creates the container and dataset, then repeats extend, write, flush and
//! sleep once per frame.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized → ContainerOpen → DatasetDeclared
//!                                      ↓
//!                    ┌→ Extending → Writing → Flushed ┐
//!                    └──────────── × frame_count ─────┘
//!                                      ↓
//!                                   Closed
//! ```
//!
//! Any error aborts the run. Handles are owned by the appender and are released
//! in the order dataset, root group, container, both on [`FrameAppender::close`]
//! and when the appender is dropped on an error path.
//!
//! # Example
//!
//! ```no_run
//! use frame_appender::{AppendConfig, FrameAppender, RunEvent};
//!
//! let config = AppendConfig::default();
//! let summary = FrameAppender::create(&config)?.run_with(|event| {
//!     if let RunEvent::Starting(index) = event {
//!         println!("{index}");
//!     }
//! })?;
//! assert_eq!(summary.frames_written, 50);
//! # Ok::<(), frame_appender::AppendError>(())
//! ```

use std::fmt;
use std::path::PathBuf;
use std::thread;

use hdf5::Group;
use tracing::{debug, info, instrument};

use crate::config::AppendConfig;
use crate::container::Container;
use crate::dataset::FrameDataset;
use crate::error::{AppResult, AppendError};
use crate::frame::FrameBuffer;
use crate::window::WriteWindow;

/// Where the appender is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppenderState {
    Uninitialized,
    ContainerOpen,
    DatasetDeclared,
    Extending,
    Writing,
    Flushed,
    Closed,
}

impl fmt::Display for AppenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppenderState::Uninitialized => "uninitialized",
            AppenderState::ContainerOpen => "container_open",
            AppenderState::DatasetDeclared => "dataset_declared",
            AppenderState::Extending => "extending",
            AppenderState::Writing => "writing",
            AppenderState::Flushed => "flushed",
            AppenderState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Outcome of one flushed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// Iteration index, also the frame's leading offset
    pub index: usize,
    /// Leading extent after the flush (`index + 1`)
    pub extent: usize,
    /// Values written for this frame
    pub values: Vec<i32>,
}

/// Progress notification from [`FrameAppender::run_with`].
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    /// Iteration `i` is about to extend the dataset
    Starting(usize),
    /// Iteration finished and was flushed
    Flushed(&'a FrameReport),
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub path: PathBuf,
    pub dataset: String,
    pub frames_written: usize,
    pub final_shape: Vec<usize>,
}

/// Sole writer of one frame dataset.
///
/// Field order is drop order: dataset, then root group, then container.
pub struct FrameAppender {
    dataset: FrameDataset,
    root: Group,
    container: Container,
    frame: FrameBuffer,
    window: WriteWindow,
    config: AppendConfig,
    state: AppenderState,
    frames_written: usize,
}

impl FrameAppender {
    /// Create the container, declare the dataset, and enable SWMR-write.
    ///
    /// On return the appender is in [`AppenderState::DatasetDeclared`] and
    /// readers may open the file in SWMR-read mode.
    #[instrument(skip(config), fields(path = %config.path.display()))]
    pub fn create(config: &AppendConfig) -> AppResult<Self> {
        let frame = FrameBuffer::new(config.frame_shape, config.initial_frame.clone())?;
        if frame.peak_after(config.frame_count).is_none() {
            return Err(AppendError::ValueOverflow(format!(
                "{} frames from {:?} leave the i32 range",
                config.frame_count,
                frame.values()
            )));
        }
        let mut state = AppenderState::Uninitialized;
        debug!(%state, "starting");

        let mut container = Container::create(&config.path, config.libver)?;
        state = AppenderState::ContainerOpen;
        debug!(%state, "transition");

        let root = container.root()?;
        let dataset =
            FrameDataset::define(&root, &config.dataset, config.frame_shape, config.chunk_shape)?;
        container.start_swmr_write()?;
        state = AppenderState::DatasetDeclared;
        debug!(%state, dataset = %config.dataset, "transition");

        Ok(Self {
            dataset,
            root,
            container,
            frame,
            window: WriteWindow::at_frame(0, config.frame_shape),
            config: config.clone(),
            state,
            frames_written: 0,
        })
    }

    pub fn state(&self) -> AppenderState {
        self.state
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Current buffer contents (already incremented for the last frame).
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn dataset(&self) -> &FrameDataset {
        &self.dataset
    }

    fn transition(&mut self, next: AppenderState) {
        debug!(from = %self.state, to = %next, frame = self.frames_written, "transition");
        self.state = next;
    }

    /// Append one frame: extend by one, move the window, increment the
    /// buffer, write it, flush.
    pub fn append_next(&mut self) -> AppResult<FrameReport> {
        let index = self.frames_written;

        self.transition(AppenderState::Extending);
        let extent = self.dataset.extend_leading(1)?;
        if extent != index + 1 {
            return Err(AppendError::ShapeMismatch(format!(
                "extent {} after frame {}, expected {}",
                extent,
                index,
                index + 1
            )));
        }

        self.window.set_offset(index);
        self.transition(AppenderState::Writing);
        self.frame.increment()?;
        self.dataset.write_frame(&self.window, &self.frame)?;

        self.container.flush(&format!("frame {index}"))?;
        self.transition(AppenderState::Flushed);
        self.frames_written += 1;

        info!(frame = index, extent, "frame flushed");

        Ok(FrameReport {
            index,
            extent,
            values: self.frame.values().to_vec(),
        })
    }

    /// Run every configured frame, then close.
    pub fn run(self) -> AppResult<RunSummary> {
        self.run_with(|_| {})
    }

    /// Like [`run`](Self::run), reporting each pass to `on_event`:
    /// [`RunEvent::Starting`] before the extend and [`RunEvent::Flushed`]
    /// before the pacing delay.
    pub fn run_with<F>(mut self, mut on_event: F) -> AppResult<RunSummary>
    where
        F: FnMut(RunEvent<'_>),
    {
        let delay = self.config.delay;
        for _ in 0..self.config.frame_count {
            on_event(RunEvent::Starting(self.frames_written));
            let report = self.append_next()?;
            on_event(RunEvent::Flushed(&report));
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
        self.close()
    }

    /// Release dataset, root group and container, in that order.
    pub fn close(self) -> AppResult<RunSummary> {
        let FrameAppender {
            dataset,
            root,
            container,
            config,
            frames_written,
            ..
        } = self;

        let final_shape = dataset.shape();
        drop(dataset);
        drop(root);
        container.close()?;
        info!(state = %AppenderState::Closed, frames_written, shape = ?final_shape, "run finished");

        Ok(RunSummary {
            path: config.path,
            dataset: config.dataset,
            frames_written,
            final_shape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn quick_config(dir: &TempDir, frames: usize) -> AppendConfig {
        AppendConfig {
            path: dir.path().join("frames.h5"),
            frame_count: frames,
            delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn create_leaves_dataset_declared() {
        let dir = TempDir::new().unwrap();
        let appender = FrameAppender::create(&quick_config(&dir, 1)).unwrap();
        assert_eq!(appender.state(), AppenderState::DatasetDeclared);
        assert_eq!(appender.dataset().extent(), 0);
        assert_eq!(appender.frames_written(), 0);
    }

    #[test]
    fn first_two_frames_follow_reference_example() {
        let dir = TempDir::new().unwrap();
        let mut appender = FrameAppender::create(&quick_config(&dir, 2)).unwrap();

        let first = appender.append_next().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.extent, 1);
        assert_eq!(first.values, vec![2, 3, 4, 5, 6, 7]);
        assert_eq!(appender.state(), AppenderState::Flushed);

        let second = appender.append_next().unwrap();
        assert_eq!(second.extent, 2);
        assert_eq!(second.values, vec![3, 4, 5, 6, 7, 8]);
        assert_eq!(appender.dataset().shape(), vec![2, 3, 2]);

        let summary = appender.close().unwrap();
        assert_eq!(summary.frames_written, 2);
        assert_eq!(summary.final_shape, vec![2, 3, 2]);
    }

    #[test]
    fn run_with_reports_every_frame_in_order() {
        let dir = TempDir::new().unwrap();
        let mut seen = Vec::new();
        let summary = FrameAppender::create(&quick_config(&dir, 5))
            .unwrap()
            .run_with(|event| {
                if let RunEvent::Flushed(report) = event {
                    seen.push((report.index, report.extent));
                }
            })
            .unwrap();

        assert_eq!(seen, vec![(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)]);
        assert_eq!(summary.final_shape, vec![5, 3, 2]);
    }

    #[test]
    fn start_of_each_pass_is_reported_before_its_flush() {
        let dir = TempDir::new().unwrap();
        let mut events = Vec::new();
        FrameAppender::create(&quick_config(&dir, 2))
            .unwrap()
            .run_with(|event| {
                events.push(match event {
                    RunEvent::Starting(index) => format!("start {index}"),
                    RunEvent::Flushed(report) => format!("flushed {}", report.index),
                })
            })
            .unwrap();

        assert_eq!(events, ["start 0", "flushed 0", "start 1", "flushed 1"]);
    }

    #[test]
    fn invalid_initial_frame_fails_before_touching_disk() {
        let dir = TempDir::new().unwrap();
        let config = AppendConfig {
            initial_frame: vec![1, 2, 3],
            ..quick_config(&dir, 1)
        };
        assert!(matches!(
            FrameAppender::create(&config),
            Err(AppendError::ShapeMismatch(_))
        ));
        assert!(!config.path.exists());
    }

    #[test]
    fn overflowing_run_fails_before_touching_disk() {
        let dir = TempDir::new().unwrap();
        let config = AppendConfig {
            initial_frame: vec![i32::MAX - 1, 0, 0, 0, 0, 0],
            ..quick_config(&dir, 2)
        };
        assert!(matches!(
            FrameAppender::create(&config),
            Err(AppendError::ValueOverflow(_))
        ));
        assert!(!config.path.exists());
    }

    #[test]
    fn dropped_appender_releases_the_file() {
        let dir = TempDir::new().unwrap();
        let config = quick_config(&dir, 1);
        {
            let mut appender = FrameAppender::create(&config).unwrap();
            appender.append_next().unwrap();
        }
        // A fresh writer can truncate the path once the first is gone.
        let appender = FrameAppender::create(&config).unwrap();
        assert_eq!(appender.dataset().extent(), 0);
    }

    #[traced_test]
    #[test]
    fn flushes_are_logged() {
        let dir = TempDir::new().unwrap();
        FrameAppender::create(&quick_config(&dir, 2))
            .unwrap()
            .run()
            .unwrap();
        assert!(logs_contain("frame flushed"));
        assert!(logs_contain("run finished"));
    }
}
