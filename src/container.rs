//! HDF5 container lifecycle: create with truncation, switch to SWMR-write,
//! flush, close.
//!
//! The file handle is a scoped resource. Dropping a [`Container`] releases the
//! file, so error exits never leak it.
//!
//! HDF5 drops its own file lock once SWMR-write starts, so a writer also holds
//! an exclusive lock on `<path>.lock` for as long as the container is open.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use hdf5::{File, Group};
use tracing::{debug, info};

use crate::config::LibVersion;
use crate::error::{AppResult, AppendError};

/// The single file that owns the frame dataset.
#[derive(Debug)]
pub struct Container {
    // Declared before `lock` so the HDF5 handle is released first.
    file: File,
    lock: std::fs::File,
    path: PathBuf,
    swmr: bool,
}

/// Sidecar lock path for a container, `<path>.lock`.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn acquire_writer_lock(path: &Path) -> AppResult<std::fs::File> {
    let lock_path = lock_path(path);
    let init_error = |source: std::io::Error| AppendError::Initialization {
        path: path.to_path_buf(),
        source: Box::new(source),
    };
    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(init_error)?;
    lock.try_lock_exclusive().map_err(|e| {
        init_error(std::io::Error::new(
            e.kind(),
            format!("another writer holds {}: {e}", lock_path.display()),
        ))
    })?;
    debug!(lock = %lock_path.display(), "writer lock acquired");
    Ok(lock)
}

impl Container {
    /// Create `path`, truncating any previous content.
    ///
    /// The file is written with at least the 1.10 format so SWMR can be
    /// enabled once the dataset exists. Another writer holding the same path,
    /// in this process or any other, makes this fail with
    /// [`AppendError::Initialization`] before the file is touched.
    pub fn create(path: &Path, libver: LibVersion) -> AppResult<Self> {
        let lock = acquire_writer_lock(path)?;
        let file = File::with_options()
            .with_fapl(|fapl| match libver {
                LibVersion::V110 => fapl.libver_v110(),
                LibVersion::Latest => fapl.libver_latest(),
            })
            .create(path)
            .map_err(|source| AppendError::Initialization {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;

        info!(path = %path.display(), ?libver, "container created (truncated)");

        Ok(Self {
            file,
            lock,
            path: path.to_path_buf(),
            swmr: false,
        })
    }

    /// Open the root group.
    pub fn root(&self) -> AppResult<Group> {
        self.file
            .group("/")
            .map_err(|source| AppendError::Initialization {
                path: self.path.clone(),
                source: Box::new(source),
            })
    }

    /// Switch the open file into single-writer/multiple-reader mode.
    ///
    /// All objects must already exist: HDF5 does not allow creating new ones
    /// once SWMR-write is active.
    pub fn start_swmr_write(&mut self) -> AppResult<()> {
        if self.swmr {
            return Ok(());
        }
        self.file
            .start_swmr()
            .map_err(|source| AppendError::Initialization {
                path: self.path.clone(),
                source: Box::new(source),
            })?;
        self.swmr = true;
        debug!(path = %self.path.display(), "SWMR write mode enabled");
        Ok(())
    }

    pub fn is_swmr(&self) -> bool {
        self.swmr
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Publish pending writes. After this returns, SWMR readers that refresh
    /// see the new extent and data.
    pub fn flush(&self, context: &str) -> AppResult<()> {
        self.file.flush().map_err(|source| AppendError::Flush {
            context: context.to_string(),
            source,
        })
    }

    /// Final flush, then release the file handle.
    pub fn close(self) -> AppResult<()> {
        self.flush("teardown")?;
        let Container {
            file, lock, path, ..
        } = self;
        drop(file);
        drop(lock);
        info!(path = %path.display(), "container closed");
        Ok(())
    }
}
