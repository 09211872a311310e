//! Layered configuration using Figment
//!
//! Configuration is merged from, lowest precedence first:
//! 1. Built-in defaults (the reference run: `piltest_11416.nxs`, 50 frames, 1 s apart)
//! 2. `frame-appender.toml` in the working directory, or an explicit file
//! 3. Environment variables prefixed with `FRAME_APPENDER_`
//! 4. Command-line overrides
//!
//! Nested keys in the environment use a double underscore, for example
//! `FRAME_APPENDER_FRAME_SHAPE__ROWS=4`.
//!
//! # Example
//! ```no_run
//! use frame_appender::config::{AppendConfig, ConfigOverrides};
//!
//! let config = AppendConfig::load_with(None, ConfigOverrides::default())?;
//! println!("Writing {} frames to {}", config.frame_count, config.path.display());
//! # Ok::<(), frame_appender::error::AppendError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppResult, AppendError};
use crate::frame::FrameShape;
use crate::logging::OutputFormat;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "frame-appender.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "FRAME_APPENDER_";

/// Container path of the reference run.
pub const DEFAULT_CONTAINER_PATH: &str = "piltest_11416.nxs";

/// Dataset name of the reference run.
pub const DEFAULT_DATASET: &str = "data";

/// Chunk extent of the dataset, `[frames, rows, cols]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkShape(pub [usize; 3]);

impl Default for ChunkShape {
    fn default() -> Self {
        Self([1, 3, 2])
    }
}

impl ChunkShape {
    pub fn dims(&self) -> [usize; 3] {
        self.0
    }
}

/// Lower library-version bound written into the file's superblock.
///
/// SWMR needs at least the 1.10 format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibVersion {
    #[default]
    V110,
    Latest,
}

/// Parameters of one appender run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppendConfig {
    /// Container file, truncated on start
    pub path: PathBuf,
    /// Dataset name under the root group
    pub dataset: String,
    /// Number of frames to append
    pub frame_count: usize,
    /// Trailing dimensions of each frame
    pub frame_shape: FrameShape,
    /// Chunk extent, fixed at dataset creation
    pub chunk_shape: ChunkShape,
    /// Buffer contents before the first increment
    pub initial_frame: Vec<i32>,
    /// Pause after each flushed frame
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    /// File-format version bound
    pub libver: LibVersion,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log line format (pretty, compact, json)
    pub log_format: OutputFormat,
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CONTAINER_PATH),
            dataset: DEFAULT_DATASET.to_string(),
            frame_count: 50,
            frame_shape: FrameShape::default(),
            chunk_shape: ChunkShape::default(),
            initial_frame: vec![1, 2, 3, 4, 5, 6],
            delay: Duration::from_secs(1),
            libver: LibVersion::default(),
            log_level: "info".to_string(),
            log_format: OutputFormat::default(),
        }
    }
}

/// Values supplied on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<usize>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    pub delay: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<OutputFormat>,
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl AppendConfig {
    /// Defaults, config file and environment, without CLI overrides.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let file = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(AppendConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::load_with(Some(path.as_ref()), ConfigOverrides::default())
    }

    /// Load all layers, apply CLI overrides on top, then validate.
    pub fn load_with(config_file: Option<&Path>, overrides: ConfigOverrides) -> AppResult<Self> {
        let config: AppendConfig = Self::figment(config_file)
            .merge(Serialized::defaults(overrides))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(AppendError::Configuration(
                "Container path must not be empty".to_string(),
            ));
        }

        if self.dataset.trim().is_empty() {
            return Err(AppendError::Configuration(
                "Dataset name must not be empty".to_string(),
            ));
        }

        if self.frame_shape.is_empty() {
            return Err(AppendError::Configuration(format!(
                "Invalid frame_shape {}x{}. Both dimensions must be non-zero",
                self.frame_shape.rows, self.frame_shape.cols
            )));
        }

        let [depth, rows, cols] = self.chunk_shape.dims();
        if depth == 0 || rows == 0 || cols == 0 {
            return Err(AppendError::Configuration(format!(
                "Invalid chunk_shape {:?}. All dimensions must be non-zero",
                self.chunk_shape.dims()
            )));
        }
        if rows > self.frame_shape.rows || cols > self.frame_shape.cols {
            return Err(AppendError::Configuration(format!(
                "chunk_shape {:?} exceeds frame_shape {}x{}",
                self.chunk_shape.dims(),
                self.frame_shape.rows,
                self.frame_shape.cols
            )));
        }

        if self.initial_frame.len() != self.frame_shape.len() {
            return Err(AppendError::Configuration(format!(
                "initial_frame has {} values, frame_shape {}x{} needs {}",
                self.initial_frame.len(),
                self.frame_shape.rows,
                self.frame_shape.cols,
                self.frame_shape.len()
            )));
        }

        let peak = self.initial_frame.iter().max().and_then(|max| {
            i32::try_from(self.frame_count)
                .ok()
                .and_then(|count| max.checked_add(count))
        });
        if !self.initial_frame.is_empty() && peak.is_none() {
            return Err(AppendError::Configuration(format!(
                "initial_frame plus {} increments exceeds {}",
                self.frame_count,
                i32::MAX
            )));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(AppendError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}
