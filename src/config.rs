//! Configuration management for the thumbnailer.
//!
//! Two layers of configuration exist:
//!
//! - Command-line arguments via clap, with `THUMB_`-prefixed environment
//!   variable fallbacks, covering the worker pool and the CLI itself.
//! - [`CacheProperties`], an externally supplied JSON document describing the
//!   two cache regions. The runtime-computed disk directory is merged into it
//!   before the regions are opened.
//!
//! # Environment Variables
//!
//! - `THUMB_CACHE_DIR` - Directory for the disk cache layers
//! - `THUMB_CACHE_PROPERTIES` - Path to the cache properties JSON file
//! - `THUMB_WORKERS` - Number of render workers (default: 5)
//! - `THUMB_POLL_MS` - Worker polling interval in milliseconds (default: 200)
//! - `THUMB_SIZE` - Thumbnail box edge in pixels (default: 350)
//! - `THUMB_JPEG_QUALITY` - JPEG quality of rendered thumbnails (default: 80)
//!
//! # Properties File
//!
//! ```json
//! {
//!   "highres":   { "memory_max_bytes": 209715200, "memory_max_entries": 20, "disk_enabled": false },
//!   "thumbnail": { "memory_max_bytes": 67108864, "memory_max_entries": 2000, "disk_enabled": true }
//! }
//! ```
//!
//! Missing fields take their defaults. A missing, unreadable or invalid file
//! degrades to [`CacheProperties::in_memory`] with a warning.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::render::{MontageLayout, ScaleQuality, DEFAULT_JPEG_QUALITY};
use crate::target::Size;

// =============================================================================
// Default Values
// =============================================================================

/// Default number of render workers kept alive by the supervisor.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Default worker polling interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default supervisor check interval in milliseconds.
pub const DEFAULT_SUPERVISOR_INTERVAL_MS: u64 = 1_000;

/// Default time shutdown waits for in-flight renders, in milliseconds.
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 5_000;

/// Default thumbnail box edge in pixels.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 350;

/// Region name of raw source bytes.
pub const HIGHRES_REGION: &str = "highres";

/// Region name of rendered thumbnails.
pub const THUMBNAIL_REGION: &str = "thumbnail";

// =============================================================================
// Cache Properties
// =============================================================================

/// Tuning of one cache region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionProperties {
    /// Maximum payload bytes held in memory
    pub memory_max_bytes: usize,

    /// Maximum number of in-memory entries
    pub memory_max_entries: usize,

    /// Whether entries are persisted to disk
    pub disk_enabled: bool,

    /// Directory of the disk layer; filled from the runtime cache directory
    /// when absent
    pub disk_path: Option<PathBuf>,
}

impl RegionProperties {
    fn highres_default() -> Self {
        Self {
            memory_max_bytes: 200 * 1024 * 1024,
            memory_max_entries: 20,
            disk_enabled: false,
            disk_path: None,
        }
    }

    fn thumbnail_default() -> Self {
        Self {
            memory_max_bytes: 64 * 1024 * 1024,
            memory_max_entries: 2_000,
            disk_enabled: true,
            disk_path: None,
        }
    }

    fn validate(&self, region: &str) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::Invalid {
            region: region.to_string(),
            message: message.to_string(),
        };
        if self.memory_max_bytes == 0 {
            return Err(invalid("memory_max_bytes must be greater than 0"));
        }
        if self.memory_max_entries == 0 {
            return Err(invalid("memory_max_entries must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for RegionProperties {
    fn default() -> Self {
        Self::thumbnail_default()
    }
}

/// Configuration of both cache regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheProperties {
    pub highres: RegionProperties,
    pub thumbnail: RegionProperties,
}

impl Default for CacheProperties {
    fn default() -> Self {
        Self {
            highres: RegionProperties::highres_default(),
            thumbnail: RegionProperties::thumbnail_default(),
        }
    }
}

impl CacheProperties {
    /// Default sizing with every disk layer switched off.
    pub fn in_memory() -> Self {
        let mut props = Self::default();
        props.highres.disk_enabled = false;
        props.thumbnail.disk_enabled = false;
        props
    }

    /// Parse and validate a properties file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let props: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        props.validate()?;
        Ok(props)
    }

    /// Load the cache configuration.
    ///
    /// With no `path` the built-in defaults are used. If `path` is given but
    /// cannot be loaded, the in-memory-only configuration is used and a
    /// warning is logged. `disk_dir` is then merged in.
    pub fn load(path: Option<&Path>, disk_dir: Option<&Path>) -> Self {
        let props = match path {
            None => Self::default(),
            Some(path) => match Self::from_file(path) {
                Ok(props) => {
                    info!("Loaded cache properties from {}", path.display());
                    props
                }
                Err(e) => {
                    warn!("{}; falling back to in-memory caches", e);
                    Self::in_memory()
                }
            },
        };

        match disk_dir {
            Some(dir) => props.with_disk_dir(dir),
            None => props,
        }
    }

    /// Point every disk-enabled region without an explicit path at a
    /// subdirectory of `dir` named after the region.
    pub fn with_disk_dir(mut self, dir: &Path) -> Self {
        for (name, region) in [
            (HIGHRES_REGION, &mut self.highres),
            (THUMBNAIL_REGION, &mut self.thumbnail),
        ] {
            if region.disk_enabled && region.disk_path.is_none() {
                region.disk_path = Some(dir.join(name));
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.highres.validate(HIGHRES_REGION)?;
        self.thumbnail.validate(THUMBNAIL_REGION)?;
        Ok(())
    }
}

// =============================================================================
// Pool Configuration
// =============================================================================

/// Runtime settings of the worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers the supervisor keeps alive
    pub worker_count: usize,

    /// Idle sleep between queue polls
    pub poll_interval: Duration,

    /// Interval between supervisor checks
    pub supervisor_interval: Duration,

    /// How long shutdown waits for workers to finish their current request
    pub drain_timeout: Duration,

    /// Geometry of group montages
    pub montage: MontageLayout,

    /// JPEG quality of rendered thumbnails
    pub jpeg_quality: u8,

    /// Resampling filter choice
    pub scale_quality: ScaleQuality,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            supervisor_interval: Duration::from_millis(DEFAULT_SUPERVISOR_INTERVAL_MS),
            drain_timeout: Duration::from_millis(DEFAULT_DRAIN_TIMEOUT_MS),
            montage: MontageLayout::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            scale_quality: ScaleQuality::Quality,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".to_string());
        }
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be greater than 0".to_string());
        }
        if self.supervisor_interval.is_zero() {
            return Err("supervisor_interval must be greater than 0".to_string());
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Thumbnailer - render and cache picture thumbnails in the background.
#[derive(Parser, Debug, Clone)]
#[command(name = "thumbnailer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render thumbnails for pictures and directories of pictures
    Render(RenderConfig),

    /// Remove every persisted cache entry
    Clear(CacheArgs),

    /// Print the effective cache configuration
    Check(CacheArgs),
}

/// Cache location arguments shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    /// Directory for the disk cache layers.
    #[arg(long, env = "THUMB_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Cache properties JSON file.
    #[arg(long, env = "THUMB_CACHE_PROPERTIES")]
    pub cache_properties: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CacheArgs {
    /// Cache directory: the explicit one, or `thumbnailer` under the system
    /// temporary directory.
    pub fn resolve_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("thumbnailer"))
    }

    pub fn cache_properties(&self) -> CacheProperties {
        CacheProperties::load(
            self.cache_properties.as_deref(),
            Some(&self.resolve_cache_dir()),
        )
    }
}

/// Arguments of the `render` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RenderConfig {
    /// Picture files or directories to render.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output directory for the rendered thumbnails.
    #[arg(short, long, default_value = "thumbnails")]
    pub out: PathBuf,

    /// Thumbnail box edge in pixels.
    #[arg(long, default_value_t = DEFAULT_THUMBNAIL_SIZE, env = "THUMB_SIZE")]
    pub size: u32,

    /// Rotation applied to every picture, in degrees.
    #[arg(long, default_value_t = 0.0)]
    pub rotation: f64,

    /// Also render one folder montage of all pictures.
    #[arg(long, default_value_t = false)]
    pub group: bool,

    /// Number of render workers.
    #[arg(long, default_value_t = DEFAULT_WORKER_COUNT, env = "THUMB_WORKERS")]
    pub workers: usize,

    /// Worker polling interval in milliseconds.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS, env = "THUMB_POLL_MS")]
    pub poll_ms: u64,

    /// JPEG quality of rendered thumbnails (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "THUMB_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Use the fast (lower quality) resampling filter.
    #[arg(long, default_value_t = false)]
    pub fast_scale: bool,

    #[command(flatten)]
    pub cache: CacheArgs,
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.size == 0 {
            return Err("size must be greater than 0".to_string());
        }
        self.pool_config().validate()
    }

    pub fn thumbnail_size(&self) -> Size {
        Size::square(self.size)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            worker_count: self.workers,
            poll_interval: Duration::from_millis(self.poll_ms),
            jpeg_quality: self.jpeg_quality,
            scale_quality: if self.fast_scale {
                ScaleQuality::Fast
            } else {
                ScaleQuality::Quality
            },
            ..PoolConfig::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
