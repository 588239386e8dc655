use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while turning a source picture into encoded thumbnail bytes.
///
/// None of these reach a callback: the worker resolves every variant to a
/// placeholder icon and logs it.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Source file is missing or cannot be read
    #[error("Source unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// No decoder is available for the source format
    #[error("Unsupported format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Decoding the source image failed
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Encoding the rendered image failed
    #[error("Failed to encode image: {message}")]
    Encode { message: String },

    /// The blocking render task panicked or was cancelled
    #[error("Render task failed: {0}")]
    TaskFailed(String),
}

impl RenderError {
    /// Build a `SourceUnavailable` error from an I/O failure on `path`.
    pub fn unavailable(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        RenderError::SourceUnavailable {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

/// Errors raised by a cache engine's storage layer.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Disk layer I/O failure
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted entry could not be decoded
    #[error("Corrupt cache entry {file}: {reason}")]
    CorruptEntry { file: PathBuf, reason: String },
}

/// Errors loading or validating cache configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The properties file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The properties file is not valid JSON for the expected schema
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A region is configured with impossible values
    #[error("Invalid configuration for region '{region}': {message}")]
    Invalid { region: String, message: String },
}

/// Errors starting the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Pool settings rejected by [`PoolConfig::validate`](crate::config::PoolConfig::validate)
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// The worker runtime could not be built
    #[error("Failed to start worker runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
