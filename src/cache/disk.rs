//! Persistent layer of a tiered cache region.
//!
//! Each entry is one file named by the hex SHA-256 of its key, so arbitrary
//! key strings (paths, group keys) map to safe, fixed-length file names.
//! Writes go to a temporary file first and are renamed into place, so a
//! reader never observes a half-written entry.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use super::artifact::Artifact;
use super::key::CacheKey;
use crate::error::CacheError;

/// File extension of persisted entries.
const ENTRY_EXTENSION: &str = "tna";

/// File extension of in-progress writes.
const TEMP_EXTENSION: &str = "tmp";

/// Directory-backed artifact store.
pub struct DiskStore {
    dir: PathBuf,
    temp_counter: AtomicU64,
}

impl DiskStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!("Opened disk cache at {}", dir.display());
        Ok(Self {
            dir,
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the entry for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION))
    }

    /// Read the entry for `key`. A missing file is `Ok(None)`.
    pub async fn read(&self, key: &CacheKey) -> Result<Option<Artifact>, CacheError> {
        let path = self.entry_path(key);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Artifact::from_disk_bytes(Bytes::from(data))
            .map(Some)
            .map_err(|reason| CacheError::CorruptEntry { file: path, reason })
    }

    /// Persist `artifact` under `key`, replacing any previous entry.
    pub async fn write(&self, key: &CacheKey, artifact: &Artifact) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let temp = path.with_extension(format!(
            "{}.{}.{}",
            std::process::id(),
            self.temp_counter.fetch_add(1, Ordering::Relaxed),
            TEMP_EXTENSION
        ));

        if let Err(e) = fs::write(&temp, artifact.to_disk_bytes()).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete the entry for `key`. Returns `true` if a file was removed.
    pub async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every entry (and stray temporary file). Returns the number of
    /// entries removed.
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(ENTRY_EXTENSION) => {
                    fs::remove_file(&path).await?;
                    removed += 1;
                }
                Some(TEMP_EXTENSION) => {
                    fs::remove_file(&path).await?;
                }
                _ => {}
            }
        }
        Ok(removed)
    }

    /// Number of persisted entries.
    pub async fn len(&self) -> Result<usize, CacheError> {
        let mut count = 0;
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.path().extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}
