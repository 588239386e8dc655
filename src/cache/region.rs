//! A named cache region: key → artifact with staleness checks.
//!
//! The region decides *whether* a cached artifact can be served; the engine
//! behind it decides *where* artifacts live and when they are evicted.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::artifact::Artifact;
use super::disk::DiskStore;
use super::engine::{CacheEngine, EngineStats, MemoryEngine, TieredEngine};
use super::key::CacheKey;
use crate::config::RegionProperties;
use crate::error::{CacheError, RenderError};

#[derive(Default)]
struct RegionCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    read_errors: AtomicU64,
    write_errors: AtomicU64,
}

/// Snapshot of a region's counters and occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionStats {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    /// Lookups that found an entry older than its source
    pub stale: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub engine: EngineStats,
}

impl fmt::Display for RegionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Region: {}", self.name)?;
        writeln!(
            f,
            "  Lookups: {} hit(s), {} miss(es), {} stale",
            self.hits, self.misses, self.stale
        )?;
        writeln!(
            f,
            "  Errors: {} read, {} write",
            self.read_errors, self.write_errors
        )?;
        write!(
            f,
            "  Memory: {} entries, {} / {} bytes",
            self.engine.memory_entries, self.engine.memory_bytes, self.engine.memory_capacity
        )?;
        if let Some(disk) = self.engine.disk_entries {
            write!(f, "\n  Disk: {} entries", disk)?;
        }
        Ok(())
    }
}

/// Independently configured store mapping [`CacheKey`] to [`Artifact`].
pub struct CacheRegion {
    name: String,
    engine: Box<dyn CacheEngine>,
    counters: RegionCounters,
}

impl CacheRegion {
    /// Region backed by an arbitrary engine.
    pub fn new(name: impl Into<String>, engine: Box<dyn CacheEngine>) -> Self {
        Self {
            name: name.into(),
            engine,
            counters: RegionCounters::default(),
        }
    }

    /// Memory-only region with default sizing.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(name, Box::new(MemoryEngine::new()))
    }

    /// Open a region from its properties.
    ///
    /// If the disk layer is requested but cannot be opened, the region runs
    /// memory-only and a warning is logged.
    pub async fn open(name: &str, props: &RegionProperties) -> Self {
        let memory = MemoryEngine::with_capacity(props.memory_max_bytes, props.memory_max_entries);

        if !props.disk_enabled {
            debug!("Region '{}' is memory-only", name);
            return Self::new(name, Box::new(memory));
        }

        let Some(dir) = props.disk_path.as_ref() else {
            warn!(
                "Region '{}' has disk enabled but no disk path; running memory-only",
                name
            );
            return Self::new(name, Box::new(memory));
        };

        match DiskStore::open(dir).await {
            Ok(disk) => {
                info!("Region '{}' persists to {}", name, dir.display());
                Self::new(name, Box::new(TieredEngine::new(memory, disk)))
            }
            Err(e) => {
                warn!(
                    "Region '{}' could not open disk cache at {}: {}; running memory-only",
                    name,
                    dir.display(),
                    e
                );
                Self::new(name, Box::new(memory))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the artifact for `key`, rendering it if missing or stale.
    ///
    /// A cached artifact is served (with `cache_hit = true`) when its
    /// recorded source time is at least `source_mtime`. Otherwise `render` is
    /// awaited, its bytes are stamped with `source_mtime` and stored,
    /// replacing any previous entry.
    ///
    /// Concurrent calls for the same key are not coalesced: each may render,
    /// and the last store wins. A failed lookup is treated as a miss; a
    /// failed store still returns the fresh artifact.
    pub async fn get_or_create<F, Fut>(
        &self,
        key: CacheKey,
        source_mtime: SystemTime,
        render: F,
    ) -> Result<Artifact, RenderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, RenderError>>,
    {
        match self.engine.get(&key).await {
            Ok(Some(cached)) if !cached.is_stale(source_mtime) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(cached.with_cache_hit(true));
            }
            Ok(Some(_)) => {
                self.counters.stale.fetch_add(1, Ordering::Relaxed);
                debug!("Region '{}': stale entry {}", self.name, key);
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Region '{}': lookup of {} failed, rendering afresh: {}",
                    self.name, key, e
                );
            }
        }

        let artifact = Artifact::new(render().await?, source_mtime);

        if let Err(e) = self.engine.put(key.clone(), artifact.clone()).await {
            self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Region '{}': failed to store {}: {}", self.name, key, e);
        }

        Ok(artifact)
    }

    /// Cached artifact for `key`, regardless of staleness.
    pub async fn peek(&self, key: &CacheKey) -> Result<Option<Artifact>, CacheError> {
        self.engine.get(key).await
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        matches!(self.engine.get(key).await, Ok(Some(_)))
    }

    /// Explicitly remove `key`. Returns `true` if an entry existed.
    pub async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.engine.remove(key).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.engine.clear().await
    }

    /// Number of entries reachable through the region.
    pub async fn len(&self) -> usize {
        self.engine.stats().await.entries()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Payload bytes held in memory.
    pub async fn size(&self) -> usize {
        self.engine.stats().await.memory_bytes
    }

    pub async fn stats(&self) -> RegionStats {
        RegionStats {
            name: self.name.clone(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
            read_errors: self.counters.read_errors.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
            engine: self.engine.stats().await,
        }
    }
}
