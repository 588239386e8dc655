//! Storage engines behind a cache region.
//!
//! Eviction and persistence live here, not in the region: a region only
//! builds keys and decides staleness. Two engines are provided:
//!
//! - [`MemoryEngine`]: LRU bounded by entry count and total payload bytes
//! - [`TieredEngine`]: a [`MemoryEngine`] in front of a [`DiskStore`]

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use super::artifact::Artifact;
use super::disk::DiskStore;
use super::key::CacheKey;
use crate::error::CacheError;

/// Default memory capacity: 64MB of encoded artifacts.
pub const DEFAULT_MEMORY_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Default maximum number of in-memory entries.
pub const DEFAULT_MEMORY_MAX_ENTRIES: usize = 2_000;

/// Point-in-time occupancy of an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub memory_entries: usize,
    pub memory_bytes: usize,
    pub memory_capacity: usize,
    /// `None` when the engine has no disk layer
    pub disk_entries: Option<usize>,
}

impl EngineStats {
    /// Number of entries reachable through the engine.
    pub fn entries(&self) -> usize {
        self.disk_entries
            .map_or(self.memory_entries, |disk| disk.max(self.memory_entries))
    }
}

/// Storage backend of a cache region.
///
/// Implementations must be safe to share between workers; every method takes
/// `&self`.
#[async_trait]
pub trait CacheEngine: Send + Sync {
    /// Look up `key`, marking it recently used.
    async fn get(&self, key: &CacheKey) -> Result<Option<Artifact>, CacheError>;

    /// Store `artifact` under `key`, replacing any previous value.
    async fn put(&self, key: CacheKey, artifact: Artifact) -> Result<(), CacheError>;

    /// Remove `key` from every layer. Returns `true` if anything was removed.
    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Drop every entry from every layer.
    async fn clear(&self) -> Result<(), CacheError>;

    async fn stats(&self) -> EngineStats;
}

// =============================================================================
// Memory Engine
// =============================================================================

struct MemoryState {
    entries: LruCache<CacheKey, Artifact>,
    current_size: usize,
}

/// LRU engine with size-based eviction.
///
/// Tracks the total payload size and evicts least-recently-used entries when
/// either the byte capacity or the entry bound is exceeded.
pub struct MemoryEngine {
    state: Mutex<MemoryState>,
    max_size: usize,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_MAX_BYTES, DEFAULT_MEMORY_MAX_ENTRIES)
    }

    /// Create an engine bounded by `max_size` payload bytes and `max_entries`
    /// entries. An entry bound of zero is treated as one.
    pub fn with_capacity(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(MemoryState {
                entries: LruCache::new(max_entries),
                current_size: 0,
            }),
            max_size,
        }
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().await.entries.contains(key)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Total payload bytes currently held.
    pub async fn size(&self) -> usize {
        self.state.lock().await.current_size
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    async fn get_entry(&self, key: &CacheKey) -> Option<Artifact> {
        self.state.lock().await.entries.get(key).cloned()
    }

    async fn put_entry(&self, key: CacheKey, artifact: Artifact) {
        let mut state = self.state.lock().await;
        let added = artifact.len();

        // push() reports both a replaced value and an entry-bound eviction
        if let Some((_, displaced)) = state.entries.push(key, artifact) {
            state.current_size = state.current_size.saturating_sub(displaced.len());
        }
        state.current_size += added;

        while state.current_size > self.max_size {
            match state.entries.pop_lru() {
                Some((_, evicted)) => {
                    state.current_size = state.current_size.saturating_sub(evicted.len());
                }
                None => break,
            }
        }
    }

    async fn remove_entry(&self, key: &CacheKey) -> Option<Artifact> {
        let mut state = self.state.lock().await;
        let removed = state.entries.pop(key)?;
        state.current_size = state.current_size.saturating_sub(removed.len());
        Some(removed)
    }

    async fn clear_entries(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.current_size = 0;
    }

    async fn memory_stats(&self) -> EngineStats {
        let state = self.state.lock().await;
        EngineStats {
            memory_entries: state.entries.len(),
            memory_bytes: state.current_size,
            memory_capacity: self.max_size,
            disk_entries: None,
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheEngine for MemoryEngine {
    async fn get(&self, key: &CacheKey) -> Result<Option<Artifact>, CacheError> {
        Ok(self.get_entry(key).await)
    }

    async fn put(&self, key: CacheKey, artifact: Artifact) -> Result<(), CacheError> {
        self.put_entry(key, artifact).await;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.remove_entry(key).await.is_some())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.clear_entries().await;
        Ok(())
    }

    async fn stats(&self) -> EngineStats {
        self.memory_stats().await
    }
}

// =============================================================================
// Tiered Engine
// =============================================================================

/// Memory layer backed by a persistent disk layer.
///
/// Reads try memory first, then disk; disk hits are promoted into memory.
/// Writes go to both layers. A failed disk write still leaves the entry in
/// memory and is reported to the caller.
pub struct TieredEngine {
    memory: MemoryEngine,
    disk: DiskStore,
}

impl TieredEngine {
    pub fn new(memory: MemoryEngine, disk: DiskStore) -> Self {
        Self { memory, disk }
    }

    pub fn disk(&self) -> &DiskStore {
        &self.disk
    }
}

#[async_trait]
impl CacheEngine for TieredEngine {
    async fn get(&self, key: &CacheKey) -> Result<Option<Artifact>, CacheError> {
        if let Some(artifact) = self.memory.get_entry(key).await {
            return Ok(Some(artifact));
        }

        match self.disk.read(key).await? {
            Some(artifact) => {
                self.memory.put_entry(key.clone(), artifact.clone()).await;
                Ok(Some(artifact))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: CacheKey, artifact: Artifact) -> Result<(), CacheError> {
        self.memory.put_entry(key.clone(), artifact.clone()).await;
        self.disk.write(&key, &artifact).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let in_memory = self.memory.remove_entry(key).await.is_some();
        let on_disk = self.disk.remove(key).await?;
        Ok(in_memory || on_disk)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.memory.clear_entries().await;
        self.disk.clear().await?;
        Ok(())
    }

    async fn stats(&self) -> EngineStats {
        let mut stats = self.memory.memory_stats().await;
        stats.disk_entries = self.disk.len().await.ok();
        stats
    }
}
