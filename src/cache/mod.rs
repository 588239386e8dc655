//! Artifact caching.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               TieredCache               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │   highres    │  │    thumbnail    │  │
//! │  │  (raw file   │  │  (rendered and  │  │
//! │  │   bytes)     │  │   montages)     │  │
//! │  └──────┬───────┘  └────────┬────────┘  │
//! └─────────┼───────────────────┼───────────┘
//!           ▼                   ▼
//! ┌─────────────────────────────────────────┐
//! │     CacheEngine (memory LRU + disk)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TieredCache`]: the two regions used by the workers
//! - [`CacheRegion`]: key → [`Artifact`] with the staleness rule
//! - [`CacheKey`]: normalised key for pictures, raw files and groups
//! - [`MemoryEngine`] / [`TieredEngine`] / [`DiskStore`]: storage and eviction

mod artifact;
mod disk;
mod engine;
mod key;
mod region;
mod tiered;

pub use artifact::Artifact;
pub use disk::DiskStore;
pub use engine::{
    CacheEngine, EngineStats, MemoryEngine, TieredEngine, DEFAULT_MEMORY_MAX_BYTES,
    DEFAULT_MEMORY_MAX_ENTRIES,
};
pub use key::{CacheKey, GROUP_KEY_PREFIX};
pub use region::{CacheRegion, RegionStats};
pub use tiered::{source_mtime, TieredCache};

pub(crate) use tiered::run_blocking;
