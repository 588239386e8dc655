//! # Thumbnailer
//!
//! Background thumbnail rendering with a two-region artifact cache.
//!
//! Callers submit [`RenderRequest`]s to a [`ThumbnailService`]. A supervised
//! pool of low-priority workers polls the coalescing [`RequestQueue`],
//! renders each target through the [`TieredCache`] and hands the result back
//! through the request's [`RenderCallback`].
//!
//! ## Features
//!
//! - **Coalescing queue**: one pending request per callback handler; repeat
//!   submissions raise priority, divergent ones replace and cancel
//! - **Staleness-aware caching**: entries are stamped with the source
//!   modification time and re-rendered when the source is newer
//! - **Two regions**: raw source bytes (`highres`) and rendered thumbnails
//!   (`thumbnail`), each with an LRU memory layer and optional disk layer
//! - **Group montages**: folder thumbnails embedding member pictures
//! - **Placeholders**: unreadable, undecodable, movie and document sources
//!   resolve to icons instead of errors
//!
//! ## Architecture
//!
//! - [`queue`] - Render requests, priorities and the request queue
//! - [`pool`] - Workers, supervisor and the service root
//! - [`cache`] - Keys, artifacts, regions and storage engines
//! - [`render`] - Decode/scale/encode pipeline, montages and placeholders
//! - [`target`] / [`content`] - What to render and how to classify it
//! - [`config`] - CLI and cache properties
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use thumbnailer::{
//!     ExtensionClassifier, ImagePipeline, PoolConfig, Priority, RenderCallback, RenderRequest,
//!     RenderTarget, Size, ThumbnailService, TieredCache,
//! };
//!
//! struct PrintWhenDone;
//!
//! impl RenderCallback for PrintWhenDone {
//!     fn on_rendered(&self, request: &RenderRequest) {
//!         println!("{:?}", request.result().map(|icon| icon.kind));
//!     }
//! }
//!
//! let service = ThumbnailService::new(
//!     PoolConfig::default(),
//!     TieredCache::in_memory(),
//!     Arc::new(ImagePipeline::new()),
//!     Arc::new(ExtensionClassifier),
//! )
//! .unwrap();
//!
//! service.request(
//!     Arc::new(PrintWhenDone),
//!     RenderTarget::picture("holiday.jpg", 0.0),
//!     Size::square(350),
//!     Priority::High,
//! );
//! ```

pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod pool;
pub mod queue;
pub mod render;
pub mod target;

// Re-export commonly used types
pub use cache::{
    Artifact, CacheEngine, CacheKey, CacheRegion, DiskStore, EngineStats, MemoryEngine,
    RegionStats, TieredCache, TieredEngine,
};
pub use config::{CacheArgs, CacheProperties, Cli, Command, PoolConfig, RegionProperties, RenderConfig};
pub use content::{ContentClassifier, ContentKind, ExtensionClassifier};
pub use error::{CacheError, ConfigError, PoolError, RenderError};
pub use pool::ThumbnailService;
pub use queue::{IconKind, Priority, RenderCallback, RenderRequest, RenderedIcon, RequestQueue};
pub use render::{
    compose_montage, ImagePipeline, Montage, MontageLayout, MontageMember, RenderPipeline,
    ScaleQuality,
};
pub use target::{PictureRef, RenderTarget, Size};
