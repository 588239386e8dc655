//! Background render pool.
//!
//! # Architecture
//!
//! ```text
//!   submitters ──submit──▶ RequestQueue ◀──poll── Worker × N ──▶ TieredCache
//!                                                    ▲
//!                                 PoolSupervisor ────┘ (respawns)
//! ```
//!
//! [`ThumbnailService`] is the root object: it owns a dedicated
//! multi-threaded runtime whose threads run at the lowest OS scheduling
//! priority, the queue, the cache and the supervisor. Render work itself runs
//! on that runtime's blocking pool, which inherits the same priority.

mod priority;
mod supervisor;
mod worker;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::{Builder, Runtime};
use tracing::{info, warn};

use crate::cache::TieredCache;
use crate::config::PoolConfig;
use crate::content::ContentClassifier;
use crate::error::PoolError;
use crate::queue::{Priority, RenderCallback, RenderRequest, RequestQueue};
use crate::render::RenderPipeline;
use crate::target::{RenderTarget, Size};

pub use priority::lower_current_thread_priority;
pub use supervisor::PoolSupervisor;
pub use worker::{Worker, WorkerContext};

/// How often shutdown re-checks the live worker count.
const DRAIN_CHECK_INTERVAL: Duration = Duration::from_millis(5);

/// Owns the worker pool and everything it shares.
///
/// Dropping the service (or calling [`ThumbnailService::shutdown`]) stops
/// the workers and releases the runtime. Requests being rendered at that
/// point still complete; requests still queued are never delivered.
pub struct ThumbnailService {
    runtime: Option<Runtime>,
    queue: Arc<RequestQueue>,
    cache: Arc<TieredCache>,
    shutdown: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    config: PoolConfig,
}

impl ThumbnailService {
    /// Start the worker runtime and the supervisor.
    pub fn new(
        config: PoolConfig,
        cache: TieredCache,
        pipeline: Arc<dyn RenderPipeline>,
        classifier: Arc<dyn ContentClassifier>,
    ) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_count)
            .thread_name("thumbnail-worker")
            .on_thread_start(lower_current_thread_priority)
            .enable_all()
            .build()?;

        let queue = Arc::new(RequestQueue::new());
        let cache = Arc::new(cache);
        let shutdown = Arc::new(AtomicBool::new(false));
        let live = Arc::new(AtomicUsize::new(0));

        let ctx = WorkerContext {
            queue: Arc::clone(&queue),
            cache: Arc::clone(&cache),
            pipeline,
            classifier,
            montage: config.montage,
            poll_interval: config.poll_interval,
            shutdown: Arc::clone(&shutdown),
            live: Arc::clone(&live),
        };

        let supervisor = PoolSupervisor::new(
            ctx,
            config.worker_count,
            config.supervisor_interval,
            runtime.handle().clone(),
        );
        runtime.spawn(supervisor.run());

        info!(
            "Thumbnail service started with {} workers",
            config.worker_count
        );

        Ok(Self {
            runtime: Some(runtime),
            queue,
            cache,
            shutdown,
            live,
            config,
        })
    }

    /// Queue a request. See [`RequestQueue::submit`] for coalescing.
    pub fn submit(&self, request: RenderRequest) -> Arc<RenderRequest> {
        self.queue.submit(request)
    }

    /// Build and queue a request for `target`.
    pub fn request(
        &self,
        callback: Arc<dyn RenderCallback>,
        target: RenderTarget,
        size: Size,
        priority: Priority,
    ) -> Arc<RenderRequest> {
        self.submit(RenderRequest::new(callback, target, size, priority))
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of worker loops currently running.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime.is_none()
    }

    /// Signal the workers, wait for them to finish their current request,
    /// then release the runtime. Repeated calls are no-ops.
    ///
    /// Blocks the calling thread for at most one polling interval plus
    /// [`PoolConfig::drain_timeout`]. Workers still busy after that are
    /// dropped with the runtime.
    pub fn shutdown(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        self.shutdown.store(true, Ordering::SeqCst);
        self.queue.wake_all();

        let deadline = Instant::now() + self.config.poll_interval + self.config.drain_timeout;
        while self.live_workers() > 0 && Instant::now() < deadline {
            std::thread::sleep(DRAIN_CHECK_INTERVAL);
        }

        let busy = self.live_workers();
        if busy > 0 {
            warn!("{} worker(s) still rendering at shutdown, dropping them", busy);
        }

        runtime.shutdown_background();
        info!("Thumbnail service stopped");
    }
}

impl Drop for ThumbnailService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
