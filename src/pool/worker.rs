//! Render worker.
//!
//! A worker polls the queue, resolves each request to an icon and notifies
//! the request's callback. No failure on a single request escapes
//! [`Worker::process`]: unreadable, unsupported and undecodable sources all
//! resolve to a placeholder.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::TieredCache;
use crate::content::{ContentClassifier, ContentKind};
use crate::error::RenderError;
use crate::queue::{IconKind, RenderRequest, RenderedIcon, RequestQueue};
use crate::render::{placeholder, MontageLayout, RenderPipeline};
use crate::target::{PictureRef, RenderTarget, Size};

/// Everything a worker shares with the rest of the pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<RequestQueue>,
    pub cache: Arc<TieredCache>,
    pub pipeline: Arc<dyn RenderPipeline>,
    pub classifier: Arc<dyn ContentClassifier>,
    pub montage: MontageLayout,
    pub poll_interval: Duration,

    /// Set once to stop every worker
    pub shutdown: Arc<AtomicBool>,

    /// Number of workers currently running
    pub live: Arc<AtomicUsize>,
}

/// Decrements the live count when a worker ends, including by panic.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn enter(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Worker {
    id: usize,
    ctx: WorkerContext,
}

impl Worker {
    pub fn new(id: usize, ctx: WorkerContext) -> Self {
        Self { id, ctx }
    }

    /// Start the worker loop on `handle`.
    pub fn spawn(self, handle: &Handle) -> JoinHandle<()> {
        let live = LiveGuard::enter(&self.ctx.live);
        handle.spawn(async move {
            let _live = live;
            self.run().await;
        })
    }

    /// Poll until shutdown is signalled. The flag is checked once per
    /// iteration, so an idle worker exits within one polling interval.
    pub async fn run(self) {
        debug!("Worker {} started", self.id);

        while !self.ctx.shutdown.load(Ordering::SeqCst) {
            match self.ctx.queue.poll() {
                Some(request) => self.handle(&request).await,
                None => {
                    self.ctx.queue.wait_for_work(self.ctx.poll_interval).await;
                }
            }
        }

        info!("Worker {} stopped", self.id);
    }

    async fn handle(&self, request: &RenderRequest) {
        if request.is_canceled() {
            debug!("Worker {} skipping canceled request", self.id);
            return;
        }

        let icon = self.process(request).await;
        request.set_result(icon);
        if !request.notify_callback() {
            debug!("Worker {}: request canceled while rendering", self.id);
        }
    }

    /// Resolve `request` to an icon.
    pub async fn process(&self, request: &RenderRequest) -> RenderedIcon {
        match request.target() {
            RenderTarget::Picture(picture) => self.process_picture(picture, request.size()).await,
            RenderTarget::Group(members) => self.process_group(members).await,
            RenderTarget::Unsupported => {
                debug!("Unsupported render target");
                broken()
            }
        }
    }

    async fn process_picture(&self, picture: &PictureRef, size: Size) -> RenderedIcon {
        let path = picture.path();
        if let Err(e) = check_readable(path).await {
            warn!("{}", e);
            return broken();
        }

        match self.ctx.classifier.classify(path) {
            ContentKind::Movie => RenderedIcon::new(placeholder::movie_icon(), IconKind::Movie),
            ContentKind::Document => {
                RenderedIcon::new(placeholder::document_icon(), IconKind::Document)
            }
            ContentKind::Unsupported => {
                debug!("No thumbnail for unsupported file {}", path.display());
                broken()
            }
            ContentKind::Image if !self.ctx.pipeline.can_decode(path) => {
                debug!("No decoder for {}", path.display());
                broken()
            }
            ContentKind::Image => {
                match self
                    .ctx
                    .cache
                    .thumbnail(picture, size, &self.ctx.pipeline)
                    .await
                {
                    Ok(artifact) => RenderedIcon::new(artifact, IconKind::Thumbnail),
                    Err(e) => {
                        warn!("Failed to render {}: {}", path.display(), e);
                        broken()
                    }
                }
            }
        }
    }

    async fn process_group(&self, members: &[PictureRef]) -> RenderedIcon {
        match self
            .ctx
            .cache
            .group_thumbnail(members, &self.ctx.montage, &self.ctx.pipeline)
            .await
        {
            Ok(artifact) => RenderedIcon::new(artifact, IconKind::Thumbnail),
            Err(e) => {
                warn!("Failed to render group montage: {}", e);
                broken()
            }
        }
    }
}

fn broken() -> RenderedIcon {
    RenderedIcon::new(placeholder::broken_icon(), IconKind::Broken)
}

/// The source must be an existing regular file that can be opened.
async fn check_readable(path: &Path) -> Result<(), RenderError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| RenderError::unavailable(path, &e))?;
    if !metadata.is_file() {
        return Err(RenderError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }
    tokio::fs::File::open(path)
        .await
        .map_err(|e| RenderError::unavailable(path, &e))?;
    Ok(())
}
