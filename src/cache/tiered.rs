//! The two cache regions used by the workers.
//!
//! - **highres**: raw source bytes, keyed by path
//! - **thumbnail**: rendered thumbnails and group montages
//!
//! Both regions stamp entries with the source modification time, so a
//! rewritten source is picked up on the next lookup. Group montages are
//! stamped with the newest modification time among their members.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::{debug, info};

use super::artifact::Artifact;
use super::key::CacheKey;
use super::region::{CacheRegion, RegionStats};
use crate::config::{CacheProperties, HIGHRES_REGION, THUMBNAIL_REGION};
use crate::error::{CacheError, RenderError};
use crate::render::{compose_montage, MontageLayout, MontageMember, RenderPipeline};
use crate::target::{PictureRef, Size};

/// Raw and rendered artifact caches.
pub struct TieredCache {
    highres: CacheRegion,
    thumbnail: CacheRegion,
}

impl TieredCache {
    pub fn new(highres: CacheRegion, thumbnail: CacheRegion) -> Self {
        Self { highres, thumbnail }
    }

    /// Both regions memory-only with default sizing.
    pub fn in_memory() -> Self {
        Self::new(
            CacheRegion::in_memory(HIGHRES_REGION),
            CacheRegion::in_memory(THUMBNAIL_REGION),
        )
    }

    /// Open both regions from `props`. Never fails; see [`CacheRegion::open`].
    pub async fn open(props: &CacheProperties) -> Self {
        Self::new(
            CacheRegion::open(HIGHRES_REGION, &props.highres).await,
            CacheRegion::open(THUMBNAIL_REGION, &props.thumbnail).await,
        )
    }

    pub fn highres(&self) -> &CacheRegion {
        &self.highres
    }

    pub fn thumbnails(&self) -> &CacheRegion {
        &self.thumbnail
    }

    /// Raw bytes of the file at `path`, through the highres region.
    pub async fn highres_bytes(&self, path: &Path) -> Result<Artifact, RenderError> {
        let mtime = source_mtime(path).await?;
        self.highres
            .get_or_create(CacheKey::highres(path), mtime, || async {
                tokio::fs::read(path)
                    .await
                    .map(Bytes::from)
                    .map_err(|e| RenderError::unavailable(path, &e))
            })
            .await
    }

    /// Thumbnail of `picture` fitting inside `size`.
    pub async fn thumbnail(
        &self,
        picture: &PictureRef,
        size: Size,
        pipeline: &Arc<dyn RenderPipeline>,
    ) -> Result<Artifact, RenderError> {
        let path = picture.path();
        if !pipeline.can_decode(path) {
            return Err(RenderError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
        let mtime = source_mtime(path).await?;
        let key = CacheKey::thumbnail(path, picture.rotation, size);

        self.thumbnail
            .get_or_create(key, mtime, || async {
                let source = self.highres_bytes(path).await?;
                let pipeline = Arc::clone(pipeline);
                let path = path.to_path_buf();
                let rotation = picture.rotation;
                run_blocking(move || pipeline.render(source.bytes(), &path, rotation, size)).await
            })
            .await
    }

    /// Montage of the first `layout.capacity()` members of a group.
    ///
    /// Members that cannot be read are left out of the montage but still
    /// contribute to the cache key. While any member is unreadable the
    /// cached montage counts as stale, so it is rebuilt on every lookup.
    pub async fn group_thumbnail(
        &self,
        members: &[PictureRef],
        layout: &MontageLayout,
        pipeline: &Arc<dyn RenderPipeline>,
    ) -> Result<Artifact, RenderError> {
        let members = &members[..members.len().min(layout.capacity())];
        let key = CacheKey::group(members);

        let mut newest = UNIX_EPOCH;
        for member in members {
            match source_mtime(member.path()).await {
                Ok(mtime) => newest = newest.max(mtime),
                Err(e) => {
                    debug!("Montage member unreadable, rebuilding: {}", e);
                    newest = SystemTime::now();
                    break;
                }
            }
        }

        self.thumbnail
            .get_or_create(key, newest, || async {
                let mut sources = Vec::with_capacity(members.len());
                for member in members {
                    let source = match self.highres_bytes(member.path()).await {
                        Ok(artifact) => Some(artifact.bytes().clone()),
                        Err(e) => {
                            debug!("Montage member unavailable: {}", e);
                            None
                        }
                    };
                    sources.push(MontageMember {
                        picture: member.clone(),
                        source,
                    });
                }

                let pipeline = Arc::clone(pipeline);
                let layout = *layout;
                let montage =
                    run_blocking(move || compose_montage(pipeline.as_ref(), &layout, &sources))
                        .await?;
                debug!("Composed montage with {} member(s)", montage.embedded);
                Ok(montage.bytes)
            })
            .await
    }

    pub async fn stats(&self) -> (RegionStats, RegionStats) {
        (self.highres.stats().await, self.thumbnail.stats().await)
    }

    /// Human-readable statistics for both regions.
    pub async fn stats_report(&self) -> String {
        let (highres, thumbnail) = self.stats().await;
        format!("{}\n{}", highres, thumbnail)
    }

    pub async fn clear_highres(&self) -> Result<(), CacheError> {
        info!("Clearing {} cache", self.highres.name());
        self.highres.clear().await
    }

    pub async fn clear_thumbnails(&self) -> Result<(), CacheError> {
        info!("Clearing {} cache", self.thumbnail.name());
        self.thumbnail.clear().await
    }
}

/// Modification time of `path`, failing if it is missing or not a file.
pub async fn source_mtime(path: &Path) -> Result<SystemTime, RenderError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| RenderError::unavailable(path, &e))?;

    if !metadata.is_file() {
        return Err(RenderError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }

    metadata
        .modified()
        .map_err(|e| RenderError::unavailable(path, &e))
}

/// Run CPU-bound render work off the async worker threads.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, RenderError>
where
    F: FnOnce() -> Result<T, RenderError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RenderError::TaskFailed(format!("Task join error: {}", e)))?
}
