//! Test utilities for integration tests.
//!
//! Scratch directories, picture fixtures, a recording callback, a pipeline
//! that holds renders until released and a small service builder.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use thumbnailer::{
    ExtensionClassifier, ImagePipeline, MontageLayout, PoolConfig, RenderCallback, RenderError,
    RenderPipeline, RenderRequest, RenderedIcon, Size, ThumbnailService, TieredCache,
};

// =============================================================================
// Fixtures
// =============================================================================

static NEXT_DIR: AtomicU64 = AtomicU64::new(0);

/// A fresh, empty directory under the system temp directory.
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "thumbnailer-it-{}-{}-{}",
        label,
        std::process::id(),
        NEXT_DIR.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Encode a solid-colour JPEG.
pub fn jpeg_bytes(width: u32, height: u32, colour: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(colour));
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, 90)
        .encode_image(&img)
        .unwrap();
    buf
}

/// Encode a solid-colour PNG.
pub fn png_bytes(width: u32, height: u32, colour: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(colour));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, jpeg_bytes(width, height, [30, 90, 200])).unwrap();
    path
}

/// Overwrite `path` and move its modification time forward.
pub fn rewrite_with_newer_mtime(path: &Path, contents: &[u8]) {
    let previous = std::fs::metadata(path).unwrap().modified().unwrap();
    std::fs::write(path, contents).unwrap();
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(previous + Duration::from_secs(10)).unwrap();
}

/// Set the modification time of `path`.
pub fn set_mtime(path: &Path, time: SystemTime) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(time).unwrap();
}

pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4
        && data[0] == 0xFF
        && data[1] == 0xD8
        && data[data.len() - 2] == 0xFF
        && data[data.len() - 1] == 0xD9
}

/// 2x2 montage grid: (235 - 15) / 110 = 2 columns, (235 - 65) / 85 = 2 rows.
pub fn four_slot_layout() -> MontageLayout {
    MontageLayout::with_canvas(thumbnailer::Size::new(235, 235))
}

// =============================================================================
// Recording Callback
// =============================================================================

/// Callback that records every result it is handed.
#[derive(Default)]
pub struct Recorder {
    results: Mutex<Vec<Option<RenderedIcon>>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.results.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<RenderedIcon> {
        self.results.lock().unwrap().last().cloned().flatten()
    }

    /// Block until at least `count` callbacks arrived.
    pub fn wait_for(&self, count: usize) -> bool {
        wait_until(Duration::from_secs(10), || self.calls() >= count)
    }
}

impl RenderCallback for Recorder {
    fn on_rendered(&self, request: &RenderRequest) {
        self.results.lock().unwrap().push(request.result());
    }
}

pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// =============================================================================
// Gated Pipeline
// =============================================================================

/// [`ImagePipeline`] whose renders block until [`GatedPipeline::release`].
#[derive(Default)]
pub struct GatedPipeline {
    inner: ImagePipeline,
    started: AtomicBool,
    released: AtomicBool,
}

impl GatedPipeline {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether a render has reached the gate.
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

impl RenderPipeline for GatedPipeline {
    fn can_decode(&self, path: &Path) -> bool {
        self.inner.can_decode(path)
    }

    fn render_image(
        &self,
        source: &[u8],
        path: &Path,
        rotation: f64,
        max: Size,
    ) -> Result<DynamicImage, RenderError> {
        self.started.store(true, Ordering::SeqCst);
        wait_until(Duration::from_secs(10), || self.released.load(Ordering::SeqCst));
        self.inner.render_image(source, path, rotation, max)
    }

    fn encode(&self, image: &DynamicImage) -> Result<Bytes, RenderError> {
        self.inner.encode(image)
    }
}

// =============================================================================
// Service Builder
// =============================================================================

pub fn pool_config(workers: usize) -> PoolConfig {
    PoolConfig {
        worker_count: workers,
        poll_interval: Duration::from_millis(10),
        supervisor_interval: Duration::from_millis(20),
        montage: four_slot_layout(),
        ..PoolConfig::default()
    }
}

/// Service with in-memory caches.
pub fn start_service(workers: usize) -> ThumbnailService {
    start_service_with(workers, Arc::new(ImagePipeline::new()))
}

pub fn start_service_with(workers: usize, pipeline: Arc<dyn RenderPipeline>) -> ThumbnailService {
    ThumbnailService::new(
        pool_config(workers),
        TieredCache::in_memory(),
        pipeline,
        Arc::new(ExtensionClassifier),
    )
    .unwrap()
}

/// Run an async block to completion from a synchronous test.
pub fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}
