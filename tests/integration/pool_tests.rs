//! Worker pool integration tests.
//!
//! These run the real service with its own runtime, so they are plain
//! `#[test]`s that block on callbacks.
//!
//! Tests verify:
//! - A small JPEG renders into the requested box and is then served from cache
//! - A group of five renders a montage of the four that fit
//! - Broken, movie and document sources resolve to placeholders
//! - A bad file does not stop the pool
//! - Shutdown lets an in-flight render finish but drops queued requests

use std::sync::Arc;
use std::time::Duration;

use thumbnailer::{CacheKey, IconKind, PictureRef, Priority, RenderTarget, Size};

use super::test_utils::{
    block_on, is_valid_jpeg, png_bytes, scratch_dir, start_service, start_service_with,
    wait_until, write_jpeg, GatedPipeline, Recorder,
};

#[test]
fn test_basic_render_then_cache_hit() {
    let dir = scratch_dir("pool-basic");
    let path = write_jpeg(&dir, "small.jpg", 10, 10);
    let service = start_service(2);

    let first = Recorder::new();
    service.request(
        first.clone(),
        RenderTarget::picture(&path, 0.0),
        Size::square(350),
        Priority::High,
    );
    assert!(first.wait_for(1));

    let icon = first.last().unwrap();
    assert_eq!(icon.kind, IconKind::Thumbnail);
    assert!(!icon.artifact.cache_hit());
    assert!(is_valid_jpeg(icon.artifact.bytes()));

    let decoded = image::load_from_memory(icon.artifact.bytes()).unwrap();
    assert!(decoded.width() <= 350 && decoded.height() <= 350);

    let second = Recorder::new();
    service.request(
        second.clone(),
        RenderTarget::picture(&path, 0.0),
        Size::square(350),
        Priority::High,
    );
    assert!(second.wait_for(1));

    let again = second.last().unwrap();
    assert!(again.artifact.cache_hit());
    assert_eq!(again.artifact.bytes(), icon.artifact.bytes());
}

#[test]
fn test_group_of_five_renders_four() {
    let dir = scratch_dir("pool-group");
    let members: Vec<PictureRef> = (0..5)
        .map(|i| {
            let path = dir.join(format!("m{}.png", i));
            std::fs::write(&path, png_bytes(100, 75, [220, 20, 20])).unwrap();
            PictureRef::new(path, 0.0)
        })
        .collect();

    let service = start_service(2);
    let recorder = Recorder::new();
    service.request(
        recorder.clone(),
        RenderTarget::group(members.clone()),
        Size::square(350),
        Priority::Medium,
    );
    assert!(recorder.wait_for(1));

    let icon = recorder.last().unwrap();
    assert_eq!(icon.kind, IconKind::Thumbnail);

    let layout = service.config().montage;
    let image = image::load_from_memory(icon.artifact.bytes()).unwrap().to_rgb8();
    let embedded = (0..layout.capacity())
        .filter(|&slot| {
            let (x, y) = layout.slot_origin(slot);
            let pixel = image.get_pixel(x + 50, y + 37);
            pixel[0] > 150 && pixel[1] < 100
        })
        .count();
    assert_eq!(embedded, 4);

    let cache = Arc::clone(service.cache());
    assert!(block_on(async move {
        cache.thumbnails().contains(&CacheKey::group(&members[..4])).await
    }));
}

#[test]
fn test_placeholders() {
    let dir = scratch_dir("pool-placeholders");
    let movie = dir.join("clip.mp4");
    let document = dir.join("letter.pdf");
    let corrupt = dir.join("corrupt.jpg");
    std::fs::write(&movie, b"movie").unwrap();
    std::fs::write(&document, b"document").unwrap();
    std::fs::write(&corrupt, b"not a jpeg").unwrap();

    let service = start_service(2);
    let cases = [
        (movie, IconKind::Movie),
        (document, IconKind::Document),
        (corrupt, IconKind::Broken),
        (dir.join("missing.jpg"), IconKind::Broken),
    ];

    for (path, expected) in cases {
        let recorder = Recorder::new();
        service.request(
            recorder.clone(),
            RenderTarget::picture(&path, 0.0),
            Size::square(100),
            Priority::Medium,
        );
        assert!(recorder.wait_for(1), "no callback for {}", path.display());
        assert_eq!(recorder.last().unwrap().kind, expected, "{}", path.display());
    }
}

#[test]
fn test_bad_file_does_not_stop_pool() {
    let dir = scratch_dir("pool-resilience");
    let corrupt = dir.join("corrupt.jpg");
    std::fs::write(&corrupt, b"garbage").unwrap();
    let good = write_jpeg(&dir, "good.jpg", 20, 20);

    // One worker, so the same loop must survive the bad file
    let service = start_service(1);

    let bad = Recorder::new();
    let fine = Recorder::new();
    service.request(
        bad.clone(),
        RenderTarget::picture(&corrupt, 0.0),
        Size::square(50),
        Priority::High,
    );
    service.request(
        fine.clone(),
        RenderTarget::picture(&good, 0.0),
        Size::square(50),
        Priority::Low,
    );

    assert!(bad.wait_for(1));
    assert!(fine.wait_for(1));
    assert_eq!(bad.last().unwrap().kind, IconKind::Broken);
    assert_eq!(fine.last().unwrap().kind, IconKind::Thumbnail);
    assert_eq!(service.live_workers(), 1);
}

#[test]
fn test_queued_requests_are_dropped_on_shutdown() {
    let dir = scratch_dir("pool-shutdown");
    let path = write_jpeg(&dir, "a.jpg", 10, 10);
    let mut service = start_service(1);
    service.shutdown();

    let recorder = Recorder::new();
    service.request(
        recorder.clone(),
        RenderTarget::picture(&path, 0.0),
        Size::square(50),
        Priority::High,
    );

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(recorder.calls(), 0);
    assert_eq!(service.queue().size(), 1);
}

#[test]
fn test_shutdown_lets_in_flight_render_finish() {
    let dir = scratch_dir("pool-drain");
    let path = write_jpeg(&dir, "slow.jpg", 10, 10);
    let pipeline = GatedPipeline::new();
    let mut service = start_service_with(1, pipeline.clone());

    let recorder = Recorder::new();
    service.request(
        recorder.clone(),
        RenderTarget::picture(&path, 0.0),
        Size::square(50),
        Priority::High,
    );
    assert!(wait_until(Duration::from_secs(10), || pipeline.started()));

    // Released only after shutdown has begun
    let gate = Arc::clone(&pipeline);
    let opener = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        gate.release();
    });
    service.shutdown();
    opener.join().unwrap();

    assert_eq!(recorder.calls(), 1);
    assert_eq!(recorder.last().unwrap().kind, IconKind::Thumbnail);
    assert_eq!(service.live_workers(), 0);

    let cache = Arc::clone(service.cache());
    let key = CacheKey::thumbnail(&path, 0.0, Size::square(50));
    assert!(block_on(async move { cache.thumbnails().contains(&key).await }));
}
