//! Cache behaviour integration tests.
//!
//! Tests verify:
//! - Repeat requests are byte-identical cache hits
//! - Files whose names differ only in non-UTF-8 bytes never share an entry
//! - A rewritten source is re-rendered, then cached again
//! - Disk layers survive a new cache instance
//! - Broken configuration degrades to in-memory caches
//! - Group montages are keyed and sized by their embedded members

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use thumbnailer::{
    CacheKey, CacheProperties, ImagePipeline, PictureRef, RenderPipeline, Size, TieredCache,
};

use super::test_utils::{
    four_slot_layout, is_valid_jpeg, jpeg_bytes, png_bytes, rewrite_with_newer_mtime,
    scratch_dir, set_mtime, write_jpeg,
};

fn pipeline() -> Arc<dyn RenderPipeline> {
    Arc::new(ImagePipeline::new())
}

// =============================================================================
// Idempotence and Staleness
// =============================================================================

#[tokio::test]
async fn test_repeat_request_is_identical_cache_hit() {
    let dir = scratch_dir("idempotent");
    let path = write_jpeg(&dir, "a.jpg", 64, 48);
    let cache = TieredCache::in_memory();
    let picture = PictureRef::new(&path, 0.0);

    let first = cache.thumbnail(&picture, Size::square(32), &pipeline()).await.unwrap();
    let second = cache.thumbnail(&picture, Size::square(32), &pipeline()).await.unwrap();

    assert!(!first.cache_hit());
    assert!(second.cache_hit());
    assert_eq!(first.bytes(), second.bytes());
    assert!(is_valid_jpeg(first.bytes()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_utf8_names_do_not_share_thumbnails() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = scratch_dir("non-utf8");
    let red = dir.join(OsStr::from_bytes(b"pic\xff.jpg"));
    let blue = dir.join(OsStr::from_bytes(b"pic\xfe.jpg"));
    std::fs::write(&red, jpeg_bytes(16, 16, [250, 0, 0])).unwrap();
    std::fs::write(&blue, jpeg_bytes(16, 16, [0, 0, 250])).unwrap();
    set_mtime(&red, UNIX_EPOCH + Duration::from_secs(5_000));
    set_mtime(&blue, UNIX_EPOCH + Duration::from_secs(5_000));

    let cache = TieredCache::in_memory();
    let size = Size::square(16);
    cache.thumbnail(&PictureRef::new(&red, 0.0), size, &pipeline()).await.unwrap();
    let second = cache
        .thumbnail(&PictureRef::new(&blue, 0.0), size, &pipeline())
        .await
        .unwrap();

    assert!(!second.cache_hit());
    assert_eq!(cache.highres().len().await, 2);
    let pixel = *image::load_from_memory(second.bytes())
        .unwrap()
        .to_rgb8()
        .get_pixel(8, 8);
    assert!(pixel[2] > 200 && pixel[0] < 50, "got {:?}", pixel);
}

#[tokio::test]
async fn test_rewritten_source_is_rerendered() {
    let dir = scratch_dir("stale");
    let path = write_jpeg(&dir, "a.jpg", 64, 48);
    let cache = TieredCache::in_memory();
    let picture = PictureRef::new(&path, 0.0);
    let size = Size::square(100);

    let original = cache.thumbnail(&picture, size, &pipeline()).await.unwrap();

    rewrite_with_newer_mtime(&path, &jpeg_bytes(80, 20, [250, 10, 10]));

    let fresh = cache.thumbnail(&picture, size, &pipeline()).await.unwrap();
    assert!(!fresh.cache_hit());
    assert_ne!(original.bytes(), fresh.bytes());

    let decoded = image::load_from_memory(fresh.bytes()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (80, 20));

    let again = cache.thumbnail(&picture, size, &pipeline()).await.unwrap();
    assert!(again.cache_hit());
    assert_eq!(again.bytes(), fresh.bytes());
}

#[tokio::test]
async fn test_older_mtime_keeps_cached_entry() {
    let dir = scratch_dir("older");
    let path = write_jpeg(&dir, "a.jpg", 16, 16);
    let cache = TieredCache::in_memory();
    let picture = PictureRef::new(&path, 0.0);

    cache.thumbnail(&picture, Size::square(8), &pipeline()).await.unwrap();
    set_mtime(&path, UNIX_EPOCH + Duration::from_secs(1_000));

    let again = cache.thumbnail(&picture, Size::square(8), &pipeline()).await.unwrap();
    assert!(again.cache_hit());
}

// =============================================================================
// Persistence and Configuration
// =============================================================================

#[tokio::test]
async fn test_disk_layer_survives_new_instance() {
    let dir = scratch_dir("persist");
    let cache_dir = scratch_dir("persist-cache");
    let path = write_jpeg(&dir, "a.jpg", 40, 40);
    let picture = PictureRef::new(&path, 90.0);
    let props = CacheProperties::default().with_disk_dir(&cache_dir);

    let rendered = {
        let cache = TieredCache::open(&props).await;
        cache.thumbnail(&picture, Size::square(20), &pipeline()).await.unwrap()
    };
    assert!(cache_dir.join("thumbnail").is_dir());

    let reopened = TieredCache::open(&props).await;
    let cached = reopened
        .thumbnail(&picture, Size::square(20), &pipeline())
        .await
        .unwrap();

    assert!(cached.cache_hit());
    assert_eq!(cached.bytes(), rendered.bytes());
    assert_eq!(cached.last_modified(), rendered.last_modified());

    reopened.clear_thumbnails().await.unwrap();
    let after_clear = TieredCache::open(&props).await;
    assert!(after_clear.thumbnails().is_empty().await);
}

#[tokio::test]
async fn test_broken_properties_degrade_to_memory() {
    let dir = scratch_dir("props");
    let bad = dir.join("cache.json");
    std::fs::write(&bad, "{ this is not json").unwrap();

    let props = CacheProperties::load(Some(&bad), Some(&dir));
    assert_eq!(props, CacheProperties::in_memory());

    let missing = CacheProperties::load(Some(&dir.join("absent.json")), Some(&dir));
    assert_eq!(missing, CacheProperties::in_memory());

    // Still fully usable
    let cache = TieredCache::open(&props).await;
    let path = write_jpeg(&dir, "a.jpg", 8, 8);
    let artifact = cache
        .thumbnail(&PictureRef::new(&path, 0.0), Size::square(8), &pipeline())
        .await
        .unwrap();
    assert!(!artifact.cache_hit());
}

#[tokio::test]
async fn test_stats_report_counts_lookups() {
    let dir = scratch_dir("stats");
    let path = write_jpeg(&dir, "a.jpg", 8, 8);
    let cache = TieredCache::in_memory();
    let picture = PictureRef::new(&path, 0.0);

    cache.thumbnail(&picture, Size::square(8), &pipeline()).await.unwrap();
    cache.thumbnail(&picture, Size::square(8), &pipeline()).await.unwrap();

    let (highres, thumbnail) = cache.stats().await;
    assert_eq!((thumbnail.hits, thumbnail.misses), (1, 1));
    assert_eq!((highres.hits, highres.misses), (0, 1));
    assert!(cache.stats_report().await.contains("1 hit(s), 1 miss(es)"));
}

// =============================================================================
// Group Montages
// =============================================================================

#[tokio::test]
async fn test_group_of_five_embeds_four() {
    let dir = scratch_dir("group");
    let members: Vec<PictureRef> = (0..5)
        .map(|i| {
            let path = dir.join(format!("m{}.png", i));
            std::fs::write(&path, png_bytes(100, 75, [220, 20, 20])).unwrap();
            PictureRef::new(path, 0.0)
        })
        .collect();

    let layout = four_slot_layout();
    let cache = TieredCache::in_memory();
    let montage = cache
        .group_thumbnail(&members, &layout, &pipeline())
        .await
        .unwrap();

    assert!(!montage.cache_hit());
    assert!(cache.thumbnails().contains(&CacheKey::group(&members[..4])).await);
    assert!(!cache.thumbnails().contains(&CacheKey::group(&members)).await);

    // Fifth member was never read
    assert_eq!(cache.highres().len().await, 4);

    let image = image::load_from_memory(montage.bytes()).unwrap().to_rgb8();
    assert_eq!(image.dimensions(), (235, 235));
    for slot in 0..4 {
        let (x, y) = layout.slot_origin(slot);
        let pixel = image.get_pixel(x + 50, y + 37);
        assert!(pixel[0] > 150 && pixel[1] < 100, "slot {} is empty", slot);
    }
}

#[tokio::test]
async fn test_group_follows_newest_member() {
    let dir = scratch_dir("group-stale");
    let members: Vec<PictureRef> = (0..2)
        .map(|i| PictureRef::new(write_jpeg(&dir, &format!("m{}.jpg", i), 20, 20), 0.0))
        .collect();

    let layout = four_slot_layout();
    let cache = TieredCache::in_memory();
    cache.group_thumbnail(&members, &layout, &pipeline()).await.unwrap();

    rewrite_with_newer_mtime(members[1].path(), &jpeg_bytes(20, 20, [0, 0, 0]));

    let fresh = cache.group_thumbnail(&members, &layout, &pipeline()).await.unwrap();
    assert!(!fresh.cache_hit());
}
