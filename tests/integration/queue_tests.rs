//! Request queue integration tests.
//!
//! Tests verify:
//! - Concurrent submitters never lose or duplicate requests
//! - Coalescing holds when many threads hammer the same handler
//! - Canceled and replaced requests are never delivered by a worker
//! - A request canceled mid-render still fills the cache, silently

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thumbnailer::pool::{Worker, WorkerContext};
use thumbnailer::{
    CacheKey, ExtensionClassifier, ImagePipeline, Priority, RenderCallback, RenderPipeline,
    RenderRequest, RenderTarget, RequestQueue, Size, TieredCache,
};

use super::test_utils::{four_slot_layout, scratch_dir, write_jpeg, GatedPipeline, Recorder};

fn request(callback: Arc<dyn RenderCallback>, path: &str, priority: Priority) -> RenderRequest {
    RenderRequest::new(
        callback,
        RenderTarget::picture(path, 0.0),
        Size::square(350),
        priority,
    )
}

fn worker_context(queue: Arc<RequestQueue>, pipeline: Arc<dyn RenderPipeline>) -> WorkerContext {
    WorkerContext {
        queue,
        cache: Arc::new(TieredCache::in_memory()),
        pipeline,
        classifier: Arc::new(ExtensionClassifier),
        montage: four_slot_layout(),
        poll_interval: Duration::from_millis(5),
        shutdown: Arc::new(AtomicBool::new(false)),
        live: Arc::new(AtomicUsize::new(0)),
    }
}

/// Run one worker until `queue` drains and `done` holds, then stop it.
async fn drain_with_worker(queue: &Arc<RequestQueue>, done: impl Fn() -> bool) {
    let ctx = worker_context(Arc::clone(queue), Arc::new(ImagePipeline::new()));
    let shutdown = Arc::clone(&ctx.shutdown);
    let handle = tokio::spawn(Worker::new(0, ctx).run());

    for _ in 0..1_000 {
        if queue.is_empty() && done() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    shutdown.store(true, Ordering::SeqCst);
    handle.await.unwrap();
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_submitters_distinct_handlers() {
    let queue = Arc::new(RequestQueue::new());

    let threads: Vec<_> = (0..8)
        .map(|t| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..50 {
                    let priority = if i % 2 == 0 { Priority::Low } else { Priority::High };
                    queue.submit(request(Recorder::new(), &format!("{}-{}.jpg", t, i), priority));
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(queue.size(), 400);

    let mut seen = HashSet::new();
    let mut last = Priority::High;
    while let Some(request) = queue.poll() {
        assert!(request.priority() >= last, "priority order violated");
        last = request.priority();
        assert!(seen.insert(Arc::as_ptr(&request) as usize));
    }
    assert_eq!(seen.len(), 400);
}

#[test]
fn test_concurrent_submitters_same_handler_coalesce() {
    let queue = Arc::new(RequestQueue::new());
    let handler: Arc<dyn RenderCallback> = Recorder::new();

    let threads: Vec<_> = (0..8)
        .map(|t| {
            let queue = Arc::clone(&queue);
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                for _ in 0..50 {
                    let priority = if t == 3 { Priority::High } else { Priority::Lowest };
                    queue.submit(request(Arc::clone(&handler), "same.jpg", priority));
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(queue.size(), 1);
    let survivor = queue.find(&handler).unwrap();
    assert_eq!(survivor.priority(), Priority::High);
    assert!(!survivor.is_canceled());
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_canceled_before_dequeue_is_never_delivered() {
    let dir = scratch_dir("cancel");
    let path = write_jpeg(&dir, "a.jpg", 10, 10);
    let queue = Arc::new(RequestQueue::new());
    let canceled = Recorder::new();
    let live = Recorder::new();

    let doomed = queue.submit(RenderRequest::new(
        canceled.clone(),
        RenderTarget::picture(&path, 0.0),
        Size::square(350),
        Priority::High,
    ));
    queue.submit(RenderRequest::new(
        live.clone(),
        RenderTarget::picture(&path, 0.0),
        Size::square(350),
        Priority::Low,
    ));
    doomed.cancel();

    drain_with_worker(&queue, || live.calls() == 1).await;

    assert_eq!(canceled.calls(), 0);
    assert_eq!(live.calls(), 1);
    assert!(doomed.result().is_none());
}

#[tokio::test]
async fn test_replaced_request_is_never_delivered() {
    let dir = scratch_dir("replace");
    let path = write_jpeg(&dir, "a.jpg", 10, 10);
    let queue = Arc::new(RequestQueue::new());
    let handler = Recorder::new();

    let old = queue.submit(RenderRequest::new(
        handler.clone(),
        RenderTarget::picture(&path, 0.0),
        Size::square(350),
        Priority::Low,
    ));
    let new = queue.submit(RenderRequest::new(
        handler.clone(),
        RenderTarget::picture(&path, 0.0),
        Size::square(100),
        Priority::Low,
    ));

    drain_with_worker(&queue, || handler.calls() == 1).await;

    assert!(old.is_canceled());
    assert!(old.result().is_none());
    assert_eq!(handler.calls(), 1);
    assert!(new.result().is_some());
}

#[tokio::test]
async fn test_canceled_while_rendering_fills_cache_without_callback() {
    let dir = scratch_dir("cancel-mid-render");
    let path = write_jpeg(&dir, "a.jpg", 10, 10);
    let queue = Arc::new(RequestQueue::new());
    let handler = Recorder::new();
    let pipeline = GatedPipeline::new();

    let request = queue.submit(RenderRequest::new(
        handler.clone(),
        RenderTarget::picture(&path, 0.0),
        Size::square(350),
        Priority::High,
    ));

    let ctx = worker_context(Arc::clone(&queue), pipeline.clone());
    let cache = Arc::clone(&ctx.cache);
    let shutdown = Arc::clone(&ctx.shutdown);
    let worker = tokio::spawn(Worker::new(0, ctx).run());

    for _ in 0..1_000 {
        if pipeline.started() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(pipeline.started());

    request.cancel();
    pipeline.release();

    for _ in 0..1_000 {
        if request.result().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    shutdown.store(true, Ordering::SeqCst);
    worker.await.unwrap();

    let key = CacheKey::thumbnail(&path, 0.0, Size::square(350));
    assert!(cache.thumbnails().contains(&key).await);
    assert!(request.result().is_some());
    assert_eq!(handler.calls(), 0);
}

#[test]
fn test_priority_escalation_through_api() {
    let queue = RequestQueue::new();
    let slow = queue.submit(request(Recorder::new(), "slow.jpg", Priority::Lowest));
    queue.submit(request(Recorder::new(), "other.jpg", Priority::Medium));

    assert!(queue.increase_priority(&slow, Priority::High));
    assert!(Arc::ptr_eq(&queue.poll().unwrap(), &slow));
    assert_eq!(queue.poll().unwrap().priority(), Priority::Medium);
}
