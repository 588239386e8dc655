//! Priority queue of pending render requests.
//!
//! At most one request per callback handler is pending at any time. A new
//! submission for a handler either merges into the pending request (same
//! work, priority raised) or replaces it (different work, old one canceled).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info};

use super::request::{callback_id, CallbackId, Priority, RenderCallback, RenderRequest};

/// Heap entry. The priority is a snapshot taken at insertion; requests are
/// re-inserted whenever their priority changes.
struct Entry {
    priority: Priority,
    seq: u64,
    request: Arc<RenderRequest>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Max-heap: the most urgent priority, then the oldest entry, is greatest
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Entry>,
    index: HashMap<CallbackId, Arc<RenderRequest>>,
    next_seq: u64,
}

impl QueueState {
    fn push(&mut self, request: Arc<RenderRequest>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(request.callback_id(), Arc::clone(&request));
        self.heap.push(Entry {
            priority: request.priority(),
            seq,
            request,
        });
    }

    fn remove(&mut self, request: &Arc<RenderRequest>) -> bool {
        let before = self.heap.len();
        self.heap.retain(|entry| !Arc::ptr_eq(&entry.request, request));

        let id = request.callback_id();
        if self
            .index
            .get(&id)
            .is_some_and(|indexed| Arc::ptr_eq(indexed, request))
        {
            self.index.remove(&id);
        }

        self.heap.len() != before
    }
}

/// Thread-safe request queue shared by submitters and workers.
#[derive(Default)]
pub struct RequestQueue {
    state: Mutex<QueueState>,
    work_available: Notify,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `request`, coalescing with any pending request of the same
    /// callback handler.
    ///
    /// Returns the request that will be processed: either `request` itself
    /// or the already-pending one it was merged into.
    pub fn submit(&self, request: RenderRequest) -> Arc<RenderRequest> {
        let request = Arc::new(request);
        let mut state = self.lock();

        let queued = match state.index.get(&request.callback_id()).cloned() {
            None => {
                state.push(Arc::clone(&request));
                request
            }
            Some(existing) if existing.same_work(&request) => {
                state.remove(&existing);
                let priority = existing.increase_priority_to(request.priority());
                state.push(Arc::clone(&existing));
                debug!("Merged duplicate request, priority now {:?}", priority);
                existing
            }
            Some(existing) => {
                existing.cancel();
                state.remove(&existing);
                debug!("Replaced pending request {:?}", existing);
                state.push(Arc::clone(&request));
                request
            }
        };

        drop(state);
        self.work_available.notify_one();
        queued
    }

    /// Take the most urgent pending request, if any. Never blocks.
    pub fn poll(&self) -> Option<Arc<RenderRequest>> {
        let mut state = self.lock();
        let entry = state.heap.pop()?;

        let id = entry.request.callback_id();
        if state
            .index
            .get(&id)
            .is_some_and(|indexed| Arc::ptr_eq(indexed, &entry.request))
        {
            state.index.remove(&id);
        }

        Some(entry.request)
    }

    /// Raise a pending request's priority. Returns `false` if it is no
    /// longer queued.
    pub fn increase_priority(&self, request: &Arc<RenderRequest>, priority: Priority) -> bool {
        let mut state = self.lock();
        if !state.remove(request) {
            return false;
        }
        request.increase_priority_to(priority);
        state.push(Arc::clone(request));
        true
    }

    /// Remove a pending request. Removing an absent request is a no-op.
    pub fn remove(&self, request: &Arc<RenderRequest>) -> bool {
        let removed = self.lock().remove(request);
        if !removed {
            info!("Request not on queue, nothing to remove: {:?}", request);
        }
        removed
    }

    /// The pending request of `callback`, if any.
    pub fn find(&self, callback: &Arc<dyn RenderCallback>) -> Option<Arc<RenderRequest>> {
        self.lock().index.get(&callback_id(callback)).cloned()
    }

    /// Drop every pending request without notifying anyone.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.heap.clear();
        state.index.clear();
    }

    pub fn size(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Wake every worker currently waiting for work.
    pub fn wake_all(&self) {
        self.work_available.notify_waiters();
    }

    /// Wait until a request is submitted or `timeout` elapses.
    ///
    /// A submission made while nobody was waiting is remembered, so this
    /// returns immediately for the next waiter.
    pub async fn wait_for_work(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.work_available.notified())
            .await
            .is_ok()
    }
}
