//! Render requests and their callbacks.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::cache::Artifact;
use crate::target::{RenderTarget, Size};

/// Scheduling priority. Lower ordinal is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    High = 0,
    Medium = 1,
    #[default]
    Low = 2,
    Lowest = 3,
}

impl Priority {
    /// The more urgent of `self` and `other`.
    pub fn most_urgent(self, other: Priority) -> Priority {
        self.min(other)
    }
}

/// Receives a request once its result is available.
///
/// Called from a worker thread at most once per request, and never for a
/// request that was canceled.
pub trait RenderCallback: Send + Sync {
    fn on_rendered(&self, request: &RenderRequest);
}

/// What a resolved request ended up showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    /// A real thumbnail or montage
    Thumbnail,
    Broken,
    Movie,
    Document,
}

/// Result slot contents of a processed request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedIcon {
    pub artifact: Artifact,
    pub kind: IconKind,
}

impl RenderedIcon {
    pub fn new(artifact: Artifact, kind: IconKind) -> Self {
        Self { artifact, kind }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind != IconKind::Thumbnail
    }
}

/// Identity of a callback handler: the address of its shared allocation.
pub type CallbackId = usize;

/// One pending unit of render work.
pub struct RenderRequest {
    callback: Arc<dyn RenderCallback>,
    target: RenderTarget,
    size: Size,
    priority: Mutex<Priority>,
    canceled: Mutex<bool>,
    result: Mutex<Option<RenderedIcon>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RenderRequest {
    pub fn new(
        callback: Arc<dyn RenderCallback>,
        target: RenderTarget,
        size: Size,
        priority: Priority,
    ) -> Self {
        Self {
            callback,
            target,
            size,
            priority: Mutex::new(priority),
            canceled: Mutex::new(false),
            result: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn priority(&self) -> Priority {
        *lock(&self.priority)
    }

    pub fn callback(&self) -> &Arc<dyn RenderCallback> {
        &self.callback
    }

    pub fn callback_id(&self) -> CallbackId {
        callback_id(&self.callback)
    }

    /// Whether `other` asks for the same work on behalf of the same handler.
    pub fn same_work(&self, other: &RenderRequest) -> bool {
        self.callback_id() == other.callback_id()
            && self.target == other.target
            && self.size == other.size
    }

    /// Mark the request canceled. Its callback will never fire afterwards.
    pub fn cancel(&self) {
        *lock(&self.canceled) = true;
    }

    pub fn is_canceled(&self) -> bool {
        *lock(&self.canceled)
    }

    /// Raise the priority to `priority` if that is more urgent.
    ///
    /// Only the queue may call this, and only while the request is out of
    /// its heap.
    pub(crate) fn increase_priority_to(&self, priority: Priority) -> Priority {
        let mut current = lock(&self.priority);
        *current = current.most_urgent(priority);
        *current
    }

    pub fn set_result(&self, icon: RenderedIcon) {
        *lock(&self.result) = Some(icon);
    }

    pub fn result(&self) -> Option<RenderedIcon> {
        lock(&self.result).clone()
    }

    /// Fire the callback unless the request was canceled.
    ///
    /// Returns whether the callback ran.
    pub fn notify_callback(&self) -> bool {
        if self.is_canceled() {
            debug!("Suppressing callback for canceled request {:?}", self);
            return false;
        }
        self.callback.on_rendered(self);
        true
    }
}

impl fmt::Debug for RenderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderRequest")
            .field("target", &self.target.describe())
            .field("size", &self.size)
            .field("priority", &self.priority())
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

pub(crate) fn callback_id(callback: &Arc<dyn RenderCallback>) -> CallbackId {
    Arc::as_ptr(callback) as *const () as usize
}
