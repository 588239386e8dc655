//! Render request scheduling.
//!
//! - [`RenderRequest`]: target, size, priority, cancel flag and result slot
//! - [`RequestQueue`]: coalescing priority queue polled by the workers
//! - [`RenderCallback`]: handler notified once a request is resolved

#[allow(clippy::module_inception)]
mod queue;
mod request;

pub use queue::RequestQueue;
pub use request::{
    CallbackId, IconKind, Priority, RenderCallback, RenderRequest, RenderedIcon,
};
