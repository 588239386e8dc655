//! OS scheduling priority of worker threads.
//!
//! Only Linux applies niceness per thread. Elsewhere `setpriority` acts on the
//! whole process, so other platforms leave the priority unchanged.

use tracing::debug;
#[cfg(target_os = "linux")]
use tracing::warn;

/// Niceness applied to worker threads: the lowest scheduling priority.
#[cfg(target_os = "linux")]
pub const WORKER_NICENESS: libc::c_int = 19;

/// Drop the calling thread to the lowest scheduling priority.
///
/// Failure is logged and otherwise ignored; the thread keeps running at its
/// inherited priority.
#[cfg(target_os = "linux")]
pub fn lower_current_thread_priority() {
    // SAFETY: setpriority takes no pointers; on Linux who = 0 names the
    // calling thread only.
    let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, WORKER_NICENESS) };
    if result == 0 {
        debug!("Worker thread niceness set to {}", WORKER_NICENESS);
    } else {
        warn!(
            "Could not lower worker thread priority: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn lower_current_thread_priority() {
    debug!("Thread priority unchanged on this platform");
}
