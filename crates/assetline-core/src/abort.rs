//! Shared abort signal for cooperative cancellation of load work.
//!
//! An [`AbortSignal`] only suppresses result propagation and stops the
//! scheduling of work that has not started yet. It never preempts a fetch
//! that is already in flight: transports and bundles are not told about it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    aborted: AtomicBool,
    notify: Notify,
}

/// A cloneable, one-way abort flag.
///
/// All clones observe the same state. Once aborted, a signal stays aborted.
///
/// # Example
///
/// ```
/// use assetline_core::abort::AbortSignal;
///
/// let signal = AbortSignal::new();
/// let observer = signal.clone();
///
/// signal.abort();
/// assert!(observer.is_aborted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    inner: Arc<Inner>,
}

impl AbortSignal {
    /// Create a signal that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort. Returns `true` if this call flipped the flag.
    pub fn abort(&self) -> bool {
        let first = !self.inner.aborted.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Whether any clone has requested abort.
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Resolve once the signal fires. Resolves immediately if it already did.
    pub async fn aborted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}
