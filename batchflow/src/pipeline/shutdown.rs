//! Shutdown requests shared between a running pipeline and its callers.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A cooperative stop signal.
///
/// A graceful request lets the in-flight batch finish; an immediate request
/// additionally wakes an async orchestrator so it can abandon the batch.
/// Only the first reason is kept.
#[derive(Default)]
pub(crate) struct ShutdownSignal {
    requested: AtomicBool,
    immediate: AtomicBool,
    reason: RwLock<Option<String>>,
    notify: Notify,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Requests a graceful stop.
    pub(crate) fn request(&self, reason: impl Into<String>) {
        if self
            .requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.reason.write() = Some(reason.into());
        }
    }

    /// Requests an immediate stop and wakes async waiters.
    pub(crate) fn request_now(&self, reason: impl Into<String>) {
        self.request(reason);
        self.immediate.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub(crate) fn is_immediate(&self) -> bool {
        self.immediate.load(Ordering::SeqCst)
    }

    pub(crate) fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Resolves once an immediate stop is requested.
    pub(crate) async fn immediate(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_immediate() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("requested", &self.is_requested())
            .field("immediate", &self.is_immediate())
            .field("reason", &self.reason())
            .finish()
    }
}
