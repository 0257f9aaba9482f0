//! Per-pass reconcile context
//!
//! Carries cancellation (a shared flag flipped by Ctrl-C or the controller)
//! and an optional deadline. Handlers call [`ReconcileContext::check`] before
//! every mutating store call so that a cancelled pass performs no writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exit code for cancelled runs
pub const EXIT_CODE_CANCELLED: i32 = 80;

/// Returned by [`ReconcileContext::check`] once the pass must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancelled {
    #[error("reconcile cancelled")]
    Requested,

    #[error("reconcile deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl ReconcileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A child context sharing the cancel flag, expiring after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(match self.deadline {
                Some(existing) => existing.min(deadline),
                None => deadline,
            }),
        }
    }

    /// Request cancellation for this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail if cancellation was requested or the deadline has passed.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled::Requested);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Cancelled::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Sleep for `duration`, waking early on cancellation.
    ///
    /// Returns false if the context was cancelled while waiting.
    pub fn sleep(&self, duration: Duration) -> bool {
        let until = Instant::now() + duration;
        let tick = Duration::from_millis(10);
        loop {
            if self.check().is_err() {
                return false;
            }
            let now = Instant::now();
            if now >= until {
                return true;
            }
            std::thread::sleep(tick.min(until - now));
        }
    }
}
