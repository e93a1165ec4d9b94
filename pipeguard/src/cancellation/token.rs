//! Cancellation token for cooperative cancellation.

use crate::errors::{Failure, PipelineResult};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::warn;

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn Fn() + Send + Sync>;

/// A token for cooperative cancellation.
///
/// The token is created by the caller, shared with the pipeline through the
/// request envelope, and observed by stages and handlers at every suspension
/// point. Cancellation is idempotent - only the first cancellation reason is
/// kept.
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Callbacks to invoke on cancellation.
    callbacks: RwLock<Vec<CancelCallback>>,
    /// Wakes tasks waiting in [`CancellationToken::cancelled`].
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason.
    ///
    /// Callbacks are invoked immediately, each exactly once. Panics in
    /// callbacks are logged and suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        // Reason is stored under the lock before the flag flips, so anyone who
        // sees the flag also sees the reason.
        let mut slot = self.reason.write();
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *slot = Some(reason.into());
            drop(slot);
            self.notify.notify_waiters();

            // Drained under the write lock that `on_cancel` holds while it
            // checks the flag, so no registration falls between the two.
            let callbacks: Vec<CancelCallback> = std::mem::take(&mut *self.callbacks.write());
            for callback in &callbacks {
                invoke_callback(callback.as_ref());
            }
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut callbacks = self.callbacks.write();
        if self.is_cancelled() {
            drop(callbacks);
            invoke_callback(&callback);
        } else {
            callbacks.push(Box::new(callback));
        }
    }

    /// Returns the number of callbacks still waiting for cancellation.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Returns a cancellation failure if cancellation has been requested.
    pub fn check(&self) -> PipelineResult<()> {
        if self.is_cancelled() {
            Err(self.to_failure())
        } else {
            Ok(())
        }
    }

    /// Races `future` against this token.
    ///
    /// Yields a cancellation failure if the token fires first. The future is
    /// dropped at that point, so downstream work stops at its next
    /// suspension point.
    pub async fn run_until_cancelled<F, T>(&self, future: F) -> PipelineResult<T>
    where
        F: Future<Output = PipelineResult<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            () = self.cancelled() => Err(self.to_failure()),
            result = future => result,
        }
    }

    fn to_failure(&self) -> Failure {
        Failure::cancelled(
            self.reason()
                .unwrap_or_else(|| "cancellation requested".to_string()),
        )
    }
}

fn invoke_callback(callback: &(dyn Fn() + Send + Sync)) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
