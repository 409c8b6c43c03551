//! A cooperative cancellation signal checked at per-item dispatch
//! boundaries (`DomainQueue::run_cancellable`'s dispatch loop, the
//! per-article guard in `Worker::run_eval_phase`), following the teacher's
//! preference for an explicit cancellation handle over ad hoc `AtomicBool`
//! checks scattered through the call graph.
//!
//! `stop()` requests arrive from the API layer as OS signals (SIGTERM on
//! Unix); the CLI's signal handler calls [`CancellationToken::cancel`] so
//! the worker stops starting new fetch/LLM/webhook calls and abandons the
//! remaining queue at the next dispatch boundary, while still running its
//! teardown block. A call already in flight when `cancel()` fires still
//! runs to completion — cancellation does not interrupt `Fetcher::fetch`,
//! `LlmClient::evaluate`, or `Notifier::notify` mid-request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called. Intended for use in a
    /// `tokio::select!` alongside in-flight I/O so cancellation interrupts
    /// a pending suspension rather than waiting for it to finish.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_immediately_once_flagged() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        token.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_future_wakes_on_cancel() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::task::yield_now().await;
        token.cancel();
        handle.await.unwrap();
    }
}
