//! Cancellable, deadline-aware execution context
//!
//! Every controller operation receives a `Context`. Store calls are raced
//! against the context so that cancellation or an expired deadline aborts
//! them promptly instead of letting them run on.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// Execution context passed to every controller operation
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled together with `parent`
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            cancel: parent.child_token(),
            deadline: None,
        }
    }

    /// Derive a context whose deadline is at most `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(match self.deadline {
                Some(existing) => existing.min(deadline),
                None => deadline,
            }),
        }
    }

    /// Cancel this context and everything derived from it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Run `fut` unless the context is cancelled or its deadline passes first
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ServiceError>
    where
        F: Future,
    {
        if self.cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ServiceError::Cancelled),
            _ = deadline => Err(ServiceError::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = Context::background();
        assert_eq!(ctx.run(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancelled_context_does_not_poll() {
        let ctx = Context::background();
        ctx.cancel();

        let mut polled = false;
        let result = ctx.run(async { polled = true }).await;
        assert!(matches!(result, Err(ServiceError::Cancelled)));
        assert!(!polled);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_pending_call() {
        let parent = CancellationToken::new();
        let ctx = Context::with_parent(&parent);

        let canceller = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = ctx.run(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(ServiceError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_slow_call() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));

        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert!(matches!(result, Err(ServiceError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_child_deadline_never_extends_parent() {
        let parent = Context::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
