//! Request-scoped deadline and cancellation.
//!
//! A [`Context`] is created by the caller of a cache operation and passed by
//! reference down to every store call. Backends wrap each round trip in
//! [`Context::run`], so an elapsed deadline or a cancelled token fails the
//! call immediately with [`CacheError::Timeout`] or [`CacheError::Cancelled`].
//!
//! Nothing here retries. Whether a failed call is fatal is decided by the
//! caller.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CacheError;

/// Deadline and cancellation signal for one logical cache operation.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    budget: Option<Duration>,
}

impl Context {
    /// Create a context with no deadline and a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the context to `timeout` from now.
    ///
    /// An existing earlier deadline is kept.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.bounded(deadline, timeout)
    }

    /// Bound the context to an absolute deadline.
    ///
    /// An existing earlier deadline is kept.
    #[must_use]
    pub fn with_deadline(self, deadline: Instant) -> Self {
        let budget = deadline.saturating_duration_since(Instant::now());
        self.bounded(deadline, budget)
    }

    fn bounded(mut self, deadline: Instant, budget: Duration) -> Self {
        match self.deadline {
            Some(current) if current <= deadline => {}
            _ => {
                self.deadline = Some(deadline);
                self.budget = Some(budget);
            }
        }
        self
    }

    /// Derive a child context sharing this deadline.
    ///
    /// Cancelling `self` cancels the child; cancelling the child leaves
    /// `self` untouched.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            budget: self.budget,
        }
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    fn timeout_error(&self) -> CacheError {
        CacheError::Timeout(self.budget.unwrap_or_default())
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline elapses first.
    ///
    /// The future is never polled if the context is already cancelled or
    /// past its deadline.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        if self.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let guarded = async {
            tokio::select! {
                biased;
                () = self.token.cancelled() => Err(CacheError::Cancelled),
                res = fut => res,
            }
        };

        match self.deadline {
            Some(deadline) => {
                if deadline <= Instant::now() {
                    return Err(self.timeout_error());
                }
                tokio::time::timeout_at(deadline, guarded)
                    .await
                    .map_err(|_| self.timeout_error())?
            }
            None => guarded.await,
        }
    }
}
