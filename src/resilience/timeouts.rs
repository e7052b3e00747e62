//! Deadline and cancellation plumbing.
//!
//! # Responsibilities
//! - Carry the caller's deadline and cancellation token into every stage
//! - Derive tighter per-attempt deadlines from the overall one
//! - Bound a transport future by its deadline
//!
//! # Design Decisions
//! - Uses Tokio's clock so paused-time tests drive expiry deterministically
//! - Expiry is reported as `TransportError::Timeout`; it counts as a breaker
//!   failure like any other transport failure
//! - Cancellation is cooperative: dropping the future is the cancel

use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// Roughly thirty years; stands in for "no deadline".
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + timeout`, saturating at a far-future instant.
pub fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Deadline and cancellation scope for one call or attempt.
#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Instant,
    cancel: CancellationToken,
}

impl CallContext {
    /// A context expiring `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(deadline_after(Instant::now(), timeout))
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a caller-owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A context sharing this one's cancellation, bounded by the earlier of
    /// the two deadlines.
    pub fn narrowed(&self, deadline: Instant) -> Self {
        Self {
            deadline: deadline.min(self.deadline),
            cancel: self.cancel.clone(),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Run a transport future, failing with `Timeout` once the deadline passes.
pub async fn bounded<F, T>(ctx: &CallContext, call: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match timeout_at(ctx.deadline(), call).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let ctx = CallContext::with_timeout(Duration::from_millis(100));
        let result: Result<(), _> = bounded(&ctx, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(TransportError::Timeout));
        assert!(ctx.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_narrowed_keeps_earlier_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_secs(5));
        let tighter = ctx.narrowed(Instant::now() + Duration::from_secs(1));
        assert_eq!(tighter.remaining(), Duration::from_secs(1));

        let looser = ctx.narrowed(Instant::now() + Duration::from_secs(60));
        assert_eq!(looser.deadline(), ctx.deadline());

        ctx.cancellation().cancel();
        assert!(tighter.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_timeout_saturates() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, Duration::from_secs(2)), now + Duration::from_secs(2));
        assert!(deadline_after(now, Duration::MAX) >= now + FAR_FUTURE);

        let ctx = CallContext::with_timeout(Duration::MAX);
        assert!(!ctx.is_expired());
    }
}
