//! Retry logic.
//!
//! # Responsibilities
//! - Select an endpoint per attempt from the freshest snapshot
//! - Bound each attempt by min(remaining overall deadline, attempt timeout)
//! - Stop on success, on attempt exhaustion, on deadline, or on cancellation
//!
//! # Design Decisions
//! - Breakers are never touched here; outcomes reach them through the
//!   endpoint pipeline
//! - No backoff between attempts: the next attempt goes to a freshly picked
//!   endpoint, which is usually a different instance
//! - Deadline expiry wins over remaining attempts
//! - Only the final error is returned; per-attempt errors are logged

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::endpoint::stages::outcome_label;
use crate::endpoint::{Endpoint, EndpointSet};
use crate::error::{DispatchError, DispatchResult};
use crate::load_balancer::{LoadBalancer, Pick};
use crate::observability::metrics;
use crate::resilience::timeouts::{deadline_after, CallContext};

/// Retry budget for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub overall_timeout: Duration,
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            overall_timeout: config.overall_timeout(),
            attempt_timeout: config.attempt_timeout(),
        }
    }
}

/// Runs one logical call against a service with retries.
pub struct RetryDispatcher<Req, Resp> {
    operation: Arc<str>,
    endpoints: Arc<EndpointSet<Req, Resp>>,
    balancer: Arc<dyn LoadBalancer>,
    policy: RetryPolicy,
}

impl<Req, Resp> RetryDispatcher<Req, Resp>
where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
{
    pub fn new(
        operation: &str,
        endpoints: Arc<EndpointSet<Req, Resp>>,
        balancer: Arc<dyn LoadBalancer>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            operation: operation.into(),
            endpoints,
            balancer,
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn endpoints(&self) -> &EndpointSet<Req, Resp> {
        &self.endpoints
    }

    /// Dispatch `request`. The overall timeout starts now and is further
    /// bounded by the caller's own deadline; cancelling the caller's token
    /// aborts the call.
    pub async fn call(&self, ctx: &CallContext, request: &Req) -> DispatchResult<Resp> {
        let start = Instant::now();
        let span = tracing::info_span!(
            "dispatch",
            service = %self.endpoints.service(),
            operation = %self.operation,
            call_id = %Uuid::new_v4(),
            balancer = self.balancer.strategy(),
            max_attempts = self.policy.max_attempts,
            timeout_ms = self.policy.overall_timeout.as_millis() as u64,
        );

        let result = self.run(ctx.narrowed(deadline_after(start, self.policy.overall_timeout)), request)
            .instrument(span)
            .await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(DispatchError::DeadlineExceeded) => "deadline_exceeded",
            Err(DispatchError::Cancelled) => "cancelled",
            Err(_) => "error",
        };
        metrics::record_call(&self.operation, outcome, start);
        result
    }

    async fn run(&self, overall: CallContext, request: &Req) -> DispatchResult<Resp> {
        let mut last_error = DispatchError::NoEndpoints;

        for attempt in 1..=self.policy.max_attempts {
            if overall.is_cancelled() {
                return Err(DispatchError::Cancelled);
            }
            if overall.is_expired() {
                tracing::warn!(attempt, last_error = %last_error, "Deadline exceeded before attempt");
                return Err(DispatchError::DeadlineExceeded);
            }

            let attempt_ctx = match self.policy.attempt_timeout {
                Some(timeout) => overall.narrowed(deadline_after(Instant::now(), timeout)),
                None => overall.clone(),
            };

            let snapshot = self.endpoints.snapshot();
            let result = match self.balancer.pick(snapshot.as_slice()) {
                Ok(endpoint) => {
                    tracing::debug!(attempt, peer = %endpoint.instance(), "Dispatching attempt");
                    tokio::select! {
                        biased;
                        _ = overall.cancellation().cancelled() => {
                            tracing::debug!(attempt, "Call cancelled mid-attempt");
                            return Err(DispatchError::Cancelled);
                        }
                        result = endpoint.invoke(&attempt_ctx, request) => result,
                    }
                }
                Err(e) => Err(e),
            };
            metrics::record_attempt(&self.operation, outcome_label(&result));

            match result {
                Ok(response) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Call succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Attempt failed");
                    last_error = e;
                }
            }

            if overall.is_expired() {
                tracing::warn!(attempt, last_error = %last_error, "Deadline exceeded");
                return Err(DispatchError::DeadlineExceeded);
            }
        }

        tracing::warn!(
            attempts = self.policy.max_attempts,
            error = %last_error,
            "Retries exhausted"
        );
        Err(last_error)
    }
}
