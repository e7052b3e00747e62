//! Endpoint pipeline stages.
//!
//! Outermost to innermost: [`TraceStage`] → [`BreakerStage`] → caller
//! middleware → [`TransportStage`].

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::time::Instant;
use tracing::field;
use tracing::Instrument;

use crate::discovery::Instance;
use crate::endpoint::{BoxEndpoint, Endpoint};
use crate::error::{DispatchError, DispatchResult};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::timeouts::{bounded, CallContext};
use crate::transport::Transport;

/// Innermost stage: one deadline-bound transport call.
pub struct TransportStage<T: Transport> {
    transport: Arc<T>,
    target: T::Target,
}

impl<T: Transport> TransportStage<T> {
    pub fn new(transport: Arc<T>, target: T::Target) -> Self {
        Self { transport, target }
    }
}

impl<T: Transport> Endpoint<T::Request, T::Response> for TransportStage<T> {
    fn invoke<'a>(
        &'a self,
        ctx: &'a CallContext,
        request: &'a T::Request,
    ) -> BoxFuture<'a, DispatchResult<T::Response>> {
        bounded(ctx, self.transport.call(&self.target, request))
            .map(|result| result.map_err(DispatchError::from))
            .boxed()
    }
}

/// Admission gate; feeds every outcome of an admitted call to the breaker.
pub struct BreakerStage<Req, Resp> {
    breaker: Arc<CircuitBreaker>,
    inner: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> BreakerStage<Req, Resp> {
    pub fn new(breaker: Arc<CircuitBreaker>, inner: BoxEndpoint<Req, Resp>) -> Self {
        Self { breaker, inner }
    }
}

impl<Req, Resp> Endpoint<Req, Resp> for BreakerStage<Req, Resp>
where
    Req: Send + Sync,
    Resp: Send,
{
    fn invoke<'a>(&'a self, ctx: &'a CallContext, request: &'a Req) -> BoxFuture<'a, DispatchResult<Resp>> {
        Box::pin(async move {
            let Some(admission) = self.breaker.acquire() else {
                return Err(DispatchError::CircuitOpen);
            };
            let result = self.inner.invoke(ctx, request).await;
            admission.record(result.is_ok());
            result
        })
    }
}

/// Outermost stage: one span per invocation, including rejected ones.
pub struct TraceStage<Req, Resp> {
    operation: Arc<str>,
    peer: Instance,
    inner: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> TraceStage<Req, Resp> {
    pub fn new(operation: Arc<str>, peer: Instance, inner: BoxEndpoint<Req, Resp>) -> Self {
        Self { operation, peer, inner }
    }
}

impl<Req, Resp> Endpoint<Req, Resp> for TraceStage<Req, Resp>
where
    Req: Send + Sync,
    Resp: Send,
{
    fn invoke<'a>(&'a self, ctx: &'a CallContext, request: &'a Req) -> BoxFuture<'a, DispatchResult<Resp>> {
        let span = tracing::debug_span!(
            "endpoint",
            operation = %self.operation,
            peer.address = %self.peer,
            outcome = field::Empty,
            elapsed_ms = field::Empty,
        );

        Box::pin(
            async move {
                let start = Instant::now();
                let result = self.inner.invoke(ctx, request).await;
                let span = tracing::Span::current();
                span.record("outcome", outcome_label(&result));
                span.record("elapsed_ms", start.elapsed().as_millis() as u64);

                match &result {
                    Ok(_) => tracing::debug!("Endpoint call succeeded"),
                    Err(DispatchError::CircuitOpen) => tracing::debug!("Endpoint call rejected by breaker"),
                    Err(e) => tracing::debug!(error = %e, "Endpoint call failed"),
                }
                result
            }
            .instrument(span),
        )
    }
}

/// Short label for an outcome, used in spans and metrics.
pub fn outcome_label<T>(result: &DispatchResult<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(DispatchError::NoEndpoints) => "no_endpoints",
        Err(DispatchError::CircuitOpen) => "circuit_open",
        Err(DispatchError::Transport(_)) => "transport_error",
        Err(DispatchError::DeadlineExceeded) => "deadline_exceeded",
        Err(DispatchError::Cancelled) => "cancelled",
    }
}
