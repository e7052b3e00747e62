//! Endpoint subsystem.
//!
//! # Data Flow
//! ```text
//! discovery event Added(instance)
//!     → factory.rs (transport.prepare → stage pipeline → ServiceEndpoint)
//!     → set.rs (insert, publish snapshot)
//!
//! Call through one endpoint:
//!     → TraceStage (span: operation, peer.address, outcome, elapsed)
//!     → BreakerStage (admission, outcome recording)
//!     → caller middleware, in registration order
//!     → TransportStage (deadline-bound wire call)
//! ```
//!
//! # Design Decisions
//! - Every stage implements the same `Endpoint` trait, so each one is
//!   testable alone and the order is fixed in one place (the factory)
//! - Endpoints are shared as `Arc`; removal from the set never cancels
//!   in-flight calls, the last holder frees the endpoint

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::discovery::Instance;
use crate::error::DispatchResult;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::timeouts::CallContext;

pub mod factory;
pub mod set;
pub mod stages;

pub use factory::{EndpointBuilder, EndpointFactory};
pub use set::{EndpointSet, Snapshot};

/// Something that can serve one request.
pub trait Endpoint<Req, Resp>: Send + Sync {
    fn invoke<'a>(&'a self, ctx: &'a CallContext, request: &'a Req) -> BoxFuture<'a, DispatchResult<Resp>>;
}

/// Shared, type-erased endpoint.
pub type BoxEndpoint<Req, Resp> = Arc<dyn Endpoint<Req, Resp>>;

impl<Req, Resp, E> Endpoint<Req, Resp> for Arc<E>
where
    E: Endpoint<Req, Resp> + ?Sized,
{
    fn invoke<'a>(&'a self, ctx: &'a CallContext, request: &'a Req) -> BoxFuture<'a, DispatchResult<Resp>> {
        (**self).invoke(ctx, request)
    }
}

/// A stage wrapping an inner endpoint.
pub trait Middleware<Req, Resp>: Send + Sync {
    fn wrap(&self, inner: BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp>;
}

impl<Req, Resp, F> Middleware<Req, Resp> for F
where
    F: Fn(BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> + Send + Sync,
{
    fn wrap(&self, inner: BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> {
        self(inner)
    }
}

/// The callable unit for one discovered instance.
pub struct ServiceEndpoint<Req, Resp> {
    instance: Instance,
    breaker: Arc<CircuitBreaker>,
    pipeline: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> ServiceEndpoint<Req, Resp> {
    pub fn new(instance: Instance, breaker: Arc<CircuitBreaker>, pipeline: BoxEndpoint<Req, Resp>) -> Self {
        Self {
            instance,
            breaker,
            pipeline,
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The breaker guarding this endpoint (read-only inspection).
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<Req, Resp> Endpoint<Req, Resp> for ServiceEndpoint<Req, Resp>
where
    Req: Send + Sync,
    Resp: Send,
{
    fn invoke<'a>(&'a self, ctx: &'a CallContext, request: &'a Req) -> BoxFuture<'a, DispatchResult<Resp>> {
        self.pipeline.invoke(ctx, request)
    }
}

impl<Req, Resp> Drop for ServiceEndpoint<Req, Resp> {
    fn drop(&mut self) {
        tracing::debug!(instance = %self.instance, "Endpoint released");
    }
}

impl<Req, Resp> std::fmt::Debug for ServiceEndpoint<Req, Resp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("instance", &self.instance)
            .field("breaker", &self.breaker.state())
            .finish()
    }
}
