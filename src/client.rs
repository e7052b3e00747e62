//! Service client.
//!
//! # Responsibilities
//! - Assemble discovery, endpoint set, balancer and retry dispatcher from
//!   one configuration
//! - Offer a single `call` entry point per logical operation
//!
//! # Data Flow
//! ```text
//! ServiceClient::call(request)
//!     → RetryDispatcher (overall deadline, attempts)
//!     → LoadBalancer picks from the EndpointSet snapshot
//!     → ServiceEndpoint pipeline (trace → breaker → middleware → transport)
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::DispatchConfig;
use crate::discovery::{self, Instancer};
use crate::endpoint::{EndpointBuilder, EndpointFactory, EndpointSet};
use crate::error::DispatchResult;
use crate::load_balancer;
use crate::resilience::{BreakerSettings, CallContext, RetryDispatcher, RetryPolicy};
use crate::transport::HttpJsonTransport;

/// Resilient client for one operation of one service.
pub struct ServiceClient<Req, Resp> {
    dispatcher: RetryDispatcher<Req, Resp>,
    endpoints: Arc<EndpointSet<Req, Resp>>,
    shutdown: CancellationToken,
}

impl<Req, Resp> ServiceClient<Req, Resp>
where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
{
    /// Wire a client from configuration, an instancer and an endpoint builder.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        config: &DispatchConfig,
        instancer: &dyn Instancer,
        builder: Arc<dyn EndpointBuilder<Req, Resp>>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let endpoints = Arc::new(EndpointSet::spawn(&config.service.name, instancer, builder, &shutdown));
        let balancer = load_balancer::from_config(&config.balancer);

        tracing::info!(
            service = %config.service.name,
            operation = %config.service.operation,
            balancer = balancer.strategy(),
            max_attempts = config.retries.max_attempts,
            "Service client created"
        );

        let dispatcher = RetryDispatcher::new(
            &config.service.operation,
            endpoints.clone(),
            Arc::from(balancer),
            RetryPolicy::from(&config.retries),
        );

        Self {
            dispatcher,
            endpoints,
            shutdown,
        }
    }

    /// Dispatch with the configured overall timeout and no cancellation.
    pub async fn call(&self, request: &Req) -> DispatchResult<Resp> {
        let ctx = CallContext::with_timeout(self.dispatcher.policy().overall_timeout);
        self.dispatcher.call(&ctx, request).await
    }

    /// Dispatch under a caller-supplied deadline and cancellation token.
    pub async fn call_with(&self, ctx: &CallContext, request: &Req) -> DispatchResult<Resp> {
        self.dispatcher.call(ctx, request).await
    }

    pub fn endpoints(&self) -> &EndpointSet<Req, Resp> {
        &self.endpoints
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.dispatcher.policy()
    }

    /// Wait up to `timeout` for discovery to publish a first endpoint.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        self.endpoints.wait_for_endpoints(timeout).await
    }

    /// Stop following discovery. Calls keep using the last snapshot.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl<Req, Resp> ServiceClient<Req, Resp>
where
    Req: Serialize + Send + Sync + 'static,
    Resp: DeserializeOwned + Send + 'static,
{
    /// JSON over HTTP client with discovery taken from configuration.
    pub fn http(config: &DispatchConfig) -> Result<Self, reqwest::Error> {
        let transport = HttpJsonTransport::new(&config.transport)?;
        let factory = EndpointFactory::new(
            &config.service.operation,
            Arc::new(transport),
            BreakerSettings::from(&config.breaker),
        );
        let instancer = discovery::from_config(&config.discovery);
        Ok(Self::new(config, instancer.as_ref(), Arc::new(factory)))
    }
}

impl<Req, Resp> Drop for ServiceClient<Req, Resp> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
