//! Endpoint construction.
//!
//! # Responsibilities
//! - Validate a discovered instance through the transport
//! - Attach a fresh circuit breaker per instance
//! - Assemble the stage pipeline in its fixed order

use std::sync::Arc;

use crate::discovery::Instance;
use crate::endpoint::stages::{BreakerStage, TraceStage, TransportStage};
use crate::endpoint::{BoxEndpoint, Middleware, ServiceEndpoint};
use crate::error::ConstructionError;
use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker};
use crate::transport::Transport;

/// Builds an endpoint for each instance the endpoint set learns about.
pub trait EndpointBuilder<Req, Resp>: Send + Sync + 'static {
    fn build(&self, instance: &Instance) -> Result<ServiceEndpoint<Req, Resp>, ConstructionError>;
}

/// Standard builder: tracing → breaker → middleware → transport.
pub struct EndpointFactory<T: Transport> {
    operation: Arc<str>,
    transport: Arc<T>,
    breaker: BreakerSettings,
    middleware: Vec<Arc<dyn Middleware<T::Request, T::Response>>>,
}

impl<T: Transport> EndpointFactory<T> {
    pub fn new(operation: &str, transport: Arc<T>, breaker: BreakerSettings) -> Self {
        Self {
            operation: operation.into(),
            transport,
            breaker,
            middleware: Vec::new(),
        }
    }

    /// Add a stage between the breaker and the transport. Stages added first
    /// sit closest to the breaker.
    pub fn with_middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<T::Request, T::Response> + 'static,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl<T: Transport> EndpointBuilder<T::Request, T::Response> for EndpointFactory<T> {
    fn build(&self, instance: &Instance) -> Result<ServiceEndpoint<T::Request, T::Response>, ConstructionError> {
        let target = self.transport.prepare(instance)?;

        let mut pipeline: BoxEndpoint<T::Request, T::Response> =
            Arc::new(TransportStage::new(self.transport.clone(), target));
        for stage in self.middleware.iter().rev() {
            pipeline = stage.wrap(pipeline);
        }

        let breaker = Arc::new(CircuitBreaker::new(instance.as_str(), self.breaker));
        pipeline = Arc::new(BreakerStage::new(breaker.clone(), pipeline));
        pipeline = Arc::new(TraceStage::new(self.operation.clone(), instance.clone(), pipeline));

        Ok(ServiceEndpoint::new(instance.clone(), breaker, pipeline))
    }
}
