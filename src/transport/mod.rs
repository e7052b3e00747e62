//! Transport adapters.
//!
//! # Responsibilities
//! - Turn a discovered instance into a call target (or refuse it)
//! - Perform one wire call for a logical request against a target
//!
//! # Design Decisions
//! - Wire encoding is entirely the adapter's business
//! - Adapters never retry; the dispatcher owns the retry budget
//! - Deadlines are enforced by the endpoint stage around `call`, adapters
//!   only need to be drop-safe

use futures_util::future::BoxFuture;

use crate::discovery::Instance;
use crate::error::{ConstructionError, TransportError};

pub mod http;

pub use http::HttpJsonTransport;

/// A per-call transport for one logical request/response pair.
pub trait Transport: Send + Sync + 'static {
    type Request: Send + Sync + 'static;
    type Response: Send + 'static;
    /// Prepared, per-instance call target.
    type Target: Send + Sync + 'static;

    /// Validate an instance address and prepare a target for it.
    fn prepare(&self, instance: &Instance) -> Result<Self::Target, ConstructionError>;

    /// Perform the call against a prepared target.
    fn call<'a>(
        &'a self,
        target: &'a Self::Target,
        request: &'a Self::Request,
    ) -> BoxFuture<'a, Result<Self::Response, TransportError>>;
}
