//! Error taxonomy for dispatch.
//!
//! Only [`DispatchError`] ever reaches callers of a service client.
//! [`ConstructionError`] stays inside the endpoint set: a discovered instance
//! that cannot be turned into an endpoint is logged and skipped.

use thiserror::Error;

use crate::discovery::Instance;

/// Failure reported by a transport adapter for a single wire call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The call did not complete before its deadline.
    #[error("request timed out")]
    Timeout,

    /// The peer could not be reached or the connection broke mid-call.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The peer answered with a non-success status.
    #[error("remote returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request could not be encoded or the response decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

/// Errors surfaced by endpoints and by the retry dispatcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The snapshot was empty at pick time.
    #[error("no endpoints available")]
    NoEndpoints,

    /// The endpoint's circuit breaker refused admission.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The transport call failed or timed out.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The overall call deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Whether the retry loop may try another endpoint after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::NoEndpoints | DispatchError::CircuitOpen | DispatchError::Transport(_)
        )
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// An endpoint could not be built for a discovered instance.
#[derive(Debug, Error)]
#[error("cannot build endpoint for instance {instance}: {reason}")]
pub struct ConstructionError {
    pub instance: Instance,
    pub reason: String,
}

impl ConstructionError {
    pub fn new(instance: &Instance, reason: impl Into<String>) -> Self {
        Self {
            instance: instance.clone(),
            reason: reason.into(),
        }
    }
}
