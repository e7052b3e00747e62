//! Resilient client-side service dispatch library

pub mod client;
pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod load_balancer;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use client::ServiceClient;
pub use config::schema::DispatchConfig;
pub use error::{DispatchError, DispatchResult, TransportError};
pub use resilience::CallContext;
