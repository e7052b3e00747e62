//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Logical call:
//!     → retries.rs (attempt loop, retry budget, overall deadline)
//!     → timeouts.rs (per-attempt deadline, cancellation scope)
//!     → endpoint pipeline → circuit_breaker.rs (admission, outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every transport call has a deadline
//! - Circuit breaker is per endpoint and prevents cascading failures
//! - Retries re-pick an endpoint every attempt
//! - All resilience logic is composable stages

pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState};
pub use retries::{RetryDispatcher, RetryPolicy};
pub use timeouts::CallContext;
