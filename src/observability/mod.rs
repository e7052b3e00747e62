//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! endpoint stages, endpoint set, breakers, dispatcher produce:
//!     → tracing events inside per-component spans
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Each component carries its own span (service, operation, peer address)
//!   so events are attributed without global logger state
//! - Call IDs flow from the dispatcher span into every attempt
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
