//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DispatchConfig (validated, immutable)
//!     → sections handed to breaker, retries, balancer, transport
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; instance membership changes flow
//!   through discovery, not through config reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::BalancerConfig;
pub use schema::BalancerStrategy;
pub use schema::BreakerConfig;
pub use schema::DiscoveryConfig;
pub use schema::DispatchConfig;
pub use schema::ObservabilityConfig;
pub use schema::RetryConfig;
pub use schema::ServiceConfig;
pub use schema::TransportConfig;
