//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! discovery backend (fixed list / registry / watched file)
//!     → Instancer::subscribe() hands out an event channel
//!     → DiscoveryEvent::{Added, Removed} in arrival order
//!     → endpoint::set consumes the channel on a single task
//! ```
//!
//! # Design Decisions
//! - Events carry one instance each; the consumer owns idempotency
//! - Every subscriber gets its own channel, starting with the current
//!   membership replayed as `Added`
//! - Unbounded channels: membership churn is tiny next to call volume

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::DiscoveryConfig;

pub mod file;
pub mod fixed;
pub mod registry;

pub use file::FileInstancer;
pub use fixed::FixedInstancer;
pub use registry::InstanceRegistry;

/// Opaque address of one reachable service replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instance(String);

impl Instance {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Instance {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for Instance {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A membership change reported by a discovery backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Added(Instance),
    Removed(Instance),
}

/// Receiving half of a discovery subscription.
pub type EventStream = mpsc::UnboundedReceiver<DiscoveryEvent>;

/// A source of membership events for one logical service.
pub trait Instancer: Send + Sync {
    /// Open a new subscription. The stream ends when the backend shuts down.
    fn subscribe(&self) -> EventStream;
}

/// Build the configured discovery backend. A watched file takes precedence
/// over the static list.
pub fn from_config(config: &DiscoveryConfig) -> Box<dyn Instancer> {
    match &config.watch_file {
        Some(path) => Box::new(FileInstancer::new(path)),
        None => Box::new(FixedInstancer::new(config.instances.iter().map(String::as_str))),
    }
}
