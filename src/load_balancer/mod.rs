//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher attempt
//!     → endpoint set snapshot (immutable slice)
//!     → Apply load balancing algorithm:
//!         - random.rs (uniform pick, default)
//!         - round_robin.rs (rotate through endpoints)
//!     → Return endpoint reference or NoEndpoints
//! ```
//!
//! # Design Decisions
//! - Load balancer only sees the snapshot it is handed; it never tracks
//!   membership
//! - Breaker state is ignored on purpose: an open endpoint can be picked and
//!   its own gate rejects the call, so failure distribution matches the
//!   per-endpoint health model
//! - Algorithm selected per client from configuration

use crate::config::{BalancerConfig, BalancerStrategy};
use crate::error::{DispatchError, DispatchResult};

pub mod random;
pub mod round_robin;

pub use random::RandomBalancer;
pub use round_robin::RoundRobin;

/// Selection policy over a snapshot of `len` endpoints.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Index of the next endpoint, or None when `len` is zero.
    fn next_index(&self, len: usize) -> Option<usize>;

    /// Policy name for spans and logs.
    fn strategy(&self) -> &'static str;
}

/// Pick an element of a snapshot through any balancer.
pub trait Pick {
    fn pick<'a, T>(&self, snapshot: &'a [T]) -> DispatchResult<&'a T>;
}

impl<L: LoadBalancer + ?Sized> Pick for L {
    fn pick<'a, T>(&self, snapshot: &'a [T]) -> DispatchResult<&'a T> {
        self.next_index(snapshot.len())
            .and_then(|index| snapshot.get(index))
            .ok_or(DispatchError::NoEndpoints)
    }
}

/// Build the configured balancer.
pub fn from_config(config: &BalancerConfig) -> Box<dyn LoadBalancer> {
    match config.strategy {
        BalancerStrategy::Random => Box::new(RandomBalancer::new(config.seed)),
        BalancerStrategy::RoundRobin => Box::new(RoundRobin::new()),
    }
}
