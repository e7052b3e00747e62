//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::LoadBalancer;

/// Round-robin selector.
/// Stores an internal counter to rotate through endpoints.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        // Snapshot size can change between calls; modulo keeps us in range.
        Some(self.counter.fetch_add(1, Ordering::Relaxed) % len)
    }

    fn strategy(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::Pick;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let endpoints = ["http://127.0.0.1:8080", "http://127.0.0.1:8081"];

        assert_eq!(lb.pick(&endpoints), Ok(&endpoints[0]));
        assert_eq!(lb.pick(&endpoints), Ok(&endpoints[1]));
        assert_eq!(lb.pick(&endpoints), Ok(&endpoints[0]));
    }

    #[test]
    fn test_shrinking_snapshot_stays_in_range() {
        let lb = RoundRobin::new();
        let three = ["a", "b", "c"];
        let one = ["a"];
        lb.pick(&three).unwrap();
        lb.pick(&three).unwrap();
        assert_eq!(lb.pick(&one), Ok(&"a"));
    }
}
