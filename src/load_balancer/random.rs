//! Uniform random load balancing strategy.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::LoadBalancer;

/// Random selector.
/// One generator, seeded once, shared by every caller.
#[derive(Debug)]
pub struct RandomBalancer {
    rng: Mutex<StdRng>,
}

impl RandomBalancer {
    /// Seed explicitly, or from OS entropy when `seed` is None.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng: Mutex::new(rng) }
    }
}

impl Default for RandomBalancer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LoadBalancer for RandomBalancer {
    fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Some(rng.gen_range(0..len))
    }

    fn strategy(&self) -> &'static str {
        "random"
    }
}
