//! In-process instance registry.
//!
//! # Responsibilities
//! - Track the current membership of one service
//! - Fan out register/deregister as events to every live subscriber
//! - Replay current membership to new subscribers

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::discovery::{DiscoveryEvent, EventStream, Instance, Instancer};

#[derive(Default)]
struct RegistryState {
    members: BTreeSet<Instance>,
    subscribers: Vec<mpsc::UnboundedSender<DiscoveryEvent>>,
}

impl RegistryState {
    fn broadcast(&mut self, event: DiscoveryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Registry that services (or tests) update directly.
#[derive(Default)]
pub struct InstanceRegistry {
    state: Mutex<RegistryState>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance. Returns false if it was already registered.
    pub fn register(&self, instance: impl Into<Instance>) -> bool {
        let instance = instance.into();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.members.insert(instance.clone()) {
            return false;
        }
        tracing::debug!(instance = %instance, "Instance registered");
        state.broadcast(DiscoveryEvent::Added(instance));
        true
    }

    /// Remove an instance. Returns false if it was not registered.
    pub fn deregister(&self, instance: impl Into<Instance>) -> bool {
        let instance = instance.into();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.members.remove(&instance) {
            return false;
        }
        tracing::debug!(instance = %instance, "Instance deregistered");
        state.broadcast(DiscoveryEvent::Removed(instance));
        true
    }

    /// Current membership, ordered by address.
    pub fn instances(&self) -> Vec<Instance> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.members.iter().cloned().collect()
    }

    /// Number of subscribers whose receiver is still alive.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

impl Instancer for InstanceRegistry {
    fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for instance in &state.members {
            let _ = tx.send(DiscoveryEvent::Added(instance.clone()));
        }
        state.subscribers.push(tx);
        rx
    }
}
