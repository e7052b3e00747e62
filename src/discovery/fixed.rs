//! Fixed instance list.

use tokio::sync::mpsc;

use crate::discovery::{DiscoveryEvent, EventStream, Instance, Instancer};

/// Instancer over a list that never changes.
///
/// Each subscription receives one `Added` per instance and then ends.
#[derive(Debug, Clone, Default)]
pub struct FixedInstancer {
    instances: Vec<Instance>,
}

impl FixedInstancer {
    pub fn new<I, S>(instances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Instance>,
    {
        Self {
            instances: instances.into_iter().map(Into::into).collect(),
        }
    }
}

impl Instancer for FixedInstancer {
    fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        for instance in &self.instances {
            // Receiver is still in scope, send cannot fail.
            let _ = tx.send(DiscoveryEvent::Added(instance.clone()));
        }
        rx
    }
}
