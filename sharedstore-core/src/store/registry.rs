/*
    registry.rs - Workers known to the owner

    Every worker registered after the owner store was created ends up here
    and receives every broadcast. A worker is only dropped from the registry
    once a send to it fails, which means its context has terminated.
*/

use metrics::gauge;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::metrics::WORKERS_REGISTERED;
use crate::protocol::{ChannelAdapter, ChannelError, Envelope, PortSender};

/// Identifier the owner assigns to a registered worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Owner-side view of one worker's channel
#[derive(Debug, Clone)]
pub struct WorkerLink {
    pub id: WorkerId,
    pub sender: PortSender,
    pub adapter: ChannelAdapter,
}

impl WorkerLink {
    pub fn new(id: WorkerId, sender: PortSender, adapter: ChannelAdapter) -> Self {
        WorkerLink { id, sender, adapter }
    }
}

/// Broadcast fan-out list
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: Vec<WorkerLink>,
    next_id: u64,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the id for the next registration
    pub fn allocate_id(&mut self) -> WorkerId {
        self.next_id += 1;
        WorkerId(self.next_id)
    }

    pub fn register(&mut self, link: WorkerLink) {
        info!(worker = %link.id, "Registered worker");
        self.workers.push(link);
        gauge!(WORKERS_REGISTERED).set(self.workers.len() as f64);
    }

    pub fn get(&self, id: WorkerId) -> Option<&WorkerLink> {
        self.workers.iter().find(|link| link.id == id)
    }

    pub fn ids(&self) -> Vec<WorkerId> {
        self.workers.iter().map(|link| link.id).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Send to one worker, pruning it if it has terminated
    pub fn send_to(&mut self, id: WorkerId, envelope: &Envelope) -> Result<(), ChannelError> {
        let result = match self.get(id) {
            Some(link) => link.sender.post_envelope(envelope),
            None => {
                debug!(worker = %id, "Send to unknown worker ignored");
                return Ok(());
            }
        };
        if let Err(ChannelError::Disconnected) = result {
            self.prune(&[id]);
        }
        result
    }

    /// Send to every registered worker
    ///
    /// Returns the number of workers the envelope was posted to. Workers whose
    /// channel is closed are removed.
    pub fn broadcast(&mut self, envelope: &Envelope) -> Result<usize, ChannelError> {
        let payload = envelope.to_value()?;
        let mut delivered = 0;
        let mut terminated = Vec::new();

        for link in &self.workers {
            match link.sender.post_message(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => terminated.push(link.id),
            }
        }

        self.prune(&terminated);
        Ok(delivered)
    }

    fn prune(&mut self, terminated: &[WorkerId]) {
        if terminated.is_empty() {
            return;
        }
        self.workers.retain(|link| !terminated.contains(&link.id));
        for id in terminated {
            info!(worker = %id, "Worker terminated, removed from registry");
        }
        gauge!(WORKERS_REGISTERED).set(self.workers.len() as f64);
    }
}
