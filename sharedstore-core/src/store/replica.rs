/*
    replica.rs - A worker's mirror of the canonical store

    Lifecycle:

        Uninitialized --send requestUpdate--> AwaitingBootstrap
        AwaitingBootstrap --first updateStorage--> SyncedReady (ready fires)
        SyncedReady --next updateStorage--> Synced

    Local mutations are applied immediately and forwarded to the owner. The
    owner's broadcast that follows replaces the mirror wholesale, so the
    optimistic apply and the echo always agree once traffic stops.
*/

use metrics::counter;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::entries::{EntryTable, Snapshot};
use super::ready::{ReadyHandler, ReadySignal};
use super::StorageArea;
use crate::metrics::MESSAGES_UNKNOWN_OPERATION;
use crate::protocol::{Envelope, Operation, PortSender};

/// Where a replica is in its bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaState {
    Uninitialized,
    AwaitingBootstrap,
    /// First snapshot applied, ready signal fired
    SyncedReady,
    Synced,
}

#[derive(Debug)]
pub struct ReplicaStore {
    entries: EntryTable,
    owner: PortSender,
    state: ReplicaState,
    ready: ReadySignal,
}

impl ReplicaStore {
    /// Create a replica and ask the owner for its current data
    pub fn new(owner: PortSender) -> Self {
        let mut replica = ReplicaStore {
            entries: EntryTable::new(),
            owner,
            state: ReplicaState::Uninitialized,
            ready: ReadySignal::new(),
        };
        replica.request_update();
        replica
    }

    pub fn state(&self) -> ReplicaState {
        self.state
    }

    /// Receiver that turns `true` once the first snapshot was applied
    pub fn ready_watch(&self) -> watch::Receiver<bool> {
        self.ready.watch()
    }

    fn request_update(&mut self) {
        if let Err(e) = self.owner.post_envelope(&Envelope::request_update()) {
            warn!(error = %e, "Failed to request bootstrap snapshot");
        }
        self.state = ReplicaState::AwaitingBootstrap;
    }

    /// Dispatch a protocol message received from the owner
    pub fn handle_envelope(&mut self, envelope: Envelope) {
        match envelope.operation() {
            Ok(Operation::UpdateStorage) => match envelope.snapshot_arg(0) {
                Ok(snapshot) => self.update_storage(snapshot),
                Err(e) => debug!(error = %e, "Dropping malformed snapshot"),
            },
            Ok(operation) => {
                debug!(%operation, "Replica does not handle this operation");
            }
            Err(e) => {
                counter!(MESSAGES_UNKNOWN_OPERATION).increment(1);
                warn!(operation = %envelope.operation, error = %e, "Ignoring protocol message");
            }
        }
    }

    /// Replace the mirror with a snapshot from the owner
    ///
    /// Nothing is sent back to the owner.
    pub fn update_storage(&mut self, snapshot: Snapshot) {
        trace!(entries = snapshot.len(), "Applying snapshot");
        self.entries = EntryTable::from_snapshot(snapshot);

        match self.state {
            ReplicaState::Uninitialized | ReplicaState::AwaitingBootstrap => {
                self.state = ReplicaState::SyncedReady;
                let notified = self.ready.fire();
                info!(entries = self.entries.len(), notified, "Replica bootstrapped");
            }
            ReplicaState::SyncedReady | ReplicaState::Synced => {
                self.state = ReplicaState::Synced;
            }
        }
    }

    fn notify_owner(&self, envelope: Envelope) {
        if let Err(e) = self.owner.post_envelope(&envelope) {
            warn!(operation = %envelope.operation, error = %e, "Failed to notify owner");
        }
    }
}

impl StorageArea for ReplicaStore {
    fn get_item(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: Value) {
        self.entries.set(key, value.clone());
        self.notify_owner(Envelope::set_item(key, value));
    }

    fn remove_item(&mut self, key: &str) {
        self.entries.remove(key);
        self.notify_owner(Envelope::remove_item(key));
    }

    fn clear(&mut self) {
        for key in self.entries.keys() {
            self.remove_item(&key);
        }
    }

    fn key(&self, index: usize) -> Option<String> {
        self.entries.key(index).map(str::to_string)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn snapshot(&self) -> Snapshot {
        self.entries.snapshot()
    }

    fn set_on_ready(&mut self, handler: ReadyHandler) -> bool {
        let installed = self.ready.set(handler);
        if !installed {
            debug!("Replica already bootstrapped, ready handler dropped");
        }
        installed
    }

    fn has_on_ready(&self) -> bool {
        self.ready.is_set()
    }
}
