/*
    owner.rs - Canonical store held by the owner context

    Flow for any mutation, local or requested by a worker:
    1. Apply to the canonical entry table
    2. Send `updateStorage(full snapshot)` to every registered worker,
       the worker that asked for the change included

    Flow for bootstrap:
    1. A new worker sends `requestUpdate()`
    2. Reply to that worker only with `updateStorage(full snapshot)`

    `clear()` is a sequence of `remove_item` calls and therefore broadcasts
    once per removed key.
*/

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use super::entries::{EntryTable, Snapshot};
use super::ready::ReadyHandler;
use super::registry::{WorkerId, WorkerLink, WorkerRegistry};
use super::StorageArea;
use crate::metrics::{BROADCASTS_SENT, MESSAGES_UNKNOWN_OPERATION, SNAPSHOT_ENTRIES};
use crate::protocol::{Envelope, Operation, ProtocolError};

/// How the owner handles a `removeItem` request coming from a worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveDispatch {
    /// Remove the key from the canonical store
    #[default]
    Remove,
    /// Route the request through the set handler with the same positional
    /// arguments. The key ends up stored with whatever the second argument
    /// was (`null` when absent) instead of being removed.
    LegacySetItem,
}

/// Canonical store plus the workers it replicates to
#[derive(Debug, Default)]
pub struct OwnerStore {
    entries: EntryTable,
    registry: WorkerRegistry,
    remove_dispatch: RemoveDispatch,
}

impl OwnerStore {
    pub fn new(remove_dispatch: RemoveDispatch) -> Self {
        OwnerStore {
            entries: EntryTable::new(),
            registry: WorkerRegistry::new(),
            remove_dispatch,
        }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn allocate_worker_id(&mut self) -> WorkerId {
        self.registry.allocate_id()
    }

    pub fn register_worker(&mut self, link: WorkerLink) {
        self.registry.register(link);
    }

    /// Dispatch a protocol message received from a worker
    pub fn handle_envelope(&mut self, from: WorkerId, envelope: Envelope) {
        let operation = match envelope.operation() {
            Ok(operation) => operation,
            Err(e) => {
                counter!(MESSAGES_UNKNOWN_OPERATION).increment(1);
                warn!(worker = %from, operation = %envelope.operation, error = %e, "Ignoring protocol message");
                return;
            }
        };

        trace!(worker = %from, %operation, "Owner received protocol message");
        if let Err(e) = self.dispatch(from, operation, &envelope) {
            debug!(worker = %from, %operation, error = %e, "Dropping protocol message");
        }
    }

    fn dispatch(
        &mut self,
        from: WorkerId,
        operation: Operation,
        envelope: &Envelope,
    ) -> Result<(), ProtocolError> {
        match operation {
            Operation::SetItem => {
                let key = envelope.key_arg(0)?.to_string();
                self.set_item(&key, envelope.value_arg(1));
            }
            Operation::RemoveItem => {
                let key = envelope.key_arg(0)?.to_string();
                match self.remove_dispatch {
                    RemoveDispatch::Remove => self.remove_item(&key),
                    RemoveDispatch::LegacySetItem => self.set_item(&key, envelope.value_arg(1)),
                }
            }
            Operation::RequestUpdate => self.request_update(from),
            Operation::UpdateStorage => {
                debug!(worker = %from, "Owner does not accept snapshots from workers");
            }
        }
        Ok(())
    }

    /// Answer a bootstrap request from one worker
    fn request_update(&mut self, from: WorkerId) {
        let envelope = match Envelope::update_storage(&self.entries.snapshot()) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "Failed to encode snapshot");
                return;
            }
        };
        match self.registry.send_to(from, &envelope) {
            Ok(()) => debug!(worker = %from, entries = self.entries.len(), "Sent bootstrap snapshot"),
            Err(e) => warn!(worker = %from, error = %e, "Failed to send bootstrap snapshot"),
        }
    }

    /// Send the full snapshot to every registered worker
    fn broadcast(&mut self) {
        if self.registry.is_empty() {
            return;
        }

        let snapshot = self.entries.snapshot();
        histogram!(SNAPSHOT_ENTRIES).record(snapshot.len() as f64);

        let envelope = match Envelope::update_storage(&snapshot) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "Failed to encode snapshot");
                return;
            }
        };
        match self.registry.broadcast(&envelope) {
            Ok(delivered) => {
                counter!(BROADCASTS_SENT).increment(delivered as u64);
                trace!(delivered, "Broadcast snapshot");
            }
            Err(e) => error!(error = %e, "Failed to broadcast snapshot"),
        }
    }
}

impl StorageArea for OwnerStore {
    fn get_item(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: Value) {
        self.entries.set(key, value);
        self.broadcast();
    }

    fn remove_item(&mut self, key: &str) {
        self.entries.remove(key);
        self.broadcast();
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

    fn set_on_ready(&mut self, _handler: ReadyHandler) -> bool {
        debug!("Ready handlers have no effect on the owner");
        false
    }
}
