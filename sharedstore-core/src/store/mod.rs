/*
    Store subsystem - the data each context holds and how it changes

    Two roles share one surface (`StorageArea`):
    - OwnerStore: canonical data, fans every change out to all workers
    - ReplicaStore: a worker's mirror, forwards its own changes to the owner

    Neither role does any I/O beyond posting on ports, which never blocks,
    so every method here runs to completion inside its context's event loop.
*/

pub mod entries;
pub mod owner;
pub mod ready;
pub mod registry;
pub mod replica;

pub use entries::{Entry, EntryTable, Snapshot};
pub use owner::{OwnerStore, RemoveDispatch};
pub use ready::{ReadyHandler, ReadySignal};
pub use registry::{WorkerId, WorkerLink, WorkerRegistry};
pub use replica::{ReplicaState, ReplicaStore};

use serde_json::Value;

/// Storage operations available on every context
pub trait StorageArea: Send {
    /// Value stored under `key`
    fn get_item(&self, key: &str) -> Option<Value>;

    /// Insert or overwrite `key`
    fn set_item(&mut self, key: &str, value: Value);

    /// Remove `key`; missing keys are a no-op
    fn remove_item(&mut self, key: &str);

    /// Remove every key, one `remove_item` per key
    fn clear(&mut self);

    /// Key at slot `index`
    fn key(&self, index: usize) -> Option<String>;

    /// Number of live entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Snapshot;

    /// Install the single-shot ready handler
    ///
    /// Returns false when the handler was dropped without being installed.
    fn set_on_ready(&mut self, handler: ReadyHandler) -> bool;

    /// Whether a ready handler is installed and still waiting to run
    fn has_on_ready(&self) -> bool {
        false
    }
}
