//! SharedStore: a key-value store replicated between an owner context and
//! the worker contexts it spawns.
//!
//! The owner holds the canonical data. Each worker keeps a full mirror,
//! bootstrapped on startup and replaced by every snapshot the owner
//! broadcasts. Reads are served locally everywhere; writes from a worker
//! are applied optimistically and forwarded to the owner.

pub mod config;
pub mod context;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod store;
pub mod test_utils;

pub use config::{Config, ContextConfig};
pub use context::{
    ExecutionContext, SharedStorage, StorageError, StorageResult, WorkerHandle, WorkerScope,
};
pub use logging::{init_logging, LogLevel};
pub use protocol::{Envelope, MessagePort, API_TAG};
pub use store::{RemoveDispatch, ReplicaState, Snapshot, WorkerId};
