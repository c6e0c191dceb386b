//! Worker-facing types
//!
//! `WorkerHandle` is what the owner keeps for each registered worker.
//! `WorkerScope` is what a spawned worker receives: its id and its end of
//! the channel, ready to be turned into a worker-side storage context.

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::handle::{ExecutionContext, SharedStorage};
use crate::config::ContextConfig;
use crate::protocol::{ChannelAdapter, ChannelError, MessagePort, PortSender};
use crate::store::WorkerId;

/// Owner-side handle to a registered worker
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    sender: PortSender,
    adapter: ChannelAdapter,
}

impl WorkerHandle {
    pub(crate) fn new(id: WorkerId, sender: PortSender, adapter: ChannelAdapter) -> Self {
        WorkerHandle {
            id,
            sender,
            adapter,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Post an application message to the worker
    ///
    /// Shares the channel with protocol traffic; the worker's storage context
    /// hands it to the worker's application listeners.
    pub fn post_message(&self, data: Value) -> Result<(), ChannelError> {
        self.sender.post_message(data)
    }

    /// Listen for application messages coming from this worker
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.adapter.subscribe()
    }

    /// True once the worker's side of the channel is gone
    pub fn is_terminated(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Everything a freshly spawned worker starts with
#[derive(Debug)]
pub struct WorkerScope {
    id: WorkerId,
    port: MessagePort,
    config: ContextConfig,
}

impl WorkerScope {
    pub(crate) fn new(id: WorkerId, port: MessagePort, config: ContextConfig) -> Self {
        WorkerScope { id, port, config }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn into_context(self) -> ExecutionContext {
        ExecutionContext::Worker(self.port)
    }

    /// Start this worker's storage context with the owner's configuration
    pub fn init_storage(self) -> (SharedStorage, JoinHandle<()>) {
        let config = self.config.clone();
        SharedStorage::init(self.into_context(), &config)
    }
}
