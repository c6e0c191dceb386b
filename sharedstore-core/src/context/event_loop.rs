/*
    Event loop - the single task that owns a context's store

    Each context (the owner, every worker) runs exactly one of these. It
    selects over two sources and handles one item at a time:

    ┌──────────────────────┐      ┌────────────────────────────────┐
    │ SharedStorage handle │      │ inbound ports                  │
    │ (application calls)  │      │ owner: one per registered      │
    └──────────┬───────────┘      │        worker (StreamMap)      │
               │ StorageCommand   │ worker: the port to the owner  │
               │                  └───────────────┬────────────────┘
               ▼                                  ▼ ChannelAdapter
        ┌────────────────────────────────────────────────────┐
        │ StorageContext::run                                │
        │   StoreRole::Owner(OwnerStore)                     │
        │   StoreRole::Replica(ReplicaStore)                 │
        └────────────────────────────────────────────────────┘

    No locks: the store is only ever touched from inside this loop.
*/

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, info};

use super::error::StorageError;
use super::worker::WorkerHandle;
use crate::protocol::{ChannelAdapter, Delivery, MessagePort};
use crate::store::{
    OwnerStore, ReadyHandler, ReplicaState, ReplicaStore, Snapshot, StorageArea, WorkerId,
    WorkerLink,
};

/// Commands sent from a handle to its context
pub(crate) enum StorageCommand {
    GetItem {
        key: String,
        respond_to: oneshot::Sender<Option<Value>>,
    },
    SetItem {
        key: String,
        value: Value,
        respond_to: oneshot::Sender<()>,
    },
    RemoveItem {
        key: String,
        respond_to: oneshot::Sender<()>,
    },
    Clear {
        respond_to: oneshot::Sender<()>,
    },
    Key {
        index: usize,
        respond_to: oneshot::Sender<Option<String>>,
    },
    Length {
        respond_to: oneshot::Sender<usize>,
    },
    Snapshot {
        respond_to: oneshot::Sender<Snapshot>,
    },
    OnReady {
        handler: ReadyHandler,
        respond_to: oneshot::Sender<bool>,
    },
    HasReadyHandler {
        respond_to: oneshot::Sender<bool>,
    },
    ReplicaState {
        respond_to: oneshot::Sender<Option<ReplicaState>>,
    },
    RegisterWorker {
        port: MessagePort,
        respond_to: oneshot::Sender<Result<WorkerHandle, StorageError>>,
    },
    Workers {
        respond_to: oneshot::Sender<Vec<WorkerId>>,
    },
    Shutdown,
}

/// The store held by a context, chosen once at construction
#[derive(Debug)]
pub(crate) enum StoreRole {
    Owner(OwnerStore),
    Replica(ReplicaStore),
}

impl StoreRole {
    fn area(&self) -> &dyn StorageArea {
        match self {
            StoreRole::Owner(store) => store,
            StoreRole::Replica(store) => store,
        }
    }

    fn area_mut(&mut self) -> &mut dyn StorageArea {
        match self {
            StoreRole::Owner(store) => store,
            StoreRole::Replica(store) => store,
        }
    }
}

/// Inbound traffic sources
pub(crate) enum Inbound {
    Owner {
        workers: StreamMap<WorkerId, UnboundedReceiverStream<Value>>,
        listener_capacity: usize,
    },
    Worker {
        rx: mpsc::UnboundedReceiver<Value>,
        adapter: ChannelAdapter,
    },
}

impl Inbound {
    /// Next payload and the worker it came from (`None` on the worker side)
    async fn next(&mut self) -> Option<(Option<WorkerId>, Value)> {
        match self {
            Inbound::Owner { workers, .. } => {
                let (id, data) = workers.next().await?;
                Some((Some(id), data))
            }
            Inbound::Worker { rx, .. } => rx.recv().await.map(|data| (None, data)),
        }
    }
}

pub(crate) struct StorageContext {
    role: StoreRole,
    command_rx: mpsc::Receiver<StorageCommand>,
    inbound: Inbound,
}

impl StorageContext {
    pub(crate) fn new(
        role: StoreRole,
        command_rx: mpsc::Receiver<StorageCommand>,
        inbound: Inbound,
    ) -> Self {
        StorageContext {
            role,
            command_rx,
            inbound,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Storage context started");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(StorageCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some((from, data)) = self.inbound.next() => self.handle_inbound(from, data),
            }
        }

        info!("Storage context stopped");
    }

    fn handle_command(&mut self, command: StorageCommand) {
        // A dropped receiver only means the caller stopped waiting.
        match command {
            StorageCommand::GetItem { key, respond_to } => {
                let _ = respond_to.send(self.role.area().get_item(&key));
            }
            StorageCommand::SetItem {
                key,
                value,
                respond_to,
            } => {
                self.role.area_mut().set_item(&key, value);
                let _ = respond_to.send(());
            }
            StorageCommand::RemoveItem { key, respond_to } => {
                self.role.area_mut().remove_item(&key);
                let _ = respond_to.send(());
            }
            StorageCommand::Clear { respond_to } => {
                self.role.area_mut().clear();
                let _ = respond_to.send(());
            }
            StorageCommand::Key { index, respond_to } => {
                let _ = respond_to.send(self.role.area().key(index));
            }
            StorageCommand::Length { respond_to } => {
                let _ = respond_to.send(self.role.area().len());
            }
            StorageCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.role.area().snapshot());
            }
            StorageCommand::OnReady {
                handler,
                respond_to,
            } => {
                let installed = self.role.area_mut().set_on_ready(handler);
                let _ = respond_to.send(installed);
            }
            StorageCommand::HasReadyHandler { respond_to } => {
                let _ = respond_to.send(self.role.area().has_on_ready());
            }
            StorageCommand::ReplicaState { respond_to } => {
                let state = match &self.role {
                    StoreRole::Replica(store) => Some(store.state()),
                    StoreRole::Owner(_) => None,
                };
                let _ = respond_to.send(state);
            }
            StorageCommand::RegisterWorker { port, respond_to } => {
                let _ = respond_to.send(self.register_worker(port));
            }
            StorageCommand::Workers { respond_to } => {
                let ids = match &self.role {
                    StoreRole::Owner(store) => store.registry().ids(),
                    StoreRole::Replica(_) => Vec::new(),
                };
                let _ = respond_to.send(ids);
            }
            StorageCommand::Shutdown => {}
        }
    }

    /// Attach the protocol listener to a worker's channel and register it
    fn register_worker(&mut self, port: MessagePort) -> Result<WorkerHandle, StorageError> {
        let (store, workers, listener_capacity) = match (&mut self.role, &mut self.inbound) {
            (
                StoreRole::Owner(store),
                Inbound::Owner {
                    workers,
                    listener_capacity,
                },
            ) => (store, workers, *listener_capacity),
            _ => return Err(StorageError::NotOwner),
        };

        let id = store.allocate_worker_id();
        let (sender, rx) = port.split();
        let adapter = ChannelAdapter::new(listener_capacity);

        workers.insert(id, UnboundedReceiverStream::new(rx));
        store.register_worker(WorkerLink::new(id, sender.clone(), adapter.clone()));

        Ok(WorkerHandle::new(id, sender, adapter))
    }

    fn handle_inbound(&mut self, from: Option<WorkerId>, data: Value) {
        match (&mut self.role, &self.inbound, from) {
            (StoreRole::Owner(store), Inbound::Owner { .. }, Some(id)) => {
                let adapter = match store.registry().get(id) {
                    Some(link) => link.adapter.clone(),
                    None => {
                        debug!(worker = %id, "Message from unregistered worker dropped");
                        return;
                    }
                };
                if let Delivery::Protocol(envelope) = adapter.deliver(data) {
                    store.handle_envelope(id, envelope);
                }
            }
            (StoreRole::Replica(store), Inbound::Worker { adapter, .. }, None) => {
                if let Delivery::Protocol(envelope) = adapter.deliver(data) {
                    store.handle_envelope(envelope);
                }
            }
            _ => debug!("Inbound message does not match context role"),
        }
    }
}
