/*
   SharedStorage

   Single entry point application code uses to read and write the shared
   key-value store from whichever context it runs in.

   E.G: get_item(key) -> Option<Value>
        set_item(key, value)
        remove_item(key)
        clear()
        key(index) -> Option<String>

   Workflow:

   `SharedStorage::init` is called once per context. It picks the store role
   from the execution context (owner or spawned worker), spawns the context's
   event loop and returns a cloneable handle. Every handle method packages a
   StorageCommand, pushes it onto the event loop's channel and awaits the
   reply, so calls from one handle are applied in order.

   Owner:  init(ExecutionContext::Owner) -> spawn_worker(..) / register_worker(port)
   Worker: scope.init_storage()          -> ready().await -> get_item(..)
*/

use serde_json::Value;
use std::future::Future;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamMap;
use tracing::{info_span, Instrument};

use super::error::{StorageError, StorageResult};
use super::event_loop::{Inbound, StorageCommand, StorageContext, StoreRole};
use super::worker::{WorkerHandle, WorkerScope};
use crate::config::ContextConfig;
use crate::protocol::{ChannelAdapter, MessagePort, PortSender};
use crate::store::{OwnerStore, ReplicaState, ReplicaStore, Snapshot, WorkerId};

/// Which kind of context is being initialised
#[derive(Debug)]
pub enum ExecutionContext {
    /// The coordinating context holding the canonical store
    Owner,
    /// A spawned context, holding its end of the channel to the owner
    Worker(MessagePort),
}

impl ExecutionContext {
    pub fn is_worker(&self) -> bool {
        matches!(self, ExecutionContext::Worker(_))
    }
}

/// Worker-side channel access kept by the handle
#[derive(Debug, Clone)]
struct WorkerChannel {
    owner: PortSender,
    adapter: ChannelAdapter,
    ready: watch::Receiver<bool>,
}

/// Handle to a context's shared storage
#[derive(Debug, Clone)]
pub struct SharedStorage {
    command_tx: mpsc::Sender<StorageCommand>,
    channel: Option<WorkerChannel>,
    config: ContextConfig,
}

impl SharedStorage {
    /// Create the storage for this context and spawn its event loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(context: ExecutionContext, config: &ContextConfig) -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));

        let (role, inbound, channel, span) = match context {
            ExecutionContext::Owner => (
                StoreRole::Owner(OwnerStore::new(config.remove_dispatch)),
                Inbound::Owner {
                    workers: StreamMap::new(),
                    listener_capacity: config.listener_capacity,
                },
                None,
                info_span!("storage", role = "owner"),
            ),
            ExecutionContext::Worker(port) => {
                let (owner, rx) = port.split();
                let adapter = ChannelAdapter::new(config.listener_capacity);
                let replica = ReplicaStore::new(owner.clone());
                let ready = replica.ready_watch();
                (
                    StoreRole::Replica(replica),
                    Inbound::Worker {
                        rx,
                        adapter: adapter.clone(),
                    },
                    Some(WorkerChannel {
                        owner,
                        adapter,
                        ready,
                    }),
                    info_span!("storage", role = "worker"),
                )
            }
        };

        let context = StorageContext::new(role, command_rx, inbound);
        let handle = tokio::spawn(context.run().instrument(span));

        (
            SharedStorage {
                command_tx,
                channel,
                config: config.clone(),
            },
            handle,
        )
    }

    pub fn is_owner(&self) -> bool {
        self.channel.is_none()
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StorageCommand,
    ) -> StorageResult<T> {
        let (respond_to, response) = oneshot::channel();
        self.command_tx
            .send(build(respond_to))
            .await
            .map_err(|_| StorageError::ContextClosed)?;
        response.await.map_err(|_| StorageError::ContextClosed)
    }

    /// Value stored under `key`
    pub async fn get_item(&self, key: &str) -> StorageResult<Option<Value>> {
        let key = key.to_string();
        self.request(|respond_to| StorageCommand::GetItem { key, respond_to })
            .await
    }

    /// Insert or overwrite `key`
    pub async fn set_item(&self, key: &str, value: impl Into<Value>) -> StorageResult<()> {
        let key = key.to_string();
        let value = value.into();
        self.request(|respond_to| StorageCommand::SetItem {
            key,
            value,
            respond_to,
        })
        .await
    }

    /// Remove `key`
    pub async fn remove_item(&self, key: &str) -> StorageResult<()> {
        let key = key.to_string();
        self.request(|respond_to| StorageCommand::RemoveItem { key, respond_to })
            .await
    }

    /// Remove every key
    pub async fn clear(&self) -> StorageResult<()> {
        self.request(|respond_to| StorageCommand::Clear { respond_to })
            .await
    }

    /// Key stored at slot `index`
    pub async fn key(&self, index: usize) -> StorageResult<Option<String>> {
        self.request(|respond_to| StorageCommand::Key { index, respond_to })
            .await
    }

    /// Number of live entries
    pub async fn len(&self) -> StorageResult<usize> {
        self.request(|respond_to| StorageCommand::Length { respond_to })
            .await
    }

    pub async fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn snapshot(&self) -> StorageResult<Snapshot> {
        self.request(|respond_to| StorageCommand::Snapshot { respond_to })
            .await
    }

    /// Install the single-shot ready handler
    ///
    /// Returns whether the handler was installed. On the owner, or on a worker
    /// that already received its first snapshot, the handler is dropped.
    pub async fn on_ready<F>(&self, handler: F) -> StorageResult<bool>
    where
        F: FnOnce() + Send + 'static,
    {
        let handler = Box::new(handler);
        self.request(|respond_to| StorageCommand::OnReady {
            handler,
            respond_to,
        })
        .await
    }

    /// Whether a ready handler is installed and has not run yet
    pub async fn has_ready_handler(&self) -> StorageResult<bool> {
        self.request(|respond_to| StorageCommand::HasReadyHandler { respond_to })
            .await
    }

    /// Wait until this worker has applied its first snapshot
    ///
    /// Resolves immediately if that already happened, and immediately on the
    /// owner. Fails with `ReadyUnavailable` if the context stops first.
    pub async fn ready(&self) -> StorageResult<()> {
        let Some(channel) = &self.channel else {
            return Ok(());
        };
        let mut ready = channel.ready.clone();
        ready
            .wait_for(|bootstrapped| *bootstrapped)
            .await
            .map_err(|_| StorageError::ReadyUnavailable)?;
        Ok(())
    }

    /// Bootstrap state of a worker's mirror, `None` on the owner
    pub async fn replica_state(&self) -> StorageResult<Option<ReplicaState>> {
        self.request(|respond_to| StorageCommand::ReplicaState { respond_to })
            .await
    }

    /// Register a worker whose channel end is `port`
    ///
    /// From here on the worker receives every snapshot broadcast. Messages the
    /// worker posted before registration are processed once it completes.
    pub async fn register_worker(&self, port: MessagePort) -> StorageResult<WorkerHandle> {
        if !self.is_owner() {
            return Err(StorageError::NotOwner);
        }
        self.request(|respond_to| StorageCommand::RegisterWorker { port, respond_to })
            .await?
    }

    /// Create a worker context, register it, then start it
    ///
    /// Registration completes before `worker` begins running, so its
    /// bootstrap request is always answered.
    pub async fn spawn_worker<F, Fut>(
        &self,
        worker: F,
    ) -> StorageResult<(WorkerHandle, JoinHandle<Fut::Output>)>
    where
        F: FnOnce(WorkerScope) -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let (owner_end, worker_end) = MessagePort::pair();
        let handle = self.register_worker(owner_end).await?;

        let scope = WorkerScope::new(handle.id(), worker_end, self.config.clone());
        let span = info_span!("worker", id = %handle.id());
        let task = tokio::spawn(worker(scope).instrument(span));

        Ok((handle, task))
    }

    /// Workers currently registered with the owner
    pub async fn workers(&self) -> StorageResult<Vec<WorkerId>> {
        self.request(|respond_to| StorageCommand::Workers { respond_to })
            .await
    }

    /// Post an application message to the owner (workers only)
    pub fn post_message(&self, data: Value) -> StorageResult<()> {
        let channel = self.channel.as_ref().ok_or(StorageError::NotWorker)?;
        channel.owner.post_message(data)?;
        Ok(())
    }

    /// Listen for application messages from the owner (workers only)
    pub fn subscribe_messages(&self) -> StorageResult<broadcast::Receiver<Value>> {
        let channel = self.channel.as_ref().ok_or(StorageError::NotWorker)?;
        Ok(channel.adapter.subscribe())
    }

    /// Stop the context's event loop
    pub async fn shutdown(&self) -> StorageResult<()> {
        self.command_tx
            .send(StorageCommand::Shutdown)
            .await
            .map_err(|_| StorageError::ContextClosed)
    }
}
