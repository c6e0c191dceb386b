//! Test fixtures for creating common test objects
//!
//! `TestCluster` wires an owner context to a number of worker contexts in
//! the current runtime, keeping every worker's handle reachable from the
//! test body.

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use super::async_helpers::{assert_completes_within, eventually, DEFAULT_TEST_TIMEOUT};
use crate::config::ContextConfig;
use crate::context::{ExecutionContext, SharedStorage, WorkerHandle};
use crate::protocol::MessagePort;
use crate::store::{Entry, Snapshot};

/// Snapshot with every slot occupied, in the given order
pub fn snapshot_of(entries: &[(&str, Value)]) -> Snapshot {
    Snapshot::from_slots(
        entries
            .iter()
            .map(|(key, value)| Some(Entry::new(*key, value.clone())))
            .collect(),
    )
}

/// Snapshot with a vacant slot between two entries
pub fn snapshot_with_hole() -> Snapshot {
    Snapshot::from_slots(vec![
        Some(Entry::new("first", json!(1))),
        None,
        Some(Entry::new("third", json!({ "nested": [3] }))),
    ])
}

/// A worker context as seen from both ends of its channel
pub struct TestWorker {
    /// Owner-side handle
    pub handle: WorkerHandle,
    /// The worker's own storage
    pub storage: SharedStorage,
    pub task: JoinHandle<()>,
}

/// An owner plus registered, bootstrapped workers
pub struct TestCluster {
    pub owner: SharedStorage,
    pub owner_task: JoinHandle<()>,
    pub workers: Vec<TestWorker>,
    config: ContextConfig,
}

impl TestCluster {
    /// Start an owner and `workers` workers with default settings
    pub async fn start(workers: usize) -> Self {
        Self::with_config(workers, ContextConfig::default()).await
    }

    pub async fn with_config(workers: usize, config: ContextConfig) -> Self {
        let (owner, owner_task) = SharedStorage::init(ExecutionContext::Owner, &config);
        let mut cluster = TestCluster {
            owner,
            owner_task,
            workers: Vec::with_capacity(workers),
            config,
        };
        for _ in 0..workers {
            cluster.add_worker().await;
        }
        cluster
    }

    /// Attach one more worker and wait for its bootstrap
    pub async fn add_worker(&mut self) -> &TestWorker {
        let (owner_end, worker_end) = MessagePort::pair();
        let (storage, task) = SharedStorage::init(ExecutionContext::Worker(worker_end), &self.config);
        let handle = self
            .owner
            .register_worker(owner_end)
            .await
            .expect("owner accepts workers");

        assert_completes_within(DEFAULT_TEST_TIMEOUT, storage.ready())
            .await
            .expect("worker bootstraps");

        self.workers.push(TestWorker {
            handle,
            storage,
            task,
        });
        &self.workers[self.workers.len() - 1]
    }

    pub fn worker(&self, index: usize) -> &SharedStorage {
        &self.workers[index].storage
    }

    /// The owner followed by every worker
    pub fn contexts(&self) -> Vec<&SharedStorage> {
        std::iter::once(&self.owner)
            .chain(self.workers.iter().map(|w| &w.storage))
            .collect()
    }

    /// Wait until every context reports `expected` for `key`
    pub async fn converges_on(&self, key: &str, expected: Option<Value>) -> bool {
        let contexts: Vec<SharedStorage> = self.contexts().into_iter().cloned().collect();
        eventually(DEFAULT_TEST_TIMEOUT, || {
            let contexts = contexts.clone();
            let expected = expected.clone();
            async move {
                for storage in &contexts {
                    match storage.get_item(key).await {
                        Ok(value) if value == expected => {}
                        _ => return false,
                    }
                }
                true
            }
        })
        .await
    }

    /// Wait until every worker's mirror equals the owner's snapshot
    pub async fn converged(&self) -> bool {
        let owner = self.owner.clone();
        let workers: Vec<SharedStorage> = self.workers.iter().map(|w| w.storage.clone()).collect();
        eventually(DEFAULT_TEST_TIMEOUT, || {
            let owner = owner.clone();
            let workers = workers.clone();
            async move {
                let Ok(expected) = owner.snapshot().await else {
                    return false;
                };
                for storage in &workers {
                    match storage.snapshot().await {
                        Ok(mirror) if mirror == expected => {}
                        _ => return false,
                    }
                }
                true
            }
        })
        .await
    }

    /// Stop every context and wait for the loops to exit
    pub async fn shutdown(self) {
        for worker in self.workers {
            let _ = worker.storage.shutdown().await;
            let _ = worker.task.await;
        }
        let _ = self.owner.shutdown().await;
        let _ = self.owner_task.await;
    }
}
