//! `sharedstore demo`
//!
//! Spawns workers that each write one key, waits for the owner to see every
//! write, then asks each worker for its mirror over the same channel the
//! storage protocol uses.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use sharedstore_core::{
    Config, ExecutionContext, SharedStorage, Snapshot, StorageError, WorkerId, WorkerScope,
};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval, timeout};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What every context held once the demo settled
#[derive(Debug)]
pub struct DemoReport {
    pub owner: Snapshot,
    pub mirrors: Vec<(WorkerId, Snapshot)>,
}

impl DemoReport {
    /// True when every mirror matches the owner slot for slot
    pub fn converged(&self) -> bool {
        self.mirrors.iter().all(|(_, mirror)| *mirror == self.owner)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&render_snapshot("owner", &self.owner));
        for (id, mirror) in &self.mirrors {
            out.push_str(&render_snapshot(&id.to_string(), mirror));
        }
        out
    }
}

fn render_snapshot(label: &str, snapshot: &Snapshot) -> String {
    let mut out = format!("{} ({} entries)\n", label, snapshot.len());
    for (index, slot) in snapshot.slots().iter().enumerate() {
        match slot {
            Some(entry) => out.push_str(&format!("  [{}] {} = {}\n", index, entry.key, entry.value)),
            None => out.push_str(&format!("  [{}] <vacant>\n", index)),
        }
    }
    out
}

fn is_kind(message: &Value, kind: &str) -> bool {
    message.get("kind").and_then(Value::as_str) == Some(kind)
}

async fn next_of_kind(inbox: &mut broadcast::Receiver<Value>, kind: &str) -> Option<Value> {
    loop {
        match inbox.recv().await {
            Ok(message) if is_kind(&message, kind) => return Some(message),
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Body of each spawned worker
async fn demo_worker(scope: WorkerScope) -> Result<(), StorageError> {
    let id = scope.id();
    let (storage, task) = scope.init_storage();
    let mut inbox = storage.subscribe_messages()?;

    storage.ready().await?;
    let bootstrapped = storage.len().await?;
    debug!(worker = %id, entries = bootstrapped, "Worker bootstrapped");
    storage
        .set_item(&id.to_string(), json!({ "worker": id.0 }))
        .await?;

    if next_of_kind(&mut inbox, "report").await.is_none() {
        return Err(StorageError::ContextClosed);
    }
    let mirror = storage.snapshot().await?;
    storage.post_message(json!({ "kind": "mirror", "snapshot": mirror }))?;

    storage.shutdown().await?;
    let _ = task.await;
    Ok(())
}

async fn wait_for_len(storage: &SharedStorage, expected: usize) -> Result<()> {
    let mut ticks = interval(POLL_INTERVAL);
    loop {
        ticks.tick().await;
        if storage.len().await? >= expected {
            return Ok(());
        }
    }
}

/// Run an owner with `workers` workers until every mirror has settled
pub async fn run_demo(config: &Config, workers: usize) -> Result<DemoReport> {
    if workers == 0 {
        bail!("demo needs at least one worker");
    }
    let settle = config.cli.settle_timeout;
    let (owner, owner_task) = SharedStorage::init(ExecutionContext::Owner, &config.context);

    let mut spawned = Vec::with_capacity(workers);
    for _ in 0..workers {
        let (handle, task) = owner.spawn_worker(demo_worker).await?;
        let inbox = handle.subscribe();
        spawned.push((handle, inbox, task));
    }
    info!(workers, "Spawned demo workers");

    timeout(settle, wait_for_len(&owner, workers))
        .await
        .with_context(|| format!("owner did not see every write within {:?}", settle))??;
    let owner_snapshot = owner.snapshot().await?;

    for (handle, _, _) in &spawned {
        handle.post_message(json!({ "kind": "report" }))?;
    }

    let mut mirrors = Vec::with_capacity(workers);
    for (handle, mut inbox, task) in spawned {
        let message = timeout(settle, next_of_kind(&mut inbox, "mirror"))
            .await
            .with_context(|| format!("{} did not report its mirror", handle.id()))?
            .with_context(|| format!("{} closed its channel", handle.id()))?;
        let mirror: Snapshot = serde_json::from_value(message["snapshot"].clone())
            .with_context(|| format!("{} sent a malformed mirror", handle.id()))?;
        task.await??;
        mirrors.push((handle.id(), mirror));
    }

    owner.shutdown().await?;
    owner_task.await?;

    Ok(DemoReport {
        owner: owner_snapshot,
        mirrors,
    })
}
