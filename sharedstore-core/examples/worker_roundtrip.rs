//! Minimal embedding of SharedStore: one owner, two spawned workers
//!
//! Run with: cargo run --example worker_roundtrip
//! Set RUST_LOG=debug to watch snapshots move between contexts.

use serde_json::json;
use sharedstore_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use sharedstore_core::{ContextConfig, ExecutionContext, SharedStorage, StorageError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_with_config(LogConfig::new(LogLevel::Info))?;

    let config = ContextConfig::default();
    let (owner, owner_task) = SharedStorage::init(ExecutionContext::Owner, &config);
    owner.set_item("motd", "hello from the owner").await?;

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let (_handle, task) = owner
            .spawn_worker(|scope| async move {
                let id = scope.id();
                let (storage, storage_task) = scope.init_storage();
                storage.ready().await?;

                let motd = storage.get_item("motd").await?;
                info!(worker = %id, ?motd, "Worker read shared value");
                storage.set_item(&id.to_string(), json!("checked in")).await?;

                storage.shutdown().await?;
                let _ = storage_task.await;
                Ok::<_, StorageError>(())
            })
            .await?;
        tasks.push(task);
    }

    for task in tasks {
        task.await??;
    }

    // Worker writes are applied by the owner asynchronously.
    while owner.len().await? < 3 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    for index in 0..owner.snapshot().await?.slots().len() {
        if let Some(key) = owner.key(index).await? {
            let value = owner.get_item(&key).await?;
            info!(index, key = %key, ?value, "Owner entry");
        }
    }

    owner.shutdown().await?;
    owner_task.await?;
    Ok(())
}
