/*
    end_to_end.rs - Full owner/worker lifecycles

    Spawned workers, application traffic sharing the storage channel,
    terminated workers and the configurable remove handling.
*/

use serde_json::{json, Value};
use sharedstore_core::test_utils::{
    assert_completes_within, eventually, recv_broadcast_timeout, TestCluster,
    DEFAULT_TEST_TIMEOUT, SHORT_TEST_TIMEOUT,
};
use sharedstore_core::{
    ContextConfig, ExecutionContext, RemoveDispatch, SharedStorage, StorageError, API_TAG,
};

#[tokio::test]
async fn test_spawned_worker_reads_and_writes() {
    let config = ContextConfig::default();
    let (owner, owner_task) = SharedStorage::init(ExecutionContext::Owner, &config);
    owner.set_item("greeting", "hello").await.unwrap();

    let (handle, task) = owner
        .spawn_worker(|scope| async move {
            let id = scope.id();
            let (storage, storage_task) = scope.init_storage();
            storage.ready().await?;

            let greeting = storage.get_item("greeting").await?;
            storage.set_item("worker", json!(id.0)).await?;

            storage.shutdown().await?;
            let _ = storage_task.await;
            Ok::<_, StorageError>(greeting)
        })
        .await
        .unwrap();

    let greeting = assert_completes_within(DEFAULT_TEST_TIMEOUT, task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(greeting, Some(json!("hello")));

    let expected = Some(json!(handle.id().0));
    assert!(
        eventually(DEFAULT_TEST_TIMEOUT, || {
            let owner = owner.clone();
            let expected = expected.clone();
            async move { owner.get_item("worker").await.ok() == Some(expected) }
        })
        .await
    );

    owner.shutdown().await.unwrap();
    owner_task.await.unwrap();
}

#[tokio::test]
async fn test_application_messages_pass_through() {
    let cluster = TestCluster::start(1).await;
    let worker = &cluster.workers[0];

    let mut at_worker = worker.storage.subscribe_messages().unwrap();
    let mut at_owner = worker.handle.subscribe();

    worker
        .handle
        .post_message(json!({ "kind": "ping", "seq": 1 }))
        .unwrap();
    worker
        .storage
        .post_message(json!(["pong", 1]))
        .unwrap();

    assert_eq!(
        recv_broadcast_timeout(&mut at_worker, DEFAULT_TEST_TIMEOUT).await,
        Ok(json!({ "kind": "ping", "seq": 1 }))
    );
    assert_eq!(
        recv_broadcast_timeout(&mut at_owner, DEFAULT_TEST_TIMEOUT).await,
        Ok(json!(["pong", 1]))
    );

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_protocol_traffic_is_hidden_from_listeners() {
    let cluster = TestCluster::start(1).await;
    let worker = &cluster.workers[0];
    let mut at_worker = worker.storage.subscribe_messages().unwrap();
    let mut at_owner = worker.handle.subscribe();

    cluster.owner.set_item("k", "v").await.unwrap();
    worker.storage.set_item("w", 1).await.unwrap();
    assert!(cluster.converges_on("w", Some(json!(1))).await);

    assert!(recv_broadcast_timeout(&mut at_worker, SHORT_TEST_TIMEOUT)
        .await
        .is_err());
    assert!(recv_broadcast_timeout(&mut at_owner, SHORT_TEST_TIMEOUT)
        .await
        .is_err());

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_unknown_operation_is_ignored() {
    let cluster = TestCluster::start(1).await;
    let worker = &cluster.workers[0];
    let mut at_owner = worker.handle.subscribe();

    worker
        .storage
        .post_message(json!({ "tag": API_TAG, "operation": "frobnicate", "arguments": ["k"] }))
        .unwrap();
    worker.storage.set_item("after", true).await.unwrap();

    assert!(cluster.converges_on("after", Some(json!(true))).await);
    assert_eq!(cluster.owner.len().await.unwrap(), 1);
    assert!(recv_broadcast_timeout(&mut at_owner, SHORT_TEST_TIMEOUT)
        .await
        .is_err());

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_foreign_tag_is_application_traffic() {
    let cluster = TestCluster::start(1).await;
    let worker = &cluster.workers[0];
    let mut at_owner = worker.handle.subscribe();

    let lookalike = json!({ "tag": "sh-apis-something-else", "operation": "setItem", "arguments": ["k", 1] });
    worker.storage.post_message(lookalike.clone()).unwrap();

    assert_eq!(
        recv_broadcast_timeout(&mut at_owner, DEFAULT_TEST_TIMEOUT).await,
        Ok(lookalike)
    );
    assert_eq!(cluster.owner.get_item("k").await.unwrap(), None);

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_terminated_worker_is_pruned() {
    let mut cluster = TestCluster::start(2).await;
    let gone = cluster.workers.remove(1);
    let gone_id = gone.handle.id();

    gone.storage.shutdown().await.unwrap();
    gone.task.await.unwrap();
    assert!(gone.handle.is_terminated());

    cluster.owner.set_item("still", "here").await.unwrap();

    let workers = cluster.owner.workers().await.unwrap();
    assert!(!workers.contains(&gone_id));
    assert_eq!(workers.len(), 1);
    assert!(cluster.converges_on("still", Some(json!("here"))).await);

    assert!(matches!(
        gone.storage.get_item("still").await,
        Err(StorageError::ContextClosed)
    ));

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_legacy_remove_dispatch_stores_null() {
    let config = ContextConfig {
        remove_dispatch: RemoveDispatch::LegacySetItem,
        ..ContextConfig::default()
    };
    let cluster = TestCluster::with_config(1, config).await;
    cluster.owner.set_item("k", "v").await.unwrap();
    assert!(cluster.converges_on("k", Some(json!("v"))).await);

    cluster.worker(0).remove_item("k").await.unwrap();

    assert!(cluster.converges_on("k", Some(Value::Null)).await);
    assert_eq!(cluster.owner.len().await.unwrap(), 1);

    cluster.owner.remove_item("k").await.unwrap();
    assert!(cluster.converges_on("k", None).await);

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_role_restricted_calls() {
    let cluster = TestCluster::start(1).await;

    assert!(matches!(
        cluster.owner.post_message(json!("hi")),
        Err(StorageError::NotWorker)
    ));
    assert!(matches!(
        cluster.owner.subscribe_messages(),
        Err(StorageError::NotWorker)
    ));

    let (_owner_end, worker_end) = sharedstore_core::MessagePort::pair();
    assert!(matches!(
        cluster.worker(0).register_worker(worker_end).await,
        Err(StorageError::NotOwner)
    ));
    assert!(cluster.worker(0).workers().await.unwrap().is_empty());
    assert!(cluster.owner.is_owner());
    assert!(!cluster.worker(0).is_owner());

    cluster.shutdown().await;
}

#[tokio::test]
async fn test_worker_without_owner_never_becomes_ready() {
    let config = ContextConfig::default();
    let (owner_end, worker_end) = sharedstore_core::MessagePort::pair();
    let (worker, task) = SharedStorage::init(ExecutionContext::Worker(worker_end), &config);

    // Writes still apply locally while unbootstrapped.
    worker.set_item("local", 1).await.unwrap();
    assert_eq!(worker.get_item("local").await.unwrap(), Some(json!(1)));

    worker.shutdown().await.unwrap();
    task.await.unwrap();
    assert!(matches!(
        worker.ready().await,
        Err(StorageError::ReadyUnavailable)
    ));
    drop(owner_end);
}
