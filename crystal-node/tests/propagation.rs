mod common;

use common::{addr, local_registry, registry_with, settle, RecordingUpstream};
use crystal_node::{
    error::ShardError,
    registry::ShardRegistry,
    scheduler::RateLimit,
    storage::{DurableStore, FileStore, MemoryStore},
    strategy::{CounterStrategy, RegisterStrategy, Reply},
    telemetry::TracingReporter,
};
use crystal_types::{GCounterSet, PairSet};
use std::{sync::Arc, time::Duration};

#[tokio::test(start_paused = true)]
async fn test_burst_within_window_is_flushed_once() {
    let upstream = Arc::new(RecordingUpstream::<RegisterStrategy>::default());
    let registry = registry_with(upstream.clone());
    let leaf = registry.actor(&addr("pairs:3:1")).await.unwrap();

    leaf.put("a", Some("1".into())).await.unwrap();
    settle().await;
    assert_eq!(upstream.calls().len(), 1);

    //both land inside the rate limit window: one deferred flush, re-armed by the second
    leaf.put("b", Some("2".into())).await.unwrap();
    leaf.put("c", Some("3".into())).await.unwrap();
    assert!(leaf.has_pending_flush());

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(upstream.calls().len(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let calls = upstream.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(upstream.attempts(), 2);

    let (parent, flushed) = &calls[1];
    assert_eq!(parent, &addr("pairs:1"));
    let mut keys: Vec<_> = flushed.pairs.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["b", "c"]);

    assert!(!leaf.has_pending_flush());
    assert!(leaf.dump().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_propagation_keeps_local_state() {
    let upstream = Arc::new(RecordingUpstream::<RegisterStrategy>::default());
    upstream.set_failing(true);
    let registry = registry_with(upstream.clone());
    let leaf = registry.actor(&addr("pairs:3:1")).await.unwrap();

    leaf.put("a", Some("1".into())).await.unwrap();
    settle().await;
    leaf.put("b", Some("2".into())).await.unwrap();
    settle().await;

    //never marked as propagated, so every write retries straight away
    assert_eq!(upstream.attempts(), 2);
    assert!(!leaf.has_pending_flush());
    assert_eq!(leaf.dump().await.len(), 2);

    upstream.set_failing(false);
    leaf.put("c", Some("3".into())).await.unwrap();
    settle().await;

    let calls = upstream.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.len(), 3);
    assert!(leaf.dump().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_write_returns_before_propagation() {
    let upstream = Arc::new(RecordingUpstream::<CounterStrategy>::default());
    let registry = registry_with(upstream.clone());
    let leaf = registry.actor(&addr("hits:3:1")).await.unwrap();

    let reply = leaf.put("likes", None).await.unwrap();
    assert_eq!(reply, Reply::Text("1".into()));
    assert_eq!(upstream.attempts(), 0);

    settle().await;
    assert_eq!(upstream.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_register_state_moves_up_to_root() {
    let store = Arc::new(MemoryStore::new());
    let registry = local_registry::<RegisterStrategy>(store.clone());
    let leaf = registry.actor(&addr("pairs:3:1")).await.unwrap();

    leaf.put("a", Some("hello".into())).await.unwrap();
    settle().await;

    let mid = registry.actor(&addr("pairs:1")).await.unwrap();
    let root = registry.actor(&addr("pairs")).await.unwrap();
    assert!(leaf.dump().await.is_empty());
    assert!(mid.dump().await.is_empty());
    assert_eq!(
        root.dump().await.get("a").unwrap().value.as_deref(),
        Some("hello")
    );

    let persisted: PairSet = serde_json::from_slice(&store.get("pairs").await.unwrap().unwrap())
        .unwrap();
    assert_eq!(persisted.get("a").unwrap().value.as_deref(), Some("hello"));
    //non-root register shards are not persisted
    assert!(store.get("pairs:3:1").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_leaf_read_pulls_from_parent() {
    let store = Arc::new(MemoryStore::new());
    let registry = local_registry::<RegisterStrategy>(store);
    let root = registry.actor(&addr("pairs")).await.unwrap();
    root.put("a", Some("from root".into())).await.unwrap();

    let leaf = registry.actor(&addr("pairs:3:1")).await.unwrap();
    match leaf.get("a").await.unwrap() {
        Reply::Json(v) => assert_eq!(v["value"], "from root"),
        other => panic!("unexpected reply {other:?}"),
    }
    assert!(matches!(
        leaf.get("missing").await,
        Err(ShardError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_leaf_reads_its_own_write_after_it_moved_up() {
    let registry = local_registry::<RegisterStrategy>(Arc::new(MemoryStore::new()));
    let leaf = registry.actor(&addr("pairs:3:1")).await.unwrap();

    //starts the pull window on the leaf and on its parent
    assert!(matches!(leaf.get("a").await, Err(ShardError::NotFound(_))));

    leaf.put("a", Some("mine".into())).await.unwrap();
    settle().await;
    assert!(leaf.dump().await.get("a").is_none());

    //still inside the window, but the value left this shard so it is pulled back
    match leaf.get("a").await.unwrap() {
        Reply::Json(v) => assert_eq!(v["value"], "mine"),
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_root_writes_are_persisted_synchronously() {
    let store = Arc::new(MemoryStore::new());
    let registry = local_registry::<CounterStrategy>(store.clone());
    let root = registry.actor(&addr("hits")).await.unwrap();

    root.put("likes", None).await.unwrap();
    root.put("likes", None).await.unwrap();

    let persisted: GCounterSet =
        serde_json::from_slice(&store.get("hits").await.unwrap().unwrap()).unwrap();
    assert_eq!(persisted.value("likes"), Some(2));
    assert!(!root.has_pending_flush());
}

#[tokio::test(start_paused = true)]
async fn test_sibling_leaves_converge_at_parent() {
    let store = Arc::new(MemoryStore::new());
    let registry = local_registry::<CounterStrategy>(store.clone());
    let left = registry.actor(&addr("hits:1:0")).await.unwrap();
    let right = registry.actor(&addr("hits:2:0")).await.unwrap();

    for _ in 0..3 {
        left.put("likes", None).await.unwrap();
    }
    for _ in 0..2 {
        right.put("likes", None).await.unwrap();
    }

    //long enough for every deferred flush on every level to fire
    tokio::time::sleep(Duration::from_secs(20)).await;

    let parent = registry.actor(&addr("hits:0")).await.unwrap();
    let parent_state = parent.dump().await;
    assert_eq!(parent_state.value("likes"), Some(5));
    assert_eq!(parent_state.count("likes", "hits:1:0"), 3);
    assert_eq!(parent_state.count("likes", "hits:2:0"), 2);

    let root = registry.actor(&addr("hits")).await.unwrap();
    assert_eq!(root.dump().await.value("likes"), Some(5));

    assert!(left.dump().await.value("likes").unwrap() >= 3);
    assert!(right.dump().await.value("likes").unwrap() >= 2);
    //counters are retained below the root and persisted at every level
    assert!(store.get("hits:1:0").await.unwrap().is_some());
}

#[tokio::test]
async fn test_root_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let rate_limit = RateLimit::new(Duration::from_secs(2), Duration::from_secs(5));

    {
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let registry: Arc<ShardRegistry<RegisterStrategy>> =
            ShardRegistry::new(store, rate_limit, Arc::new(TracingReporter), None);
        let root = registry.actor(&addr("pairs")).await.unwrap();
        root.put("a", Some("kept".into())).await.unwrap();
    }

    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let registry: Arc<ShardRegistry<RegisterStrategy>> =
        ShardRegistry::new(store, rate_limit, Arc::new(TracingReporter), None);
    let root = registry.actor(&addr("pairs")).await.unwrap();
    match root.get("a").await.unwrap() {
        Reply::Json(v) => assert_eq!(v["value"], "kept"),
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_key_is_rejected() {
    let registry = local_registry::<CounterStrategy>(Arc::new(MemoryStore::new()));
    let leaf = registry.actor(&addr("hits:1")).await.unwrap();

    assert!(matches!(leaf.put("", None).await, Err(ShardError::InvalidKey)));
    assert!(matches!(leaf.get("").await, Err(ShardError::InvalidKey)));
}
