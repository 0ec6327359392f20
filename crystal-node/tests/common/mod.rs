#![allow(dead_code)]

use async_trait::async_trait;
use crystal_node::{
    error::{ShardError, StorageError, UpstreamError},
    registry::ShardRegistry,
    scheduler::RateLimit,
    storage::{DurableStore, MemoryStore},
    strategy::Strategy,
    telemetry::{ErrorReporter, RequestTags, TracingReporter},
    upstream::Upstream,
};
use crystal_types::ShardAddress;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

pub const WINDOW: Duration = Duration::from_secs(2);
pub const FLUSH_DELAY: Duration = Duration::from_secs(5);

pub fn addr(address: &str) -> ShardAddress {
    ShardAddress::new(address).unwrap()
}

//lets spawned propagations run to completion
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

pub fn local_registry<S: Strategy>(store: Arc<MemoryStore>) -> Arc<ShardRegistry<S>> {
    ShardRegistry::new(
        store,
        RateLimit::new(WINDOW, FLUSH_DELAY),
        Arc::new(TracingReporter),
        None,
    )
}

pub fn registry_with<S: Strategy>(upstream: Arc<RecordingUpstream<S>>) -> Arc<ShardRegistry<S>> {
    ShardRegistry::new(
        Arc::new(MemoryStore::new()),
        RateLimit::new(WINDOW, FLUSH_DELAY),
        Arc::new(TracingReporter),
        Some(upstream as Arc<dyn Upstream<S>>),
    )
}

//records every accepted merge, can be switched to fail
pub struct RecordingUpstream<S: Strategy> {
    calls: Mutex<Vec<(ShardAddress, S::State)>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl<S: Strategy> Default for RecordingUpstream<S> {
    fn default() -> Self {
        RecordingUpstream {
            calls: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }
}

impl<S: Strategy> RecordingUpstream<S> {
    pub fn calls(&self) -> Vec<(ShardAddress, S::State)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: Strategy> Upstream<S> for RecordingUpstream<S> {
    async fn merge(
        &self,
        parent: &ShardAddress,
        state: &S::State,
    ) -> Result<Option<S::State>, UpstreamError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status(503));
        }
        self.calls
            .lock()
            .unwrap()
            .push((parent.clone(), state.clone()));
        Ok(Some(state.clone()))
    }

    async fn fetch(
        &self,
        _parent: &ShardAddress,
        _key: &str,
    ) -> Result<Option<S::State>, UpstreamError> {
        Ok(None)
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub faults: Mutex<Vec<(String, RequestTags)>>,
}

impl ErrorReporter for RecordingReporter {
    fn capture(&self, fault: &ShardError, tags: &RequestTags) {
        self.faults
            .lock()
            .unwrap()
            .push((fault.to_string(), tags.clone()));
    }
}

//a store whose disk is gone
pub struct BrokenStore;

#[async_trait]
impl DurableStore for BrokenStore {
    async fn get(&self, _id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk unavailable")))
    }

    async fn put(&self, _id: &str, _bytes: Vec<u8>) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk unavailable")))
    }
}
