//one actor per shard address, all of its state behind a single async mutex
//the lock is never held across a call to the parent, that is where requests and deferred
//propagations interleave

use crate::{
    error::ShardError,
    scheduler::{Decision, PropagationScheduler, RateLimit},
    storage::DurableStore,
    strategy::{absorb, Reply, Strategy},
    telemetry::ErrorReporter,
    upstream::Upstream,
};
use crystal_types::ShardAddress;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, error};

//shared by every actor of one registry
pub struct ShardContext<S: Strategy> {
    pub store: Arc<dyn DurableStore>,
    pub upstream: Arc<dyn Upstream<S>>,
    pub rate_limit: RateLimit,
    pub reporter: Arc<dyn ErrorReporter>,
}

pub struct ShardRecord<S: Strategy> {
    pub state: S::State,
    pub last_propagation: Option<Instant>,
    pub last_pull: Option<Instant>,
}

pub struct ShardActor<S: Strategy> {
    address: ShardAddress,
    parent: Option<ShardAddress>,
    record: Mutex<ShardRecord<S>>,
    scheduler: PropagationScheduler,
    ctx: Arc<ShardContext<S>>,
}

impl<S: Strategy> std::fmt::Debug for ShardActor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardActor")
            .field("address", &self.address)
            .field("kind", &S::KIND)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl<S: Strategy> ShardActor<S> {
    pub async fn load(
        address: ShardAddress,
        ctx: Arc<ShardContext<S>>,
    ) -> Result<Arc<Self>, ShardError> {
        let state = match ctx.store.get(address.as_str()).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ShardError::InternalFault(format!("corrupt state for {address}: {e}")))?,
            None => S::State::default(),
        };
        debug!(%address, kind = ?S::KIND, "shard loaded");

        Ok(Arc::new(ShardActor {
            parent: address.parent(),
            address,
            record: Mutex::new(ShardRecord {
                state,
                last_propagation: None,
                last_pull: None,
            }),
            scheduler: PropagationScheduler::new(),
            ctx,
        }))
    }

    pub fn address(&self) -> &ShardAddress {
        &self.address
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn has_pending_flush(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub async fn key_count(&self) -> usize {
        S::keys(&self.record.lock().await.state)
    }

    pub async fn get(self: &Arc<Self>, key: &str) -> Result<Reply, ShardError> {
        if key.is_empty() {
            return Err(ShardError::InvalidKey);
        }
        if S::PULLS_ON_READ {
            self.pull(key).await;
        }

        let record = self.record.lock().await;
        S::read(&record.state, key)?.ok_or_else(|| ShardError::NotFound(key.to_string()))
    }

    //what a child pulling `key` from us gets
    pub async fn read_state(self: &Arc<Self>, key: &str) -> S::State {
        if S::PULLS_ON_READ {
            self.pull(key).await;
        }
        S::project(&self.record.lock().await.state, key)
    }

    pub async fn put(self: &Arc<Self>, key: &str, body: Option<String>) -> Result<Reply, ShardError> {
        if key.is_empty() {
            return Err(ShardError::InvalidKey);
        }

        let (reply, last) = {
            let mut record = self.record.lock().await;
            let reply = S::write(&mut record.state, &self.address, key, body, now_ms())?;
            if self.is_root() || S::PERSISTS_AT_EVERY_LEVEL {
                self.persist(&record.state).await?;
            }
            (reply, record.last_propagation)
        };

        self.maybe_propagate(last);
        Ok(reply)
    }

    pub async fn merge_state(self: &Arc<Self>, incoming: S::State) -> Result<S::State, ShardError> {
        let (merged, last) = {
            let mut record = self.record.lock().await;
            absorb(&mut record.state, &incoming);
            if self.is_root() || S::PERSISTS_AT_EVERY_LEVEL {
                self.persist(&record.state).await?;
            }
            (record.state.clone(), record.last_propagation)
        };

        self.maybe_propagate(last);
        Ok(merged)
    }

    pub async fn merge_in(self: &Arc<Self>, incoming: S::State) -> Result<Reply, ShardError> {
        let merged = self.merge_state(incoming).await?;
        S::merge_reply(&merged)
    }

    pub async fn dump(&self) -> S::State {
        self.record.lock().await.state.clone()
    }

    async fn persist(&self, state: &S::State) -> Result<(), ShardError> {
        let bytes =
            serde_json::to_vec(state).map_err(|e| ShardError::InternalFault(e.to_string()))?;
        self.ctx.store.put(self.address.as_str(), bytes).await?;
        Ok(())
    }

    //supersedes whatever is pending: either sends now or (re)arms the single deferred flush
    fn maybe_propagate(self: &Arc<Self>, last: Option<Instant>) {
        let Some(parent) = self.parent.clone() else {
            return;
        };

        self.scheduler.cancel();
        match self.ctx.rate_limit.decide(last, Instant::now()) {
            Decision::Now => {
                let actor = Arc::clone(self);
                tokio::spawn(async move { actor.propagate(parent).await });
            }
            Decision::Defer(delay) => {
                debug!(address = %self.address, ?delay, "propagation deferred");
                let actor = Arc::clone(self);
                self.scheduler
                    .schedule(delay, move || async move { actor.propagate(parent).await });
            }
        }
    }

    //on failure nothing local changes, the next write or flush carries it again
    pub async fn propagate(self: &Arc<Self>, parent: ShardAddress) {
        let sent = {
            let record = self.record.lock().await;
            if S::is_empty(&record.state) {
                return;
            }
            record.state.clone()
        };

        match self.ctx.upstream.merge(&parent, &sent).await {
            Ok(parent_state) => {
                let mut record = self.record.lock().await;
                record.last_propagation = Some(Instant::now());
                let before = S::keys(&record.state);
                S::after_propagation(&mut record.state, &sent, parent_state);
                //what moved up has to be pulled back down on the next read
                if S::keys(&record.state) < before {
                    record.last_pull = None;
                }
                if S::PERSISTS_AT_EVERY_LEVEL {
                    if let Err(e) = self.persist(&record.state).await {
                        error!(address = %self.address, error = %e, "couldn't persist after sync");
                    }
                }
                debug!(
                    address = %self.address,
                    %parent,
                    keys = S::keys(&record.state),
                    "propagated to parent"
                );
            }
            Err(e) => self.ctx.reporter.capture_upstream(&e, &self.address),
        }
    }

    //bounded staleness: at most one pull per rate limit window, failures only logged
    async fn pull(self: &Arc<Self>, key: &str) {
        let Some(parent) = self.parent.as_ref() else {
            return;
        };
        {
            let mut record = self.record.lock().await;
            let now = Instant::now();
            if let Some(at) = record.last_pull {
                if now.saturating_duration_since(at) <= self.ctx.rate_limit.window {
                    return;
                }
            }
            record.last_pull = Some(now);
        }

        match self.ctx.upstream.fetch(parent, key).await {
            Ok(Some(pulled)) if !S::is_empty(&pulled) => {
                let mut record = self.record.lock().await;
                absorb(&mut record.state, &pulled);
            }
            Ok(_) => {}
            Err(e) => self.ctx.reporter.capture_upstream(&e, &self.address),
        }
    }
}
