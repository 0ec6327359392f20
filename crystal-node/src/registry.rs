//address -> actor, created on first access

use crate::{
    actor::{ShardActor, ShardContext},
    config::Config,
    error::ShardError,
    scheduler::RateLimit,
    storage::DurableStore,
    strategy::Strategy,
    telemetry::ErrorReporter,
    upstream::{LocalUpstream, Upstream},
};
use crystal_types::ShardAddress;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct ShardRegistry<S: Strategy> {
    //the cell is the startup barrier: callers racing on a new address all await the one load
    actors: DashMap<ShardAddress, Arc<OnceCell<Arc<ShardActor<S>>>>>,
    ctx: Arc<ShardContext<S>>,
}

impl<S: Strategy> ShardRegistry<S> {
    //upstream None resolves parents in this registry
    pub fn new(
        store: Arc<dyn DurableStore>,
        rate_limit: RateLimit,
        reporter: Arc<dyn ErrorReporter>,
        upstream: Option<Arc<dyn Upstream<S>>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let upstream = upstream
                .unwrap_or_else(|| Arc::new(LocalUpstream::new(weak.clone())) as Arc<dyn Upstream<S>>);
            ShardRegistry {
                actors: DashMap::new(),
                ctx: Arc::new(ShardContext {
                    store,
                    upstream,
                    rate_limit,
                    reporter,
                }),
            }
        })
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn DurableStore>,
        reporter: Arc<dyn ErrorReporter>,
        upstream: Option<Arc<dyn Upstream<S>>>,
    ) -> Arc<Self> {
        let rate_limit = RateLimit::new(config.sync_window(), config.flush_delay());
        ShardRegistry::new(store, rate_limit, reporter, upstream)
    }

    pub async fn actor(&self, address: &ShardAddress) -> Result<Arc<ShardActor<S>>, ShardError> {
        //clone the cell out so the map shard isn't locked while loading
        let cell = self.actors.entry(address.clone()).or_default().clone();
        cell.get_or_try_init(|| ShardActor::load(address.clone(), Arc::clone(&self.ctx)))
            .await
            .map(Arc::clone)
    }

    pub fn addresses(&self) -> Vec<ShardAddress> {
        self.actors
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.addresses().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
