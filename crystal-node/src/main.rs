use anyhow::Result;
use clap::Parser;
use crystal_node::{
    cache::ResponseCache,
    config::{Config, StoreKind},
    network::{self, AppState},
    registry::ShardRegistry,
    storage::{DurableStore, FileStore, MemoryStore},
    strategy::{CounterStrategy, RegisterStrategy, Strategy},
    telemetry::{TracingReporter, TracingTelemetry},
    upstream::{HttpUpstream, Upstream},
};
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "crystal-node",
    version,
    about = "A shard tree node for hot keys",
    long_about = None
)]
struct Args {
    /// path to a toml config, defaults apply when missing
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// overrides listen_address
    #[arg(short, long)]
    listen: Option<String>,

    /// overrides store: register or counter
    #[arg(short, long)]
    store: Option<StoreKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load_or_default(args.config.as_deref());
    if let Some(listen) = args.listen {
        config.listen_address = listen;
    }
    if let Some(store) = args.store {
        config.store = store;
    }

    let store: Arc<dyn DurableStore> = match &config.data_dir {
        Some(dir) => Arc::new(FileStore::open(dir).await?),
        None => Arc::new(MemoryStore::new()),
    };

    match config.store {
        StoreKind::Register => run::<RegisterStrategy>(config, store).await,
        StoreKind::Counter => run::<CounterStrategy>(config, store).await,
    }
}

async fn run<S: Strategy>(config: Config, store: Arc<dyn DurableStore>) -> Result<()> {
    let upstream = match &config.upstream_url {
        Some(url) => {
            let http = HttpUpstream::<S>::new(url, config.upstream_timeout())?;
            info!("parents served by {}", http.base_url());
            Some(Arc::new(http) as Arc<dyn Upstream<S>>)
        }
        None => None,
    };

    let reporter = Arc::new(TracingReporter);
    let registry = ShardRegistry::<S>::from_config(&config, store, reporter.clone(), upstream);

    //the one cache of this process, handed to the router below
    let cache = Arc::new(ResponseCache::new(config.cache_ttl()));
    if cache.is_enabled() {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(cache.ttl());
            loop {
                tick.tick().await;
                cache.purge_expired();
            }
        });
    }

    let app = network::router(AppState {
        registry,
        cache,
        telemetry: Arc::new(TracingTelemetry),
        reporter,
    });

    info!(
        node_id = %config.node_id,
        store = ?S::KIND,
        flush_delay_ms = config.flush_delay_ms,
        sync_window_ms = config.sync_window_ms,
        layers = ?config.layout().layers(),
        "starting crystal node"
    );
    network::start_listener(&config.listen_address, app).await
}
