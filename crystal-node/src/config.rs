use anyhow::Result;
use crystal_types::ShardLayout;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Register,
    Counter,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        match input {
            "register" | "pairs" => Ok(StoreKind::Register),
            "counter" | "counters" => Ok(StoreKind::Counter),
            other => Err(format!("unknown store kind: {other}")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub node_id: String,
    pub listen_address: String,
    pub store: StoreKind,
    //leaf width and fan-in of the tree, used by writers picking a leaf
    pub shard_count: u64,
    pub shard_ratio: u64,
    //how long a deferred propagation waits
    pub flush_delay_ms: u64,
    //minimum gap between two propagations from the same shard
    pub sync_window_ms: u64,
    //0 turns the read cache off
    pub cache_ttl_ms: u64,
    //another node serving the parents, None keeps the whole tree in this process
    pub upstream_url: Option<String>,
    pub upstream_timeout_ms: u64,
    //None keeps durable state in memory only
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_id: "crystal".to_string(),
            listen_address: "127.0.0.1:8787".to_string(),
            store: StoreKind::Register,
            shard_count: 100,
            shard_ratio: 5,
            flush_delay_ms: 5_000,
            sync_window_ms: 2_000,
            cache_ttl_ms: 5_000,
            upstream_url: None,
            upstream_timeout_ms: 3_000,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn load_config(config_path: PathBuf) -> Result<Self> {
        let mut file = File::open(&config_path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let new_config: Self = toml::from_str(&contents)?;

        Ok(new_config)
    }

    //a missing or broken config source never stops the node, the defaults apply instead
    pub fn load_or_default(config_path: Option<&Path>) -> Self {
        let Some(path) = config_path else {
            return Config::default();
        };
        match Config::load_config(path.to_path_buf()) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "couldn't load config, using defaults");
                Config::default()
            }
        }
    }

    pub fn store_config(node: &Self, config_path: PathBuf) -> Result<()> {
        let mut file = File::create(&config_path)?;

        let contents = toml::to_string(node)?;

        file.write_all(contents.as_bytes())?;

        Ok(())
    }

    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    pub fn sync_window(&self) -> Duration {
        Duration::from_millis(self.sync_window_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn layout(&self) -> ShardLayout {
        ShardLayout::new(self.shard_count, self.shard_ratio)
    }
}
