//calls from a shard to its parent, either inside this process or over http to another node

use crate::{error::UpstreamError, registry::ShardRegistry, strategy::Strategy};
use async_trait::async_trait;
use crystal_types::ShardAddress;
use reqwest::{Client, StatusCode};
use std::{marker::PhantomData, sync::Weak, time::Duration};

#[async_trait]
pub trait Upstream<S: Strategy>: Send + Sync + 'static {
    //returns the parent's merged state when the transport carries it back
    async fn merge(
        &self,
        parent: &ShardAddress,
        state: &S::State,
    ) -> Result<Option<S::State>, UpstreamError>;

    async fn fetch(
        &self,
        parent: &ShardAddress,
        key: &str,
    ) -> Result<Option<S::State>, UpstreamError>;
}

pub struct LocalUpstream<S: Strategy> {
    registry: Weak<ShardRegistry<S>>,
}

impl<S: Strategy> LocalUpstream<S> {
    pub fn new(registry: Weak<ShardRegistry<S>>) -> Self {
        LocalUpstream { registry }
    }

    fn registry(&self) -> Result<std::sync::Arc<ShardRegistry<S>>, UpstreamError> {
        self.registry
            .upgrade()
            .ok_or_else(|| UpstreamError::Unavailable("registry shut down".to_string()))
    }
}

#[async_trait]
impl<S: Strategy> Upstream<S> for LocalUpstream<S> {
    async fn merge(
        &self,
        parent: &ShardAddress,
        state: &S::State,
    ) -> Result<Option<S::State>, UpstreamError> {
        let actor = self
            .registry()?
            .actor(parent)
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
        let merged = actor
            .merge_state(state.clone())
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
        Ok(Some(merged))
    }

    async fn fetch(
        &self,
        parent: &ShardAddress,
        key: &str,
    ) -> Result<Option<S::State>, UpstreamError> {
        let actor = self
            .registry()?
            .actor(parent)
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
        Ok(Some(actor.read_state(key).await))
    }
}

//talks to the node serving the parents through the same request surface clients use
pub struct HttpUpstream<S: Strategy> {
    client: Client,
    base_url: String,
    _strategy: PhantomData<fn() -> S>,
}

impl<S: Strategy> HttpUpstream<S> {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let base_url = if base_url.starts_with("http") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };
        Ok(HttpUpstream {
            client,
            base_url,
            _strategy: PhantomData,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl<S: Strategy> Upstream<S> for HttpUpstream<S> {
    async fn merge(
        &self,
        parent: &ShardAddress,
        state: &S::State,
    ) -> Result<Option<S::State>, UpstreamError> {
        let response = self
            .client
            .patch(format!("{}/{}", self.base_url, parent))
            .json(state)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }
        let body = response.bytes().await?;
        S::decode_merge_reply(&body)
    }

    async fn fetch(
        &self,
        parent: &ShardAddress,
        key: &str,
    ) -> Result<Option<S::State>, UpstreamError> {
        let response = self
            .client
            .get(format!("{}/{}/{}", self.base_url, parent, key))
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if !status.is_success() => Err(UpstreamError::Status(status.as_u16())),
            _ => {
                let body = response.bytes().await?;
                S::decode_read_reply(key, &body).map(Some)
            }
        }
    }
}
