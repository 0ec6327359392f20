//the register tree and the counter tree run the same actor, a strategy decides what a write
//does, what a read returns and what is left locally once the parent accepted a propagation

use crate::{config::StoreKind, error::ShardError, error::UpstreamError};
use crystal_types::{GCounterSet, LwwRegister, Merge, PairSet, ShardAddress};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(serde_json::Value),
    Text(String),
}

impl Reply {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ShardError> {
        serde_json::to_value(value)
            .map(Reply::Json)
            .map_err(|e| ShardError::InternalFault(e.to_string()))
    }
}

pub trait Strategy: Send + Sync + Sized + 'static {
    type State: Merge
        + Clone
        + Default
        + Debug
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    const KIND: StoreKind;
    //non-root shards persist too
    const PERSISTS_AT_EVERY_LEVEL: bool;
    const PULLS_ON_READ: bool;

    fn write(
        state: &mut Self::State,
        address: &ShardAddress,
        key: &str,
        body: Option<String>,
        now_ms: u64,
    ) -> Result<Reply, ShardError>;

    fn read(state: &Self::State, key: &str) -> Result<Option<Reply>, ShardError>;

    //the slice of `state` handed down for `key` on a pull
    fn project(state: &Self::State, key: &str) -> Self::State;

    fn keys(state: &Self::State) -> usize;

    fn is_empty(state: &Self::State) -> bool {
        Self::keys(state) == 0
    }

    //parent_state is only there when the transport carries the merged state back
    fn after_propagation(
        state: &mut Self::State,
        sent: &Self::State,
        parent_state: Option<Self::State>,
    );

    fn merge_reply(state: &Self::State) -> Result<Reply, ShardError>;

    fn decode_merge_reply(body: &[u8]) -> Result<Option<Self::State>, UpstreamError>;

    fn decode_read_reply(key: &str, body: &[u8]) -> Result<Self::State, UpstreamError>;
}

//incoming is the first merge argument, so a register tie keeps the local value
pub fn absorb<T: Merge + Clone>(local: &mut T, incoming: &T) {
    let mut merged = incoming.clone();
    merged.merge(local);
    *local = merged;
}

//state moves up the tree, a child forgets what its parent accepted
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterStrategy;

impl Strategy for RegisterStrategy {
    type State = PairSet;

    const KIND: StoreKind = StoreKind::Register;
    const PERSISTS_AT_EVERY_LEVEL: bool = false;
    const PULLS_ON_READ: bool = true;

    fn write(
        state: &mut PairSet,
        _address: &ShardAddress,
        key: &str,
        body: Option<String>,
        now_ms: u64,
    ) -> Result<Reply, ShardError> {
        let register = state.set(key, body.unwrap_or_default(), now_ms);
        Reply::json(&register)
    }

    fn read(state: &PairSet, key: &str) -> Result<Option<Reply>, ShardError> {
        state
            .get(key)
            .filter(|register| register.value.is_some())
            .map(Reply::json)
            .transpose()
    }

    fn project(state: &PairSet, key: &str) -> PairSet {
        let mut slice = PairSet::new();
        if let Some(register) = state.get(key) {
            slice.pairs.insert(key.to_string(), register.clone());
        }
        slice
    }

    fn keys(state: &PairSet) -> usize {
        state.len()
    }

    fn after_propagation(state: &mut PairSet, sent: &PairSet, _parent_state: Option<PairSet>) {
        state.retain_unsent(sent);
    }

    fn merge_reply(_state: &PairSet) -> Result<Reply, ShardError> {
        Ok(Reply::Text("OK".to_string()))
    }

    fn decode_merge_reply(_body: &[u8]) -> Result<Option<PairSet>, UpstreamError> {
        Ok(None)
    }

    fn decode_read_reply(key: &str, body: &[u8]) -> Result<PairSet, UpstreamError> {
        let register: LwwRegister =
            serde_json::from_slice(body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        let mut slice = PairSet::new();
        if register.value.is_some() {
            slice.pairs.insert(key.to_string(), register);
        }
        Ok(slice)
    }
}

//every shard counts its own writes under its address and keeps everything it has seen
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterStrategy;

impl Strategy for CounterStrategy {
    type State = GCounterSet;

    const KIND: StoreKind = StoreKind::Counter;
    const PERSISTS_AT_EVERY_LEVEL: bool = true;
    const PULLS_ON_READ: bool = false;

    fn write(
        state: &mut GCounterSet,
        address: &ShardAddress,
        key: &str,
        _body: Option<String>,
        _now_ms: u64,
    ) -> Result<Reply, ShardError> {
        let count = state.increment(key, address.as_str());
        Ok(Reply::Text(count.to_string()))
    }

    fn read(state: &GCounterSet, key: &str) -> Result<Option<Reply>, ShardError> {
        Ok(state.value(key).map(|sum| Reply::Text(sum.to_string())))
    }

    fn project(state: &GCounterSet, key: &str) -> GCounterSet {
        let mut slice = GCounterSet::new();
        if let Some(counter) = state.counters.get(key) {
            slice.counters.insert(key.to_string(), counter.clone());
        }
        slice
    }

    fn keys(state: &GCounterSet) -> usize {
        state.len()
    }

    fn after_propagation(
        state: &mut GCounterSet,
        _sent: &GCounterSet,
        parent_state: Option<GCounterSet>,
    ) {
        if let Some(parent_state) = parent_state {
            state.merge(&parent_state);
        }
    }

    fn merge_reply(state: &GCounterSet) -> Result<Reply, ShardError> {
        Reply::json(state)
    }

    fn decode_merge_reply(body: &[u8]) -> Result<Option<GCounterSet>, UpstreamError> {
        serde_json::from_slice(body)
            .map(Some)
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    //a counter read only carries the sum, which can't be merged back into per-writer state
    fn decode_read_reply(_key: &str, _body: &[u8]) -> Result<GCounterSet, UpstreamError> {
        Ok(GCounterSet::new())
    }
}
