//used for string support, one register per key

//a register with value None means "not found", it is never written as a tombstone

use super::Merge;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

//register structure: {"key": "name", "value": "name1", "ts": 1700000000000}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LwwRegister {
    pub key: String,
    pub value: Option<String>,
    //wall clock millis of the write
    pub ts: u64,
}

impl LwwRegister {
    pub fn new(key: impl Into<String>, value: impl Into<String>, ts: u64) -> Self {
        LwwRegister {
            key: key.into(),
            value: Some(value.into()),
            ts,
        }
    }

    //true when other should replace self; equal timestamps go to other
    pub fn loses_to(&self, other: &Self) -> bool {
        self.ts <= other.ts
    }
}

impl Merge for LwwRegister {
    fn merge(&mut self, other: &Self) {
        if self.loses_to(other) {
            *self = other.clone();
        }
    }
}

//key -> register
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairSet {
    pub pairs: HashMap<String, LwwRegister>,
}

impl Merge for PairSet {
    //keep the strictly newer register per key, other wins ties
    fn merge(&mut self, other: &Self) {
        for (key, incoming) in other.pairs.iter() {
            match self.pairs.get_mut(key) {
                Some(local) => local.merge(incoming),
                None => {
                    self.pairs.insert(key.clone(), incoming.clone());
                }
            }
        }
    }
}

impl PairSet {
    pub fn new() -> Self {
        PairSet::default()
    }

    pub fn set(&mut self, key: &str, value: String, ts: u64) -> LwwRegister {
        let register = LwwRegister::new(key, value, ts);
        self.pairs.insert(key.to_string(), register.clone());
        register
    }

    pub fn get(&self, key: &str) -> Option<&LwwRegister> {
        self.pairs.get(key)
    }

    //drops every register in `sent` that is still exactly what this set holds, anything
    //rewritten since is kept
    pub fn retain_unsent(&mut self, sent: &PairSet) {
        self.pairs
            .retain(|key, register| sent.pairs.get(key) != Some(register));
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
