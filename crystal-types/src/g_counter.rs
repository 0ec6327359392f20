use super::Merge;
use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp;
use std::collections::HashMap;

//Follows a (node_id, count) model, increment only. Every shard that accepts a write counts it under
//its own address, eg: leaf "hits:3:2:1" incrementing key "likes" gives {"likes": {"hits:3:2:1": 1}}.
//Its sibling "hits:8:2:1" does the same independently to get {"likes": {"hits:8:2:1": 1}}. When
//both reach the parent "hits:2:1" it holds {"likes": {"hits:3:2:1": 1, "hits:8:2:1": 1}}, obtained
//by taking the max per writer and union-ising the writers. The value read is the sum, so 2.

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GCounter {
    pub counts: HashMap<NodeId, u64>,
}

impl Merge for GCounter {
    fn merge(&mut self, other: &Self) {
        for (node, cnt) in other.counts.iter() {
            let entry = self.counts.entry(node.clone()).or_insert(0);
            *entry = cmp::max(*entry, *cnt);
        }
    }
}

impl GCounter {
    pub fn new() -> Self {
        GCounter::default()
    }

    //returns the writer's count after the increment
    pub fn increment(&mut self, node_id: &str) -> u64 {
        let entry = self.counts.entry(node_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn count(&self, node_id: &str) -> u64 {
        self.counts.get(node_id).copied().unwrap_or(0)
    }

    pub fn value(&self) -> u64 {
        self.counts.values().sum()
    }
}

//logical counter key -> GCounter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GCounterSet {
    pub counters: HashMap<String, GCounter>,
}

impl Merge for GCounterSet {
    fn merge(&mut self, other: &Self) {
        for (key, counter) in other.counters.iter() {
            match self.counters.get_mut(key) {
                Some(local) => local.merge(counter),
                None => {
                    self.counters.insert(key.clone(), counter.clone());
                }
            }
        }
    }
}

impl GCounterSet {
    pub fn new() -> Self {
        GCounterSet::default()
    }

    pub fn increment(&mut self, key: &str, node_id: &str) -> u64 {
        self.counters
            .entry(key.to_string())
            .or_default()
            .increment(node_id)
    }

    pub fn count(&self, key: &str, node_id: &str) -> u64 {
        self.counters
            .get(key)
            .map(|c| c.count(node_id))
            .unwrap_or(0)
    }

    //None when the key has never been incremented anywhere this shard has heard of
    pub fn value(&self, key: &str) -> Option<u64> {
        self.counters.get(key).map(GCounter::value)
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
