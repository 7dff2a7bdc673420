//! Working Memory – the orchestrator's bounded scratchpad.
//!
//! Holds a handful of keyed values (the current request, the last result,
//! the latest hardware status).  When full, the item that was *inserted*
//! earliest is evicted, regardless of how often it has been read since.
//!
//! Not internally synchronised: the owning orchestrator holds it by value and
//! mutates it through `&mut self`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Number of keys reported by [`WorkingMemoryStatus::most_accessed`].
const MOST_ACCESSED_REPORTED: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemoryItem {
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
    /// Insertion sequence; breaks `created_at` ties.
    #[serde(skip)]
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemoryStatus {
    pub total_items: usize,
    pub max_items: usize,
    pub most_accessed: Vec<String>,
}

#[derive(Debug)]
pub struct WorkingMemory {
    items: HashMap<String, WorkingMemoryItem>,
    capacity: usize,
    next_seq: u64,
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new(100)
    }
}

impl WorkingMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: HashMap::new(),
            capacity,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Store `value` under `key`.
    ///
    /// Re-storing an existing key replaces it and counts as a fresh
    /// insertion.  Returns the key evicted to make room, if any.
    pub fn store(&mut self, key: impl Into<String>, value: Value) -> Option<String> {
        let key = key.into();
        let mut evicted = None;
        if self.items.remove(&key).is_none() && self.items.len() >= self.capacity {
            evicted = self.evict_oldest();
        }
        if self.capacity == 0 {
            return evicted;
        }
        let now = Utc::now();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.items.insert(
            key.clone(),
            WorkingMemoryItem {
                key,
                value,
                created_at: now,
                access_count: 0,
                last_accessed: now,
                seq,
            },
        );
        evicted
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self
            .items
            .values()
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)))
            .map(|item| item.key.clone())?;
        self.items.remove(&oldest);
        debug!(key = %oldest, "working memory evicted oldest item");
        Some(oldest)
    }

    /// Read a value, bumping its access statistics.
    pub fn retrieve(&mut self, key: &str) -> Option<&Value> {
        let item = self.items.get_mut(key)?;
        item.access_count += 1;
        item.last_accessed = Utc::now();
        Some(&item.value)
    }

    /// Retrieve several keys at once; missing keys are omitted.
    pub fn retrieve_context(&mut self, keys: &[&str]) -> serde_json::Map<String, Value> {
        keys.iter()
            .filter_map(|k| self.retrieve(k).map(|v| (k.to_string(), v.clone())))
            .collect()
    }

    /// Peek without touching access statistics.
    pub fn item(&self, key: &str) -> Option<&WorkingMemoryItem> {
        self.items.get(key)
    }

    pub fn status(&self) -> WorkingMemoryStatus {
        let mut items: Vec<&WorkingMemoryItem> = self.items.values().collect();
        items.sort_by(|a, b| b.access_count.cmp(&a.access_count).then(a.seq.cmp(&b.seq)));
        WorkingMemoryStatus {
            total_items: self.items.len(),
            max_items: self.capacity,
            most_accessed: items
                .into_iter()
                .take(MOST_ACCESSED_REPORTED)
                .map(|i| i.key.clone())
                .collect(),
        }
    }
}
