//! CacheState - the last pulled copy of each collection.

use crate::{CachedCollection, CollectionName, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// In-memory mirror of the cached collections.
///
/// Each collection holds either its previous full value or its new full
/// value; writes replace, they never merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheState {
    collections: BTreeMap<CollectionName, CachedCollection>,
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `name` with `items`, stamped at `now`.
    pub fn write(&mut self, name: CollectionName, items: Vec<serde_json::Value>, now: Timestamp) {
        self.collections
            .insert(name, CachedCollection::new(name, items, now));
    }

    /// Insert an already-stamped collection, e.g. one loaded from storage.
    pub fn insert(&mut self, cached: CachedCollection) {
        self.collections.insert(cached.name, cached);
    }

    /// Items of `name`, or an empty slice if it was never written.
    pub fn read(&self, name: CollectionName) -> &[serde_json::Value] {
        self.collections
            .get(&name)
            .map(|c| c.items.as_slice())
            .unwrap_or(&[])
    }

    /// The full cached entry, including its fetch time.
    pub fn entry(&self, name: CollectionName) -> Option<&CachedCollection> {
        self.collections.get(&name)
    }

    /// Collections that are missing or older than their threshold.
    pub fn stale_collections(&self, now: Timestamp) -> Vec<CollectionName> {
        CollectionName::ALL
            .into_iter()
            .filter(|name| match self.collections.get(name) {
                Some(cached) => cached.is_stale(now),
                None => true,
            })
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CachedCollection> {
        self.collections.values()
    }

    pub fn clear(&mut self) {
        self.collections.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
