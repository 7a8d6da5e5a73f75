//! Cached domain collections and their staleness rules.

use crate::{Error, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const HOUR_MS: u64 = 60 * 60 * 1000;

/// The domain collections mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionName {
    Boats,
    Bookings,
    Messages,
}

impl CollectionName {
    /// Every collection, in pull order.
    pub const ALL: [CollectionName; 3] = [
        CollectionName::Boats,
        CollectionName::Bookings,
        CollectionName::Messages,
    ];

    /// Lowercase name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Boats => "boats",
            CollectionName::Bookings => "bookings",
            CollectionName::Messages => "messages",
        }
    }

    /// Key under which the collection is persisted.
    pub fn storage_key(&self) -> &'static str {
        match self {
            CollectionName::Boats => "cached_boats",
            CollectionName::Bookings => "cached_bookings",
            CollectionName::Messages => "cached_messages",
        }
    }

    /// Maximum age in milliseconds before the cached copy should not be
    /// trusted. `None` means the cache is always usable.
    pub fn staleness_threshold(&self) -> Option<u64> {
        match self {
            CollectionName::Boats => Some(24 * HOUR_MS),
            CollectionName::Bookings => Some(HOUR_MS),
            CollectionName::Messages => None,
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boats" => Ok(CollectionName::Boats),
            "bookings" => Ok(CollectionName::Bookings),
            "messages" => Ok(CollectionName::Messages),
            other => Err(Error::UnknownCollection(other.to_string())),
        }
    }
}

/// The last successful pull of one collection.
///
/// Items are opaque JSON records; they are replaced wholesale on every pull
/// and never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedCollection {
    pub name: CollectionName,
    pub items: Vec<serde_json::Value>,
    /// When the pull completed (milliseconds since epoch)
    pub fetched_at: Timestamp,
}

impl CachedCollection {
    pub fn new(name: CollectionName, items: Vec<serde_json::Value>, fetched_at: Timestamp) -> Self {
        Self {
            name,
            items,
            fetched_at,
        }
    }

    /// Age of the cached copy at `now`. A `fetched_at` in the future counts
    /// as zero age.
    pub fn age(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.fetched_at)
    }

    /// Whether the copy has outlived its collection's threshold.
    pub fn is_stale(&self, now: Timestamp) -> bool {
        match self.name.staleness_threshold() {
            Some(threshold) => self.age(now) > threshold,
            None => false,
        }
    }
}
