//! Bounded memo of computed results, stamped with time and data version.

use lru::LruCache;
use sift_core::types::DataVersion;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub timestamp: Instant,
    pub data_version: DataVersion,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, max_age: Duration) -> bool {
        now.saturating_duration_since(self.timestamp) > max_age
    }
}

/// Outcome of a cache lookup.
///
/// `Expired` and `Stale` entries have already been removed when returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Hit(V),
    Miss,
    Expired,
    Stale,
}

impl<V> Lookup<V> {
    pub fn into_value(self) -> Option<V> {
        match self {
            Lookup::Hit(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub expired: usize,
    pub average_age: Duration,
}

/// LRU cache keyed by normalized query.
///
/// An entry is only returned while it is younger than `max_age` and was
/// stored under the caller's current data version.
pub struct ResultCache<V> {
    entries: LruCache<String, CacheEntry<V>>,
    max_age: Duration,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            max_age,
        }
    }

    pub fn lookup(&mut self, key: &str, version: DataVersion, now: Instant) -> Lookup<V> {
        let Some(entry) = self.entries.get(key) else {
            return Lookup::Miss;
        };

        let outcome = if entry.is_expired(now, self.max_age) {
            Lookup::Expired
        } else if entry.data_version != version {
            Lookup::Stale
        } else {
            return Lookup::Hit(entry.value.clone());
        };

        self.entries.pop(key);
        outcome
    }

    pub fn get(&mut self, key: &str, version: DataVersion, now: Instant) -> Option<V> {
        self.lookup(key, version, now).into_value()
    }

    pub fn contains(&mut self, key: &str, version: DataVersion, now: Instant) -> bool {
        self.get(key, version, now).is_some()
    }

    pub fn put(&mut self, key: impl Into<String>, value: V, version: DataVersion, now: Instant) {
        self.entries.put(
            key.into(),
            CacheEntry {
                value,
                timestamp: now,
                data_version: version,
            },
        );
    }
}

/// Maintenance operations.
impl<V> ResultCache<V> {
    /// Drops every entry. Returns how many were removed.
    pub fn invalidate_all(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Drops entries stored under `version`.
    pub fn invalidate_version(&mut self, version: DataVersion) -> usize {
        self.remove_where(|entry| entry.data_version == version)
    }

    /// Drops entries older than the configured max age.
    pub fn cleanup_expired(&mut self, now: Instant) -> usize {
        let max_age = self.max_age;
        self.remove_where(|entry| entry.is_expired(now, max_age))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self, now: Instant) -> CacheStats {
        let mut expired = 0;
        let mut total_age = Duration::ZERO;
        for (_, entry) in self.entries.iter() {
            if entry.is_expired(now, self.max_age) {
                expired += 1;
            }
            total_age += now.saturating_duration_since(entry.timestamp);
        }

        let entries = self.entries.len();
        CacheStats {
            entries,
            capacity: self.entries.cap().get(),
            expired,
            average_age: match u32::try_from(entries) {
                Ok(n) if n > 0 => total_age / n,
                _ => Duration::ZERO,
            },
        }
    }

    fn remove_where(&mut self, predicate: impl Fn(&CacheEntry<V>) -> bool) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.entries.pop(key);
        }
        doomed.len()
    }
}
