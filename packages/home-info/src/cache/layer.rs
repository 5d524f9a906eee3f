//! A single time-bounded cache layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use crate::types::address::AddressKey;

/// A cached payload with its creation time and lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            created_at,
            ttl,
        }
    }

    /// Time since creation; zero if the clock went backwards.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// An entry is expired once its age reaches the TTL.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.age(now) >= self.ttl
    }
}

/// Entry counts for one layer (or the sum of layers).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LayerStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,

    /// valid / total, 0.0 for an empty layer
    pub validity_ratio: f64,
}

impl LayerStats {
    fn from_counts(total: usize, valid: usize) -> Self {
        Self {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
            validity_ratio: if total == 0 {
                0.0
            } else {
                valid as f64 / total as f64
            },
        }
    }

    /// Sum of two layers' counts.
    pub fn combine(&self, other: &LayerStats) -> LayerStats {
        Self::from_counts(
            self.total_entries + other.total_entries,
            self.valid_entries + other.valid_entries,
        )
    }
}

/// Map from address key to an expiring payload.
///
/// Expiry is lazy: `get` treats an expired entry as absent but leaves it in
/// place; only `purge_expired` removes entries.
pub struct TtlLayer<V> {
    entries: RwLock<HashMap<AddressKey, CacheEntry<V>>>,
}

impl<V> Default for TtlLayer<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlLayer<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the entry for `key`.
    pub fn put(&self, key: AddressKey, value: V, ttl: Duration, now: DateTime<Utc>) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, CacheEntry::new(value, now, ttl));
    }

    /// Remove every entry, returning how many there were.
    pub fn purge_all(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let count = entries.len();
        entries.clear();
        count
    }

    /// Remove expired entries, returning how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self, now: DateTime<Utc>) -> LayerStats {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let valid = entries.values().filter(|e| !e.is_expired(now)).count();
        LayerStats::from_counts(entries.len(), valid)
    }

    /// Age of the entry for `key`, expired or not.
    pub fn age(&self, key: &AddressKey, now: DateTime<Utc>) -> Option<Duration> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|entry| entry.age(now))
    }
}

impl<V: Clone> TtlLayer<V> {
    /// The live payload for `key`, if present and not expired.
    pub fn get(&self, key: &AddressKey, now: DateTime<Utc>) -> Option<V> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(street: &str) -> AddressKey {
        AddressKey {
            street: street.into(),
            unit: None,
            city: None,
            state: None,
            zip: None,
        }
    }

    #[test]
    fn test_expired_entry_is_a_miss_but_stays_until_purged() {
        let layer = TtlLayer::new();
        let t0 = Utc::now();
        layer.put(key("1 a st"), 7u32, Duration::from_secs(60), t0);

        let later = t0 + chrono::Duration::seconds(59);
        assert_eq!(layer.get(&key("1 a st"), later), Some(7));

        let expired = t0 + chrono::Duration::seconds(60);
        assert_eq!(layer.get(&key("1 a st"), expired), None);
        assert_eq!(layer.len(), 1);

        assert_eq!(layer.purge_expired(expired), 1);
        assert!(layer.is_empty());
    }

    #[test]
    fn test_put_overwrites() {
        let layer = TtlLayer::new();
        let now = Utc::now();
        layer.put(key("1 a st"), "old", Duration::from_secs(60), now);
        layer.put(key("1 a st"), "new", Duration::from_secs(60), now);
        assert_eq!(layer.get(&key("1 a st"), now), Some("new"));
        assert_eq!(layer.len(), 1);
    }

    #[test]
    fn test_stats_counts_valid_and_expired() {
        let layer = TtlLayer::new();
        let t0 = Utc::now();
        layer.put(key("1 a st"), 1, Duration::from_secs(10), t0);
        layer.put(key("2 b st"), 2, Duration::from_secs(100), t0);
        layer.put(key("3 c st"), 3, Duration::from_secs(100), t0);

        let stats = layer.stats(t0 + chrono::Duration::seconds(50));
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.valid_entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert!((stats.validity_ratio - 2.0 / 3.0).abs() < 1e-9);

        let empty: TtlLayer<u8> = TtlLayer::new();
        assert_eq!(empty.stats(t0).validity_ratio, 0.0);
    }
}
