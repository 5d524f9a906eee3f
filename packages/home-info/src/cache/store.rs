//! Dual-layer cache store.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::layer::{LayerStats, TtlLayer};
use crate::types::address::AddressKey;
use crate::types::discovery::DiscoveredUrls;
use crate::types::property::ExtractedProperty;

/// Default lifetime of cache entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The two independent cache layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLayer {
    /// address → validated listing URLs
    UrlDiscovery,
    /// address → merged property record
    Extraction,
}

impl CacheLayer {
    pub const ALL: [CacheLayer; 2] = [CacheLayer::UrlDiscovery, CacheLayer::Extraction];

    pub fn name(&self) -> &'static str {
        match self {
            CacheLayer::UrlDiscovery => "url_discovery",
            CacheLayer::Extraction => "extraction",
        }
    }
}

/// A payload of either layer. The variant selects the layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CachePayload {
    Urls(DiscoveredUrls),
    Property(ExtractedProperty),
}

/// Entry counts overall and per layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    #[serde(flatten)]
    pub overall: LayerStats,
    pub url_discovery: LayerStats,
    pub extraction: LayerStats,
    pub default_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// Expired entries outnumber valid ones
    Degraded,
    Empty,
}

/// Cache health with operator recommendations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheHealth {
    pub status: HealthStatus,
    pub statistics: CacheStats,
    pub recommendations: Vec<String>,
}

/// Process-wide, in-memory cache shared by concurrent requests.
///
/// Each layer has its own lock; single-key operations are atomic and
/// concurrent writes to a key are last-write-wins.
pub struct CacheStore {
    urls: TtlLayer<DiscoveredUrls>,
    extractions: TtlLayer<ExtractedProperty>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    /// Create an empty store with the 24h default TTL and the system clock.
    pub fn new() -> Self {
        Self {
            urls: TtlLayer::new(),
            extractions: TtlLayer::new(),
            default_ttl: DEFAULT_TTL,
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the TTL used when `put` is given none.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Live payload for `key` in `layer`.
    pub fn get(&self, key: &AddressKey, layer: CacheLayer) -> Option<CachePayload> {
        match layer {
            CacheLayer::UrlDiscovery => self.get_urls(key).map(CachePayload::Urls),
            CacheLayer::Extraction => self.get_property(key).map(CachePayload::Property),
        }
    }

    /// Store a payload in the layer its variant belongs to.
    pub fn put(&self, key: AddressKey, payload: CachePayload, ttl: Option<Duration>) {
        match payload {
            CachePayload::Urls(urls) => self.put_urls(key, urls, ttl),
            CachePayload::Property(property) => self.put_property(key, property, ttl),
        }
    }

    pub fn get_urls(&self, key: &AddressKey) -> Option<DiscoveredUrls> {
        self.urls.get(key, self.clock.now())
    }

    pub fn put_urls(&self, key: AddressKey, urls: DiscoveredUrls, ttl: Option<Duration>) {
        debug!(key = %key.fingerprint(), count = urls.len(), "Caching discovered URLs");
        self.urls
            .put(key, urls, ttl.unwrap_or(self.default_ttl), self.clock.now());
    }

    pub fn get_property(&self, key: &AddressKey) -> Option<ExtractedProperty> {
        self.extractions.get(key, self.clock.now())
    }

    pub fn put_property(&self, key: AddressKey, property: ExtractedProperty, ttl: Option<Duration>) {
        debug!(
            key = %key.fingerprint(),
            filled = property.record.filled_count(),
            "Caching extracted property"
        );
        self.extractions.put(
            key,
            property,
            ttl.unwrap_or(self.default_ttl),
            self.clock.now(),
        );
    }

    /// Age of the entry for `key` in `layer`, expired or not.
    pub fn entry_age(&self, key: &AddressKey, layer: CacheLayer) -> Option<Duration> {
        let now = self.clock.now();
        match layer {
            CacheLayer::UrlDiscovery => self.urls.age(key, now),
            CacheLayer::Extraction => self.extractions.age(key, now),
        }
    }

    /// Clear both layers, returning the number of entries removed.
    pub fn purge_all(&self) -> usize {
        let removed = self.urls.purge_all() + self.extractions.purge_all();
        info!(removed, "Cache cleared");
        removed
    }

    /// Clear one layer, leaving the other untouched.
    pub fn purge_layer(&self, layer: CacheLayer) -> usize {
        let removed = match layer {
            CacheLayer::UrlDiscovery => self.urls.purge_all(),
            CacheLayer::Extraction => self.extractions.purge_all(),
        };
        info!(layer = layer.name(), removed, "Cache layer cleared");
        removed
    }

    /// Remove expired entries from both layers.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = self.urls.purge_expired(now) + self.extractions.purge_expired(now);
        if removed > 0 {
            info!(removed, "Expired cache entries removed");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let url_discovery = self.urls.stats(now);
        let extraction = self.extractions.stats(now);
        CacheStats {
            overall: url_discovery.combine(&extraction),
            url_discovery,
            extraction,
            default_ttl_secs: self.default_ttl.as_secs(),
        }
    }

    pub fn health(&self) -> CacheHealth {
        let statistics = self.stats();
        let overall = statistics.overall;
        let mut recommendations = Vec::new();

        let status = if overall.total_entries == 0 {
            recommendations
                .push("Cache is empty; confirm lookups are writing results".to_string());
            HealthStatus::Empty
        } else if overall.expired_entries > overall.valid_entries {
            recommendations
                .push("Expired entries outnumber valid ones; run purge_expired".to_string());
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        for (layer, stats) in [
            (CacheLayer::UrlDiscovery, &statistics.url_discovery),
            (CacheLayer::Extraction, &statistics.extraction),
        ] {
            if stats.total_entries > 0 && stats.valid_entries == 0 {
                recommendations.push(format!(
                    "Every {} entry has expired; consider a longer TTL",
                    layer.name()
                ));
            }
        }

        if recommendations.is_empty() {
            recommendations.push("Cache is performing optimally".to_string());
        }

        CacheHealth {
            status,
            statistics,
            recommendations,
        }
    }
}
