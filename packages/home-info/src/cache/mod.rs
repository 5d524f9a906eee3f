//! Dual-layer TTL cache keyed by normalized address.

pub mod clock;
pub mod layer;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use layer::{CacheEntry, LayerStats, TtlLayer};
pub use store::{
    CacheHealth, CacheLayer, CachePayload, CacheStats, CacheStore, HealthStatus, DEFAULT_TTL,
};
