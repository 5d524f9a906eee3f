//! Property Lookup with a Dual-Layer Listing Cache
//!
//! Resolves a postal address to structured property facts by searching
//! listing sites (Zillow, then Redfin), validating that each candidate URL
//! really is the requested address, and extracting a fixed field schema
//! through a metered scraping provider.
//!
//! # Design
//!
//! - Every request runs under a credit budget checked before each call
//! - Two independent TTL caches: discovered URLs and extracted records
//! - A backup source is consulted only when the primary record is too sparse
//!   and the budget can cover it
//! - Failures are reported in the response envelope, never thrown
//!
//! # Usage
//!
//! ```rust,ignore
//! use home_info::{CacheStore, FirecrawlClient, HomeInfoRequest, Orchestrator, Settings};
//!
//! let settings = Settings::from_env()?;
//! let client = FirecrawlClient::from_settings(&settings)?;
//! let orchestrator = Orchestrator::new(client, Arc::new(CacheStore::new()))
//!     .with_config(settings.lookup.clone());
//!
//! let response = orchestrator
//!     .extract_home_info(&HomeInfoRequest::new("123 Main St, Springfield, IL 62704"))
//!     .await;
//! ```
//!
//! # Modules
//!
//! - [`types`] - Address, property record and request/response types
//! - [`normalize`] - Address normalization into cache keys
//! - [`validator`] - Listing URL validation and ranking
//! - [`cache`] - TTL cache layers and the dual-layer store
//! - [`budget`] - Per-request credit accounting
//! - [`orchestrator`] - The lookup state machine and public entry points
//! - [`clients`] - Listing client implementations (Firecrawl)
//! - [`testing`] - Mock client and manual clock

pub mod budget;
pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod testing;
pub mod traits;
pub mod types;
pub mod usage;
pub mod validator;

// Re-export core types at crate root
pub use budget::{BudgetReport, BudgetStatus, CreditBudget, DEFAULT_CREDIT_LIMIT};
pub use cache::{CacheHealth, CacheLayer, CacheStats, CacheStore, Clock, HealthStatus, SystemClock};
pub use config::{LookupConfig, Settings};
pub use error::{ClientError, ConfigError, LookupError};
pub use normalize::normalize;
pub use orchestrator::{
    FlowReport, LookupOutcome, Orchestrator, Outcome, SourceAttempt, SourceFailure, SourceRole,
    Stage,
};
pub use traits::client::{CallKind, ListingClient, Metered, SearchHit};
pub use types::{
    address::{AddressInput, AddressKey, NormalizedAddress},
    discovery::DiscoveredUrls,
    property::{ExtractedProperty, ExtractionSchema, PropertyField, PropertyRecord, QualityScore},
    request::{
        ExtractFromUrlsRequest, HomeInfoRequest, HomeInfoResponse, PropertyUrlsResponse,
    },
    source::Source,
};
pub use usage::{Efficiency, UsageMonitor, UsageSnapshot};

#[cfg(feature = "firecrawl")]
pub use clients::FirecrawlClient;

// Re-export testing utilities
pub use testing::{ManualClock, MockListingClient};
