//! Listing client implementations.

#[cfg(feature = "firecrawl")]
pub mod firecrawl;

#[cfg(feature = "firecrawl")]
pub use firecrawl::{FirecrawlClient, FirecrawlCosts};
