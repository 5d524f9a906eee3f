//! Listing client trait: credit-metered search and extraction.
//!
//! This is the only I/O boundary of the library. Implementations report
//! the credits each successful call consumed; the orchestrator never
//! assumes a fixed price.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::error::ClientResult;
use crate::types::property::{ExtractionSchema, PropertyRecord};
use crate::types::source::Source;

/// A search result candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: Url,

    /// Page title, when the search API returns one.
    pub title: Option<String>,

    pub snippet: Option<String>,
}

impl SearchHit {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            title: None,
            snippet: None,
        }
    }

    /// Create from a URL string.
    pub fn from_url(url: &str) -> Option<Self> {
        Url::parse(url).ok().map(Self::new)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A call result together with the credits it consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Metered<T> {
    pub value: T,
    pub credits: u32,
}

impl<T> Metered<T> {
    pub fn new(value: T, credits: u32) -> Self {
        Self { value, credits }
    }
}

/// Category of an external call, for budgeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Search,
    Extract,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Search => f.write_str("search"),
            CallKind::Extract => f.write_str("extract"),
        }
    }
}

/// Search and structured-extraction provider.
///
/// # Implementations
///
/// - `FirecrawlClient` - Firecrawl search + scrape-with-JSON (feature `firecrawl`)
/// - `MockListingClient` - For testing
#[async_trait]
pub trait ListingClient: Send + Sync {
    /// Provider name for logs and error messages.
    fn provider(&self) -> &str;

    /// Search the web with a query already scoped to `source`.
    ///
    /// Returns at most `limit` hits in provider order.
    async fn search(
        &self,
        query: &str,
        source: Source,
        limit: usize,
    ) -> ClientResult<Metered<Vec<SearchHit>>>;

    /// Extract the property field set from one listing page.
    async fn extract(
        &self,
        url: &Url,
        schema: &ExtractionSchema,
    ) -> ClientResult<Metered<PropertyRecord>>;

    /// Upper bound on what one call of this kind can cost.
    ///
    /// Checked against the remaining budget before each call.
    fn max_cost(&self, kind: CallKind) -> u32;
}

#[async_trait]
impl<T: ListingClient + ?Sized> ListingClient for Arc<T> {
    fn provider(&self) -> &str {
        (**self).provider()
    }

    async fn search(
        &self,
        query: &str,
        source: Source,
        limit: usize,
    ) -> ClientResult<Metered<Vec<SearchHit>>> {
        (**self).search(query, source, limit).await
    }

    async fn extract(
        &self,
        url: &Url,
        schema: &ExtractionSchema,
    ) -> ClientResult<Metered<PropertyRecord>> {
        (**self).extract(url, schema).await
    }

    fn max_cost(&self, kind: CallKind) -> u32 {
        (**self).max_cost(kind)
    }
}
