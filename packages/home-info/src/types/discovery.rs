//! Discovered listing URLs, keyed by source.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::source::Source;

/// Validated listing URLs per source, plus discovery errors.
///
/// Serializes as `{"zillow": [...], "redfin": [...], "errors": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredUrls {
    #[serde(flatten)]
    urls: IndexMap<Source, Vec<Url>>,

    #[serde(default)]
    pub errors: Vec<String>,
}

impl DiscoveredUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the URLs for a source, replacing any previous list.
    ///
    /// An empty list removes the source.
    pub fn insert(&mut self, source: Source, urls: Vec<Url>) {
        if urls.is_empty() {
            self.urls.shift_remove(&source);
        } else {
            self.urls.insert(source, urls);
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, source: Source, urls: Vec<Url>) -> Self {
        self.insert(source, urls);
        self
    }

    /// URLs found for a source, in ranked order.
    pub fn urls_for(&self, source: Source) -> &[Url] {
        self.urls.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any source has at least one URL.
    pub fn has_any(&self) -> bool {
        self.urls.values().any(|urls| !urls.is_empty())
    }

    /// Whether this source has at least one URL.
    pub fn has(&self, source: Source) -> bool {
        !self.urls_for(source).is_empty()
    }

    /// Sources with URLs, in insertion order.
    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.urls
            .iter()
            .filter(|(_, urls)| !urls.is_empty())
            .map(|(source, _)| *source)
    }

    /// Total number of URLs across sources.
    pub fn len(&self) -> usize {
        self.urls.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a discovery error.
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Copy with an empty list for every source that has none, in priority
    /// order, so responses always carry every source key.
    pub fn padded(&self) -> DiscoveredUrls {
        let mut urls: IndexMap<Source, Vec<Url>> = Source::ALL
            .iter()
            .map(|s| (*s, self.urls_for(*s).to_vec()))
            .collect();
        for (source, list) in &self.urls {
            urls.entry(*source).or_insert_with(|| list.clone());
        }
        DiscoveredUrls {
            urls,
            errors: self.errors.clone(),
        }
    }
}
