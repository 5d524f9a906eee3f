//! Testing utilities: a scriptable listing client and a manual clock.
//!
//! Useful for exercising the lookup flow without network calls or sleeping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use url::Url;

use crate::cache::Clock;
use crate::error::{ClientError, ClientResult};
use crate::traits::client::{CallKind, ListingClient, Metered, SearchHit};
use crate::types::property::{ExtractionSchema, PropertyRecord};
use crate::types::source::Source;

/// Record of a call made to the mock client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Search {
        query: String,
        source: Source,
        limit: usize,
    },
    Extract {
        url: String,
    },
}

/// Listing client with canned results per source and per URL.
///
/// Unknown sources return no hits; unknown URLs return an empty record.
/// Search is charged one credit per hit returned (minimum one) unless a
/// fixed cost is set.
pub struct MockListingClient {
    hits: Arc<RwLock<HashMap<Source, Vec<SearchHit>>>>,
    search_failures: Arc<RwLock<HashMap<Source, ClientError>>>,
    records: Arc<RwLock<HashMap<String, PropertyRecord>>>,
    extract_failures: Arc<RwLock<HashMap<String, ClientError>>>,
    search_cost: Option<u32>,
    extract_cost: u32,
    max_search_cost: u32,
    max_extract_cost: u32,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockCall>>>,
}

impl Default for MockListingClient {
    fn default() -> Self {
        Self {
            hits: Arc::default(),
            search_failures: Arc::default(),
            records: Arc::default(),
            extract_failures: Arc::default(),
            search_cost: None,
            extract_cost: 1,
            max_search_cost: 3,
            max_extract_cost: 2,
            calls: Arc::default(),
        }
    }
}

impl MockListingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search hits returned for a source.
    pub fn with_search_hits(self, source: Source, hits: Vec<SearchHit>) -> Self {
        self.hits.write().unwrap().insert(source, hits);
        self
    }

    /// URL strings returned as search hits for a source.
    pub fn with_hits(self, source: Source, urls: &[&str]) -> Self {
        let hits = urls.iter().filter_map(|u| SearchHit::from_url(u)).collect();
        self.with_search_hits(source, hits)
    }

    /// Make every search of a source fail.
    pub fn with_search_failure(self, source: Source, error: ClientError) -> Self {
        self.search_failures.write().unwrap().insert(source, error);
        self
    }

    /// Record returned when extracting a URL.
    pub fn with_record(self, url: &str, record: PropertyRecord) -> Self {
        self.records.write().unwrap().insert(url.to_string(), record);
        self
    }

    /// Make extraction of a URL fail.
    pub fn with_extract_failure(self, url: &str, error: ClientError) -> Self {
        self.extract_failures
            .write()
            .unwrap()
            .insert(url.to_string(), error);
        self
    }

    /// Charge a fixed amount per search.
    pub fn with_search_cost(mut self, credits: u32) -> Self {
        self.search_cost = Some(credits);
        self
    }

    /// Charge a fixed amount per extract. Default: 1.
    pub fn with_extract_cost(mut self, credits: u32) -> Self {
        self.extract_cost = credits;
        self
    }

    /// Worst-case costs reported through `max_cost`. Default: 3 and 2.
    pub fn with_max_costs(mut self, search: u32, extract: u32) -> Self {
        self.max_search_cost = search;
        self.max_extract_cost = extract;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Sources searched, in call order.
    pub fn search_calls(&self) -> Vec<Source> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                MockCall::Search { source, .. } => Some(*source),
                MockCall::Extract { .. } => None,
            })
            .collect()
    }

    /// URLs extracted, in call order.
    pub fn extract_calls(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                MockCall::Extract { url } => Some(url.clone()),
                MockCall::Search { .. } => None,
            })
            .collect()
    }

    pub fn reset_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

impl Clone for MockListingClient {
    fn clone(&self) -> Self {
        Self {
            hits: Arc::clone(&self.hits),
            search_failures: Arc::clone(&self.search_failures),
            records: Arc::clone(&self.records),
            extract_failures: Arc::clone(&self.extract_failures),
            search_cost: self.search_cost,
            extract_cost: self.extract_cost,
            max_search_cost: self.max_search_cost,
            max_extract_cost: self.max_extract_cost,
            calls: Arc::clone(&self.calls),
        }
    }
}

#[async_trait]
impl ListingClient for MockListingClient {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn search(
        &self,
        query: &str,
        source: Source,
        limit: usize,
    ) -> ClientResult<Metered<Vec<SearchHit>>> {
        self.calls.write().unwrap().push(MockCall::Search {
            query: query.to_string(),
            source,
            limit,
        });

        if let Some(error) = self.search_failures.read().unwrap().get(&source) {
            return Err(error.clone());
        }

        let hits: Vec<SearchHit> = self
            .hits
            .read()
            .unwrap()
            .get(&source)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .collect();
        let credits = self.search_cost.unwrap_or(hits.len().max(1) as u32);
        Ok(Metered::new(hits, credits))
    }

    async fn extract(
        &self,
        url: &Url,
        _schema: &ExtractionSchema,
    ) -> ClientResult<Metered<PropertyRecord>> {
        self.calls.write().unwrap().push(MockCall::Extract {
            url: url.to_string(),
        });

        if let Some(error) = self.extract_failures.read().unwrap().get(url.as_str()) {
            return Err(error.clone());
        }

        let record = self
            .records
            .read()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .unwrap_or_default();
        Ok(Metered::new(record, self.extract_cost))
    }

    fn max_cost(&self, kind: CallKind) -> u32 {
        match kind {
            CallKind::Search => self.max_search_cost,
            CallKind::Extract => self.max_extract_cost,
        }
    }
}

/// A rate-limit error as the mock provider would report it.
pub fn rate_limited() -> ClientError {
    ClientError::RateLimited {
        provider: "mock".into(),
        retry_after_secs: None,
    }
}

/// A record with the first `filled` fields of the field set populated.
pub fn record_with_fields(filled: usize) -> PropertyRecord {
    let full = PropertyRecord {
        home_type: Some("Single Family".into()),
        heating_types: Some(vec!["Forced Air".into()]),
        cooling_types: Some(vec!["Central Air".into()]),
        interior_area_sqft: Some(1850),
        lot_size_sqft: Some(7405),
        bedrooms: Some(3),
        bathrooms: Some(2.5),
        parking_options: Some(vec!["Garage".into()]),
        year_built: Some(1994),
        finished_basement: Some(true),
        has_patio: Some(true),
        flooring_types: Some(vec!["Hardwood".into()]),
        appliances_included: Some(vec!["Dishwasher".into()]),
        hoa_fee: Some(35.0),
        property_tax: Some(4120.0),
    };

    let mut record = PropertyRecord::default();
    macro_rules! take {
        ($n:expr, $($field:ident),+) => {{
            let mut i = 0;
            $(
                if i < $n {
                    record.$field = full.$field.clone();
                }
                i += 1;
            )+
            let _ = i;
        }};
    }
    take!(
        filled,
        home_type,
        heating_types,
        cooling_types,
        interior_area_sqft,
        lot_size_sqft,
        bedrooms,
        bathrooms,
        parking_options,
        year_built,
        finished_basement,
        has_patio,
        flooring_types,
        appliances_included,
        hoa_fee,
        property_tax
    );
    record
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Start at the current wall-clock time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        let mut now = self.now.write().unwrap();
        *now = now.checked_add_signed(by).unwrap_or(*now);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_with_fields_counts() {
        assert_eq!(record_with_fields(0).filled_count(), 0);
        assert_eq!(record_with_fields(4).filled_count(), 4);
        assert_eq!(record_with_fields(15).filled_count(), 15);
        assert_eq!(record_with_fields(40).filled_count(), 15);
    }

    #[tokio::test]
    async fn test_mock_tracks_calls_and_costs() {
        let client = MockListingClient::new()
            .with_hits(
                Source::Zillow,
                &[
                    "https://www.zillow.com/homedetails/1-A-St/1_zpid/",
                    "https://www.zillow.com/homedetails/1-A-St/2_zpid/",
                ],
            )
            .with_search_failure(Source::Redfin, rate_limited());

        let metered = client.search("q", Source::Zillow, 3).await.unwrap();
        assert_eq!(metered.credits, 2);
        assert!(client.search("q", Source::Redfin, 3).await.is_err());
        assert_eq!(client.search_calls(), vec![Source::Zillow, Source::Redfin]);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
    }
}
