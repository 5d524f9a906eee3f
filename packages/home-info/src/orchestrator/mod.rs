//! Lookup orchestration: cache checks, budgeted discovery and extraction,
//! the quality-gated backup and result caching.
//!
//! # Usage
//!
//! ```rust,ignore
//! use home_info::{CacheStore, HomeInfoRequest, Orchestrator};
//! use home_info::testing::MockListingClient;
//!
//! let cache = Arc::new(CacheStore::new());
//! let orchestrator = Orchestrator::new(MockListingClient::new(), cache);
//!
//! let request = HomeInfoRequest::new("123 Main St")
//!     .with_city("Springfield")
//!     .with_state("IL")
//!     .with_zip("62704");
//! let response = orchestrator.extract_home_info(&request).await;
//! ```

mod flow;
pub mod report;

use std::sync::Arc;
use tracing::{info, instrument, warn, Span};
use url::Url;
use uuid::Uuid;

use crate::budget::CreditBudget;
use crate::cache::CacheStore;
use crate::config::LookupConfig;
use crate::error::Result;
use crate::normalize::normalize;
use crate::traits::client::{CallKind, ListingClient};
use crate::types::address::NormalizedAddress;
use crate::types::discovery::DiscoveredUrls;
use crate::types::property::ExtractionSchema;
use crate::types::request::{
    ExtractFromUrlsRequest, HomeInfoRequest, HomeInfoResponse, PropertyUrlsResponse,
};
use crate::types::source::Source;
use crate::usage::UsageMonitor;

use flow::{Calls, Flow};
pub use report::{FlowReport, Outcome, SourceAttempt, SourceFailure, SourceRole, Stage};

/// Response of a full lookup together with its trace.
#[derive(Debug, Clone)]
pub struct LookupOutcome {
    pub response: HomeInfoResponse,

    /// `None` when the request was rejected before the flow started
    pub report: Option<FlowReport>,
}

/// Runs lookups against a listing client and a shared cache.
pub struct Orchestrator<C> {
    client: C,
    cache: Arc<CacheStore>,
    config: LookupConfig,
    usage: Arc<UsageMonitor>,
}

impl<C: ListingClient> Orchestrator<C> {
    /// Create an orchestrator with default configuration.
    pub fn new(client: C, cache: Arc<CacheStore>) -> Self {
        Self {
            client,
            cache,
            config: LookupConfig::default(),
            usage: Arc::new(UsageMonitor::new()),
        }
    }

    pub fn with_config(mut self, config: LookupConfig) -> Self {
        self.config = config;
        self
    }

    /// Share usage counters with other orchestrators.
    pub fn with_usage(mut self, usage: Arc<UsageMonitor>) -> Self {
        self.usage = usage;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn usage(&self) -> &Arc<UsageMonitor> {
        &self.usage
    }

    fn prepare(request: &HomeInfoRequest) -> Result<NormalizedAddress> {
        request.validate()?;
        normalize(request)
    }

    /// Discover and extract property data for an address.
    ///
    /// Never fails: request problems and exhausted sources are reported in
    /// the response envelope with `success: false`.
    #[instrument(skip(self, request), fields(request_id = tracing::field::Empty, key = tracing::field::Empty))]
    pub async fn lookup(&self, request: &HomeInfoRequest) -> LookupOutcome {
        let request_id = Uuid::new_v4();
        Span::current().record("request_id", tracing::field::display(request_id));

        let address = match Self::prepare(request) {
            Ok(address) => address,
            Err(e) => {
                warn!(error = %e, "Lookup rejected");
                self.usage.record_credits(0, 0, true);
                return LookupOutcome {
                    response: HomeInfoResponse::failure(request.address.clone(), e.to_string()),
                    report: None,
                };
            }
        };
        Span::current().record("key", tracing::field::display(address.key.fingerprint()));

        let result = Flow::new(&self.client, &self.cache, &self.config, &address, request_id)
            .run()
            .await;
        self.usage.record(&result.report);

        let response = match result.property {
            Some(property) => HomeInfoResponse::success(
                address.query.clone(),
                property.record,
                property
                    .sources
                    .iter()
                    .map(|s| s.domain().to_string())
                    .collect(),
            ),
            None => {
                let reasons = result.report.failure_summary();
                let message = if reasons.is_empty() {
                    "no listing data found".to_string()
                } else {
                    format!("no listing data found: {}", reasons)
                };
                HomeInfoResponse::failure(address.query.clone(), message)
            }
        };

        LookupOutcome {
            response,
            report: Some(result.report),
        }
    }

    /// Full lookup, response only.
    pub async fn extract_home_info(&self, request: &HomeInfoRequest) -> HomeInfoResponse {
        self.lookup(request).await.response
    }

    /// Find validated listing URLs without extracting.
    ///
    /// Serves from the URL cache when possible; otherwise searches sources in
    /// priority order and stops at the first one that validates.
    #[instrument(skip(self, request), fields(key = tracing::field::Empty))]
    pub async fn find_property_urls(&self, request: &HomeInfoRequest) -> PropertyUrlsResponse {
        let address = match Self::prepare(request) {
            Ok(address) => address,
            Err(e) => {
                self.usage.record_credits(0, 0, true);
                return PropertyUrlsResponse::failure(
                    request.address.clone(),
                    &DiscoveredUrls::new(),
                    e.to_string(),
                );
            }
        };
        Span::current().record("key", tracing::field::display(address.key.fingerprint()));

        if let Some(cached) = self.cache.get_urls(&address.key).filter(|d| d.has_any()) {
            info!(urls = cached.len(), "URL cache hit");
            self.usage.record_credits(0, 0, false);
            return PropertyUrlsResponse::success(address.query.clone(), &cached);
        }

        let mut calls = Calls::new(&self.client, CreditBudget::new(self.config.max_credits));
        let mut found = DiscoveredUrls::new();

        for source in &self.config.sources {
            if calls.provider_refused {
                break;
            }
            match calls.discover(*source, &address, &self.config).await {
                Ok(urls) => {
                    found.insert(*source, urls);
                    break;
                }
                Err(failure) => found.push_error(format!("{}: {}", source, failure)),
            }
        }

        let used = calls.budget.report();
        let success = found.has_any();
        self.usage
            .record_credits(used.search, used.extract, !success);
        info!(urls = found.len(), credits = used.used, "URL discovery completed");

        if success {
            // Errors from sources that failed belong to this request only
            let mut cached = found.clone();
            cached.errors.clear();
            self.cache
                .put_urls(address.key.clone(), cached, Some(self.config.cache_ttl()));
            PropertyUrlsResponse::success(address.query.clone(), &found)
        } else {
            let message = format!("no listing URLs found: {}", found.errors.join("; "));
            PropertyUrlsResponse::failure(address.query.clone(), &found, message)
        }
    }

    /// Extract from caller-supplied URLs under the credit budget.
    ///
    /// Results are merged first-found-wins and are not cached.
    #[instrument(skip(self, request), fields(urls = request.property_urls.len()))]
    pub async fn extract_from_urls(&self, request: &ExtractFromUrlsRequest) -> HomeInfoResponse {
        let urls = match request.validate() {
            Ok(urls) => urls,
            Err(e) => {
                self.usage.record_credits(0, 0, true);
                return HomeInfoResponse::failure(request.address.clone(), e.to_string());
            }
        };

        let schema = ExtractionSchema::for_address(request.address.trim());
        let mut calls = Calls::new(&self.client, CreditBudget::new(self.config.max_credits));
        let batch = calls.extract_all(&urls, &schema).await;
        let record = batch.record.filter(|r| !r.is_empty());

        let used = calls.budget.report();
        self.usage
            .record_credits(used.search, used.extract, record.is_none());
        info!(
            extracted = batch.extracted.len(),
            credits = calls.budget.spent_on(CallKind::Extract),
            "URL extraction completed"
        );

        match record {
            Some(record) => HomeInfoResponse::success(
                request.address.clone(),
                record,
                contributing_hosts(&batch.extracted),
            ),
            None => {
                let mut reasons: Vec<String> = batch
                    .failures
                    .iter()
                    .map(|(url, failure)| format!("{}: {}", url, failure))
                    .collect();
                if !batch.extracted.is_empty() {
                    let empty = SourceFailure::NoData {
                        urls: batch.extracted.len(),
                    };
                    reasons.push(empty.to_string());
                }
                HomeInfoResponse::failure(
                    request.address.clone(),
                    format!("no property data extracted: {}", reasons.join("; ")),
                )
            }
        }
    }
}

/// Distinct sites of the URLs, in order.
///
/// Known sources are reported by domain, like full lookups; anything else
/// by host.
fn contributing_hosts(urls: &[Url]) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for url in urls {
        let host = match Source::from_url(url) {
            Some(source) => source.domain().to_string(),
            None => match url.host_str() {
                Some(host) => host.to_string(),
                None => continue,
            },
        };
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    hosts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record_with_fields, MockListingClient};
    use crate::types::property::PropertyRecord;

    const ZILLOW: &str = "https://www.zillow.com/homedetails/123-Main-St-Springfield-IL-62704/5551_zpid/";
    const REDFIN: &str = "https://www.redfin.com/IL/Springfield/123-Main-St-62704/home/777";

    fn request() -> HomeInfoRequest {
        HomeInfoRequest::new("123 Main St")
            .with_city("Springfield")
            .with_state("IL")
            .with_zip("62704")
    }

    fn orchestrator(client: MockListingClient) -> Orchestrator<MockListingClient> {
        Orchestrator::new(client, Arc::new(CacheStore::new()))
    }

    #[tokio::test]
    async fn test_lookup_reports_domains_and_normalized_address() {
        let client = MockListingClient::new()
            .with_hits(Source::Zillow, &[ZILLOW])
            .with_record(ZILLOW, record_with_fields(10));

        let outcome = orchestrator(client).lookup(&request()).await;
        assert!(outcome.response.success);
        assert_eq!(outcome.response.address, "123 Main St, Springfield, IL 62704");
        assert_eq!(outcome.response.sources, vec!["zillow.com".to_string()]);

        let report = outcome.report.unwrap();
        assert_eq!(report.outcome, Outcome::Extracted);
        assert_eq!(report.credits.used, 2);
        assert!(!report.backup_used());
    }

    #[tokio::test]
    async fn test_malformed_address_spends_nothing() {
        let client = MockListingClient::new();
        let orchestrator = orchestrator(client.clone());

        let outcome = orchestrator.lookup(&HomeInfoRequest::new("Main St")).await;
        assert!(!outcome.response.success);
        assert!(outcome.report.is_none());
        assert_eq!(client.call_count(), 0);
        assert_eq!(orchestrator.usage().snapshot().failed_requests, 1);
    }

    #[tokio::test]
    async fn test_failure_message_names_each_source() {
        let client = MockListingClient::new()
            .with_hits(Source::Zillow, &["https://www.zillow.com/homes/Springfield-IL_rb/"])
            .with_search_failure(Source::Redfin, crate::testing::rate_limited());

        let outcome = orchestrator(client).lookup(&request()).await;
        let message = outcome.response.error_message.unwrap();
        assert!(message.starts_with("no listing data found: "));
        assert!(message.contains("zillow: "));
        assert!(message.contains("redfin: search rate limited"));
        assert!(outcome.report.unwrap().failed());
    }

    #[tokio::test]
    async fn test_find_property_urls_serves_cache_second_time() {
        let client = MockListingClient::new().with_hits(Source::Zillow, &[ZILLOW]);
        let orchestrator = orchestrator(client.clone());

        let first = orchestrator.find_property_urls(&request()).await;
        assert!(first.success);
        assert_eq!(first.found_urls.urls_for(Source::Zillow).len(), 1);
        assert!(!first.found_urls.has(Source::Redfin));

        let second = orchestrator.find_property_urls(&request()).await;
        assert_eq!(second.found_urls, first.found_urls);
        assert_eq!(client.search_calls(), vec![Source::Zillow]);
    }

    #[tokio::test]
    async fn test_find_property_urls_cache_drops_request_errors() {
        let client = MockListingClient::new()
            .with_search_failure(Source::Zillow, crate::testing::rate_limited())
            .with_hits(Source::Redfin, &[REDFIN]);
        let orchestrator = orchestrator(client.clone());

        let first = orchestrator.find_property_urls(&request()).await;
        assert!(first.success);
        assert_eq!(first.found_urls.errors.len(), 1);

        let second = orchestrator.find_property_urls(&request()).await;
        assert!(second.success);
        assert!(second.found_urls.errors.is_empty());
        assert_eq!(second.found_urls.urls_for(Source::Redfin).len(), 1);
        assert_eq!(client.search_calls(), vec![Source::Zillow, Source::Redfin]);

        let key = normalize(&request()).unwrap().key;
        assert!(orchestrator.cache().get_urls(&key).unwrap().errors.is_empty());
    }

    #[tokio::test]
    async fn test_extract_from_urls_merges_in_order() {
        let partial = PropertyRecord {
            bedrooms: Some(4),
            ..Default::default()
        };
        let client = MockListingClient::new()
            .with_record(ZILLOW, partial)
            .with_record(REDFIN, record_with_fields(6));

        let request = ExtractFromUrlsRequest::new(
            vec![ZILLOW.to_string(), REDFIN.to_string()],
            "123 Main St, Springfield, IL",
        );
        let response = orchestrator(client.clone()).extract_from_urls(&request).await;

        assert!(response.success);
        let record = response.property_info.unwrap();
        assert_eq!(record.bedrooms, Some(4));
        assert_eq!(record.filled_count(), 6);
        assert_eq!(response.sources, vec!["zillow.com", "redfin.com"]);
        assert_eq!(client.extract_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_extract_from_urls_empty_records_fail() {
        let client = MockListingClient::new().with_record(ZILLOW, PropertyRecord::default());
        let request = ExtractFromUrlsRequest::new(vec![ZILLOW.to_string()], "123 Main St");

        let response = orchestrator(client.clone()).extract_from_urls(&request).await;
        assert!(!response.success);
        assert!(response.property_info.is_none());
        assert!(response
            .error_message
            .unwrap()
            .contains("no property data in 1 extracted pages"));
        assert_eq!(client.extract_calls().len(), 1);
    }

    #[test]
    fn test_contributing_hosts_prefers_source_domain() {
        let urls = vec![
            Url::parse(ZILLOW).unwrap(),
            Url::parse("https://zillow.com/homedetails/1-A-St/2_zpid/").unwrap(),
            Url::parse("https://listings.example.com/home/1").unwrap(),
        ];
        assert_eq!(
            contributing_hosts(&urls),
            vec!["zillow.com", "listings.example.com"]
        );
    }

    #[tokio::test]
    async fn test_extract_from_urls_rejects_bad_urls_without_calls() {
        let client = MockListingClient::new();
        let request = ExtractFromUrlsRequest::new(vec!["ftp://example.com/x".into()], "addr");

        let response = orchestrator(client.clone()).extract_from_urls(&request).await;
        assert!(!response.success);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_orchestrators_share_client_and_cache() {
        let client = Arc::new(
            MockListingClient::new()
                .with_hits(Source::Zillow, &[ZILLOW])
                .with_record(ZILLOW, record_with_fields(10)),
        );
        let cache = Arc::new(CacheStore::new());
        let first = Orchestrator::new(Arc::clone(&client), Arc::clone(&cache));
        let second = Orchestrator::new(Arc::clone(&client), cache);

        first.extract_home_info(&request()).await;
        let response = second.extract_home_info(&request()).await;

        assert!(response.success);
        assert_eq!(client.call_count(), 2);
        assert_eq!(second.usage().snapshot().extraction_cache_hits, 1);
    }
}
