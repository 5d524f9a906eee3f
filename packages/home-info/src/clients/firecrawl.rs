//! Firecrawl-backed listing client.
//!
//! Search goes through `/search`; extraction through `/scrape` with the JSON
//! format and the property schema. Requires the `firecrawl` feature.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Settings, DEFAULT_FIRECRAWL_API_URL};
use crate::error::{ClientError, ClientResult};
use crate::traits::client::{CallKind, ListingClient, Metered, SearchHit};
use crate::types::property::{ExtractionSchema, PropertyRecord};
use crate::types::source::Source;

const PROVIDER: &str = "firecrawl";

/// Credit costs of Firecrawl calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirecrawlCosts {
    /// Worst-case cost of one search
    pub search_max: u32,

    /// Worst-case cost of one JSON scrape
    pub extract_max: u32,

    /// Cost charged when a scrape response does not report its usage
    pub extract_default: u32,
}

impl Default for FirecrawlCosts {
    fn default() -> Self {
        Self {
            search_max: 3,
            extract_max: 2,
            extract_default: 1,
        }
    }
}

/// Listing client over the Firecrawl REST API.
///
/// # Example
///
/// ```rust,ignore
/// use home_info::clients::FirecrawlClient;
///
/// let settings = Settings::from_env()?;
/// let client = FirecrawlClient::from_settings(&settings)?;
/// let hits = client.search("123 Main St site:zillow.com", Source::Zillow, 3).await?;
/// ```
pub struct FirecrawlClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    costs: FirecrawlCosts,
}

// Request/Response types for Firecrawl API

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    success: bool,
    #[serde(default)]
    data: Vec<SearchItem>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct SearchItem {
    url: String,
    title: Option<String>,
    description: Option<String>,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: Vec<&'static str>,
    #[serde(rename = "jsonOptions")]
    json_options: JsonOptions<'a>,
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
}

#[derive(Serialize)]
struct JsonOptions<'a> {
    schema: &'a Value,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    json: Option<Value>,
    // older API versions
    extract: Option<Value>,
    metadata: Option<ScrapeMetadata>,
}

#[derive(Deserialize)]
struct ScrapeMetadata {
    #[serde(rename = "creditsUsed")]
    credits_used: Option<u32>,
}

impl FirecrawlClient {
    /// Create a client with a 120s per-call timeout.
    pub fn new(api_key: SecretString) -> ClientResult<Self> {
        Self::with_timeout(api_key, Duration::from_secs(120))
    }

    pub fn with_timeout(api_key: SecretString, timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Setup {
                provider: PROVIDER.into(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_FIRECRAWL_API_URL.to_string(),
            costs: FirecrawlCosts::default(),
        })
    }

    /// Build from loaded settings. The per-call timeout is the request timeout.
    pub fn from_settings(settings: &Settings) -> ClientResult<Self> {
        let api_key = SecretString::new(Box::from(settings.firecrawl_api_key.expose_secret()));
        Ok(Self::with_timeout(api_key, settings.request_timeout)?
            .with_base_url(&settings.firecrawl_api_url))
    }

    /// Point at a different API endpoint (e.g. a self-hosted instance).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_costs(mut self, costs: FirecrawlCosts) -> Self {
        self.costs = costs;
        self
    }

    async fn post<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> ClientResult<R> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, text));
        }

        response.json().await.map_err(|e| ClientError::InvalidResponse {
            provider: PROVIDER.into(),
            message: e.to_string(),
        })
    }
}

fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_decode() {
        ClientError::InvalidResponse {
            provider: PROVIDER.into(),
            message: e.to_string(),
        }
    } else {
        ClientError::Transient {
            provider: PROVIDER.into(),
            message: e.to_string(),
        }
    }
}

fn status_error(status: StatusCode, retry_after_secs: Option<u64>, body: String) -> ClientError {
    let message: String = body.chars().take(300).collect();
    if status == StatusCode::TOO_MANY_REQUESTS {
        ClientError::RateLimited {
            provider: PROVIDER.into(),
            retry_after_secs,
        }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ClientError::Transient {
            provider: PROVIDER.into(),
            message: format!("{}: {}", status, message),
        }
    } else {
        ClientError::Rejected {
            provider: PROVIDER.into(),
            status: status.as_u16(),
            message,
        }
    }
}

fn unsuccessful(error: Option<String>, what: &str) -> ClientError {
    ClientError::InvalidResponse {
        provider: PROVIDER.into(),
        message: error.unwrap_or_else(|| format!("{} reported failure", what)),
    }
}

/// Hits with parseable URLs, at most `limit`, charged one credit per hit
/// (minimum one).
fn parse_search(response: SearchResponse, limit: usize) -> ClientResult<Metered<Vec<SearchHit>>> {
    if !response.success {
        return Err(unsuccessful(response.error, "search"));
    }

    let returned = response.data.len();
    let hits: Vec<SearchHit> = response
        .data
        .into_iter()
        .filter_map(|item| {
            let mut hit = SearchHit::from_url(&item.url)?;
            hit.title = item.title;
            hit.snippet = item.description;
            Some(hit)
        })
        .take(limit)
        .collect();

    let credits = returned.min(limit).max(1) as u32;
    Ok(Metered::new(hits, credits))
}

fn parse_scrape(response: ScrapeResponse, default_cost: u32) -> ClientResult<Metered<PropertyRecord>> {
    if !response.success {
        return Err(unsuccessful(response.error, "scrape"));
    }
    let data = response.data.ok_or_else(|| ClientError::InvalidResponse {
        provider: PROVIDER.into(),
        message: "scrape returned no data".into(),
    })?;

    let credits = data
        .metadata
        .as_ref()
        .and_then(|m| m.credits_used)
        .unwrap_or(default_cost);

    let object = match data.json.or(data.extract) {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => serde_json::Map::new(),
        Some(other) => {
            return Err(ClientError::InvalidResponse {
                provider: PROVIDER.into(),
                message: format!("expected a JSON object, got {}", json_kind(&other)),
            })
        }
    };

    Ok(Metered::new(PropertyRecord::from_json(&object), credits))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl ListingClient for FirecrawlClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn search(
        &self,
        query: &str,
        source: Source,
        limit: usize,
    ) -> ClientResult<Metered<Vec<SearchHit>>> {
        debug!(source = %source, limit, "Firecrawl search");
        let request = SearchRequest { query, limit };
        let response: SearchResponse = self.post("/search", &request).await?;
        let metered = parse_search(response, limit)?;
        debug!(
            source = %source,
            hits = metered.value.len(),
            credits = metered.credits,
            "Firecrawl search completed"
        );
        Ok(metered)
    }

    async fn extract(
        &self,
        url: &Url,
        schema: &ExtractionSchema,
    ) -> ClientResult<Metered<PropertyRecord>> {
        debug!(url = %url, "Firecrawl JSON scrape");
        let request = ScrapeRequest {
            url: url.as_str(),
            formats: vec!["json"],
            json_options: JsonOptions {
                schema: &schema.schema,
                prompt: &schema.prompt,
            },
            only_main_content: true,
        };
        let response: ScrapeResponse = self.post("/scrape", &request).await?;
        let metered = parse_scrape(response, self.costs.extract_default)?;
        if metered.credits > self.costs.extract_max {
            warn!(
                url = %url,
                credits = metered.credits,
                max = self.costs.extract_max,
                "Scrape cost more than expected"
            );
        }
        Ok(metered)
    }

    fn max_cost(&self, kind: CallKind) -> u32 {
        match kind {
            CallKind::Search => self.costs.search_max,
            CallKind::Extract => self.costs.extract_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, Some(10), String::new()).is_rate_limited());
        assert!(status_error(StatusCode::BAD_GATEWAY, None, "oops".into()).is_transient());

        let rejected = status_error(StatusCode::PAYMENT_REQUIRED, None, "no credits".into());
        assert_eq!(
            rejected,
            ClientError::Rejected {
                provider: "firecrawl".into(),
                status: 402,
                message: "no credits".into(),
            }
        );
        assert!(!rejected.is_retryable_elsewhere());
    }

    #[test]
    fn test_parse_search_charges_per_hit() {
        let response: SearchResponse = serde_json::from_value(json!({
            "success": true,
            "data": [
                {"url": "https://www.zillow.com/homedetails/1-A-St/1_zpid/", "title": "1 A St"},
                {"url": "not a url"},
                {"url": "https://www.zillow.com/homedetails/1-A-St/2_zpid/"}
            ]
        }))
        .unwrap();
        let metered = parse_search(response, 3).unwrap();
        assert_eq!(metered.value.len(), 2);
        assert_eq!(metered.value[0].title.as_deref(), Some("1 A St"));
        assert_eq!(metered.credits, 3);

        let empty: SearchResponse =
            serde_json::from_value(json!({"success": true, "data": []})).unwrap();
        assert_eq!(parse_search(empty, 3).unwrap().credits, 1);
    }

    #[test]
    fn test_parse_scrape_reads_json_and_cost() {
        let response: ScrapeResponse = serde_json::from_value(json!({
            "success": true,
            "data": {
                "json": {"bedrooms": 3, "bathrooms": 2.5, "home_type": "Condo"},
                "metadata": {"title": "x", "creditsUsed": 2}
            }
        }))
        .unwrap();
        let metered = parse_scrape(response, 1).unwrap();
        assert_eq!(metered.credits, 2);
        assert_eq!(metered.value.bedrooms, Some(3));
        assert_eq!(metered.value.home_type.as_deref(), Some("Condo"));
    }

    #[test]
    fn test_parse_scrape_failures() {
        let failed: ScrapeResponse =
            serde_json::from_value(json!({"success": false, "error": "blocked"})).unwrap();
        assert_eq!(
            parse_scrape(failed, 1).unwrap_err(),
            ClientError::InvalidResponse {
                provider: "firecrawl".into(),
                message: "blocked".into(),
            }
        );

        let array: ScrapeResponse =
            serde_json::from_value(json!({"success": true, "data": {"json": [1, 2]}})).unwrap();
        assert!(parse_scrape(array, 1).is_err());

        let missing: ScrapeResponse =
            serde_json::from_value(json!({"success": true, "data": {"metadata": {}}})).unwrap();
        let metered = parse_scrape(missing, 1).unwrap();
        assert!(metered.value.is_empty());
        assert_eq!(metered.credits, 1);
    }
}
