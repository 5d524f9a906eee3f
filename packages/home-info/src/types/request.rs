//! Boundary request and response records.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LookupError, Result};
use crate::types::address::AddressInput;
use crate::types::discovery::DiscoveredUrls;
use crate::types::property::PropertyRecord;

/// Maximum length of any single address component.
const MAX_COMPONENT_LEN: usize = 200;

/// Maximum number of URLs accepted by an extract-only request.
pub const MAX_EXTRACT_URLS: usize = 10;

/// Request for discovery and full extraction.
pub type HomeInfoRequest = AddressInput;

impl AddressInput {
    /// Boundary checks: a non-blank street line and bounded component lengths.
    ///
    /// Address semantics (house number, zip format) are checked by the
    /// normalizer.
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(LookupError::invalid("address is required"));
        }

        let components = [
            ("address", Some(&self.address)),
            ("city", self.city.as_ref()),
            ("state", self.state.as_ref()),
            ("zip_code", self.zip_code.as_ref()),
        ];
        for (name, value) in components {
            if value.is_some_and(|v| v.len() > MAX_COMPONENT_LEN) {
                return Err(LookupError::invalid(format!(
                    "{} exceeds {} characters",
                    name, MAX_COMPONENT_LEN
                )));
            }
        }

        Ok(())
    }
}

/// Request to extract from caller-supplied listing URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractFromUrlsRequest {
    /// Property detail URLs to extract from
    pub property_urls: Vec<String>,

    /// Address used in the extraction prompt
    pub address: String,
}

impl ExtractFromUrlsRequest {
    pub fn new(property_urls: Vec<String>, address: impl Into<String>) -> Self {
        Self {
            property_urls,
            address: address.into(),
        }
    }

    /// Check the request and parse its URLs.
    ///
    /// Duplicates are dropped, keeping first occurrence.
    pub fn validate(&self) -> Result<Vec<Url>> {
        if self.address.trim().is_empty() {
            return Err(LookupError::invalid("address is required"));
        }
        if self.property_urls.is_empty() {
            return Err(LookupError::invalid("no property URLs provided"));
        }
        if self.property_urls.len() > MAX_EXTRACT_URLS {
            return Err(LookupError::invalid(format!(
                "at most {} property URLs per request",
                MAX_EXTRACT_URLS
            )));
        }

        let mut urls: Vec<Url> = Vec::with_capacity(self.property_urls.len());
        for raw in &self.property_urls {
            let url = Url::parse(raw.trim())
                .map_err(|e| LookupError::invalid(format!("invalid URL {}: {}", raw, e)))?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(LookupError::invalid(format!("not a web URL: {}", raw)));
            }
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Ok(urls)
    }
}

/// Result of a full lookup or an extract-only request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeInfoResponse {
    pub address: String,

    /// `None` (serialized as null) when the request failed
    pub property_info: Option<PropertyRecord>,

    /// Domains that contributed data, e.g. "zillow.com"
    #[serde(default)]
    pub sources: Vec<String>,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl HomeInfoResponse {
    pub fn success(address: impl Into<String>, record: PropertyRecord, sources: Vec<String>) -> Self {
        Self {
            address: address.into(),
            property_info: Some(record),
            sources,
            success: true,
            error_message: None,
        }
    }

    pub fn failure(address: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            property_info: None,
            sources: Vec::new(),
            success: false,
            error_message: Some(error_message.into()),
        }
    }
}

/// Result of a discovery-only request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyUrlsResponse {
    pub address: String,
    pub found_urls: DiscoveredUrls,
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PropertyUrlsResponse {
    pub fn success(address: impl Into<String>, found_urls: &DiscoveredUrls) -> Self {
        Self {
            address: address.into(),
            found_urls: found_urls.padded(),
            success: true,
            error_message: None,
        }
    }

    pub fn failure(
        address: impl Into<String>,
        found_urls: &DiscoveredUrls,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            found_urls: found_urls.padded(),
            success: false,
            error_message: Some(error_message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_address_rejected() {
        let err = HomeInfoRequest::new("   ").validate().unwrap_err();
        assert!(matches!(err, LookupError::InvalidRequest { .. }));
    }

    #[test]
    fn test_extract_request_parses_and_dedups() {
        let req = ExtractFromUrlsRequest::new(
            vec![
                "https://www.zillow.com/homedetails/1-A-St/1_zpid/".into(),
                "https://www.zillow.com/homedetails/1-A-St/1_zpid/".into(),
            ],
            "1 A St",
        );
        assert_eq!(req.validate().unwrap().len(), 1);
    }

    #[test]
    fn test_extract_request_rejects_bad_urls() {
        let empty = ExtractFromUrlsRequest::new(vec![], "1 A St");
        assert!(empty.validate().is_err());

        let ftp = ExtractFromUrlsRequest::new(vec!["ftp://zillow.com/x".into()], "1 A St");
        assert!(ftp.validate().is_err());

        let junk = ExtractFromUrlsRequest::new(vec!["not a url".into()], "1 A St");
        assert!(junk.validate().is_err());
    }

    #[test]
    fn test_failure_response_has_no_record() {
        let resp = HomeInfoResponse::failure("1 A St", "malformed address: zip");
        assert!(!resp.success);
        assert!(resp.property_info.is_none());
        assert!(resp.sources.is_empty());

        let json = serde_json::to_value(&resp).unwrap();
        assert!(json["property_info"].is_null());
        assert_eq!(json["error_message"], "malformed address: zip");
    }
}
