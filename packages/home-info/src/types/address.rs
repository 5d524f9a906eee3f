//! Address types - raw input and the normalized cache key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Raw address fields as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    /// Street line, e.g. "123 Main St Apt 4"
    pub address: String,

    /// City name
    #[serde(default)]
    pub city: Option<String>,

    /// State abbreviation
    #[serde(default)]
    pub state: Option<String>,

    /// ZIP or ZIP+4
    #[serde(default)]
    pub zip_code: Option<String>,
}

impl AddressInput {
    /// Create an input with only a street line.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Set the city.
    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Set the state.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Set the ZIP code.
    pub fn with_zip(mut self, zip: impl Into<String>) -> Self {
        self.zip_code = Some(zip.into());
        self
    }
}

/// Normalized address identity shared by both cache layers.
///
/// Equality is the cache identity: two inputs that differ only in case,
/// spacing, punctuation or suffix spelling produce equal keys. Absent
/// components stay `None`, so a key without a zip never collides with a
/// key that has one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressKey {
    /// House number and street name, e.g. "123 main st"
    pub street: String,

    /// Unit identifier without its designator, e.g. "4" for "Apt 4" or "#4"
    pub unit: Option<String>,

    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl AddressKey {
    /// House number plus street name tokens.
    pub fn street_tokens(&self) -> Vec<&str> {
        self.street.split(' ').filter(|t| !t.is_empty()).collect()
    }

    /// The house number (first street token).
    pub fn house_number(&self) -> Option<&str> {
        self.street.split(' ').next().filter(|t| !t.is_empty())
    }

    /// Every token of the key, in street → unit → city → state → zip order.
    pub fn tokens(&self) -> Vec<&str> {
        [
            Some(self.street.as_str()),
            self.unit.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.zip.as_deref(),
        ]
        .into_iter()
        .flatten()
        .flat_map(|part| part.split(' '))
        .filter(|t| !t.is_empty())
        .collect()
    }

    /// Canonical string form, `street|unit|city|state|zip` with `-` for absent parts.
    pub fn canonical(&self) -> String {
        let part = |p: &Option<String>| p.clone().unwrap_or_else(|| "-".to_string());
        format!(
            "{}|{}|{}|{}|{}",
            self.street,
            part(&self.unit),
            part(&self.city),
            part(&self.state),
            part(&self.zip)
        )
    }

    /// Short SHA-256 fingerprint, safe to log in place of the address.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..12].to_string()
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Output of the address normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAddress {
    /// Equality identity for the caches
    pub key: AddressKey,

    /// Display-cased full address for search engines and responses,
    /// e.g. "123 Main St, Springfield, IL 62704"
    pub query: String,
}
