//! Listing sources - the real-estate sites URLs are discovered on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// A supported listing website.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Zillow,
    Redfin,
}

impl Source {
    /// All sources in default priority order.
    pub const ALL: [Source; 2] = [Source::Zillow, Source::Redfin];

    /// Stable identifier used in responses and cache payloads.
    pub fn id(&self) -> &'static str {
        match self {
            Source::Zillow => "zillow",
            Source::Redfin => "redfin",
        }
    }

    /// Registrable domain of the site.
    pub fn domain(&self) -> &'static str {
        match self {
            Source::Zillow => "zillow.com",
            Source::Redfin => "redfin.com",
        }
    }

    /// Scope a search query to this site's listing pages.
    pub fn scoped_query(&self, query: &str) -> String {
        match self {
            Source::Zillow => format!("{} site:zillow.com homedetails", query),
            Source::Redfin => format!("{} site:redfin.com", query),
        }
    }

    /// Identify which source a URL belongs to, if any.
    pub fn from_url(url: &Url) -> Option<Source> {
        Self::ALL.into_iter().find(|s| s.owns_host(url))
    }

    /// Whether the URL is hosted on this source.
    pub fn owns_host(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let domain = self.domain();
        host == domain || host.ends_with(&format!(".{}", domain))
    }

    /// Whether the URL is a property detail page on this source.
    ///
    /// Search pages, agent pages and city listings are not.
    pub fn is_listing_url(&self, url: &Url) -> bool {
        self.owns_host(url) && self.address_segment(url).is_some()
    }

    /// The path segment that embeds the street address.
    ///
    /// - Zillow: `/homedetails/123-Main-St-Springfield-IL-62704/1234_zpid/`
    /// - Redfin: `/IL/Springfield/123-Main-St-62704/home/1234567`
    pub fn address_segment<'a>(&self, url: &'a Url) -> Option<&'a str> {
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        let marker = match self {
            Source::Zillow => "homedetails",
            Source::Redfin => "home",
        };
        let pos = segments.iter().position(|s| s.eq_ignore_ascii_case(marker))?;

        match self {
            Source::Zillow => segments.get(pos + 1).copied(),
            Source::Redfin => pos.checked_sub(1).and_then(|i| segments.get(i).copied()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zillow" | "zillow.com" => Ok(Source::Zillow),
            "redfin" | "redfin.com" => Ok(Source::Redfin),
            other => Err(format!("unknown listing source: {}", other)),
        }
    }
}
