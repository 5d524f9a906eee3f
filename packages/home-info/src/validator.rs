//! Listing URL validation.
//!
//! A search hit is accepted for a source only when it is a property detail
//! page of that source and the street number + street name embedded in it
//! (URL slug, or failing that the page title) equal the target's. When the
//! target has a unit, the candidate must also name that unit after the
//! street. City, state or zip agreement alone never make a match.

use serde::Serialize;
use std::collections::HashSet;
use url::Url;

use crate::normalize::street_like_tokens;
use crate::traits::client::SearchHit;
use crate::types::address::AddressKey;
use crate::types::source::Source;

/// A validated candidate with its ranking data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCandidate {
    pub url: Url,

    /// Number of target key tokens found in the candidate
    pub overlap: usize,

    /// Position in the original search results
    pub position: usize,
}

/// Outcome of validating one source's search hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Ranked URLs, best first
    Matched(Vec<Url>),

    /// No candidate matched the target street
    NoMatch { candidates: usize },
}

impl Validation {
    pub fn urls(&self) -> &[Url] {
        match self {
            Validation::Matched(urls) => urls,
            Validation::NoMatch { .. } => &[],
        }
    }
}

/// Tokens from the URL's address slug.
fn slug_tokens(source: Source, url: &Url) -> Vec<String> {
    source
        .address_segment(url)
        .map(street_like_tokens)
        .unwrap_or_default()
}

/// Tokens from the title's first comma-separated part ("123 Main St, ...").
fn title_tokens(hit: &SearchHit) -> Vec<String> {
    hit.title
        .as_deref()
        .and_then(|t| t.split(',').next())
        .map(street_like_tokens)
        .unwrap_or_default()
}

fn starts_with_street(tokens: &[String], street: &[&str]) -> bool {
    !street.is_empty()
        && tokens.len() >= street.len()
        && tokens.iter().zip(street).all(|(a, b)| a == b)
}

/// Every unit token appears somewhere after the street.
fn names_unit(tokens: &[String], street_len: usize, unit: Option<&str>) -> bool {
    let Some(unit) = unit else {
        return true;
    };
    let rest = tokens.get(street_len..).unwrap_or_default();
    unit.split_whitespace().all(|u| rest.iter().any(|t| t == u))
}

/// Whether a hit is a listing of `source` for the target street and unit.
pub fn validate(source: Source, hit: &SearchHit, target: &AddressKey) -> bool {
    if !source.is_listing_url(&hit.url) {
        return false;
    }
    let street = target.street_tokens();
    let unit = target.unit.as_deref();
    [slug_tokens(source, &hit.url), title_tokens(hit)]
        .iter()
        .any(|tokens| {
            starts_with_street(tokens, &street) && names_unit(tokens, street.len(), unit)
        })
}

/// Validate and rank hits by token overlap with the whole target key.
///
/// Ties keep search order. Duplicate URLs are dropped.
pub fn rank(source: Source, hits: &[SearchHit], target: &AddressKey) -> Vec<RankedCandidate> {
    let key_tokens = target.tokens();
    let mut seen: HashSet<&Url> = HashSet::new();

    let mut ranked: Vec<RankedCandidate> = hits
        .iter()
        .enumerate()
        .filter(|(_, hit)| validate(source, hit, target))
        .filter(|(_, hit)| seen.insert(&hit.url))
        .map(|(position, hit)| {
            let found: HashSet<String> = slug_tokens(source, &hit.url)
                .into_iter()
                .chain(
                    hit.title
                        .as_deref()
                        .map(street_like_tokens)
                        .unwrap_or_default(),
                )
                .collect();
            let overlap = key_tokens.iter().filter(|t| found.contains(**t)).count();
            RankedCandidate {
                url: hit.url.clone(),
                overlap,
                position,
            }
        })
        .collect();

    // stable: equal overlap keeps search order
    ranked.sort_by(|a, b| b.overlap.cmp(&a.overlap));
    ranked
}

/// Pick at most `max` validated URLs for a source.
pub fn select(source: Source, hits: &[SearchHit], target: &AddressKey, max: usize) -> Validation {
    let urls: Vec<Url> = rank(source, hits, target)
        .into_iter()
        .take(max)
        .map(|c| c.url)
        .collect();

    if urls.is_empty() {
        Validation::NoMatch {
            candidates: hits.len(),
        }
    } else {
        Validation::Matched(urls)
    }
}
