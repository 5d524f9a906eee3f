//! Per-request trace of the lookup state machine.

use serde::Serialize;
use std::fmt;
use url::Url;
use uuid::Uuid;

use crate::budget::BudgetReport;
use crate::traits::client::CallKind;
use crate::types::property::QualityScore;
use crate::types::source::Source;

/// A state of the lookup flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtractionCacheCheck,
    UrlCacheCheck,
    PrimarySearch,
    Validate,
    PrimaryExtract,
    QualityGate,
    BackupSearch,
    BackupExtract,
    Merge,
    CacheWrite,
    Respond,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Respond | Stage::Failed)
    }
}

/// Why a source produced nothing usable. Never fatal for the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceFailure {
    /// Search returned no candidate matching the target street
    NoMatch { candidates: usize },

    /// The client call failed
    ExternalCall {
        call: CallKind,
        message: String,
        rate_limited: bool,
    },

    /// Extraction succeeded but every field came back empty
    NoData { urls: usize },

    /// Remaining credits could not cover the next call
    BudgetExhausted { needed: u32, remaining: u32 },
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFailure::NoMatch { candidates } => {
                write!(f, "no matching listing among {} candidates", candidates)
            }
            SourceFailure::ExternalCall {
                call,
                rate_limited: true,
                ..
            } => write!(f, "{} rate limited", call),
            SourceFailure::ExternalCall { call, message, .. } => {
                write!(f, "{} failed: {}", call, message)
            }
            SourceFailure::NoData { urls } => {
                write!(f, "no property data in {} extracted pages", urls)
            }
            SourceFailure::BudgetExhausted { needed, remaining } => write!(
                f,
                "credit budget exhausted ({} needed, {} remaining)",
                needed, remaining
            ),
        }
    }
}

/// Role a source played in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    Primary,
    Backup,
}

/// What happened with one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceAttempt {
    pub source: Source,
    pub role: SourceRole,

    /// URLs used for extraction (validated or cached)
    pub urls: Vec<Url>,

    /// Whether the URLs came from the URL cache layer
    pub urls_from_cache: bool,

    /// Fields this source's extraction filled
    pub filled: usize,

    pub failure: Option<SourceFailure>,
}

impl SourceAttempt {
    pub fn new(source: Source, role: SourceRole) -> Self {
        Self {
            source,
            role,
            urls: Vec::new(),
            urls_from_cache: false,
            filled: 0,
            failure: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Served from the extraction cache layer
    CacheHit,
    /// Fresh record produced by the flow
    Extracted,
    Failed,
}

/// Trace of one request: stages visited, sources tried, credits spent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub request_id: Uuid,

    /// Address key fingerprint (never the raw address)
    pub key: String,

    pub stages: Vec<Stage>,
    pub attempts: Vec<SourceAttempt>,
    pub quality: Option<QualityScore>,
    pub credits: BudgetReport,
    pub outcome: Outcome,
}

impl FlowReport {
    /// Whether the request was answered without any external call.
    pub fn served_from_cache(&self) -> bool {
        self.outcome == Outcome::CacheHit
    }

    pub fn failed(&self) -> bool {
        self.stages.last() == Some(&Stage::Failed)
    }

    pub fn visited(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn backup_used(&self) -> bool {
        self.attempts.iter().any(|a| a.role == SourceRole::Backup)
    }

    pub fn url_cache_hit(&self) -> bool {
        self.attempts.iter().any(|a| a.urls_from_cache)
    }

    /// One line per failed source, e.g. "zillow: no matching listing ...".
    pub fn failure_summary(&self) -> String {
        self.attempts
            .iter()
            .filter_map(|a| a.failure.as_ref().map(|f| format!("{}: {}", a.source, f)))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        let limited = SourceFailure::ExternalCall {
            call: CallKind::Search,
            message: "rate limited by firecrawl".into(),
            rate_limited: true,
        };
        assert_eq!(limited.to_string(), "search rate limited");

        let budget = SourceFailure::BudgetExhausted {
            needed: 3,
            remaining: 1,
        };
        assert_eq!(
            budget.to_string(),
            "credit budget exhausted (3 needed, 1 remaining)"
        );

        let empty = SourceFailure::NoData { urls: 2 };
        assert_eq!(empty.to_string(), "no property data in 2 extracted pages");
    }

    #[test]
    fn test_failure_serializes_tagged() {
        let value = serde_json::to_value(SourceFailure::NoMatch { candidates: 3 }).unwrap();
        assert_eq!(value["kind"], "no_match");
        assert_eq!(value["candidates"], 3);
    }
}
