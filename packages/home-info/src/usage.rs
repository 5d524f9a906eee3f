//! Process-wide credit and cache usage counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::orchestrator::report::{FlowReport, Outcome};

/// Rating of average credits spent per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Efficiency {
    Excellent,
    Good,
    Moderate,
    Poor,
}

impl Efficiency {
    /// ≤5 excellent, ≤10 good, ≤20 moderate, otherwise poor.
    pub fn rate(average_credits: f64) -> Self {
        if average_credits <= 5.0 {
            Efficiency::Excellent
        } else if average_credits <= 10.0 {
            Efficiency::Good
        } else if average_credits <= 20.0 {
            Efficiency::Moderate
        } else {
            Efficiency::Poor
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub requests: u64,
    pub failed_requests: u64,
    pub total_credits: u64,
    pub search_credits: u64,
    pub extract_credits: u64,
    pub extraction_cache_hits: u64,
    pub url_cache_hits: u64,
    pub backup_searches: u64,
    pub average_credits_per_request: f64,
    pub efficiency: Efficiency,
}

/// Counters shared by every request of an orchestrator.
#[derive(Debug, Default)]
pub struct UsageMonitor {
    requests: AtomicU64,
    failed_requests: AtomicU64,
    search_credits: AtomicU64,
    extract_credits: AtomicU64,
    extraction_cache_hits: AtomicU64,
    url_cache_hits: AtomicU64,
    backup_searches: AtomicU64,
}

impl UsageMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished request into the counters.
    pub fn record(&self, report: &FlowReport) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.search_credits
            .fetch_add(report.credits.search as u64, Ordering::Relaxed);
        self.extract_credits
            .fetch_add(report.credits.extract as u64, Ordering::Relaxed);

        match report.outcome {
            Outcome::CacheHit => {
                self.extraction_cache_hits.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failed => {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Extracted => {}
        }
        if report.url_cache_hit() {
            self.url_cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        if report.backup_used() {
            self.backup_searches.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count credits spent outside a full lookup flow.
    pub fn record_credits(&self, search: u32, extract: u32, failed: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.search_credits
            .fetch_add(search as u64, Ordering::Relaxed);
        self.extract_credits
            .fetch_add(extract as u64, Ordering::Relaxed);
        if failed {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let search_credits = self.search_credits.load(Ordering::Relaxed);
        let extract_credits = self.extract_credits.load(Ordering::Relaxed);
        let total_credits = search_credits + extract_credits;
        let average = if requests == 0 {
            0.0
        } else {
            total_credits as f64 / requests as f64
        };

        UsageSnapshot {
            requests,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            total_credits,
            search_credits,
            extract_credits,
            extraction_cache_hits: self.extraction_cache_hits.load(Ordering::Relaxed),
            url_cache_hits: self.url_cache_hits.load(Ordering::Relaxed),
            backup_searches: self.backup_searches.load(Ordering::Relaxed),
            average_credits_per_request: average,
            efficiency: Efficiency::rate(average),
        }
    }

    /// Zero every counter, returning the values they had.
    pub fn reset(&self) -> UsageSnapshot {
        let snapshot = self.snapshot();
        for counter in [
            &self.requests,
            &self.failed_requests,
            &self.search_credits,
            &self.extract_credits,
            &self.extraction_cache_hits,
            &self.url_cache_hits,
            &self.backup_searches,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        snapshot
    }
}
