//! The per-request lookup state machine.
//!
//! One `Flow` runs one request: it owns the credit budget, walks the stages
//! strictly in sequence and records each visited stage. Per-source problems
//! become `SourceFailure` values on the attempt; only the absence of any
//! usable record ends in `Stage::Failed`.

use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::budget::CreditBudget;
use crate::cache::CacheStore;
use crate::config::LookupConfig;
use crate::traits::client::{CallKind, ListingClient};
use crate::types::address::NormalizedAddress;
use crate::types::discovery::DiscoveredUrls;
use crate::types::property::{ExtractedProperty, ExtractionSchema, PropertyRecord};
use crate::types::source::Source;
use crate::validator::{self, Validation};

use super::report::{FlowReport, Outcome, SourceAttempt, SourceFailure, SourceRole, Stage};

/// Budgeted access to the client for one request.
///
/// Every call is checked against the client's worst-case cost first and
/// charged its reported cost after. Failed calls cost nothing.
pub(crate) struct Calls<'a, C> {
    client: &'a C,
    pub(crate) budget: CreditBudget,

    /// Set when the provider refused us outright; further calls are pointless
    pub(crate) provider_refused: bool,
}

impl<'a, C: ListingClient> Calls<'a, C> {
    pub(crate) fn new(client: &'a C, budget: CreditBudget) -> Self {
        Self {
            client,
            budget,
            provider_refused: false,
        }
    }

    fn ensure(&self, kind: CallKind) -> Result<(), SourceFailure> {
        let needed = self.client.max_cost(kind);
        if self.budget.can_afford(needed) {
            Ok(())
        } else {
            Err(SourceFailure::BudgetExhausted {
                needed,
                remaining: self.budget.remaining(),
            })
        }
    }

    /// Whether the budget covers the worst case of the given calls.
    pub(crate) fn can_afford(&self, searches: u32, extracts: u32) -> bool {
        let needed = searches * self.client.max_cost(CallKind::Search)
            + extracts * self.client.max_cost(CallKind::Extract);
        self.budget.can_afford(needed)
    }

    fn call_failed(&mut self, call: CallKind, error: crate::error::ClientError) -> SourceFailure {
        if !error.is_retryable_elsewhere() {
            self.provider_refused = true;
        }
        SourceFailure::ExternalCall {
            call,
            rate_limited: error.is_rate_limited(),
            message: error.to_string(),
        }
    }

    /// Search one source and keep the hits that validate.
    pub(crate) async fn discover(
        &mut self,
        source: Source,
        address: &NormalizedAddress,
        config: &LookupConfig,
    ) -> Result<Vec<Url>, SourceFailure> {
        self.ensure(CallKind::Search)?;

        // Search is billed per result, so never ask for more than the
        // reserved worst case covers.
        let cap = self.client.max_cost(CallKind::Search).max(1) as usize;
        let limit = config.search_limit.min(cap).max(1);

        let query = source.scoped_query(&address.query);
        let metered = match self.client.search(&query, source, limit).await {
            Ok(metered) => metered,
            Err(e) => {
                warn!(
                    provider = self.client.provider(),
                    source = %source,
                    error = %e,
                    "Search failed"
                );
                return Err(self.call_failed(CallKind::Search, e));
            }
        };
        self.budget.charge(CallKind::Search, metered.credits);

        match validator::select(source, &metered.value, &address.key, config.max_urls_per_source) {
            Validation::Matched(urls) => {
                debug!(source = %source, urls = urls.len(), credits = metered.credits, "Listing URLs validated");
                Ok(urls)
            }
            Validation::NoMatch { candidates } => {
                debug!(source = %source, candidates, "No candidate matched the address");
                Err(SourceFailure::NoMatch { candidates })
            }
        }
    }

    /// Extract one URL.
    pub(crate) async fn extract(
        &mut self,
        url: &Url,
        schema: &ExtractionSchema,
    ) -> Result<PropertyRecord, SourceFailure> {
        self.ensure(CallKind::Extract)?;

        match self.client.extract(url, schema).await {
            Ok(metered) => {
                self.budget.charge(CallKind::Extract, metered.credits);
                debug!(
                    url = %url,
                    filled = metered.value.filled_count(),
                    credits = metered.credits,
                    "Extraction completed"
                );
                Ok(metered.value)
            }
            Err(e) => {
                warn!(
                    provider = self.client.provider(),
                    url = %url,
                    error = %e,
                    "Extraction failed"
                );
                Err(self.call_failed(CallKind::Extract, e))
            }
        }
    }

    /// Extract URLs in order, merging first-found-wins.
    ///
    /// Returns the merged record of the calls that succeeded, the URLs that
    /// produced it, and the first failure when nothing succeeded.
    pub(crate) async fn extract_all(
        &mut self,
        urls: &[Url],
        schema: &ExtractionSchema,
    ) -> ExtractBatch {
        let mut batch = ExtractBatch::default();

        for url in urls {
            if self.provider_refused {
                break;
            }
            match self.extract(url, schema).await {
                Ok(record) => {
                    batch.record = Some(match batch.record.take() {
                        Some(merged) => merged.merged_with(&record),
                        None => record,
                    });
                    batch.extracted.push(url.clone());
                }
                Err(failure) => {
                    let exhausted = matches!(failure, SourceFailure::BudgetExhausted { .. });
                    batch.failures.push((url.clone(), failure));
                    if exhausted {
                        break;
                    }
                }
            }
        }
        batch
    }
}

/// Result of extracting a list of URLs.
#[derive(Debug, Default)]
pub(crate) struct ExtractBatch {
    pub(crate) record: Option<PropertyRecord>,
    pub(crate) extracted: Vec<Url>,
    pub(crate) failures: Vec<(Url, SourceFailure)>,
}

/// Final state of a flow.
pub(crate) struct FlowResult {
    pub(crate) property: Option<ExtractedProperty>,
    pub(crate) report: FlowReport,
}

/// One run of the lookup state machine.
pub(crate) struct Flow<'a, C> {
    calls: Calls<'a, C>,
    cache: &'a CacheStore,
    config: &'a LookupConfig,
    address: &'a NormalizedAddress,
    schema: ExtractionSchema,
    request_id: Uuid,
    stages: Vec<Stage>,
    attempts: Vec<SourceAttempt>,
    discovered: DiscoveredUrls,
}

impl<'a, C: ListingClient> Flow<'a, C> {
    pub(crate) fn new(
        client: &'a C,
        cache: &'a CacheStore,
        config: &'a LookupConfig,
        address: &'a NormalizedAddress,
        request_id: Uuid,
    ) -> Self {
        Self {
            calls: Calls::new(client, CreditBudget::new(config.max_credits)),
            cache,
            config,
            address,
            schema: ExtractionSchema::for_address(&address.query),
            request_id,
            stages: Vec::new(),
            attempts: Vec::new(),
            discovered: DiscoveredUrls::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!(stage = ?stage, remaining = self.calls.budget.remaining(), "Entering stage");
        self.stages.push(stage);
    }

    fn finish(self, property: Option<ExtractedProperty>, outcome: Outcome) -> FlowResult {
        debug_assert!(self.stages.last().is_some_and(|s| s.is_terminal()));
        let quality = property.as_ref().map(|p| p.record.quality());
        FlowResult {
            property,
            report: FlowReport {
                request_id: self.request_id,
                key: self.address.key.fingerprint(),
                stages: self.stages,
                attempts: self.attempts,
                quality,
                credits: self.calls.budget.report(),
                outcome,
            },
        }
    }

    pub(crate) async fn run(mut self) -> FlowResult {
        let address = self.address;
        let key = &address.key;

        self.enter(Stage::ExtractionCacheCheck);
        if let Some(hit) = self.cache.get_property(key) {
            info!(filled = hit.record.filled_count(), "Extraction cache hit");
            self.enter(Stage::Respond);
            return self.finish(Some(hit), Outcome::CacheHit);
        }

        self.enter(Stage::UrlCacheCheck);
        if let Some(cached) = self.cache.get_urls(key) {
            debug!(urls = cached.len(), "URL cache hit");
            self.discovered = cached;
        }

        // Sources with cached URLs go first so a warm URL layer spends no
        // search credits. Priority order is kept within each group.
        let mut sources = self.config.sources.clone();
        sources.sort_by_key(|s| !self.discovered.has(*s));

        // Primary: the first source that yields a record.
        let mut primary: Option<(usize, PropertyRecord)> = None;
        for (i, source) in sources.iter().copied().enumerate() {
            if self.calls.provider_refused {
                break;
            }
            if let Some(record) = self.try_source(source, SourceRole::Primary).await {
                primary = Some((i, record));
                break;
            }
        }

        let Some((primary_idx, mut record)) = primary else {
            self.enter(Stage::Failed);
            warn!(
                credits = self.calls.budget.used(),
                budget_exhausted = self.calls.budget.is_exhausted(),
                attempts = self.attempts.len(),
                "No usable listing data"
            );
            return self.finish(None, Outcome::Failed);
        };

        self.enter(Stage::QualityGate);
        let quality = record.quality();
        if quality.meets(self.config.quality_threshold) {
            debug!(quality = %quality, "Quality gate passed");
        } else {
            for source in sources.iter().copied().skip(primary_idx + 1) {
                if self.calls.provider_refused {
                    break;
                }
                let searches = if self.discovered.has(source) { 0 } else { 1 };
                if !self.calls.can_afford(searches, 1) {
                    info!(
                        quality = %quality,
                        remaining = self.calls.budget.remaining(),
                        "Backup skipped, accepting partial record"
                    );
                    break;
                }
                info!(quality = %quality, backup = %source, "Quality below threshold, trying backup");
                if let Some(backup) = self.try_source(source, SourceRole::Backup).await {
                    record.fill_missing_from(&backup);
                    break;
                }
            }
        }

        self.enter(Stage::Merge);
        let sources: Vec<Source> = self
            .attempts
            .iter()
            .filter(|a| a.filled > 0)
            .map(|a| a.source)
            .collect();
        let property = ExtractedProperty { record, sources };

        self.enter(Stage::CacheWrite);
        self.cache
            .put_property(key.clone(), property.clone(), Some(self.config.cache_ttl()));

        self.enter(Stage::Respond);
        info!(
            filled = property.record.filled_count(),
            credits = self.calls.budget.used(),
            "Lookup completed"
        );
        self.finish(Some(property), Outcome::Extracted)
    }

    /// Discover (or reuse cached) URLs for a source and extract them.
    ///
    /// Returns the source's record when at least one extraction succeeded
    /// and filled at least one field.
    async fn try_source(&mut self, source: Source, role: SourceRole) -> Option<PropertyRecord> {
        let (search_stage, extract_stage) = match role {
            SourceRole::Primary => (Stage::PrimarySearch, Stage::PrimaryExtract),
            SourceRole::Backup => (Stage::BackupSearch, Stage::BackupExtract),
        };
        let mut attempt = SourceAttempt::new(source, role);

        let urls = if self.discovered.has(source) {
            attempt.urls_from_cache = true;
            self.discovered.urls_for(source).to_vec()
        } else {
            self.enter(search_stage);
            let found = self.calls.discover(source, self.address, self.config).await;
            if matches!(found, Ok(_) | Err(SourceFailure::NoMatch { .. })) {
                self.enter(Stage::Validate);
            }
            match found {
                Ok(urls) => {
                    self.discovered.insert(source, urls.clone());
                    self.cache.put_urls(
                        self.address.key.clone(),
                        self.discovered.clone(),
                        Some(self.config.cache_ttl()),
                    );
                    urls
                }
                Err(failure) => {
                    attempt.failure = Some(failure);
                    self.attempts.push(attempt);
                    return None;
                }
            }
        };
        attempt.urls = urls.clone();

        self.enter(extract_stage);
        let batch = self.calls.extract_all(&urls, &self.schema).await;
        let record = match batch.record {
            Some(record) if record.filled_count() > 0 => {
                attempt.filled = record.filled_count();
                Some(record)
            }
            Some(_) => {
                debug!(source = %source, urls = batch.extracted.len(), "Extraction returned no data");
                attempt.failure = Some(SourceFailure::NoData {
                    urls: batch.extracted.len(),
                });
                None
            }
            None => {
                attempt.failure = batch.failures.into_iter().next().map(|(_, f)| f);
                None
            }
        };
        self.attempts.push(attempt);
        record
    }
}
