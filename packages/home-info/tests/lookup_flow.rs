//! Integration tests for the lookup flow.
//!
//! These drive `Orchestrator` end to end against the mock listing client:
//! 1. Cache checks
//! 2. Search and validation per source
//! 3. Extraction under the credit budget
//! 4. Quality-gated backup and merge

use home_info::{
    testing::{rate_limited, record_with_fields, MockCall, MockListingClient},
    CacheLayer, CacheStore, ClientError, HomeInfoRequest, LookupConfig, Orchestrator, Outcome,
    PropertyRecord, Source, SourceFailure, SourceRole, Stage,
};
use std::sync::Arc;

const ZILLOW: &str = "https://www.zillow.com/homedetails/123-Main-St-Springfield-IL-62704/5551_zpid/";
const ZILLOW_OTHER: &str =
    "https://www.zillow.com/homedetails/456-Oak-Ave-Springfield-IL-62704/7771_zpid/";
const REDFIN: &str = "https://www.redfin.com/IL/Springfield/123-Main-St-62704/home/12345678";

/// Helper to build the standard test request.
fn request() -> HomeInfoRequest {
    HomeInfoRequest::new("123 Main St")
        .with_city("Springfield")
        .with_state("IL")
        .with_zip("62704")
}

/// Filled field count of a successful response.
fn filled(response: &home_info::HomeInfoResponse) -> usize {
    response
        .property_info
        .as_ref()
        .map_or(0, PropertyRecord::filled_count)
}

/// Helper for a client where both sources find the address.
fn both_sources(zillow: PropertyRecord, redfin: PropertyRecord) -> MockListingClient {
    MockListingClient::new()
        .with_hits(Source::Zillow, &[ZILLOW])
        .with_hits(Source::Redfin, &[REDFIN])
        .with_record(ZILLOW, zillow)
        .with_record(REDFIN, redfin)
}

fn orchestrator(client: &MockListingClient) -> Orchestrator<MockListingClient> {
    Orchestrator::new(client.clone(), Arc::new(CacheStore::new()))
}

#[tokio::test]
async fn test_fresh_lookup_visits_stages_in_order() {
    let client = both_sources(record_with_fields(10), record_with_fields(15));

    let outcome = orchestrator(&client).lookup(&request()).await;
    let report = outcome.report.unwrap();

    assert_eq!(
        report.stages,
        vec![
            Stage::ExtractionCacheCheck,
            Stage::UrlCacheCheck,
            Stage::PrimarySearch,
            Stage::Validate,
            Stage::PrimaryExtract,
            Stage::QualityGate,
            Stage::Merge,
            Stage::CacheWrite,
            Stage::Respond,
        ]
    );
    assert_eq!(report.outcome, Outcome::Extracted);
    assert_eq!(report.credits.search, 1);
    assert_eq!(report.credits.extract, 1);

    // High-quality primary: Redfin never touched
    assert_eq!(client.search_calls(), vec![Source::Zillow]);
    assert_eq!(filled(&outcome.response), 10);
}

#[tokio::test]
async fn test_second_lookup_is_served_from_cache() {
    let client = both_sources(record_with_fields(10), record_with_fields(15));
    let orchestrator = orchestrator(&client);

    let first = orchestrator.lookup(&request()).await;
    let calls_after_first = client.call_count();

    let second = orchestrator.lookup(&request()).await;
    let report = second.report.unwrap();

    assert_eq!(client.call_count(), calls_after_first);
    assert_eq!(report.outcome, Outcome::CacheHit);
    assert_eq!(report.credits.used, 0);
    assert_eq!(
        report.stages,
        vec![Stage::ExtractionCacheCheck, Stage::Respond]
    );
    assert_eq!(second.response, first.response);

    let usage = orchestrator.usage().snapshot();
    assert_eq!(usage.requests, 2);
    assert_eq!(usage.extraction_cache_hits, 1);
}

#[tokio::test]
async fn test_equivalent_addresses_share_cache_entry() {
    let client = both_sources(record_with_fields(10), record_with_fields(15));
    let orchestrator = orchestrator(&client);

    orchestrator.lookup(&request()).await;
    let calls = client.call_count();

    let variants = [
        HomeInfoRequest::new("123 MAIN STREET")
            .with_city("springfield")
            .with_state("Illinois")
            .with_zip("62704"),
        HomeInfoRequest::new("  123   main st.  ")
            .with_city(" Springfield ")
            .with_state("il")
            .with_zip("62704-0001"),
        HomeInfoRequest::new("123 Main St, Springfield, IL 62704"),
    ];
    for variant in &variants {
        let outcome = orchestrator.lookup(variant).await;
        assert_eq!(outcome.report.unwrap().outcome, Outcome::CacheHit);
    }
    assert_eq!(client.call_count(), calls);
}

#[tokio::test]
async fn test_quality_gate_is_inclusive_at_threshold() {
    let config = LookupConfig::default().with_quality_threshold(4.0 / 15.0);

    let at_threshold = both_sources(record_with_fields(4), record_with_fields(15));
    let outcome = orchestrator(&at_threshold)
        .with_config(config.clone())
        .lookup(&request())
        .await;
    assert!(!outcome.report.unwrap().backup_used());
    assert_eq!(at_threshold.search_calls(), vec![Source::Zillow]);

    let below = both_sources(record_with_fields(3), record_with_fields(15));
    let outcome = orchestrator(&below)
        .with_config(config)
        .lookup(&request())
        .await;
    let report = outcome.report.unwrap();
    assert!(report.backup_used());
    assert!(report.visited(Stage::BackupSearch));
    assert!(report.visited(Stage::BackupExtract));
    assert_eq!(below.search_calls(), vec![Source::Zillow, Source::Redfin]);
}

#[tokio::test]
async fn test_default_threshold_boundary() {
    // 0.25 of 15 fields: 4 fields pass, 3 do not
    let passes = both_sources(record_with_fields(4), record_with_fields(15));
    let outcome = orchestrator(&passes).lookup(&request()).await;
    assert!(!outcome.report.unwrap().backup_used());

    let fails = both_sources(record_with_fields(3), record_with_fields(15));
    let outcome = orchestrator(&fails).lookup(&request()).await;
    assert!(outcome.report.unwrap().backup_used());
}

#[tokio::test]
async fn test_backup_only_fills_missing_fields() {
    let primary = PropertyRecord {
        home_type: Some("Condo".into()),
        bedrooms: Some(3),
        ..Default::default()
    };
    let mut backup = record_with_fields(10);
    backup.bedrooms = Some(5);

    let client = both_sources(primary, backup);
    let outcome = orchestrator(&client).lookup(&request()).await;
    let response = outcome.response;

    assert!(response.success);
    let record = response.property_info.as_ref().unwrap();
    assert_eq!(record.home_type.as_deref(), Some("Condo"));
    assert_eq!(record.bedrooms, Some(3));
    assert_eq!(record.year_built, Some(1994));
    assert_eq!(record.filled_count(), 10);
    assert_eq!(response.sources, vec!["zillow.com", "redfin.com"]);

    let report = outcome.report.unwrap();
    assert_eq!(report.attempts.len(), 2);
    assert_eq!(report.attempts[1].role, SourceRole::Backup);
    assert_eq!(report.credits.used, 4);
}

#[tokio::test]
async fn test_budget_blocks_backup_and_keeps_partial_record() {
    let client = both_sources(record_with_fields(2), record_with_fields(15));
    let orchestrator =
        orchestrator(&client).with_config(LookupConfig::default().with_max_credits(5));

    let outcome = orchestrator.lookup(&request()).await;
    let report = outcome.report.unwrap();

    // 2 spent, backup worst case is 3 + 2
    assert!(outcome.response.success);
    assert_eq!(filled(&outcome.response), 2);
    assert!(!report.backup_used());
    assert!(report.credits.used <= 5);
    assert_eq!(client.search_calls(), vec![Source::Zillow]);
}

#[tokio::test]
async fn test_budget_too_small_for_any_search_fails_without_calls() {
    let client = both_sources(record_with_fields(10), record_with_fields(10));
    let orchestrator =
        orchestrator(&client).with_config(LookupConfig::default().with_max_credits(2));

    let outcome = orchestrator.lookup(&request()).await;
    let report = outcome.report.unwrap();

    assert!(!outcome.response.success);
    assert_eq!(report.outcome, Outcome::Failed);
    assert_eq!(report.credits.used, 0);
    assert_eq!(client.call_count(), 0);
    assert!(report
        .attempts
        .iter()
        .all(|a| matches!(a.failure, Some(SourceFailure::BudgetExhausted { .. }))));
    assert!(outcome
        .response
        .error_message
        .unwrap()
        .contains("credit budget exhausted"));
}

#[tokio::test]
async fn test_credit_ceiling_holds_across_scenarios() {
    for limit in 0..=12 {
        for primary_fields in [0, 2, 10] {
            let client =
                both_sources(record_with_fields(primary_fields), record_with_fields(15));
            let orchestrator =
                orchestrator(&client).with_config(LookupConfig::default().with_max_credits(limit));

            let report = orchestrator.lookup(&request()).await.report.unwrap();
            assert!(
                report.credits.used <= limit,
                "limit {} used {}",
                limit,
                report.credits.used
            );
        }
    }
}

#[tokio::test]
async fn test_non_matching_listing_is_rejected() {
    let client = MockListingClient::new()
        .with_hits(Source::Zillow, &[ZILLOW_OTHER])
        .with_hits(Source::Redfin, &[REDFIN])
        .with_record(ZILLOW_OTHER, record_with_fields(15))
        .with_record(REDFIN, record_with_fields(8));

    let outcome = orchestrator(&client).lookup(&request()).await;
    let report = outcome.report.unwrap();

    assert!(outcome.response.success);
    assert_eq!(outcome.response.sources, vec!["redfin.com"]);
    assert_eq!(
        report.attempts[0].failure,
        Some(SourceFailure::NoMatch { candidates: 1 })
    );
    assert_eq!(report.attempts[1].role, SourceRole::Primary);

    // The wrong listing was never extracted
    assert_eq!(client.extract_calls(), vec![REDFIN.to_string()]);
}

#[tokio::test]
async fn test_rate_limited_primary_falls_back() {
    let client = both_sources(record_with_fields(10), record_with_fields(8))
        .with_search_failure(Source::Zillow, rate_limited());

    let outcome = orchestrator(&client).lookup(&request()).await;
    let report = outcome.report.unwrap();

    assert!(outcome.response.success);
    assert_eq!(filled(&outcome.response), 8);
    assert_eq!(report.credits.search, 1);
    assert!(matches!(
        report.attempts[0].failure,
        Some(SourceFailure::ExternalCall {
            rate_limited: true,
            ..
        })
    ));
}

#[tokio::test]
async fn test_failed_extract_falls_back_to_next_source() {
    let client = both_sources(record_with_fields(10), record_with_fields(8)).with_extract_failure(
        ZILLOW,
        ClientError::Transient {
            provider: "mock".into(),
            message: "connection reset".into(),
        },
    );

    let outcome = orchestrator(&client).lookup(&request()).await;
    assert!(outcome.response.success);
    assert_eq!(outcome.response.sources, vec!["redfin.com"]);
}

#[tokio::test]
async fn test_all_sources_failing_reports_each() {
    let client = MockListingClient::new()
        .with_hits(Source::Zillow, &[ZILLOW_OTHER])
        .with_search_failure(Source::Redfin, rate_limited());
    let orchestrator = orchestrator(&client);

    let outcome = orchestrator.lookup(&request()).await;
    let report = outcome.report.unwrap();

    assert_eq!(report.outcome, Outcome::Failed);
    assert_eq!(report.stages.last(), Some(&Stage::Failed));
    assert_eq!(report.attempts.len(), 2);

    let message = outcome.response.error_message.unwrap();
    assert!(message.contains("zillow: no matching listing among 1 candidates"));
    assert!(message.contains("redfin: search rate limited"));

    // Failures are not cached
    assert_eq!(orchestrator.cache().stats().extraction.total_entries, 0);
}

#[tokio::test]
async fn test_refused_provider_stops_further_calls() {
    let client = both_sources(record_with_fields(10), record_with_fields(10)).with_search_failure(
        Source::Zillow,
        ClientError::Rejected {
            provider: "mock".into(),
            status: 402,
            message: "Payment required".into(),
        },
    );

    let outcome = orchestrator(&client).lookup(&request()).await;
    assert!(!outcome.response.success);
    assert_eq!(client.search_calls(), vec![Source::Zillow]);
}

#[tokio::test]
async fn test_malformed_address_makes_no_calls() {
    let client = both_sources(record_with_fields(10), record_with_fields(10));
    let orchestrator = orchestrator(&client);

    for bad in ["", "   ", "Main Street", "123"] {
        let outcome = orchestrator.lookup(&HomeInfoRequest::new(bad)).await;
        assert!(!outcome.response.success, "{:?} accepted", bad);
        assert!(outcome.response.error_message.is_some());
    }
    assert_eq!(client.call_count(), 0);
    assert_eq!(orchestrator.usage().snapshot().total_credits, 0);
}

#[tokio::test]
async fn test_cached_urls_skip_search() {
    let client = both_sources(record_with_fields(10), record_with_fields(10));
    let orchestrator = orchestrator(&client);

    orchestrator.lookup(&request()).await;
    orchestrator.cache().purge_layer(CacheLayer::Extraction);
    client.reset_calls();

    let outcome = orchestrator.lookup(&request()).await;
    let report = outcome.report.unwrap();

    assert!(client.search_calls().is_empty());
    assert_eq!(client.extract_calls(), vec![ZILLOW.to_string()]);
    assert!(report.url_cache_hit());
    assert!(!report.visited(Stage::PrimarySearch));
    assert_eq!(report.credits.search, 0);
}

#[tokio::test]
async fn test_find_urls_then_lookup_reuses_discovery() {
    let client = both_sources(record_with_fields(10), record_with_fields(10));
    let orchestrator = orchestrator(&client);

    let found = orchestrator.find_property_urls(&request()).await;
    assert!(found.success);
    assert_eq!(found.address, "123 Main St, Springfield, IL 62704");
    assert_eq!(found.found_urls.urls_for(Source::Zillow)[0].as_str(), ZILLOW);

    client.reset_calls();
    let outcome = orchestrator.lookup(&request()).await;
    assert!(outcome.response.success);
    assert!(client.search_calls().is_empty());
}

#[tokio::test]
async fn test_cached_backup_source_is_tried_before_searching() {
    // Only Redfin's URLs are cached: Zillow was rate limited at discovery
    let client = both_sources(record_with_fields(10), record_with_fields(10))
        .with_search_failure(Source::Zillow, rate_limited());
    let orchestrator = orchestrator(&client);
    assert!(orchestrator.find_property_urls(&request()).await.success);
    client.reset_calls();

    let outcome = orchestrator.lookup(&request()).await;
    let report = outcome.report.unwrap();

    assert!(outcome.response.success);
    assert!(client.search_calls().is_empty());
    assert_eq!(client.extract_calls(), vec![REDFIN.to_string()]);
    assert_eq!(report.credits.search, 0);
    assert_eq!(report.attempts[0].source, Source::Redfin);
    assert!(report.attempts[0].urls_from_cache);
    assert_eq!(outcome.response.sources, vec!["redfin.com"]);
}

#[tokio::test]
async fn test_uncached_source_becomes_backup_after_cached_primary() {
    let client = MockListingClient::new()
        .with_hits(Source::Redfin, &[REDFIN])
        .with_record(REDFIN, record_with_fields(2));
    let orchestrator = orchestrator(&client);
    assert!(orchestrator.find_property_urls(&request()).await.success);

    let client = both_sources(record_with_fields(15), record_with_fields(2));
    let orchestrator = Orchestrator::new(client.clone(), Arc::clone(orchestrator.cache()));
    let outcome = orchestrator.lookup(&request()).await;
    let report = outcome.report.unwrap();

    assert_eq!(client.search_calls(), vec![Source::Zillow]);
    assert_eq!(report.attempts[0].source, Source::Redfin);
    assert_eq!(report.attempts[1].source, Source::Zillow);
    assert_eq!(report.attempts[1].role, SourceRole::Backup);
    assert_eq!(filled(&outcome.response), 15);
}

#[tokio::test]
async fn test_empty_extractions_fail_and_are_not_cached() {
    // Both sources match but extract to a record with no fields
    let client = MockListingClient::new()
        .with_hits(Source::Zillow, &[ZILLOW])
        .with_hits(Source::Redfin, &[REDFIN]);
    let orchestrator = orchestrator(&client);

    let outcome = orchestrator.lookup(&request()).await;
    let report = outcome.report.unwrap();

    assert!(!outcome.response.success);
    assert!(outcome.response.property_info.is_none());
    assert!(outcome.response.sources.is_empty());
    assert_eq!(report.outcome, Outcome::Failed);
    assert!(report
        .attempts
        .iter()
        .all(|a| a.failure == Some(SourceFailure::NoData { urls: 1 })));
    assert!(outcome
        .response
        .error_message
        .unwrap()
        .contains("zillow: no property data in 1 extracted pages"));
    assert_eq!(orchestrator.cache().stats().extraction.total_entries, 0);
}

#[tokio::test]
async fn test_search_limit_is_capped_by_reserved_cost() {
    let hits = [
        ZILLOW,
        ZILLOW_OTHER,
        "https://www.zillow.com/homedetails/1-Elm-St-Springfield-IL-62704/1_zpid/",
        "https://www.zillow.com/homedetails/2-Elm-St-Springfield-IL-62704/2_zpid/",
        "https://www.zillow.com/homedetails/3-Elm-St-Springfield-IL-62704/3_zpid/",
    ];
    let client = MockListingClient::new()
        .with_hits(Source::Zillow, &hits)
        .with_record(ZILLOW, record_with_fields(10));
    let orchestrator = orchestrator(&client).with_config(
        LookupConfig::default()
            .with_max_credits(4)
            .with_search_limit(5)
            .with_sources(vec![Source::Zillow]),
    );

    let report = orchestrator.lookup(&request()).await.report.unwrap();

    assert!(report.credits.used <= 4, "used {}", report.credits.used);
    assert_eq!(report.credits.search, 3);
    assert!(matches!(
        client.calls().first(),
        Some(MockCall::Search { limit: 3, .. })
    ));
}
