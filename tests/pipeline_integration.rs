//! End-to-end pipeline tests through the public library API, using custom
//! sources registered alongside (or instead of) the built-ins.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use pharmascope::config::Config;
use pharmascope::error::{Result, SourceError};
use pharmascope::models::{EntityKind, EntitySet, LookupParams, PayloadKind, SourcePayload};
use pharmascope::pipeline::Analyzer;
use pharmascope::registry::{DataSource, SourceDescriptor, SourceRegistry};
use pharmascope::report::{to_tabular, EnvelopeStatus, Impact};

/// Returns a fixed number of studies for any query.
struct FixedStudies(usize);

#[async_trait]
impl DataSource for FixedStudies {
    fn params(&self, query: &str, _entities: &EntitySet) -> Option<LookupParams> {
        Some(LookupParams::from([("query".to_string(), Value::from(query))]))
    }

    async fn lookup(&self, _endpoint: &str, _params: &LookupParams) -> Result<SourcePayload> {
        let records = (0..self.0).map(|i| json!({ "nctId": format!("NCT{:08}", i) })).collect();
        Ok(SourcePayload::new(PayloadKind::Studies, records))
    }
}

/// Requires a therapeutic agent and fails until its third call.
struct Flaky {
    calls: AtomicU32,
}

#[async_trait]
impl DataSource for Flaky {
    fn params(&self, _query: &str, entities: &EntitySet) -> Option<LookupParams> {
        let agent = entities.first(EntityKind::TherapeuticAgent)?;
        Some(LookupParams::from([("drug".to_string(), Value::from(agent))]))
    }

    async fn lookup(&self, _endpoint: &str, _params: &LookupParams) -> Result<SourcePayload> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 3 {
            return Err(SourceError::LookupFailure(format!("call {}", n)));
        }
        let records = vec![json!({ "reaction": "nausea" }); 4];
        Ok(SourcePayload::new(PayloadKind::AdverseEvents, records).with_total(250))
    }
}

fn fast_config() -> Config {
    let mut cfg = Config::minimal();
    cfg.fanout.base_delay_ms = 1;
    cfg
}

fn custom_registry(flaky: Arc<Flaky>) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register(SourceDescriptor::new(
        "Trials",
        "Trial Registry",
        "Clinical Data",
        "studies",
        Arc::new(FixedStudies(35)),
    ));
    registry.register(SourceDescriptor::new(
        "Events",
        "Event Reports",
        "Regulatory",
        "drug/event",
        flaky,
    ));
    registry
}

#[tokio::test]
async fn jak_query_with_custom_sources() {
    let flaky = Arc::new(Flaky {
        calls: AtomicU32::new(0),
    });
    let analyzer = Analyzer::with_registry(custom_registry(flaky.clone()), &fast_config());
    let selected = vec!["Trials".to_string(), "Events".to_string()];

    let report = analyzer
        .analyze("JAK inhibitors in rheumatoid arthritis", &selected)
        .await
        .unwrap();

    // No therapeutic agent, so the event source is never called.
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.sources[0].source_id, "Trials");
    assert_eq!(report.sources[0].name, "Trial Registry");
    assert_eq!(report.sources[0].sample_records.len(), 5);
    assert_eq!(report.total_records, 35);

    assert_eq!(report.key_findings.len(), 1);
    let finding = &report.key_findings[0];
    assert_eq!(finding.finding, "35 clinical trials identified in Trial Registry");
    assert_eq!(finding.impact, Impact::Medium);
    assert_eq!(finding.source, "Trial Registry");

    assert_eq!(analyzer.history().len(), 1);
}

#[tokio::test]
async fn flaky_source_recovers_within_retry_budget() {
    let flaky = Arc::new(Flaky {
        calls: AtomicU32::new(0),
    });
    let analyzer = Analyzer::with_registry(custom_registry(flaky.clone()), &fast_config());

    let report = analyzer
        .analyze("ruxolitinib safety", &["Events".to_string()])
        .await
        .unwrap();

    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    let envelope = &report.sources[0];
    assert_eq!(envelope.status, EnvelopeStatus::Ok);
    assert_eq!(envelope.attempts, 3);
    assert_eq!(envelope.record_count, 250);
    assert_eq!(report.key_findings[0].impact, Impact::High);

    // Same query again is served from the cache.
    let report = analyzer
        .analyze("ruxolitinib safety", &["Events".to_string()])
        .await
        .unwrap();
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    assert!(report.sources[0].cached);
    assert_eq!(report.sources[0].attempts, 0);

    let metrics = analyzer.coordinator().metrics().report();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.cache_hits, 1);
    assert!((metrics.cache_hit_rate - 0.5).abs() < 1e-9);
    // The two failed attempts were retried away, so nothing reached the error ring.
    assert!(metrics.recent_errors.is_empty());
}

#[tokio::test]
async fn exhausted_retries_become_failed_envelope() {
    let flaky = Arc::new(Flaky {
        calls: AtomicU32::new(0),
    });
    let mut cfg = fast_config();
    cfg.fanout.max_attempts = 2;
    let analyzer = Analyzer::with_registry(custom_registry(flaky.clone()), &cfg);

    let report = analyzer
        .analyze("imatinib", &["Events".to_string(), "Trials".to_string()])
        .await
        .unwrap();

    assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    let failed = &report.sources[0];
    assert_eq!(failed.status, EnvelopeStatus::Error);
    let error = failed.error.as_ref().unwrap();
    assert_eq!(error.code, "LOOKUP_FAILED");
    assert_eq!(error.message, "lookup failed: call 2");
    assert_eq!(report.successful_sources(), 1);
    assert_eq!(report.total_records, 35);

    let csv = to_tabular(&report);
    assert!(csv.contains("\"Events\",\"Event Reports\",\"Regulatory\",\"error\""));

    let recent = analyzer.coordinator().metrics().report().recent_errors;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].source_id, "Events");
    assert_eq!(recent[0].code, "LOOKUP_FAILED");
}

#[tokio::test]
async fn builtins_extend_with_custom_source() {
    let mut registry = SourceRegistry::with_builtins();
    registry.register(
        SourceDescriptor::new(
            "Trials",
            "Trial Registry",
            "Clinical Data",
            "studies",
            Arc::new(FixedStudies(3)),
        )
        .premium(),
    );
    assert_eq!(registry.len(), 13);

    let analyzer = Analyzer::with_registry(registry, &fast_config());
    let report = analyzer
        .analyze(
            "imatinib in leukemia",
            &["PubChem".to_string(), "Trials".to_string(), "DrugBank".to_string()],
        )
        .await
        .unwrap();

    let ids: Vec<&str> = report.sources.iter().map(|s| s.source_id.as_str()).collect();
    assert_eq!(ids, vec!["PubChem", "Trials", "DrugBank"]);
    assert_eq!(report.total_records, 18);
    // The catalog-only source succeeds with no records and no finding.
    assert_eq!(report.sources[2].kind, Some(PayloadKind::Placeholder));
    assert_eq!(report.key_findings.len(), 2);
}

#[tokio::test]
async fn unknown_source_fails_the_whole_analysis() {
    let analyzer = Analyzer::with_registry(SourceRegistry::with_builtins(), &fast_config());
    let err = analyzer
        .analyze("imatinib", &["PubChem".to_string(), "Nope".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::UnknownSource(ref id) if id == "Nope"));
    assert!(analyzer.history().is_empty());
    assert_eq!(analyzer.coordinator().metrics().report().total_requests, 0);
}
