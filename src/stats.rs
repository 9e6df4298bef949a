//! Lookup metrics and performance summary.
//!
//! Every source invocation made by the coordinator is recorded here: its
//! outcome (fresh success, cache hit, failure) and how long it took. Fresh
//! successes also add the size of the payload they returned, and failures
//! are kept in a short ring of recent errors. The summary backs
//! `GET /api/metrics` and `pharma analyze --stats`.

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::SourceError;

/// Number of failures kept for [`PerformanceReport::recent_errors`].
pub const RECENT_ERROR_CAPACITY: usize = 10;

/// How one invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupEvent<'a> {
    /// A source answered; `bytes` is the wire size of its payload.
    Success { bytes: usize },
    CacheHit,
    Failure(&'a SourceError),
}

/// Per-source counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
}

/// One failed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentError {
    pub source_id: String,
    pub code: String,
    pub message: String,
    pub duration_ms: u64,
    pub timestamp: String,
}

#[derive(Debug, Default)]
struct MetricsState {
    total: u64,
    successes: u64,
    failures: u64,
    cache_hits: u64,
    timed_lookups: u64,
    total_duration_ms: u64,
    total_data_size: u64,
    by_source: BTreeMap<String, SourceStats>,
    recent_errors: VecDeque<RecentError>,
}

/// Shared invocation counters.
#[derive(Debug, Default)]
pub struct LookupMetrics {
    state: Mutex<MetricsState>,
}

/// Snapshot returned by [`LookupMetrics::report`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cache_hits: u64,
    /// Share of requests answered from the cache, in `[0, 1]`.
    pub cache_hit_rate: f64,
    /// Mean duration of lookups that reached a source (cache hits excluded).
    pub average_response_time_ms: f64,
    /// Bytes of payload returned by fresh lookups.
    pub total_data_size: u64,
    pub by_source: BTreeMap<String, SourceStats>,
    /// Latest failures, oldest first.
    pub recent_errors: Vec<RecentError>,
}

impl LookupMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, source_id: &str, event: LookupEvent<'_>, elapsed: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.total += 1;

        let per_source = state.by_source.entry(source_id.to_string()).or_default();
        per_source.requests += 1;
        match event {
            LookupEvent::Success { .. } => per_source.successes += 1,
            LookupEvent::CacheHit => {
                per_source.successes += 1;
                per_source.cache_hits += 1;
            }
            LookupEvent::Failure(_) => per_source.failures += 1,
        }

        let elapsed_ms = elapsed.as_millis() as u64;
        match event {
            LookupEvent::Success { bytes } => {
                state.successes += 1;
                state.total_data_size += bytes as u64;
            }
            LookupEvent::CacheHit => {
                state.successes += 1;
                state.cache_hits += 1;
            }
            LookupEvent::Failure(err) => {
                state.failures += 1;
                if state.recent_errors.len() == RECENT_ERROR_CAPACITY {
                    state.recent_errors.pop_front();
                }
                state.recent_errors.push_back(RecentError {
                    source_id: source_id.to_string(),
                    code: err.code().to_string(),
                    message: err.to_string(),
                    duration_ms: elapsed_ms,
                    timestamp: Utc::now().to_rfc3339(),
                });
            }
        }
        if event != LookupEvent::CacheHit {
            state.timed_lookups += 1;
            state.total_duration_ms += elapsed_ms;
        }
    }

    pub fn report(&self) -> PerformanceReport {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let average = if state.timed_lookups > 0 {
            state.total_duration_ms as f64 / state.timed_lookups as f64
        } else {
            0.0
        };
        PerformanceReport {
            total_requests: state.total,
            successful_requests: state.successes,
            failed_requests: state.failures,
            cache_hits: state.cache_hits,
            cache_hit_rate: state.cache_hits as f64 / state.total.max(1) as f64,
            average_response_time_ms: average,
            total_data_size: state.total_data_size,
            by_source: state.by_source.clone(),
            recent_errors: state.recent_errors.iter().cloned().collect(),
        }
    }
}

impl PerformanceReport {
    /// Print a human-readable summary to stdout.
    pub fn print(&self) {
        println!("Lookup Performance");
        println!("==================");
        println!();
        println!("  Requests:    {}", self.total_requests);
        println!(
            "  Succeeded:   {} ({} from cache, {:.0}%)",
            self.successful_requests,
            self.cache_hits,
            self.cache_hit_rate * 100.0
        );
        println!("  Failed:      {}", self.failed_requests);
        println!("  Avg time:    {:.0} ms", self.average_response_time_ms);
        println!("  Data:        {} bytes", self.total_data_size);

        if !self.by_source.is_empty() {
            println!();
            println!(
                "  {:<16} {:>8} {:>8} {:>8} {:>8}",
                "SOURCE", "REQS", "OK", "FAILED", "CACHED"
            );
            for (source, s) in &self.by_source {
                println!(
                    "  {:<16} {:>8} {:>8} {:>8} {:>8}",
                    source, s.requests, s.successes, s.failures, s.cache_hits
                );
            }
        }

        if !self.recent_errors.is_empty() {
            println!();
            println!("  Recent errors:");
            for e in &self.recent_errors {
                println!("    {} [{}] {}", e.source_id, e.code, e.message);
            }
        }
    }
}
