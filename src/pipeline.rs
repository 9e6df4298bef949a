//! End-to-end analysis: classify → prioritize → gather → aggregate.
//!
//! [`Analyzer`] owns the coordinator and a bounded in-memory query history.
//! It is shared by the CLI `analyze` command and the `/api/analyze` endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::classify::classify;
use crate::config::Config;
use crate::error::Result;
use crate::fanout::Coordinator;
use crate::models::Domain;
use crate::registry::SourceRegistry;
use crate::report::{aggregate, AggregateReport};

/// One completed analysis.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub domain: Domain,
    pub sources: Vec<String>,
    pub total_records: u64,
}

/// Most-recent-first ring of completed analyses.
#[derive(Debug)]
pub struct QueryHistory {
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl QueryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, report: &AggregateReport) -> HistoryEntry {
        let entry = HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            query: report.query.clone(),
            timestamp: Utc::now(),
            domain: report.classification.domain,
            sources: report.sources.iter().map(|s| s.source_id.clone()).collect(),
            total_records: report.total_records,
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push_front(entry.clone());
        entries.truncate(self.capacity);
        entry
    }

    /// Entries, newest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs full analyses against a source registry.
pub struct Analyzer {
    coordinator: Coordinator,
    history: QueryHistory,
    max_query_chars: usize,
}

impl Analyzer {
    pub fn new(coordinator: Coordinator, config: &Config) -> Self {
        Self {
            coordinator,
            history: QueryHistory::new(config.analysis.history_size),
            max_query_chars: config.analysis.max_query_chars,
        }
    }

    /// Analyzer over the built-in sources.
    pub fn from_config(config: &Config) -> Self {
        Self::with_registry(SourceRegistry::with_builtins(), config)
    }

    /// Analyzer over a caller-assembled registry.
    pub fn with_registry(registry: SourceRegistry, config: &Config) -> Self {
        let coordinator = Coordinator::from_config(Arc::new(registry), config);
        Self::new(coordinator, config)
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn registry(&self) -> &SourceRegistry {
        self.coordinator.registry()
    }

    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    /// Classify the query, query the selected sources (or the domain's
    /// prioritized sources when none are selected) and build a report.
    ///
    /// # Errors
    ///
    /// Fails only when a selected source id is not registered.
    pub async fn analyze(&self, query: &str, selected: &[String]) -> Result<AggregateReport> {
        let query = truncate_chars(query.trim(), self.max_query_chars);
        let classification = classify(query);

        let source_ids = if selected.is_empty() {
            self.registry().prioritize(classification.domain)
        } else {
            selected.to_vec()
        };
        tracing::debug!(
            query,
            domain = %classification.domain,
            sources = ?source_ids,
            "analyzing query"
        );

        let results = self
            .coordinator
            .gather(query, &classification.entities, &source_ids)
            .await?;
        let report = aggregate(self.registry(), query, &classification, &results);
        self.history.record(&report);

        tracing::info!(
            domain = %classification.domain,
            sources = report.sources.len(),
            succeeded = report.successful_sources(),
            total_records = report.total_records,
            "analysis complete"
        );
        Ok(report)
    }
}

/// Prefix of `s` with at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
