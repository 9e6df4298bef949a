//! Source registry and dispatcher.
//!
//! Every data source is described by a [`SourceDescriptor`]: identifier,
//! human name, category tag, premium flag, default endpoint, per-source rate
//! limit and a bound [`DataSource`] implementation. The registry is built
//! once at startup and shared read-only behind an `Arc`.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               SourceRegistry                │
//! │  ┌──────────────┐ ┌──────────┐ ┌─────────┐  │
//! │  │  Generators  │ │ Catalog  │ │ Custom  │  │
//! │  │ CT/PubChem/… │ │ DrugBank │ │ (Rust)  │  │
//! │  └──────────────┘ └──────────┘ └─────────┘  │
//! └────────────────────┬────────────────────────┘
//!                      ▼
//!         resolve() → Coordinator::gather()
//! ```
//!
//! Library users can implement [`DataSource`] and register it alongside the
//! built-in sources:
//!
//! ```rust
//! use async_trait::async_trait;
//! use pharmascope::error::Result;
//! use pharmascope::models::{EntitySet, LookupParams, PayloadKind, SourcePayload};
//! use pharmascope::registry::{DataSource, SourceDescriptor, SourceRegistry};
//! use std::sync::Arc;
//!
//! struct InternalTrials;
//!
//! #[async_trait]
//! impl DataSource for InternalTrials {
//!     fn params(&self, query: &str, _entities: &EntitySet) -> Option<LookupParams> {
//!         Some(LookupParams::from([("query".to_string(), query.into())]))
//!     }
//!
//!     async fn lookup(&self, _endpoint: &str, _params: &LookupParams) -> Result<SourcePayload> {
//!         Ok(SourcePayload::new(PayloadKind::Studies, vec![]))
//!     }
//! }
//!
//! let mut registry = SourceRegistry::with_builtins();
//! registry.register(SourceDescriptor::new(
//!     "InternalTrials",
//!     "Internal trial registry",
//!     "Clinical Data",
//!     "studies",
//!     Arc::new(InternalTrials),
//! ));
//! assert!(registry.resolve("InternalTrials").is_ok());
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::error::{Result, SourceError};
use crate::limiter::FixedWindowLimiter;
use crate::models::{Domain, EntitySet, LookupParams, SourcePayload};

/// A pluggable dataset provider.
///
/// Implementations are invoked concurrently by the fan-out coordinator and
/// must be `Send + Sync`.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Build lookup parameters from a query and its entities.
    ///
    /// Returns `None` when the entities the source needs are missing; the
    /// coordinator then skips the source without recording a failure.
    fn params(&self, query: &str, entities: &EntitySet) -> Option<LookupParams>;

    /// Fetch records for the given endpoint and parameters.
    async fn lookup(&self, endpoint: &str, params: &LookupParams) -> Result<SourcePayload>;
}

/// Static registry entry for one data source.
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    pub category: String,
    pub premium: bool,
    pub endpoint: String,
    /// Requests per window; `None` uses `[rate_limit].default_limit`.
    pub rate_limit: Option<u32>,
    source: Arc<dyn DataSource>,
}

impl SourceDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        endpoint: impl Into<String>,
        source: Arc<dyn DataSource>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            premium: false,
            endpoint: endpoint.into(),
            rate_limit: None,
            source,
        }
    }

    pub fn premium(mut self) -> Self {
        self.premium = true;
        self
    }

    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    /// The bound lookup capability.
    pub fn source(&self) -> &dyn DataSource {
        self.source.as_ref()
    }

    pub fn info(&self) -> SourceInfo {
        SourceInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            premium: self.premium,
            endpoint: self.endpoint.clone(),
            rate_limit: self.rate_limit,
        }
    }
}

/// Serializable view of a descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub id: String,
    pub name: String,
    pub category: String,
    pub premium: bool,
    pub endpoint: String,
    pub rate_limit: Option<u32>,
}

/// Process-wide catalog of data sources.
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Create a registry pre-loaded with the twelve built-in sources.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::sources::register_builtins(&mut registry);
        registry
    }

    /// Register a source. A descriptor with an existing id replaces it.
    pub fn register(&mut self, descriptor: SourceDescriptor) {
        match self.sources.iter_mut().find(|d| d.id == descriptor.id) {
            Some(existing) => *existing = descriptor,
            None => self.sources.push(descriptor),
        }
    }

    /// Resolve an identifier to its descriptor.
    pub fn resolve(&self, source_id: &str) -> Result<&SourceDescriptor> {
        self.sources
            .iter()
            .find(|d| d.id == source_id)
            .ok_or_else(|| SourceError::UnknownSource(source_id.to_string()))
    }

    pub fn descriptors(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn ids(&self) -> Vec<String> {
        self.sources.iter().map(|d| d.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Candidate sources for a domain, most relevant first.
    pub fn prioritize(&self, domain: Domain) -> Vec<String> {
        let ids: &[&str] = match domain {
            Domain::ClinicalDevelopment => &["ClinicalTrials", "FDA", "DrugBank"],
            Domain::DrugDiscovery => &["ChEMBL", "PubChem", "UniProt", "OpenTargets"],
            Domain::RegulatoryAffairs => &["FDA", "ClinicalTrials"],
            Domain::MarketIntelligence => &["IMS", "ClinicalTrials", "PatentScope"],
            Domain::SafetySurveillance => &["FDA", "DrugBank"],
            Domain::CompetitiveIntelligence => &["IMS", "PatentScope", "ClinicalTrials", "ChEMBL"],
        };
        ids.iter().map(|s| s.to_string()).collect()
    }

    /// Like [`prioritize`](Self::prioritize) for a domain label; unknown
    /// labels fall back to a two-source default.
    pub fn prioritize_label(&self, label: &str) -> Vec<String> {
        match Domain::from_label(label) {
            Some(domain) => self.prioritize(domain),
            None => vec!["ClinicalTrials".to_string(), "PubChem".to_string()],
        }
    }

    /// Per-source limiter using descriptor limits, overridden by config.
    /// Sources that declare no limit get `config.default_limit`.
    pub fn rate_limiter(&self, config: &RateLimitConfig) -> FixedWindowLimiter {
        let mut limiter =
            FixedWindowLimiter::new(Duration::from_secs(config.window_secs), config.default_limit);
        for d in &self.sources {
            if let Some(limit) = d.rate_limit {
                limiter = limiter.with_limit(d.id.clone(), limit);
            }
        }
        for (id, limit) in &config.limits {
            limiter = limiter.with_limit(id.clone(), *limit);
        }
        limiter
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PayloadKind;

    struct Empty;

    #[async_trait]
    impl DataSource for Empty {
        fn params(&self, _query: &str, _entities: &EntitySet) -> Option<LookupParams> {
            Some(LookupParams::new())
        }

        async fn lookup(&self, _endpoint: &str, _params: &LookupParams) -> Result<SourcePayload> {
            Ok(SourcePayload::new(PayloadKind::Placeholder, vec![]))
        }
    }

    #[test]
    fn builtins_cover_catalog() {
        let registry = SourceRegistry::with_builtins();
        assert_eq!(registry.len(), 12);
        for id in ["ClinicalTrials", "PubChem", "FDA", "ChEMBL", "UniProt", "OpenTargets"] {
            let d = registry.resolve(id).unwrap();
            assert!(!d.premium, "{} should not be premium", id);
        }
        for id in ["DrugBank", "COSMIC", "IMS", "PatentScope"] {
            assert!(registry.resolve(id).unwrap().premium);
        }
    }

    #[test]
    fn resolve_unknown_fails() {
        let registry = SourceRegistry::with_builtins();
        let err = registry.resolve("NotARealSource").err().unwrap();
        assert_eq!(err, SourceError::UnknownSource("NotARealSource".into()));
    }

    #[test]
    fn prioritize_is_static_and_bounded() {
        let registry = SourceRegistry::with_builtins();
        assert_eq!(
            registry.prioritize(Domain::DrugDiscovery),
            vec!["ChEMBL", "PubChem", "UniProt", "OpenTargets"]
        );
        for domain in Domain::ALL {
            let ids = registry.prioritize(domain);
            assert!((2..=4).contains(&ids.len()));
            for id in &ids {
                assert!(registry.resolve(id).is_ok(), "{} not registered", id);
            }
        }
        assert_eq!(registry.prioritize_label("astrology"), vec!["ClinicalTrials", "PubChem"]);
        assert_eq!(registry.prioritize_label("regulatory_affairs"), vec!["FDA", "ClinicalTrials"]);
    }

    #[test]
    fn register_replaces_same_id() {
        let mut registry = SourceRegistry::new();
        for name in ["First", "Second"] {
            let source = Arc::new(Empty);
            registry.register(SourceDescriptor::new("X", name, "General", "search", source));
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("X").unwrap().name, "Second");
    }

    #[test]
    fn rate_limiter_merges_config_overrides() {
        let registry = SourceRegistry::with_builtins();
        let mut cfg = RateLimitConfig::default();
        cfg.limits.insert("FDA".into(), 7);
        let limiter = registry.rate_limiter(&cfg);
        assert_eq!(limiter.limit_for("FDA"), 7);
        assert_eq!(limiter.limit_for("PubChem"), 200);
        assert_eq!(limiter.limit_for("ClinicalTrials"), 100);
        assert_eq!(limiter.limit_for("Unregistered"), 50);
    }

    #[test]
    fn sources_without_own_limit_follow_config_default() {
        let registry = SourceRegistry::with_builtins();
        let cfg = RateLimitConfig {
            default_limit: 5,
            ..RateLimitConfig::default()
        };
        let limiter = registry.rate_limiter(&cfg);
        for id in ["HPA", "DrugBank", "ClinVar", "COSMIC", "IMS", "PatentScope"] {
            assert_eq!(registry.resolve(id).unwrap().rate_limit, None);
            assert_eq!(limiter.limit_for(id), 5, "{} should use the default", id);
        }
        assert_eq!(limiter.limit_for("FDA"), 150);
        assert_eq!(registry.resolve("FDA").unwrap().info().rate_limit, Some(150));
    }
}
