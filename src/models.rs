//! Core data models used throughout PharmaScope.
//!
//! These types represent the classified query, the normalized per-source
//! payloads, and the per-source results that flow through the fan-out and
//! aggregation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Parameters passed to a source lookup. Sorted by key so that the
/// serialized form is canonical.
pub type LookupParams = BTreeMap<String, Value>;

/// Primary domain of a query. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    ClinicalDevelopment,
    DrugDiscovery,
    RegulatoryAffairs,
    MarketIntelligence,
    SafetySurveillance,
    CompetitiveIntelligence,
}

impl Domain {
    /// All domains in declaration order.
    pub const ALL: [Domain; 6] = [
        Domain::ClinicalDevelopment,
        Domain::DrugDiscovery,
        Domain::RegulatoryAffairs,
        Domain::MarketIntelligence,
        Domain::SafetySurveillance,
        Domain::CompetitiveIntelligence,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ClinicalDevelopment => "clinical_development",
            Self::DrugDiscovery => "drug_discovery",
            Self::RegulatoryAffairs => "regulatory_affairs",
            Self::MarketIntelligence => "market_intelligence",
            Self::SafetySurveillance => "safety_surveillance",
            Self::CompetitiveIntelligence => "competitive_intelligence",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.label() == label)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Entity categories extracted from a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    TherapeuticAgent,
    DiseaseIndication,
    MolecularTarget,
    ClinicalPhase,
}

/// Matched terms per entity category.
///
/// Vocabulary categories keep vocabulary order; phases keep match order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub therapeutic_agents: Vec<String>,
    pub disease_indications: Vec<String>,
    pub molecular_targets: Vec<String>,
    pub clinical_phases: Vec<String>,
}

impl EntitySet {
    pub fn get(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::TherapeuticAgent => &self.therapeutic_agents,
            EntityKind::DiseaseIndication => &self.disease_indications,
            EntityKind::MolecularTarget => &self.molecular_targets,
            EntityKind::ClinicalPhase => &self.clinical_phases,
        }
    }

    /// First matched term of the given kind, if any.
    pub fn first(&self, kind: EntityKind) -> Option<&str> {
        self.get(kind).first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.therapeutic_agents.len()
            + self.disease_indications.len()
            + self.molecular_targets.len()
            + self.clinical_phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every matched term, category by category.
    pub fn all_terms(&self) -> impl Iterator<Item = &str> {
        self.therapeutic_agents
            .iter()
            .chain(&self.disease_indications)
            .chain(&self.molecular_targets)
            .chain(&self.clinical_phases)
            .map(String::as_str)
    }
}

/// Output of the query classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub entities: EntitySet,
    pub domain: Domain,
    pub confidence: f64,
    /// Keyword matches scored by the winning domain.
    pub match_count: usize,
    pub therapeutic_area: String,
    pub strategic_importance: String,
    /// `revenue_driver`, `innovation`, `compliance` or `risk_mitigation`.
    pub business_impact: String,
    /// Functions that usually consume this kind of analysis.
    pub stakeholders: Vec<String>,
    pub expected_deliverables: Vec<String>,
}

/// Which record collection a payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Studies,
    Compounds,
    AdverseEvents,
    Molecules,
    Proteins,
    Associations,
    Placeholder,
}

impl PayloadKind {
    /// Field name of the collection in the HTTP wire format.
    pub fn collection_key(&self) -> &'static str {
        match self {
            Self::Studies => "studies",
            Self::Compounds => "compounds",
            Self::AdverseEvents => "adverseEvents",
            Self::Molecules => "molecules",
            Self::Proteins => "proteins",
            Self::Associations => "associations",
            Self::Placeholder => "records",
        }
    }

    /// Plural noun used in key findings.
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Studies => "clinical trials",
            Self::Compounds => "compounds",
            Self::AdverseEvents => "adverse event reports",
            Self::Molecules => "molecules with bioactivity data",
            Self::Proteins => "protein entries",
            Self::Associations => "target-disease associations",
            Self::Placeholder => "records",
        }
    }
}

/// Normalized result of one source lookup.
///
/// Adapters at the source boundary produce this shape so that aggregation
/// never has to inspect payload-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePayload {
    pub kind: PayloadKind,
    pub records: Vec<Value>,
    /// Explicit total declared by the source (may exceed `records.len()`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    pub metadata: Value,
}

impl SourcePayload {
    pub fn new(kind: PayloadKind, records: Vec<Value>) -> Self {
        Self {
            kind,
            records,
            total_count: None,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Declared total if present, else the collection length.
    pub fn record_count(&self) -> u64 {
        self.total_count.unwrap_or(self.records.len() as u64)
    }

    /// HTTP wire form: `{ <collection>: [...], totalCount?, metadata }`.
    pub fn to_wire(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(
            self.kind.collection_key().to_string(),
            Value::Array(self.records.clone()),
        );
        if let Some(total) = self.total_count {
            map.insert("totalCount".to_string(), Value::from(total));
        }
        map.insert("metadata".to_string(), self.metadata.clone());
        Value::Object(map)
    }

    /// Size in bytes of the compact JSON wire form.
    pub fn wire_size(&self) -> usize {
        self.to_wire().to_string().len()
    }
}

/// Outcome of invoking one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Success {
        payload: SourcePayload,
        attempts: u32,
        cached: bool,
    },
    Failure {
        code: String,
        message: String,
    },
}

/// Result of invoking one source for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: SourceOutcome,
}

impl SourceResult {
    pub fn success(source_id: &str, payload: SourcePayload, attempts: u32, cached: bool) -> Self {
        Self {
            source_id: source_id.to_string(),
            timestamp: Utc::now(),
            outcome: SourceOutcome::Success {
                payload,
                attempts,
                cached,
            },
        }
    }

    pub fn failure(source_id: &str, err: &crate::error::SourceError) -> Self {
        Self {
            source_id: source_id.to_string(),
            timestamp: Utc::now(),
            outcome: SourceOutcome::Failure {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        }
    }

    pub fn payload(&self) -> Option<&SourcePayload> {
        match &self.outcome {
            SourceOutcome::Success { payload, .. } => Some(payload),
            SourceOutcome::Failure { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.payload().is_some()
    }
}
