//! Aggregate reports and their exports.
//!
//! [`aggregate`] folds the per-source results of one query into an
//! [`AggregateReport`]: a normalized envelope per source (failures keep an
//! explicit error marker), the total record count, one key finding per
//! source that returned data, and a fixed set of recommendations for the
//! query's domain.
//!
//! Aggregation is a pure function of its inputs. `generated_at` is the latest
//! result timestamp, so aggregating the same results twice yields identical
//! output.
//!
//! Two exports are provided: [`to_structured`] (lossless JSON) and
//! [`to_tabular`] (sectioned CSV with every field quoted).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Classification, Domain, EntitySet, PayloadKind, SourceOutcome, SourceResult};
use crate::registry::SourceRegistry;

/// Records kept per source envelope.
pub const SAMPLE_SIZE: usize = 5;

/// Findings above this record count are rated [`Impact::High`].
const HIGH_IMPACT_THRESHOLD: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMarker {
    pub code: String,
    pub message: String,
}

/// Normalized per-source section of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEnvelope {
    pub source_id: String,
    pub name: String,
    pub category: String,
    pub status: EnvelopeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<PayloadKind>,
    pub record_count: u64,
    pub sample_records: Vec<Value>,
    pub cached: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMarker>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFinding {
    pub category: String,
    pub finding: String,
    pub impact: Impact,
    pub confidence: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: String,
    pub action: String,
    pub timeline: String,
    pub investment: String,
    pub expected_return: String,
    pub risk: String,
}

/// Unified cross-source summary for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub query: String,
    pub entities: EntitySet,
    pub classification: Classification,
    pub sources: Vec<SourceEnvelope>,
    pub total_records: u64,
    pub key_findings: Vec<KeyFinding>,
    pub recommendations: Vec<Recommendation>,
    pub generated_at: DateTime<Utc>,
}

impl AggregateReport {
    pub fn successful_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.status == EnvelopeStatus::Ok)
            .count()
    }
}

/// Build a report from the results of one gather.
///
/// Results keep their order. Source names and categories come from the
/// registry; ids the registry does not know keep the id as their name.
pub fn aggregate(
    registry: &SourceRegistry,
    query: &str,
    classification: &Classification,
    results: &[SourceResult],
) -> AggregateReport {
    let mut sources = Vec::with_capacity(results.len());
    let mut key_findings = Vec::new();
    let mut total_records = 0u64;

    for result in results {
        let (name, category) = match registry.resolve(&result.source_id) {
            Ok(d) => (d.name.clone(), d.category.clone()),
            Err(_) => (result.source_id.clone(), "General".to_string()),
        };

        let envelope = match &result.outcome {
            SourceOutcome::Success {
                payload,
                attempts,
                cached,
            } => {
                let count = payload.record_count();
                total_records += count;
                if !payload.records.is_empty() {
                    key_findings.push(KeyFinding {
                        category: category.clone(),
                        finding: format!(
                            "{} {} identified in {}",
                            count,
                            payload.kind.noun(),
                            name
                        ),
                        impact: if count > HIGH_IMPACT_THRESHOLD {
                            Impact::High
                        } else {
                            Impact::Medium
                        },
                        confidence: "High".to_string(),
                        source: name.clone(),
                    });
                }
                SourceEnvelope {
                    source_id: result.source_id.clone(),
                    name,
                    category,
                    status: EnvelopeStatus::Ok,
                    kind: Some(payload.kind),
                    record_count: count,
                    sample_records: payload.records.iter().take(SAMPLE_SIZE).cloned().collect(),
                    cached: *cached,
                    attempts: *attempts,
                    error: None,
                    timestamp: result.timestamp,
                }
            }
            SourceOutcome::Failure { code, message } => SourceEnvelope {
                source_id: result.source_id.clone(),
                name,
                category,
                status: EnvelopeStatus::Error,
                kind: None,
                record_count: 0,
                sample_records: Vec::new(),
                cached: false,
                attempts: 0,
                error: Some(ErrorMarker {
                    code: code.clone(),
                    message: message.clone(),
                }),
                timestamp: result.timestamp,
            },
        };
        sources.push(envelope);
    }

    let generated_at = results
        .iter()
        .map(|r| r.timestamp)
        .max()
        .unwrap_or_default();

    AggregateReport {
        query: query.to_string(),
        entities: classification.entities.clone(),
        classification: classification.clone(),
        sources,
        total_records,
        key_findings,
        recommendations: recommendations(classification.domain),
        generated_at,
    }
}

/// Fixed recommendation set for a domain.
pub fn recommendations(domain: Domain) -> Vec<Recommendation> {
    let rows: [[&str; 6]; 2] = match domain {
        Domain::ClinicalDevelopment => [
            [
                "P1",
                "Accelerate clinical development program with focus on differentiation",
                "6-12 months",
                "High",
                "Significant",
                "Medium",
            ],
            [
                "P2",
                "Benchmark trial design against active competitor studies",
                "1-3 months",
                "Low",
                "Moderate",
                "Low",
            ],
        ],
        Domain::DrugDiscovery => [
            [
                "P1",
                "Prioritize lead series with the strongest bioactivity profile",
                "3-6 months",
                "Medium",
                "Significant",
                "Medium",
            ],
            [
                "P2",
                "Validate target engagement with orthogonal assays",
                "3-6 months",
                "Medium",
                "Moderate",
                "Low",
            ],
        ],
        Domain::RegulatoryAffairs => [
            [
                "P1",
                "Engage with regulatory authorities early",
                "1-3 months",
                "Low",
                "Significant",
                "Low",
            ],
            [
                "P2",
                "Establish regulatory strategy working group",
                "1-2 weeks",
                "Low",
                "Moderate",
                "Low",
            ],
        ],
        Domain::MarketIntelligence => [
            [
                "P1",
                "Size the primary market and refine the launch forecast",
                "1-3 months",
                "Medium",
                "Significant",
                "Medium",
            ],
            [
                "P2",
                "Track pricing and access decisions in key markets",
                "Ongoing",
                "Low",
                "Moderate",
                "Low",
            ],
        ],
        Domain::SafetySurveillance => [
            [
                "P1",
                "Investigate emerging signals in adverse event reports",
                "Immediate",
                "Medium",
                "Risk reduction",
                "High",
            ],
            ["P2", "Update the risk management plan", "3-6 months", "Medium", "Moderate", "Medium"],
        ],
        Domain::CompetitiveIntelligence => [
            [
                "P1",
                "Accelerate competitive intelligence monitoring",
                "Immediate",
                "Medium",
                "Significant",
                "Low",
            ],
            [
                "P2",
                "Map competitor pipelines by phase and indication",
                "1-3 months",
                "Low",
                "Moderate",
                "Low",
            ],
        ],
    };

    rows.iter()
        .map(|[priority, action, timeline, investment, expected_return, risk]| Recommendation {
            priority: priority.to_string(),
            action: action.to_string(),
            timeline: timeline.to_string(),
            investment: investment.to_string(),
            expected_return: expected_return.to_string(),
            risk: risk.to_string(),
        })
        .collect()
}

/// Lossless JSON form of a report.
pub fn to_structured(report: &AggregateReport) -> Value {
    serde_json::to_value(report).unwrap_or(Value::Null)
}

/// Sectioned CSV export. Every field is quoted; embedded quotes are doubled.
pub fn to_tabular(report: &AggregateReport) -> String {
    let mut out = String::new();
    let c = &report.classification;

    row(&mut out, &["PHARMACEUTICAL INTELLIGENCE REPORT"]);
    row(&mut out, &[format!("Generated: {}", report.generated_at.to_rfc3339()).as_str()]);
    row(&mut out, &[format!("Query: {}", report.query).as_str()]);
    row(&mut out, &[format!("Domain: {}", c.domain).as_str()]);
    row(&mut out, &[format!("Confidence: {:.2}", c.confidence).as_str()]);
    row(&mut out, &[format!("Therapeutic Area: {}", c.therapeutic_area).as_str()]);
    row(&mut out, &[format!("Strategic Importance: {}", c.strategic_importance).as_str()]);
    row(&mut out, &[format!("Business Impact: {}", c.business_impact).as_str()]);
    row(&mut out, &[format!("Sources Analyzed: {}", report.sources.len()).as_str()]);
    row(&mut out, &[format!("Total Records: {}", report.total_records).as_str()]);
    out.push('\n');

    row(&mut out, &["SOURCE RESULTS"]);
    row(&mut out, &["Source", "Name", "Category", "Status", "Records", "Cached", "Error"]);
    for s in &report.sources {
        let status = match s.status {
            EnvelopeStatus::Ok => "ok",
            EnvelopeStatus::Error => "error",
        };
        let error = s
            .error
            .as_ref()
            .map(|e| format!("{}: {}", e.code, e.message))
            .unwrap_or_default();
        row(
            &mut out,
            &[
                s.source_id.as_str(),
                s.name.as_str(),
                s.category.as_str(),
                status,
                s.record_count.to_string().as_str(),
                if s.cached { "yes" } else { "no" },
                error.as_str(),
            ],
        );
    }
    out.push('\n');

    row(&mut out, &["KEY FINDINGS"]);
    row(&mut out, &["Category", "Finding", "Impact", "Confidence", "Source"]);
    for f in &report.key_findings {
        row(
            &mut out,
            &[
                f.category.as_str(),
                f.finding.as_str(),
                f.impact.as_str(),
                f.confidence.as_str(),
                f.source.as_str(),
            ],
        );
    }
    out.push('\n');

    row(&mut out, &["RECOMMENDATIONS"]);
    row(
        &mut out,
        &[
            "Priority",
            "Recommendation",
            "Timeline",
            "Investment Required",
            "Expected ROI",
            "Risk Level",
        ],
    );
    for r in &report.recommendations {
        row(
            &mut out,
            &[
                r.priority.as_str(),
                r.action.as_str(),
                r.timeline.as_str(),
                r.investment.as_str(),
                r.expected_return.as_str(),
                r.risk.as_str(),
            ],
        );
    }

    out
}

fn row(out: &mut String, fields: &[&str]) {
    let quoted: Vec<String> = fields
        .iter()
        .map(|f| format!("\"{}\"", f.replace('"', "\"\"")))
        .collect();
    out.push_str(&quoted.join(","));
    out.push('\n');
}
