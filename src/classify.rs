//! Query classification: entity extraction and domain scoring.
//!
//! A free-text query is lower-cased and matched against fixed reference
//! vocabularies (therapeutic agents, disease indications, molecular targets)
//! by substring containment, plus a regular expression for clinical phases.
//! Each of the six [`Domain`]s has a keyword pattern; the domain with the
//! strictly highest number of non-overlapping matches wins, ties keep the
//! first-declared domain, and a query with no matches defaults to
//! [`Domain::ClinicalDevelopment`].
//!
//! The winning domain also fixes the business context of the analysis: its
//! business impact, the stakeholders it concerns and the deliverables a
//! report is expected to support.
//!
//! Classification never fails. An empty query yields the default domain with
//! confidence `0.7`.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{Classification, Domain, EntitySet};

const THERAPEUTIC_AGENTS: &[&str] = &[
    "imatinib", "dasatinib", "rituximab", "bevacizumab", "trastuzumab", "pembrolizumab",
    "nivolumab", "atezolizumab", "durvalumab", "ipilimumab", "cetuximab", "panitumumab",
    "sorafenib", "sunitinib", "pazopanib", "regorafenib", "cabozantinib", "lenvatinib",
    "ibrutinib", "venetoclax", "osimertinib", "alectinib", "crizotinib", "ruxolitinib",
];

const DISEASE_INDICATIONS: &[&str] = &[
    "cancer", "carcinoma", "lymphoma", "leukemia", "melanoma", "sarcoma",
    "diabetes", "alzheimer", "parkinson", "multiple sclerosis", "epilepsy",
    "covid", "influenza", "hepatitis", "hiv", "tuberculosis",
    "hypertension", "heart failure", "stroke", "arrhythmia",
    "depression", "schizophrenia", "bipolar", "anxiety",
    "arthritis", "lupus", "psoriasis", "crohn", "colitis",
];

const MOLECULAR_TARGETS: &[&str] = &[
    "egfr", "her2", "vegf", "pdgfr", "kit", "flt3", "jak2", "btk", "alk", "ros1",
    "braf", "kras", "pik3ca", "akt", "mtor", "tp53", "brca1", "brca2", "atr", "atm",
    "cd20", "cd19", "cd22", "cd30", "pd1", "pdl1", "ctla4", "lag3", "tim3", "tigit",
];

const THERAPEUTIC_AREAS: &[(&str, &[&str])] = &[
    ("oncology", &["cancer", "tumor", "carcinoma", "lymphoma", "leukemia", "melanoma", "sarcoma"]),
    ("immunology", &["immune", "autoimmune", "arthritis", "lupus", "psoriasis", "crohn"]),
    ("neurology", &["alzheimer", "parkinson", "multiple sclerosis", "epilepsy", "stroke"]),
    ("cardiology", &["heart", "cardiovascular", "hypertension", "arrhythmia"]),
    ("infectious_disease", &["covid", "hiv", "hepatitis", "tuberculosis", "influenza"]),
    ("rare_disease", &["orphan", "rare", "genetic", "inherited"]),
];

fn domain_keywords(domain: Domain) -> &'static str {
    match domain {
        Domain::ClinicalDevelopment => {
            "clinical trial|study|phase|efficacy|safety|endpoint|enrollment|protocol|investigational"
        }
        Domain::DrugDiscovery => {
            "target|mechanism|bioactivity|compound|screening|hit|lead|optimization|admet"
        }
        Domain::RegulatoryAffairs => {
            "fda|ema|approval|submission|guidance|breakthrough|orphan|fast track|priority review"
        }
        Domain::MarketIntelligence => {
            "market|commercial|sales|revenue|competition|pricing|launch|forecast"
        }
        Domain::SafetySurveillance => {
            "adverse|safety|toxicity|side effect|pharmacovigilance|risk|contraindication"
        }
        Domain::CompetitiveIntelligence => {
            "competitor|pipeline|portfolio|landscape|benchmarking|positioning"
        }
    }
}

fn domain_patterns() -> &'static [(Domain, Regex)] {
    static PATTERNS: OnceLock<Vec<(Domain, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        Domain::ALL
            .into_iter()
            .map(|d| {
                let re = Regex::new(domain_keywords(d)).expect("domain keyword pattern is valid");
                (d, re)
            })
            .collect()
    })
}

fn phase_pattern() -> &'static Regex {
    static PHASE: OnceLock<Regex> = OnceLock::new();
    PHASE.get_or_init(|| {
        Regex::new(r"(?i)\bphase[\s-]?(iv|iii|ii|i|[1-4])[a-c]?\b")
            .expect("phase pattern is valid")
    })
}

/// Classify a free-text query into entities, a primary domain and a confidence.
pub fn classify(query: &str) -> Classification {
    let lower = query.to_lowercase();

    let entities = extract_entities(&lower);

    let (domain, match_count) = score_domains(&lower);
    let confidence = (0.7 + 0.1 * match_count as f64).min(0.95);

    let strategic_importance = if match_count > 3 {
        "high"
    } else if match_count > 1 {
        "medium"
    } else {
        "low"
    };

    tracing::debug!(%domain, match_count, entities = entities.len(), "classified query");

    Classification {
        therapeutic_area: infer_therapeutic_area(&entities).to_string(),
        strategic_importance: strategic_importance.to_string(),
        business_impact: business_impact(domain).to_string(),
        stakeholders: to_strings(stakeholders(domain)),
        expected_deliverables: to_strings(expected_deliverables(domain)),
        entities,
        domain,
        confidence,
        match_count,
    }
}

/// Where a domain's findings usually land in the business.
pub fn business_impact(domain: Domain) -> &'static str {
    match domain {
        Domain::ClinicalDevelopment
        | Domain::MarketIntelligence
        | Domain::CompetitiveIntelligence => "revenue_driver",
        Domain::DrugDiscovery => "innovation",
        Domain::RegulatoryAffairs => "compliance",
        Domain::SafetySurveillance => "risk_mitigation",
    }
}

pub fn stakeholders(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::ClinicalDevelopment => &["R&D", "Medical Affairs", "Regulatory"],
        Domain::DrugDiscovery => &["R&D", "Business Development"],
        Domain::RegulatoryAffairs => &["Regulatory", "Medical Affairs", "Commercial"],
        Domain::MarketIntelligence => &["Commercial", "Business Development"],
        Domain::SafetySurveillance => &["Medical Affairs", "Regulatory"],
        Domain::CompetitiveIntelligence => &["Commercial", "Business Development", "R&D"],
    }
}

pub fn expected_deliverables(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::ClinicalDevelopment => {
            &["trial_landscape", "competitive_benchmarking", "enrollment_analysis"]
        }
        Domain::DrugDiscovery => {
            &["target_assessment", "compound_profiling", "bioactivity_analysis"]
        }
        Domain::RegulatoryAffairs => {
            &["approval_timeline", "regulatory_strategy", "pathway_optimization"]
        }
        Domain::MarketIntelligence => {
            &["market_sizing", "competitive_positioning", "commercial_forecast"]
        }
        Domain::SafetySurveillance => &["safety_profile", "risk_assessment", "monitoring_strategy"],
        Domain::CompetitiveIntelligence => {
            &["pipeline_analysis", "competitor_profiling", "landscape_mapping"]
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Extract entities from an already lower-cased query.
pub fn extract_entities(lower: &str) -> EntitySet {
    EntitySet {
        therapeutic_agents: match_vocabulary(lower, THERAPEUTIC_AGENTS),
        disease_indications: match_vocabulary(lower, DISEASE_INDICATIONS),
        molecular_targets: match_vocabulary(lower, MOLECULAR_TARGETS),
        clinical_phases: extract_phases(lower),
    }
}

fn match_vocabulary(lower: &str, vocabulary: &[&str]) -> Vec<String> {
    vocabulary
        .iter()
        .filter(|term| lower.contains(*term))
        .map(|term| term.to_string())
        .collect()
}

/// All phase mentions, normalized to `"Phase <NUMERAL>"`.
pub fn extract_phases(query: &str) -> Vec<String> {
    phase_pattern()
        .captures_iter(query)
        .map(|caps| format!("Phase {}", caps[1].to_uppercase()))
        .collect()
}

/// Winning domain and its match count. First-declared domain wins ties.
fn score_domains(lower: &str) -> (Domain, usize) {
    let mut best = (Domain::ClinicalDevelopment, 0);
    for (domain, pattern) in domain_patterns() {
        let count = pattern.find_iter(lower).count();
        if count > best.1 {
            best = (*domain, count);
        }
    }
    best
}

fn infer_therapeutic_area(entities: &EntitySet) -> &'static str {
    let joined = entities.all_terms().collect::<Vec<_>>().join(" ");
    THERAPEUTIC_AREAS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| joined.contains(k)))
        .map(|(area, _)| *area)
        .unwrap_or("multiple")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_defaults() {
        let c = classify("");
        assert_eq!(c.domain, Domain::ClinicalDevelopment);
        assert!((c.confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(c.match_count, 0);
        assert!(c.entities.is_empty());
        assert_eq!(c.therapeutic_area, "multiple");
        assert_eq!(c.strategic_importance, "low");
    }

    #[test]
    fn entities_follow_vocabulary_order() {
        let c = classify("Compare Rituximab with Imatinib in lymphoma");
        assert_eq!(c.entities.therapeutic_agents, vec!["imatinib", "rituximab"]);
        assert_eq!(c.entities.disease_indications, vec!["lymphoma"]);
    }

    #[test]
    fn phase_ii_is_normalized() {
        let c = classify("phase ii trials of pembrolizumab");
        assert!(c.entities.clinical_phases.contains(&"Phase II".to_string()));
    }

    #[test]
    fn phase_variants_normalize() {
        assert_eq!(extract_phases("Phase-III and phase 2"), vec!["Phase III", "Phase 2"]);
        assert_eq!(extract_phases("phaseiv"), vec!["Phase IV"]);
        assert!(extract_phases("phase in the market").is_empty());
        assert!(extract_phases("phases").is_empty());
    }

    #[test]
    fn sub_phase_letter_keeps_numeral() {
        assert_eq!(extract_phases("phase 2a trials of ruxolitinib"), vec!["Phase 2"]);
        assert_eq!(extract_phases("Phase 2b and phase iib"), vec!["Phase 2", "Phase II"]);
        assert_eq!(extract_phases("phase-ib/ii"), vec!["Phase I"]);
    }

    #[test]
    fn drug_discovery_wins_on_keywords() {
        let c = classify("target screening for compound optimization");
        assert_eq!(c.domain, Domain::DrugDiscovery);
        assert_eq!(c.match_count, 4);
        assert!((c.confidence - 0.95).abs() < 1e-9);
        assert_eq!(c.strategic_importance, "high");
    }

    #[test]
    fn confidence_scales_with_matches() {
        let c = classify("fda approval");
        assert_eq!(c.domain, Domain::RegulatoryAffairs);
        assert_eq!(c.match_count, 2);
        assert!((c.confidence - 0.9).abs() < 1e-9);
        assert_eq!(c.strategic_importance, "medium");
    }

    #[test]
    fn ties_keep_first_declared_domain() {
        // One clinical_development match ("study") and one market_intelligence match ("sales").
        let c = classify("sales study");
        assert_eq!(c.domain, Domain::ClinicalDevelopment);
        assert_eq!(c.match_count, 1);

        // "safety" scores for both clinical_development and safety_surveillance.
        let c = classify("safety");
        assert_eq!(c.domain, Domain::ClinicalDevelopment);
    }

    #[test]
    fn domain_sets_business_context() {
        let c = classify("fda approval");
        assert_eq!(c.business_impact, "compliance");
        assert_eq!(c.stakeholders, vec!["Regulatory", "Medical Affairs", "Commercial"]);
        assert_eq!(
            c.expected_deliverables,
            vec!["approval_timeline", "regulatory_strategy", "pathway_optimization"]
        );

        let c = classify("");
        assert_eq!(c.business_impact, "revenue_driver");
        assert_eq!(c.stakeholders, vec!["R&D", "Medical Affairs", "Regulatory"]);

        for domain in Domain::ALL {
            assert!(!stakeholders(domain).is_empty());
            assert_eq!(expected_deliverables(domain).len(), 3);
        }
        assert_eq!(business_impact(Domain::SafetySurveillance), "risk_mitigation");
        assert_eq!(business_impact(Domain::DrugDiscovery), "innovation");
    }

    #[test]
    fn therapeutic_area_inferred_from_entities() {
        assert_eq!(classify("imatinib in leukemia").therapeutic_area, "oncology");
        assert_eq!(classify("rheumatoid arthritis").therapeutic_area, "immunology");
        assert_eq!(classify("hiv").therapeutic_area, "infectious_disease");
    }

    #[test]
    fn jak_query_has_no_domain_keywords() {
        let c = classify("JAK inhibitors in rheumatoid arthritis");
        assert_eq!(c.domain, Domain::ClinicalDevelopment);
        assert_eq!(c.entities.disease_indications, vec!["arthritis"]);
        assert!(c.entities.therapeutic_agents.is_empty());
    }

    #[test]
    fn oversized_input_is_accepted() {
        let long = "compound ".repeat(10_000);
        let c = classify(&long);
        assert_eq!(c.domain, Domain::DrugDiscovery);
        assert!((c.confidence - 0.95).abs() < 1e-9);
    }
}
