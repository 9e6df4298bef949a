//! Built-in data sources.
//!
//! Six sources produce simulated records (ClinicalTrials, PubChem, FDA,
//! ChEMBL, UniProt, OpenTargets). The other six (HPA, DrugBank, ClinVar,
//! COSMIC, IMS, PatentScope) are catalog-only: they are listed, rate-limited
//! and dispatchable, but their lookup returns an empty placeholder payload.
//!
//! Record generation happens in plain functions taking `&mut impl Rng`, so no
//! thread-local RNG is ever held across an `.await`.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{EntityKind, EntitySet, LookupParams, PayloadKind, SourcePayload};
use crate::registry::{DataSource, SourceDescriptor, SourceRegistry};

/// Register the twelve built-in sources in catalog order.
pub fn register_builtins(registry: &mut SourceRegistry) {
    let generators: [(&str, &str, &str, &str, u32, Arc<dyn DataSource>); 6] = [
        (
            "ClinicalTrials",
            "ClinicalTrials.gov",
            "Clinical Data",
            "studies",
            100,
            Arc::new(ClinicalTrialsSource),
        ),
        ("PubChem", "PubChem", "Chemical Data", "compound", 200, Arc::new(PubChemSource)),
        ("FDA", "FDA OpenFDA", "Regulatory", "drug/event", 150, Arc::new(FdaSource)),
        ("ChEMBL", "ChEMBL", "Bioactivity", "molecule", 100, Arc::new(ChemblSource)),
        ("UniProt", "UniProt", "Protein Data", "uniprotkb", 150, Arc::new(UniProtSource)),
        (
            "OpenTargets",
            "Open Targets",
            "Target Intelligence",
            "association",
            100,
            Arc::new(OpenTargetsSource),
        ),
    ];
    for (id, name, category, endpoint, limit, source) in generators {
        registry.register(
            SourceDescriptor::new(id, name, category, endpoint, source).with_rate_limit(limit),
        );
    }

    let catalog: [(&str, &str, &str, &str, bool); 6] = [
        ("HPA", "Human Protein Atlas", "Expression Data", "search", false),
        ("DrugBank", "DrugBank", "Drug Intelligence", "drugs", true),
        ("ClinVar", "ClinVar", "Genomics", "variation", false),
        ("COSMIC", "COSMIC", "Cancer Genomics", "mutations", true),
        ("IMS", "IQVIA Intelligence", "Market Intelligence", "sales", true),
        ("PatentScope", "Patent Intelligence", "IP Intelligence", "patents", true),
    ];
    for (id, name, category, endpoint, premium) in catalog {
        let source = Arc::new(CatalogOnlySource::new(name, premium));
        let descriptor = SourceDescriptor::new(id, name, category, endpoint, source);
        registry.register(if premium { descriptor.premium() } else { descriptor });
    }
}

/// Print the catalog as a table.
pub fn list_sources(registry: &SourceRegistry) {
    println!(
        "{:<16} {:<24} {:<22} {:<8} {:<12} RATE/MIN",
        "SOURCE", "NAME", "CATEGORY", "PREMIUM", "ENDPOINT"
    );
    for d in registry.descriptors() {
        let limit = d
            .rate_limit
            .map(|l| l.to_string())
            .unwrap_or_else(|| "default".to_string());
        println!(
            "{:<16} {:<24} {:<22} {:<8} {:<12} {}",
            d.id, d.name, d.category, d.premium, d.endpoint, limit
        );
    }
}

/// String parameter, if present and non-empty.
pub fn param_str<'a>(params: &'a LookupParams, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn query_params(query: &str) -> LookupParams {
    LookupParams::from([("query".to_string(), Value::from(query))])
}

/// Parameters for a source that needs one entity of `kind`.
fn entity_params(
    entities: &EntitySet,
    kind: EntityKind,
    key: &str,
    limit: u64,
) -> Option<LookupParams> {
    let term = entities.first(kind)?;
    Some(LookupParams::from([
        (key.to_string(), Value::from(term)),
        ("limit".to_string(), Value::from(limit)),
    ]))
}

fn pick<'a, R: Rng>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn random_date<R: Rng>(rng: &mut R, from_year: i32, span: i32) -> String {
    let year = from_year + rng.gen_range(0..span);
    NaiveDate::from_ymd_opt(year, rng.gen_range(1..=12), rng.gen_range(1..=28))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn fixed2(value: f64) -> String {
    format!("{:.2}", value)
}

fn search_date() -> String {
    Utc::now().to_rfc3339()
}

// ---------------------------------------------------------------------------
// ClinicalTrials
// ---------------------------------------------------------------------------

/// Trial registry. Always eligible; drug, condition and phase narrow it.
pub struct ClinicalTrialsSource;

const TRIAL_CONDITIONS: &[&str] = &[
    "Cancer", "Diabetes", "Alzheimer", "COVID-19", "Heart Disease", "Arthritis", "Depression",
];
const TRIAL_PHASES: &[&str] = &["Phase I", "Phase II", "Phase III", "Phase IV"];
const TRIAL_STATUSES: &[&str] = &[
    "Recruiting", "Active, not recruiting", "Completed", "Suspended", "Terminated", "Withdrawn",
];
const SPONSORS: &[&str] = &[
    "Pfizer Inc.", "Roche", "Novartis", "Merck & Co.", "Bristol Myers Squibb",
    "AstraZeneca", "Johnson & Johnson", "Gilead Sciences", "Biogen", "Amgen",
];

#[async_trait]
impl DataSource for ClinicalTrialsSource {
    fn params(&self, query: &str, entities: &EntitySet) -> Option<LookupParams> {
        let mut params = query_params(query);
        let optional = [
            ("drug", EntityKind::TherapeuticAgent),
            ("condition", EntityKind::DiseaseIndication),
            ("phase", EntityKind::ClinicalPhase),
        ];
        for (key, kind) in optional {
            if let Some(term) = entities.first(kind) {
                params.insert(key.to_string(), Value::from(term));
            }
        }
        params.insert("pageSize".to_string(), Value::from(200));
        Some(params)
    }

    async fn lookup(&self, _endpoint: &str, params: &LookupParams) -> Result<SourcePayload> {
        Ok(generate_trials(&mut rand::thread_rng(), params))
    }
}

fn generate_trials<R: Rng>(rng: &mut R, params: &LookupParams) -> SourcePayload {
    let drug = param_str(params, "drug");
    let condition = param_str(params, "condition");
    let phase = param_str(params, "phase");

    let studies = (0..25)
        .map(|_| {
            let study_condition = condition.unwrap_or_else(|| pick(rng, TRIAL_CONDITIONS));
            let study_phase = phase.unwrap_or_else(|| pick(rng, TRIAL_PHASES));
            json!({
                "nctId": format!("NCT{:08}", rng.gen_range(0..100_000_000u64)),
                "briefTitle": format!(
                    "{} Study of {} for {}",
                    study_phase,
                    drug.unwrap_or("Novel Therapy"),
                    study_condition
                ),
                "detailedDescription": format!(
                    "Randomized, double-blind, placebo-controlled study of {} in patients with {}.",
                    drug.unwrap_or("investigational drug"),
                    condition.unwrap_or("target condition")
                ),
                "condition": study_condition,
                "intervention": drug.unwrap_or("Investigational Drug"),
                "phase": study_phase,
                "overallStatus": pick(rng, TRIAL_STATUSES),
                "startDate": random_date(rng, 2020, 4),
                "completionDate": random_date(rng, 2024, 3),
                "enrollmentCount": rng.gen_range(50..2050),
                "studyType": if rng.gen_bool(0.2) { "Observational" } else { "Interventional" },
                "sponsor": pick(rng, SPONSORS),
                "location": format!(
                    "{} | {} sites",
                    if rng.gen_bool(0.5) { "United States" } else { "Global" },
                    rng.gen_range(10..60)
                ),
                "primaryOutcome": "Overall survival, progression-free survival",
                "secondaryOutcome": "Safety, tolerability, quality of life measures",
            })
        })
        .collect();

    SourcePayload::new(PayloadKind::Studies, studies)
        .with_total(rng.gen_range(100..600))
        .with_metadata(json!({
            "query": param_str(params, "query").unwrap_or_default(),
            "searchDate": search_date(),
            "database": "ClinicalTrials.gov",
            "api_version": "2.0",
        }))
}

// ---------------------------------------------------------------------------
// PubChem
// ---------------------------------------------------------------------------

/// Chemical structures for a therapeutic agent.
pub struct PubChemSource;

#[async_trait]
impl DataSource for PubChemSource {
    fn params(&self, _query: &str, entities: &EntitySet) -> Option<LookupParams> {
        let agent = entities.first(EntityKind::TherapeuticAgent)?;
        Some(LookupParams::from([("compound".to_string(), Value::from(agent))]))
    }

    async fn lookup(&self, _endpoint: &str, params: &LookupParams) -> Result<SourcePayload> {
        Ok(generate_compounds(&mut rand::thread_rng(), params))
    }
}

fn generate_compounds<R: Rng>(rng: &mut R, params: &LookupParams) -> SourcePayload {
    let compound = param_str(params, "compound").unwrap_or("imatinib");

    let compounds: Vec<Value> = (1..=15)
        .map(|i| {
            json!({
                "cid": rng.gen_range(1_000..10_001_000u64),
                "iupacName": format!("{}-derivative-{}", compound, i),
                "molecularFormula": format!(
                    "C{}H{}N{}O{}",
                    rng.gen_range(10..40),
                    rng.gen_range(15..55),
                    rng.gen_range(1..6),
                    rng.gen_range(2..10)
                ),
                "molecularWeight": fixed2(rng.gen_range(200.0..800.0)),
                "xlogp": fixed2(rng.gen_range(-1.0..7.0)),
                "tpsa": fixed2(rng.gen_range(0.0..200.0)),
                "heavyAtomCount": rng.gen_range(10..60),
                "hbondDonorCount": rng.gen_range(0..8),
                "hbondAcceptorCount": rng.gen_range(0..12),
                "rotatableBondCount": rng.gen_range(0..15),
                "charge": rng.gen_range(-1..2),
            })
        })
        .collect();

    let total = compounds.len();
    SourcePayload::new(PayloadKind::Compounds, compounds).with_metadata(json!({
        "query": compound,
        "searchDate": search_date(),
        "database": "PubChem",
        "totalResults": total,
    }))
}

// ---------------------------------------------------------------------------
// FDA
// ---------------------------------------------------------------------------

/// Adverse event reports for a therapeutic agent.
pub struct FdaSource;

const REACTIONS: &[&str] = &[
    "Nausea", "Headache", "Fatigue", "Dizziness", "Rash", "Diarrhea", "Vomiting", "Insomnia",
    "Anxiety", "Pain", "Fever", "Cough", "Dyspnea", "Edema", "Hypotension",
];
const EVENT_OUTCOMES: &[&str] = &[
    "Recovered/Resolved", "Recovering/Resolving", "Not recovered/Not resolved",
    "Recovered/Resolved with sequelae", "Fatal", "Unknown",
];
const REPORT_COUNTRIES: &[&str] = &["Canada", "United Kingdom", "Germany", "France", "Japan"];

#[async_trait]
impl DataSource for FdaSource {
    fn params(&self, _query: &str, entities: &EntitySet) -> Option<LookupParams> {
        entity_params(entities, EntityKind::TherapeuticAgent, "drug", 1000)
    }

    async fn lookup(&self, _endpoint: &str, params: &LookupParams) -> Result<SourcePayload> {
        Ok(generate_adverse_events(&mut rand::thread_rng(), params))
    }
}

fn generate_adverse_events<R: Rng>(rng: &mut R, params: &LookupParams) -> SourcePayload {
    let drug = param_str(params, "drug").unwrap_or_default();

    let events = (0..30)
        .map(|_| {
            json!({
                "safetyReportId": format!("US-{:010}", rng.gen_range(0..10_000_000_000u64)),
                "receiveDate": random_date(rng, 2020, 4).replace('-', ""),
                "reaction": pick(rng, REACTIONS),
                "seriousness": if rng.gen_bool(0.3) { "Serious" } else { "Non-serious" },
                "outcome": pick(rng, EVENT_OUTCOMES),
                "patientAge": rng.gen_range(18..98),
                "patientSex": if rng.gen_bool(0.5) { "Female" } else { "Male" },
                "drugName": drug,
                "dosage": format!("{}mg", rng.gen_range(10..510)),
                "routeOfAdministration": if rng.gen_bool(0.5) { "Oral" } else { "Intravenous" },
                "reportCountry": if rng.gen_bool(0.2) {
                    "United States"
                } else {
                    pick(rng, REPORT_COUNTRIES)
                },
            })
        })
        .collect();

    SourcePayload::new(PayloadKind::AdverseEvents, events)
        .with_total(rng.gen_range(500..10_500))
        .with_metadata(json!({
            "query": drug,
            "searchDate": search_date(),
            "database": "FDA OpenFDA",
            "disclaimer": "This data is for research purposes only and should not be used for medical decisions.",
        }))
}

// ---------------------------------------------------------------------------
// ChEMBL
// ---------------------------------------------------------------------------

/// Bioactive molecules related to a therapeutic agent.
pub struct ChemblSource;

const TARGET_TYPES: &[&str] = &[
    "SINGLE PROTEIN",
    "PROTEIN COMPLEX",
    "PROTEIN FAMILY",
    "CELL-LINE",
    "TISSUE",
];
const ASSAY_TYPES: &[&str] = &["Binding", "Functional", "ADMET", "Toxicity", "Physicochemical"];
const STANDARD_TYPES: &[&str] = &["IC50", "EC50", "Ki", "Kd", "CC50", "LC50"];

#[async_trait]
impl DataSource for ChemblSource {
    fn params(&self, _query: &str, entities: &EntitySet) -> Option<LookupParams> {
        entity_params(entities, EntityKind::TherapeuticAgent, "query", 1000)
    }

    async fn lookup(&self, _endpoint: &str, params: &LookupParams) -> Result<SourcePayload> {
        Ok(generate_molecules(&mut rand::thread_rng(), params))
    }
}

fn generate_molecules<R: Rng>(rng: &mut R, params: &LookupParams) -> SourcePayload {
    let query = param_str(params, "query");

    let molecules: Vec<Value> = (1..=20)
        .map(|i| {
            let activities: Vec<Value> = (1..=rng.gen_range(1..=8))
                .map(|j| {
                    json!({
                        "activityId": rng.gen_range(0..10_000_000u64),
                        "standardType": pick(rng, STANDARD_TYPES),
                        "standardValue": fixed2(10f64.powf(rng.gen_range(-3.0..3.0))),
                        "standardUnits": if rng.gen_bool(0.5) { "nM" } else { "uM" },
                        "targetChemblId": format!("CHEMBL{}", rng.gen_range(1_000..101_000)),
                        "targetName": format!("Target protein {}", j),
                        "targetType": pick(rng, TARGET_TYPES),
                        "assayType": pick(rng, ASSAY_TYPES),
                        "confidence": rng.gen_range(6..=9),
                    })
                })
                .collect();
            json!({
                "chemblId": format!("CHEMBL{}", rng.gen_range(100_000..1_100_000)),
                "prefName": match query {
                    Some(q) => format!("{}-analog-{}", q, i),
                    None => format!("Compound-{}", i),
                },
                "maxPhase": rng.gen_range(0..5),
                "molecularWeight": fixed2(rng.gen_range(150.0..950.0)),
                "alogp": fixed2(rng.gen_range(-2.0..6.0)),
                "psa": fixed2(rng.gen_range(0.0..200.0)),
                "hba": rng.gen_range(0..15),
                "hbd": rng.gen_range(0..8),
                "qedScore": format!("{:.3}", rng.gen::<f64>()),
                "activities": activities,
            })
        })
        .collect();

    let total = molecules.len();
    SourcePayload::new(PayloadKind::Molecules, molecules).with_metadata(json!({
        "query": query.unwrap_or_default(),
        "searchDate": search_date(),
        "database": "ChEMBL",
        "version": "ChEMBL_31",
        "totalResults": total,
    }))
}

// ---------------------------------------------------------------------------
// UniProt
// ---------------------------------------------------------------------------

/// Protein entries for a molecular target.
pub struct UniProtSource;

const ORGANISMS: &[&str] = &[
    "Homo sapiens", "Mus musculus", "Rattus norvegicus", "Drosophila melanogaster",
    "Caenorhabditis elegans",
];
const LOCATIONS: &[&str] = &[
    "Nucleus", "Cytoplasm", "Membrane", "Mitochondrion", "Endoplasmic reticulum", "Golgi apparatus",
];
const PROTEIN_FUNCTIONS: &[&str] = &[
    "Catalyzes the phosphorylation of target proteins",
    "Involved in cell cycle regulation and DNA repair",
    "Functions as a transcriptional regulator",
    "Plays a role in protein folding and quality control",
    "Mediates signal transduction pathways",
    "Involved in metabolic processes and enzyme regulation",
];

#[async_trait]
impl DataSource for UniProtSource {
    fn params(&self, _query: &str, entities: &EntitySet) -> Option<LookupParams> {
        entity_params(entities, EntityKind::MolecularTarget, "query", 500)
    }

    async fn lookup(&self, _endpoint: &str, params: &LookupParams) -> Result<SourcePayload> {
        Ok(generate_proteins(&mut rand::thread_rng(), params))
    }
}

fn generate_proteins<R: Rng>(rng: &mut R, params: &LookupParams) -> SourcePayload {
    let query = param_str(params, "query");
    let symbol = query.map(str::to_uppercase);

    let proteins: Vec<Value> = (1..=12)
        .map(|i| {
            json!({
                "accession": format!("P{:05}", rng.gen_range(0..100_000)),
                "entryName": format!("{}_{}_HUMAN", symbol.as_deref().unwrap_or("PROTEIN"), i),
                "proteinName": format!("{} {}", query.unwrap_or("Target protein"), i),
                "geneName": format!("{}{}", symbol.as_deref().unwrap_or("GENE"), i),
                "organism": pick(rng, ORGANISMS),
                "length": rng.gen_range(100..3100),
                "mass": rng.gen_range(10_000..310_000),
                "function": pick(rng, PROTEIN_FUNCTIONS),
                "subcellularLocation": pick(rng, LOCATIONS),
                "interactions": rng.gen_range(5..55),
                "publications": rng.gen_range(10..210),
            })
        })
        .collect();

    let total = proteins.len();
    SourcePayload::new(PayloadKind::Proteins, proteins).with_metadata(json!({
        "query": query.unwrap_or_default(),
        "searchDate": search_date(),
        "database": "UniProt",
        "release": "2024_01",
        "totalResults": total,
    }))
}

// ---------------------------------------------------------------------------
// OpenTargets
// ---------------------------------------------------------------------------

/// Target-disease associations for a molecular target.
pub struct OpenTargetsSource;

const DISEASE_AREAS: &[&str] = &[
    "Neoplasm", "Cardiovascular disease", "Nervous system disease", "Immune system disease",
    "Metabolic disease",
];

#[async_trait]
impl DataSource for OpenTargetsSource {
    fn params(&self, _query: &str, entities: &EntitySet) -> Option<LookupParams> {
        entity_params(entities, EntityKind::MolecularTarget, "query", 500)
    }

    async fn lookup(&self, _endpoint: &str, params: &LookupParams) -> Result<SourcePayload> {
        Ok(generate_associations(&mut rand::thread_rng(), params))
    }
}

fn generate_associations<R: Rng>(rng: &mut R, params: &LookupParams) -> SourcePayload {
    let query = param_str(params, "query");
    let symbol = query.map(str::to_uppercase);
    let score = |rng: &mut R| format!("{:.3}", rng.gen::<f64>());

    let associations: Vec<Value> = (1..=10)
        .map(|i| {
            json!({
                "targetId": format!("ENSG00000{:06}", rng.gen_range(0..1_000_000)),
                "targetSymbol": format!("{}{}", symbol.as_deref().unwrap_or("TARGET"), i),
                "diseaseId": format!("EFO_{:07}", rng.gen_range(0..10_000_000)),
                "diseaseName": pick(rng, DISEASE_AREAS),
                "overallScore": score(rng),
                "geneticAssociationScore": score(rng),
                "drugsScore": score(rng),
                "tractabilitySmallMolecule": rng.gen_range(1..=10),
                "evidenceCount": rng.gen_range(10..110),
                "approvedDrugs": rng.gen_range(0..5),
                "clinicalTrials": rng.gen_range(1..=20),
            })
        })
        .collect();

    let total = associations.len();
    SourcePayload::new(PayloadKind::Associations, associations).with_metadata(json!({
        "query": query.unwrap_or_default(),
        "searchDate": search_date(),
        "database": "Open Targets Platform",
        "version": "23.12",
        "totalResults": total,
    }))
}

// ---------------------------------------------------------------------------
// Catalog-only
// ---------------------------------------------------------------------------

/// Listed source whose integration is not available yet.
pub struct CatalogOnlySource {
    name: String,
    premium: bool,
}

impl CatalogOnlySource {
    pub fn new(name: impl Into<String>, premium: bool) -> Self {
        Self {
            name: name.into(),
            premium,
        }
    }
}

#[async_trait]
impl DataSource for CatalogOnlySource {
    fn params(&self, query: &str, _entities: &EntitySet) -> Option<LookupParams> {
        Some(query_params(query))
    }

    async fn lookup(&self, _endpoint: &str, _params: &LookupParams) -> Result<SourcePayload> {
        let note = if self.premium {
            "integration pending enterprise subscription"
        } else {
            "integration pending"
        };
        Ok(SourcePayload::new(PayloadKind::Placeholder, Vec::new()).with_metadata(json!({
            "database": self.name,
            "message": format!("{} {}", self.name, note),
            "premium": self.premium,
        })))
    }
}
