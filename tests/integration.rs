use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pharma_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pharma");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("pharma.toml");
    fs::write(
        &config_path,
        r#"[server]
simulated_latency_ms = [0, 0]

[fanout]
base_delay_ms = 1
attempt_timeout_ms = 2000

[cache]
capacity = 50
ttl_secs = 60
"#,
    )
    .unwrap();
    (tmp, config_path)
}

fn run_pharma(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(pharma_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run pharma binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_sources_lists_catalog() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_pharma(&config, &["sources"]);
    assert!(success);
    assert!(stdout.starts_with("SOURCE"));
    for id in [
        "ClinicalTrials", "PubChem", "FDA", "ChEMBL", "UniProt", "OpenTargets",
        "HPA", "DrugBank", "ClinVar", "COSMIC", "IMS", "PatentScope",
    ] {
        assert!(stdout.contains(id), "missing {} in:\n{}", id, stdout);
    }
    assert_eq!(stdout.lines().count(), 13);
}

#[test]
fn test_classify_text() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_pharma(
        &config,
        &["classify", "imatinib target screening for compound optimization"],
    );
    assert!(success);
    assert!(stdout.contains("drug_discovery"));
    assert!(stdout.contains("imatinib"));
    assert!(stdout.contains("ChEMBL, PubChem, UniProt, OpenTargets"));
    assert!(stdout.contains("innovation"));
    assert!(stdout.contains("target_assessment, compound_profiling, bioactivity_analysis"));
}

#[test]
fn test_classify_json_defaults_empty_query() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_pharma(&config, &["classify", "", "--format", "json"]);
    assert!(success);
    let value: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["classification"]["domain"], "clinical_development");
    assert_eq!(value["classification"]["confidence"], 0.7);
    assert_eq!(value["classification"]["business_impact"], "revenue_driver");
    assert_eq!(
        value["classification"]["stakeholders"],
        serde_json::json!(["R&D", "Medical Affairs", "Regulatory"])
    );
    assert_eq!(
        value["sources"],
        serde_json::json!(["ClinicalTrials", "FDA", "DrugBank"])
    );
}

#[test]
fn test_analyze_json_with_selected_sources() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_pharma(
        &config,
        &[
            "analyze",
            "imatinib in leukemia",
            "--source",
            "PubChem",
            "--source",
            "ChEMBL",
            "--format",
            "json",
        ],
    );
    assert!(success, "stderr: {}", stderr);
    let report: Value = serde_json::from_str(&stdout).unwrap();
    let ids: Vec<&str> = report["sources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["source_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["PubChem", "ChEMBL"]);
    assert_eq!(report["total_records"], 35);
    assert_eq!(report["key_findings"].as_array().unwrap().len(), 2);
}

#[test]
fn test_analyze_csv_to_file() {
    let (tmp, config) = setup_test_env();
    let out = tmp.path().join("report.csv");
    let (stdout, _, success) = run_pharma(
        &config,
        &[
            "analyze",
            "fda approval of imatinib",
            "--format",
            "csv",
            "--output",
            out.to_str().unwrap(),
        ],
    );
    assert!(success);
    assert!(stdout.contains("Report written to"));

    let csv = fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("\"PHARMACEUTICAL INTELLIGENCE REPORT\""));
    assert!(csv.contains("\"Domain: regulatory_affairs\""));
    assert!(csv.contains("\"SOURCE RESULTS\""));
    assert!(csv.contains("\"KEY FINDINGS\""));
    assert!(csv.contains("\"RECOMMENDATIONS\""));
}

#[test]
fn test_analyze_text_with_stats() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_pharma(
        &config,
        &["analyze", "egfr in lung cancer", "--stats"],
    );
    assert!(success);
    assert!(stdout.contains("Key findings:"));
    assert!(stdout.contains("Lookup Performance"));
}

#[test]
fn test_analyze_unknown_source() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_pharma(
        &config,
        &["analyze", "imatinib", "--source", "NotARealSource"],
    );
    assert!(!success);
    assert!(stderr.contains("Unsupported API: NotARealSource"));
}

#[test]
fn test_analyze_empty_query() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_pharma(&config, &["analyze", "   "]);
    assert!(!success);
    assert!(stderr.contains("query must not be empty"));
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does-not-exist.toml");
    let (stdout, _, success) = run_pharma(&missing, &["classify", "phase ii study"]);
    assert!(success);
    assert!(stdout.contains("Phase II"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[fanout]\nmax_attempts = 0\n").unwrap();
    let (_, stderr, success) = run_pharma(&config_path, &["sources"]);
    assert!(!success);
    assert!(stderr.contains("max_attempts"));
}
