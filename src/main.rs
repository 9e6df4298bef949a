//! # PharmaScope CLI (`pharma`)
//!
//! The `pharma` binary serves the HTTP API and runs analyses from the
//! command line.
//!
//! ## Usage
//!
//! ```bash
//! pharma --config ./config/pharma.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pharma serve` | Start the HTTP API server |
//! | `pharma sources` | List the source catalog |
//! | `pharma classify "<query>"` | Show entities, domain and candidate sources |
//! | `pharma analyze "<query>"` | Run the full pipeline and print the report |
//!
//! ## Examples
//!
//! ```bash
//! # Classify a query
//! pharma classify "imatinib phase ii trials in leukemia"
//!
//! # Analyze with explicit sources and export CSV
//! pharma analyze "imatinib safety" --source FDA --source ClinicalTrials \
//!     --format csv --output imatinib.csv
//!
//! # Start the API on [server].bind
//! pharma serve --config ./config/pharma.toml
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use pharmascope::classify::classify;
use pharmascope::config::{self, Config};
use pharmascope::pipeline::{truncate_chars, Analyzer};
use pharmascope::registry::SourceRegistry;
use pharmascope::report::{to_structured, to_tabular, AggregateReport, EnvelopeStatus};
use pharmascope::{server, sources};

/// PharmaScope: pharmaceutical query classification, multi-source fan-out
/// and report aggregation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "pharma",
    about = "PharmaScope: classify pharmaceutical queries and aggregate results across data sources",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pharma.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,

    /// List the source catalog with categories, premium flags and rate limits.
    Sources,

    /// Classify a query without contacting any source.
    Classify {
        query: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Run the full analysis pipeline for a query.
    ///
    /// Without `--source`, the sources prioritized for the query's domain
    /// are used.
    Analyze {
        query: String,

        /// Source id to query (repeatable).
        #[arg(long = "source")]
        sources: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write the rendered report to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print lookup performance after the report.
        #[arg(long)]
        stats: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so report output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pharmascope=info,pharma=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Sources => {
            sources::list_sources(&SourceRegistry::with_builtins());
        }
        Commands::Classify { query, format } => {
            run_classify(&cfg, &query, format)?;
        }
        Commands::Analyze {
            query,
            sources,
            format,
            output,
            stats,
        } => {
            if query.trim().is_empty() {
                bail!("query must not be empty");
            }
            let analyzer = Analyzer::from_config(&cfg);
            let report = analyzer.analyze(&query, &sources).await?;

            let rendered = match format {
                OutputFormat::Text => render_text(&report),
                OutputFormat::Json => serde_json::to_string_pretty(&to_structured(&report))?,
                OutputFormat::Csv => to_tabular(&report),
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write report: {}", path.display()))?;
                    println!("Report written to {}", path.display());
                }
                None => print!("{}", rendered),
            }

            if stats {
                println!();
                analyzer.coordinator().metrics().report().print();
            }
        }
    }

    Ok(())
}

fn run_classify(cfg: &Config, query: &str, format: OutputFormat) -> anyhow::Result<()> {
    let query = truncate_chars(query.trim(), cfg.analysis.max_query_chars);
    let c = classify(query);
    let candidates = SourceRegistry::with_builtins().prioritize(c.domain);

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "query": query,
                "classification": c,
                "sources": candidates,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Csv => bail!("csv output is only available for analyze"),
        OutputFormat::Text => {
            println!("Query:       {}", query);
            println!("Domain:      {} (confidence {:.2})", c.domain, c.confidence);
            println!("Area:        {}", c.therapeutic_area);
            println!("Importance:  {}", c.strategic_importance);
            println!("Impact:      {}", c.business_impact);
            println!("Stakeholders: {}", c.stakeholders.join(", "));
            println!("Deliverables: {}", c.expected_deliverables.join(", "));
            println!("Entities:");
            let groups = [
                ("therapeutic_agents", &c.entities.therapeutic_agents),
                ("disease_indications", &c.entities.disease_indications),
                ("molecular_targets", &c.entities.molecular_targets),
                ("clinical_phases", &c.entities.clinical_phases),
            ];
            for (label, terms) in groups {
                let shown = if terms.is_empty() {
                    "-".to_string()
                } else {
                    terms.join(", ")
                };
                println!("  {:<20} {}", label, shown);
            }
            println!("Sources:     {}", candidates.join(", "));
        }
    }
    Ok(())
}

fn render_text(report: &AggregateReport) -> String {
    let c = &report.classification;
    let mut out = String::new();
    out.push_str(&format!("Query:          {}\n", report.query));
    out.push_str(&format!(
        "Domain:         {} (confidence {:.2})\n",
        c.domain, c.confidence
    ));
    out.push_str(&format!("Total records:  {}\n\n", report.total_records));

    out.push_str("Sources:\n");
    for s in &report.sources {
        match (&s.status, &s.error) {
            (EnvelopeStatus::Error, Some(e)) => {
                out.push_str(&format!("  {:<16} ERROR  {} ({})\n", s.source_id, e.message, e.code))
            }
            _ => out.push_str(&format!(
                "  {:<16} ok     {} records{}\n",
                s.source_id,
                s.record_count,
                if s.cached { " (cached)" } else { "" }
            )),
        }
    }

    out.push_str("\nKey findings:\n");
    if report.key_findings.is_empty() {
        out.push_str("  (none)\n");
    }
    for f in &report.key_findings {
        out.push_str(&format!("  [{}] {}\n", f.impact.as_str(), f.finding));
    }

    out.push_str("\nRecommendations:\n");
    for r in &report.recommendations {
        out.push_str(&format!(
            "  {}  {} ({}, investment {}, risk {})\n",
            r.priority, r.action, r.timeline, r.investment, r.risk
        ));
    }
    out
}
