//! # PharmaScope
//!
//! Pharmaceutical intelligence over many data sources at once.
//!
//! A free-text query is classified into entities (therapeutic agents, disease
//! indications, molecular targets, clinical phases) and a primary domain.
//! The domain selects a ranked set of data sources, which are queried
//! concurrently behind a per-source rate limiter and a TTL cache. The
//! per-source results are folded into one report with record counts, key
//! findings and recommendations, exportable as JSON or CSV.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────────────────┐   ┌───────────┐
//! │  Query   │──▶│ Classifier │──▶│ Coordinator         │──▶│ Aggregator│
//! │          │   │ entities + │   │ limiter→cache→retry │   │ report    │
//! └──────────┘   │ domain     │   │ join_all fan-out    │   │ JSON/CSV  │
//!                └────────────┘   └─────────┬───────────┘   └─────┬─────┘
//!                                           ▼                     │
//!                                    ┌────────────┐        ┌──────┴─────┐
//!                                    │  Registry  │        │ CLI / HTTP │
//!                                    │ 12 sources │        │  (pharma)  │
//!                                    └────────────┘        └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pharma classify "imatinib phase ii trials"
//! pharma analyze "egfr inhibitors in lung cancer" --format csv
//! pharma serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Source error enum |
//! | [`classify`] | Entity extraction and domain scoring |
//! | [`registry`] | `DataSource` trait and source catalog |
//! | [`sources`] | Built-in simulated and catalog-only sources |
//! | [`limiter`] | Fixed-window rate limiting |
//! | [`cache`] | Lookup result cache |
//! | [`fanout`] | Concurrent gather with retry and timeouts |
//! | [`report`] | Aggregation and JSON/CSV export |
//! | [`pipeline`] | End-to-end analysis and query history |
//! | [`stats`] | Lookup metrics |
//! | [`server`] | HTTP API server |

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod fanout;
pub mod limiter;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod server;
pub mod sources;
pub mod stats;
