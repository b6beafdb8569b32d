//! Early Risk Engine Library
//!
//! This library scores tabular credit-account records with a small set of
//! early-warning rules and produces a tiered view for dashboards. Both the
//! batch pipeline binary and the HTTP upload server call the same engine.
//!
//! # Modules
//!
//! - `obs`: Observability and logging.
//! - `charts`: SVG summary charts.
//! - `config`: Configuration management.
//! - `engine`: The flag engine (normalization, rules, score, tier, target).
//! - `errors`: Error handling types.
//! - `export`: Augmented CSV, dashboard JSON and console preview.
//! - `handlers`: HTTP request handlers.
//! - `ingest`: CSV and spreadsheet readers.
//! - `models`: Input and scored record models.
//! - `pipeline`: Batch pipeline orchestration.
//! - `schema`: Header mapping onto recognized columns.
//! - `table`: In-memory table model.

pub mod obs;

pub mod charts;
pub mod config;
pub mod engine;
pub mod errors;
pub mod export;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod table;
