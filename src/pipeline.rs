//! Batch pipeline: load a file, score it, write results, charts and a summary.

use crate::charts;
use crate::config::EngineConfig;
use crate::engine::{FlagEngine, ScoredBatch};
use crate::errors::{AppError, ResultExt};
use crate::export;
use crate::ingest;
use crate::models::RiskTier;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SUMMARY_FILE_NAME: &str = "run_summary.json";

/// What a pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub input: PathBuf,
    pub rows: usize,
    pub tier_counts: BTreeMap<RiskTier, usize>,
    pub payment_ratio_fill: String,
    pub results_csv: PathBuf,
    pub charts: Vec<PathBuf>,
    pub generated_at: DateTime<Utc>,
}

/// Writes the two summary charts; the histogram only when utilisation exists.
pub fn write_charts(batch: &ScoredBatch, outdir: &Path) -> Result<Vec<PathBuf>, AppError> {
    std::fs::create_dir_all(outdir)
        .with_context(|| format!("creating output directory {}", outdir.display()))?;

    let mut written = Vec::new();

    if let Some(values) = export::utilisation_values(batch) {
        let path = outdir.join(charts::HISTOGRAM_FILE_NAME);
        if charts::utilisation_histogram(&values, &path)? {
            written.push(path);
        }
    }

    let path = outdir.join(charts::TIER_CHART_FILE_NAME);
    charts::tier_bar_chart(&export::tier_counts(&batch.records), &path)?;
    written.push(path);

    Ok(written)
}

/// Runs the whole batch path and returns the scored batch with its report.
///
/// Nothing is written until every row has been scored.
pub fn run_pipeline(
    input: &Path,
    outdir: &Path,
    config: &EngineConfig,
) -> Result<(ScoredBatch, PipelineReport), AppError> {
    tracing::info!("Loading data: {}", input.display());
    let table = ingest::load_path(input)?;

    tracing::info!("Computing flags for {} rows...", table.len());
    let engine = FlagEngine::new(config.clone());
    let batch = engine.compute_flags(table);

    let results_csv = export::save_csv(&batch, outdir)?;

    tracing::info!("Generating basic plots...");
    let charts = write_charts(&batch, outdir)?;
    tracing::info!("Plots saved to: {}", outdir.display());

    let report = PipelineReport {
        input: input.to_path_buf(),
        rows: batch.len(),
        tier_counts: export::tier_counts(&batch.records).into_iter().collect(),
        payment_ratio_fill: config.payment_ratio_fill.to_string(),
        results_csv,
        charts,
        generated_at: Utc::now(),
    };

    let summary_path = outdir.join(SUMMARY_FILE_NAME);
    let summary = serde_json::to_string_pretty(&report)
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    std::fs::write(&summary_path, summary)
        .with_context(|| format!("writing {}", summary_path.display()))?;

    Ok((batch, report))
}
