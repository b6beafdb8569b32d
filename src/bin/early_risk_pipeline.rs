//! Batch early-risk pipeline.
//!
//! Scores a CSV/spreadsheet file, writes the augmented CSV, charts and a run
//! summary to the output directory, and prints the riskiest customers.

use anyhow::Result;
use clap::Parser;
use early_risk::config::{EngineConfig, MissingPaymentRatio};
use early_risk::{export, obs, pipeline};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "early-risk-pipeline")]
#[command(about = "Early Risk pipeline")]
#[command(version)]
struct Args {
    /// Input CSV/XLSX path
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "./outputs")]
    outdir: PathBuf,

    /// Number of rows in the console preview
    #[arg(long, default_value_t = 20)]
    top: usize,

    /// Fill for a missing payment ratio: paid (1.0) or unpaid (0.0).
    /// Overrides RISK_PAYMENT_RATIO_FILL.
    #[arg(long)]
    payment_ratio_fill: Option<MissingPaymentRatio>,
}

fn main() -> Result<()> {
    obs::init_tracing("info");
    let args = Args::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(fill) = args.payment_ratio_fill {
        config.payment_ratio_fill = fill;
    }

    let (batch, report) = pipeline::run_pipeline(&args.input, &args.outdir, &config)?;

    println!("Saved results to: {}", report.results_csv.display());
    for chart in &report.charts {
        println!("Chart: {}", chart.display());
    }
    println!();
    println!("Top flagged customers (preview):");
    println!("{}", export::render_preview(&batch, args.top));

    Ok(())
}
