//! Output sinks for a scored batch: the augmented CSV, the dashboard JSON
//! projection, the console preview and tier counts.

use crate::engine::ScoredBatch;
use crate::errors::{AppError, ResultExt};
use crate::models::{RiskFlag, RiskTier, ScoredRecord};
use crate::schema::{is_derived_column, Column};
use crate::table::{format_number, number_to_json};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const RESULTS_FILE_NAME: &str = "early_risk_results.csv";

/// Columns shown in the console preview, when present.
const PREVIEW_COLUMNS: [&str; 9] = [
    "Customer ID",
    "risk_score",
    "risk_tier",
    "reasons",
    "Utilisation %",
    "Avg Payment Ratio",
    "Min Due Paid Frequency",
    "Cash Withdrawal %",
    "DPD Bucket Next Month",
];

fn optional_number(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

fn flag_cell(raised: bool) -> &'static str {
    if raised {
        "1"
    } else {
        "0"
    }
}

/// Header and per-row derived values appended after the source columns.
fn derived_header() -> Vec<String> {
    let mut header = vec![
        "MerchantMixNorm".to_string(),
        "AvgPaymentRatioNorm".to_string(),
    ];
    header.extend(RiskFlag::ALL.iter().map(|f| f.column().to_string()));
    header.extend(
        ["risk_score", "risk_tier", "reasons", "target_positive"]
            .iter()
            .map(|s| s.to_string()),
    );
    header
}

fn derived_values(record: &ScoredRecord) -> Vec<String> {
    let mut values = vec![
        optional_number(record.merchant_mix_norm),
        format_number(record.avg_payment_ratio_norm),
    ];
    values.extend(
        RiskFlag::ALL
            .iter()
            .map(|f| flag_cell(record.flags.get(*f)).to_string()),
    );
    values.push(record.risk_score.to_string());
    values.push(record.risk_tier.to_string());
    values.push(record.reasons_text());
    values.push(
        record
            .target_positive
            .map(|t| flag_cell(t).to_string())
            .unwrap_or_default(),
    );
    values
}

/// Writes the augmented table as CSV.
///
/// Layout: source columns (minus derived columns from an earlier run), then
/// recognized columns that were absent and synthesized as empty, then the
/// derived columns.
pub fn write_augmented_csv<W: Write>(batch: &ScoredBatch, writer: W) -> Result<(), AppError> {
    let passthrough: Vec<usize> = batch
        .source
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !is_derived_column(name))
        .map(|(idx, _)| idx)
        .collect();
    let synthesized = batch.schema.missing_columns();

    let mut header: Vec<String> = passthrough
        .iter()
        .map(|idx| batch.source.columns[*idx].clone())
        .collect();
    header.extend(synthesized.iter().map(|c| c.canonical_name().to_string()));
    header.extend(derived_header());

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&header)
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    for (row, record) in batch.records.iter().enumerate() {
        let mut values: Vec<String> = passthrough
            .iter()
            .map(|idx| batch.source.cell(row, *idx).to_string())
            .collect();
        values.extend(synthesized.iter().map(|_| String::new()));
        values.extend(derived_values(record));

        wtr.write_record(&values)
            .map_err(|e| AppError::InternalError(e.to_string()))?;
    }

    wtr.flush().context("flushing CSV output")?;
    Ok(())
}

/// Writes `early_risk_results.csv` into `outdir`, creating it if needed.
pub fn save_csv(batch: &ScoredBatch, outdir: &Path) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(outdir)
        .with_context(|| format!("creating output directory {}", outdir.display()))?;

    let outpath = outdir.join(RESULTS_FILE_NAME);
    let file = std::fs::File::create(&outpath)
        .with_context(|| format!("creating {}", outpath.display()))?;
    write_augmented_csv(batch, std::io::BufWriter::new(file))?;

    tracing::info!("Saved {} scored rows to {}", batch.len(), outpath.display());
    Ok(outpath)
}

/// JSON body returned by the upload endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub count: usize,
    pub rows: Vec<Value>,
}

impl UploadResponse {
    pub fn from_batch(batch: &ScoredBatch) -> Self {
        let rows: Vec<Value> = batch
            .records
            .iter()
            .map(|record| dashboard_row(batch, record))
            .collect();
        Self {
            count: rows.len(),
            rows,
        }
    }
}

/// Dashboard projection of one record. Missing values serialize as null.
///
/// `Customer ID` is only included when the input had it. `Avg Payment Ratio`
/// carries the normalized ratio.
pub fn dashboard_row(batch: &ScoredBatch, record: &ScoredRecord) -> Value {
    let mut row = Map::new();
    let input = &record.input;

    if batch.schema.is_present(Column::CustomerId) {
        row.insert(
            Column::CustomerId.canonical_name().to_string(),
            input.customer_id.to_json(),
        );
    }
    row.insert("risk_score".to_string(), Value::from(record.risk_score));
    row.insert(
        "risk_tier".to_string(),
        Value::from(record.risk_tier.as_str()),
    );
    row.insert("reasons".to_string(), Value::from(record.reasons_text()));

    let numeric = [
        (Column::UtilisationPct, input.utilisation_pct),
        (Column::AvgPaymentRatio, Some(record.avg_payment_ratio_norm)),
        (Column::MinDuePaidFrequency, input.min_due_paid_frequency),
        (Column::CashWithdrawalPct, input.cash_withdrawal_pct),
    ];
    for (column, value) in numeric {
        row.insert(
            column.canonical_name().to_string(),
            value.map(number_to_json).unwrap_or(Value::Null),
        );
    }

    Value::Object(row)
}

/// Records ordered by descending score, ties kept in input order.
pub fn top_by_score(batch: &ScoredBatch, n: usize) -> Vec<&ScoredRecord> {
    let mut ranked: Vec<&ScoredRecord> = batch.records.iter().collect();
    ranked.sort_by(|a, b| b.risk_score.cmp(&a.risk_score));
    ranked.truncate(n);
    ranked
}

fn preview_value(batch: &ScoredBatch, record: &ScoredRecord, column: &str) -> Option<String> {
    let input = &record.input;
    let number = |col: Column, value: Option<f64>| {
        batch
            .schema
            .is_present(col)
            .then(|| optional_number(value))
    };

    match column {
        "risk_score" => Some(record.risk_score.to_string()),
        "risk_tier" => Some(record.risk_tier.to_string()),
        "reasons" => Some(record.reasons_text()),
        "Customer ID" => batch
            .schema
            .is_present(Column::CustomerId)
            .then(|| input.customer_id.to_string()),
        "Utilisation %" => number(Column::UtilisationPct, input.utilisation_pct),
        "Avg Payment Ratio" => number(
            Column::AvgPaymentRatio,
            Some(record.avg_payment_ratio_norm),
        ),
        "Min Due Paid Frequency" => {
            number(Column::MinDuePaidFrequency, input.min_due_paid_frequency)
        }
        "Cash Withdrawal %" => number(Column::CashWithdrawalPct, input.cash_withdrawal_pct),
        "DPD Bucket Next Month" => {
            number(Column::DpdBucketNextMonth, input.dpd_bucket_next_month)
        }
        _ => None,
    }
}

/// Renders the top `n` records as a right-aligned text table.
pub fn render_preview(batch: &ScoredBatch, n: usize) -> String {
    let top = top_by_score(batch, n);
    let Some(first) = top.first() else {
        return "(no rows)".to_string();
    };

    let columns: Vec<&str> = PREVIEW_COLUMNS
        .iter()
        .copied()
        .filter(|c| preview_value(batch, first, c).is_some())
        .collect();

    let cells: Vec<Vec<String>> = top
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| preview_value(batch, record, c).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:>width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut lines = vec![format_line(columns.clone())];
    for row in &cells {
        lines.push(format_line(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

/// Tier counts in Low, Medium, High order, zero-filled.
pub fn tier_counts(records: &[ScoredRecord]) -> Vec<(RiskTier, usize)> {
    RiskTier::ALL
        .iter()
        .map(|tier| {
            (
                *tier,
                records.iter().filter(|r| r.risk_tier == *tier).count(),
            )
        })
        .collect()
}

/// Utilisation values for the histogram (missing counted as 0), or `None`
/// when the input had no utilisation column.
pub fn utilisation_values(batch: &ScoredBatch) -> Option<Vec<f64>> {
    batch.schema.is_present(Column::UtilisationPct).then(|| {
        batch
            .records
            .iter()
            .map(|r| r.input.utilisation_pct.unwrap_or(0.0))
            .collect()
    })
}
