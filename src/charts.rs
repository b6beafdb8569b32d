//! Summary charts for the batch pipeline, rendered as SVG.

use crate::errors::AppError;
use crate::models::RiskTier;
use plotters::prelude::*;
use std::path::Path;

pub const HISTOGRAM_FILE_NAME: &str = "hist_utilisation.svg";
pub const TIER_CHART_FILE_NAME: &str = "bar_risk_tier_count.svg";

const HISTOGRAM_BINS: usize = 30;

fn chart_error(err: impl std::fmt::Display) -> AppError {
    AppError::InternalError(format!("chart rendering failed: {}", err))
}

/// Equal-width bins over `[min, max]`: returns `(min, bin_width, counts)`.
///
/// A degenerate range (single distinct value) uses a bin width of 1.
pub fn bin_values(values: &[f64], bins: usize) -> (f64, f64, Vec<u32>) {
    let bins = bins.max(1);
    let mut counts = vec![0u32; bins];

    let min = values.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = values.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let width = if max > min {
        (max - min) / bins as f64
    } else {
        1.0
    };

    for v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    (min, width, counts)
}

/// Histogram of utilisation values. Nothing is written for an empty slice.
pub fn utilisation_histogram(values: &[f64], path: &Path) -> Result<bool, AppError> {
    if values.is_empty() {
        tracing::debug!("No utilisation values, skipping histogram");
        return Ok(false);
    }

    let (min, width, counts) = bin_values(values, HISTOGRAM_BINS);
    let y_max = counts.iter().copied().max().unwrap_or(0) + 1;

    let root = SVGBackend::new(path, (700, 400)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Distribution of Utilisation %", ("sans-serif", 20.0))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0u32..counts.len() as u32).into_segmented(), 0u32..y_max)
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Utilisation %")
        .y_desc("Count")
        .x_labels(10)
        .x_label_formatter(&|v| match v {
            SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
                format!("{:.0}", min + width * *i as f64)
            }
            SegmentValue::Last => String::new(),
        })
        .draw()
        .map_err(chart_error)?;

    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(BLUE.mix(0.6).filled())
                .margin(1)
                .data(counts.iter().enumerate().map(|(i, c)| (i as u32, *c))),
        )
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    Ok(true)
}

/// Bar chart of record counts per tier, in Low, Medium, High order.
pub fn tier_bar_chart(counts: &[(RiskTier, usize)], path: &Path) -> Result<(), AppError> {
    let y_max = counts.iter().map(|(_, n)| *n as u32).max().unwrap_or(0) + 1;
    let labels: Vec<&'static str> = counts.iter().map(|(tier, _)| tier.as_str()).collect();

    let root = SVGBackend::new(path, (600, 400)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Count by Risk Tier", ("sans-serif", 20.0))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0u32..counts.len() as u32).into_segmented(), 0u32..y_max)
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Risk Tier")
        .y_desc("Count")
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => labels
                .get(*i as usize)
                .map(|s| s.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()
        .map_err(chart_error)?;

    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(RED.mix(0.6).filled())
                .margin(20)
                .data(
                    counts
                        .iter()
                        .enumerate()
                        .map(|(i, (_, n))| (i as u32, *n as u32)),
                ),
        )
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    Ok(())
}
