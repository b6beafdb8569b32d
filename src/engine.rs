/// Rule-based early-risk flag engine
///
/// One pure pass over a batch of records:
/// 1. Normalize merchant mix and payment ratio onto a 0-1 scale
/// 2. Evaluate the five flag rules per record
/// 3. Sum flags into a score and bucket it into a tier
/// 4. Derive the DPD roll-forward training label
///
/// The engine never fails: missing or malformed numbers degrade to defaults.
use crate::config::EngineConfig;
use crate::models::{FlagSet, InputRecord, ScoredRecord};
use crate::schema::SchemaMapping;
use crate::table::Table;

/// Rule thresholds. `Default` holds the production values.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagThresholds {
    /// Utilisation at or above this counts toward a spike.
    pub util_spike_pct: f64,
    /// Spend change at or above this counts toward a spike.
    pub spend_change_pct: f64,
    /// Minimum-due payments at or above this form a streak.
    pub min_due_streak: f64,
    /// Normalized payment ratio at or below this is low.
    pub low_pay_ratio: f64,
    /// Utilisation strictly above this makes a cash withdrawal an advance flag.
    pub cash_advance_util_pct: f64,
    /// Normalized merchant mix at or below this is a shift.
    pub merchant_shift: f64,
    /// A column whose maximum exceeds this is treated as 0-100 and divided by 100.
    pub percent_scale_cutoff: f64,
}

impl Default for FlagThresholds {
    fn default() -> Self {
        Self {
            util_spike_pct: 80.0,
            spend_change_pct: 20.0,
            min_due_streak: 2.0,
            low_pay_ratio: 0.4,
            cash_advance_util_pct: 70.0,
            merchant_shift: 0.35,
            percent_scale_cutoff: 1.5,
        }
    }
}

/// Brings a ratio column onto a 0-1 scale.
///
/// A column with no observed values is returned unchanged. Otherwise, if the
/// largest observed value exceeds `cutoff` every value is divided by 100,
/// then clipped to `[0, 1]`. Missing values stay missing.
pub fn normalize_ratio_column(values: &[Option<f64>], cutoff: f64) -> Vec<Option<f64>> {
    let max = values.iter().flatten().copied().reduce(f64::max);
    let Some(max) = max else {
        return values.to_vec();
    };

    let divisor = if max > cutoff { 100.0 } else { 1.0 };
    values
        .iter()
        .map(|v| v.map(|v| (v / divisor).clamp(0.0, 1.0)))
        .collect()
}

/// Evaluates the five rules against already-normalized ratios.
pub fn evaluate_flags(
    record: &InputRecord,
    merchant_mix_norm: Option<f64>,
    avg_payment_ratio_norm: f64,
    thresholds: &FlagThresholds,
) -> FlagSet {
    let utilisation = record.utilisation_pct.unwrap_or(0.0);
    let spend_change = record.recent_spend_change_pct.unwrap_or(0.0);
    let min_due = record.min_due_paid_frequency.unwrap_or(0.0);
    let cash = record.cash_withdrawal_pct.unwrap_or(0.0);

    FlagSet {
        util_spike: utilisation >= thresholds.util_spike_pct
            && spend_change >= thresholds.spend_change_pct,
        min_due_streak: min_due >= thresholds.min_due_streak,
        low_pay_ratio: avg_payment_ratio_norm <= thresholds.low_pay_ratio,
        cash_advance: cash > 0.0 && utilisation > thresholds.cash_advance_util_pct,
        // Missing merchant mix never counts as a shift
        merchant_shift: merchant_mix_norm.is_some_and(|m| m <= thresholds.merchant_shift),
    }
}

/// Roll-forward label for model training.
///
/// With a usable current bucket: next > current. Otherwise: next != 0.
/// `None` for every record when neither DPD column holds any value, so an
/// empty column synthesized by a previous export does not become a label.
pub fn derive_targets(records: &[InputRecord]) -> Vec<Option<bool>> {
    let has_next = records.iter().any(|r| r.dpd_bucket_next_month.is_some());
    let compare_current = records.iter().any(|r| r.current_dpd_bucket.is_some());
    if !has_next && !compare_current {
        return vec![None; records.len()];
    }

    records
        .iter()
        .map(|r| {
            let next = r.dpd_bucket_next_month.unwrap_or(0.0);
            if compare_current {
                Some(next > r.current_dpd_bucket.unwrap_or(0.0))
            } else {
                Some(next != 0.0)
            }
        })
        .collect()
}

/// A scored table: the untouched source plus one scored record per row.
#[derive(Debug, Clone)]
pub struct ScoredBatch {
    pub source: Table,
    pub schema: SchemaMapping,
    pub records: Vec<ScoredRecord>,
}

impl ScoredBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Shared engine used by both the batch pipeline and the upload endpoint.
#[derive(Debug, Clone, Default)]
pub struct FlagEngine {
    config: EngineConfig,
}

impl FlagEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scores typed records.
    pub fn score_records(&self, records: Vec<InputRecord>) -> Vec<ScoredRecord> {
        let thresholds = &self.config.thresholds;
        let cutoff = thresholds.percent_scale_cutoff;
        let fill = self.config.payment_ratio_fill.fill_value();

        let merchant: Vec<Option<f64>> = records.iter().map(|r| r.merchant_mix_index).collect();
        let merchant_norm = normalize_ratio_column(&merchant, cutoff);

        let payment: Vec<Option<f64>> = records.iter().map(|r| r.avg_payment_ratio).collect();
        let payment_norm = normalize_ratio_column(&payment, cutoff);

        let targets = derive_targets(&records);

        records
            .into_iter()
            .zip(merchant_norm)
            .zip(payment_norm)
            .zip(targets)
            .map(|(((record, merchant), payment), target)| {
                let payment = payment.unwrap_or(fill);
                let flags = evaluate_flags(&record, merchant, payment, thresholds);
                ScoredRecord::new(record, flags, merchant, payment, target)
            })
            .collect()
    }

    /// Maps the table's schema and scores every row.
    pub fn compute_flags(&self, table: Table) -> ScoredBatch {
        let schema = SchemaMapping::resolve(&table.columns);
        let records = schema.records(&table);
        let scored = self.score_records(records);

        let flagged = scored.iter().filter(|r| r.risk_score > 0).count();
        tracing::debug!(
            "Scored {} records ({} with at least one flag, payment fill: {})",
            scored.len(),
            flagged,
            self.config.payment_ratio_fill
        );

        ScoredBatch {
            source: table,
            schema,
            records: scored,
        }
    }
}

/// Scores a table with the given configuration.
pub fn compute_flags(table: Table, config: &EngineConfig) -> ScoredBatch {
    FlagEngine::new(config.clone()).compute_flags(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_percent_scale() {
        let values = vec![Some(90.0), Some(35.0), None, Some(120.0)];
        let normalized = normalize_ratio_column(&values, 1.5);
        assert_eq!(normalized, vec![Some(0.9), Some(0.35), None, Some(1.0)]);
    }

    #[test]
    fn test_normalize_unit_scale_clips() {
        let values = vec![Some(0.5), Some(-0.2), Some(1.4)];
        let normalized = normalize_ratio_column(&values, 1.5);
        assert_eq!(normalized, vec![Some(0.5), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_normalize_all_missing_passes_through() {
        let values = vec![None, None];
        assert_eq!(normalize_ratio_column(&values, 1.5), values);
    }

    #[test]
    fn test_boundaries_are_inclusive_where_specified() {
        let t = FlagThresholds::default();
        let record = InputRecord {
            utilisation_pct: Some(80.0),
            recent_spend_change_pct: Some(20.0),
            min_due_paid_frequency: Some(2.0),
            cash_withdrawal_pct: Some(1.0),
            ..Default::default()
        };

        let flags = evaluate_flags(&record, Some(0.35), 0.4, &t);
        assert!(flags.util_spike);
        assert!(flags.min_due_streak);
        assert!(flags.low_pay_ratio);
        assert!(flags.cash_advance);
        assert!(flags.merchant_shift);
    }

    #[test]
    fn test_cash_advance_needs_util_strictly_above_70() {
        let t = FlagThresholds::default();
        let record = InputRecord {
            utilisation_pct: Some(70.0),
            cash_withdrawal_pct: Some(5.0),
            ..Default::default()
        };

        let flags = evaluate_flags(&record, None, 1.0, &t);
        assert!(!flags.cash_advance);
    }

    #[test]
    fn test_targets_without_dpd_values() {
        let records = vec![InputRecord::default(); 2];
        assert_eq!(derive_targets(&records), vec![None, None]);
    }

    #[test]
    fn test_targets_compare_against_current_bucket() {
        let records = vec![
            InputRecord {
                dpd_bucket_next_month: Some(2.0),
                current_dpd_bucket: Some(1.0),
                ..Default::default()
            },
            InputRecord {
                dpd_bucket_next_month: Some(1.0),
                current_dpd_bucket: Some(1.0),
                ..Default::default()
            },
            InputRecord {
                dpd_bucket_next_month: Some(1.0),
                current_dpd_bucket: None,
                ..Default::default()
            },
        ];

        assert_eq!(
            derive_targets(&records),
            vec![Some(true), Some(false), Some(true)]
        );
    }

    #[test]
    fn test_targets_fall_back_when_current_is_all_missing() {
        let records = vec![
            InputRecord {
                dpd_bucket_next_month: Some(0.0),
                ..Default::default()
            },
            InputRecord {
                dpd_bucket_next_month: Some(3.0),
                ..Default::default()
            },
            InputRecord::default(),
        ];

        assert_eq!(
            derive_targets(&records),
            vec![Some(false), Some(true), Some(false)]
        );
    }
}
