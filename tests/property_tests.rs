/// Property-based tests using proptest
/// Tests invariants that should hold for any batch of records
use early_risk::config::{EngineConfig, MissingPaymentRatio};
use early_risk::engine::{normalize_ratio_column, FlagEngine};
use early_risk::export::write_augmented_csv;
use early_risk::ingest::read_csv;
use early_risk::models::{FlagSet, RiskTier};
use early_risk::table::{Cell, Table};
use proptest::prelude::*;

const HEADERS: [&str; 9] = [
    "Customer ID",
    "Utilisation %",
    "Avg Payment Ratio",
    "Min Due Paid Frequency",
    "Merchant Mix Index",
    "Cash Withdrawal %",
    "Recent Spend Change %",
    "DPD Bucket Next Month",
    "Current DPD Bucket",
];

fn numeric_cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        Just(Cell::Null),
        (-50.0f64..250.0).prop_map(Cell::Number),
        (0u32..6).prop_map(|n| Cell::Text(n.to_string())),
        (-50.0f64..250.0).prop_map(|n| Cell::Text(format!("{:.2}", n))),
        "[a-z]{1,4}".prop_map(Cell::Text),
    ]
}

/// Random tables; about half of them carry no DPD columns at all.
fn table_strategy() -> impl Strategy<Value = Table> {
    (
        any::<bool>(),
        prop::collection::vec(prop::collection::vec(numeric_cell(), 8), 0..25),
    )
        .prop_map(|(with_dpd, rows)| {
            let width = if with_dpd { HEADERS.len() } else { HEADERS.len() - 2 };
            let mut table = Table::new(HEADERS[..width].iter().map(|h| h.to_string()).collect());
            for (i, cells) in rows.into_iter().enumerate() {
                let mut row = vec![Cell::Text(format!("{:05}", i))];
                row.extend(cells.into_iter().take(width - 1));
                table.push_row(row);
            }
            table
        })
}

fn fill_strategy() -> impl Strategy<Value = MissingPaymentRatio> {
    prop_oneof![
        Just(MissingPaymentRatio::AssumePaid),
        Just(MissingPaymentRatio::AssumeUnpaid),
    ]
}

fn engine(fill: MissingPaymentRatio) -> FlagEngine {
    FlagEngine::new(EngineConfig {
        payment_ratio_fill: fill,
        ..Default::default()
    })
}

fn flags_of(flags: &FlagSet) -> [bool; 5] {
    [
        flags.util_spike,
        flags.min_due_streak,
        flags.low_pay_ratio,
        flags.cash_advance,
        flags.merchant_shift,
    ]
}

// Property: score, tier and reasons agree with the flags
proptest! {
    #[test]
    fn score_counts_true_flags(table in table_strategy(), fill in fill_strategy()) {
        let batch = engine(fill).compute_flags(table);
        for record in &batch.records {
            let count = flags_of(&record.flags).iter().filter(|f| **f).count() as u8;
            prop_assert_eq!(record.risk_score, count);
            prop_assert_eq!(record.reasons().len(), count as usize);
        }
    }

    #[test]
    fn tier_follows_score(table in table_strategy()) {
        let batch = engine(MissingPaymentRatio::AssumePaid).compute_flags(table);
        for record in &batch.records {
            let expected = match record.risk_score {
                0 => RiskTier::Low,
                1 => RiskTier::Medium,
                _ => RiskTier::High,
            };
            prop_assert_eq!(record.risk_tier, expected);
        }
    }

    #[test]
    fn normalized_ratios_stay_in_unit_range(table in table_strategy(), fill in fill_strategy()) {
        let batch = engine(fill).compute_flags(table);
        for record in &batch.records {
            prop_assert!((0.0..=1.0).contains(&record.avg_payment_ratio_norm));
            if let Some(m) = record.merchant_mix_norm {
                prop_assert!((0.0..=1.0).contains(&m));
            }
        }
    }

    #[test]
    fn one_row_per_input_row(table in table_strategy()) {
        let rows = table.len();
        let batch = engine(MissingPaymentRatio::AssumePaid).compute_flags(table);
        prop_assert_eq!(batch.len(), rows);
    }
}

// Property: normalization never leaves [0, 1] and keeps missing values missing
proptest! {
    #[test]
    fn normalize_column_bounds(values in prop::collection::vec(prop::option::of(-500.0f64..500.0), 0..50)) {
        let normalized = normalize_ratio_column(&values, 1.5);
        prop_assert_eq!(normalized.len(), values.len());
        for (before, after) in values.iter().zip(&normalized) {
            prop_assert_eq!(before.is_none(), after.is_none());
            if let Some(v) = after {
                prop_assert!((0.0..=1.0).contains(v));
            }
        }
    }
}

// Property: re-scoring the engine's own CSV output yields the same flags
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn rescoring_output_is_idempotent(table in table_strategy(), fill in fill_strategy()) {
        let first = engine(fill).compute_flags(table);

        let mut out = Vec::new();
        write_augmented_csv(&first, &mut out).unwrap();
        let reread = read_csv(&out).unwrap();
        let second = engine(fill).compute_flags(reread);

        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.records.iter().zip(&second.records) {
            prop_assert_eq!(&a.input.customer_id, &b.input.customer_id);
            prop_assert_eq!(a.flags, b.flags);
            prop_assert_eq!(a.risk_score, b.risk_score);
            prop_assert_eq!(a.target_positive, b.target_positive);
        }
    }
}
