/// Flag engine behaviour on whole tables
/// Tests rule outcomes, scale handling, missing columns and payment ratio policy
use early_risk::config::{EngineConfig, MissingPaymentRatio};
use early_risk::engine::{compute_flags, FlagEngine, ScoredBatch};
use early_risk::export::write_augmented_csv;
use early_risk::ingest::read_csv;
use early_risk::models::{RiskFlag, RiskTier};

fn score(csv: &str) -> ScoredBatch {
    compute_flags(read_csv(csv.as_bytes()).unwrap(), &EngineConfig::default())
}

#[cfg(test)]
mod rule_tests {
    use super::*;

    #[test]
    fn test_util_spike_only() {
        let batch = score("Customer ID,Utilisation %,Recent Spend Change %\nC1,85,25\n");
        let record = &batch.records[0];

        assert!(record.flags.util_spike);
        assert!(!record.flags.min_due_streak);
        assert!(!record.flags.low_pay_ratio);
        assert!(!record.flags.cash_advance);
        assert!(!record.flags.merchant_shift);
        assert_eq!(record.risk_score, 1);
        assert_eq!(record.risk_tier, RiskTier::Medium);
        assert_eq!(record.reasons_text(), "Util Spike");
    }

    #[test]
    fn test_clean_customer() {
        let batch = score(
            "Customer ID,Utilisation %,Cash Withdrawal %,Min Due Paid Frequency,Avg Payment Ratio,Merchant Mix Index\n\
             C2,0,0,0,0.9,0.9\n",
        );
        let record = &batch.records[0];

        assert_eq!(record.risk_score, 0);
        assert_eq!(record.risk_tier, RiskTier::Low);
        assert_eq!(record.reasons_text(), "None");
    }

    #[test]
    fn test_merchant_mix_percent_scale() {
        let batch = score("Merchant Mix Index\n90\n20\n");

        assert_eq!(batch.records[0].merchant_mix_norm, Some(0.9));
        assert!(!batch.records[0].flags.merchant_shift);
        assert_eq!(batch.records[1].merchant_mix_norm, Some(0.2));
        assert!(batch.records[1].flags.merchant_shift);
    }

    #[test]
    fn test_payment_ratio_percent_scale() {
        let batch = score("Avg Payment Ratio\n30\n95\n");

        assert_eq!(batch.records[0].avg_payment_ratio_norm, 0.3);
        assert!(batch.records[0].flags.low_pay_ratio);
        assert!(!batch.records[1].flags.low_pay_ratio);
    }

    #[test]
    fn test_everything_fires() {
        let batch = score(
            "Utilisation %,Recent Spend Change %,Min Due Paid Frequency,Avg Payment Ratio,Cash Withdrawal %,Merchant Mix Index\n\
             95,40,3,0.1,12,0.2\n",
        );
        let record = &batch.records[0];

        assert_eq!(record.risk_score, 5);
        assert_eq!(record.risk_tier, RiskTier::High);
        let expected: Vec<&str> = RiskFlag::ALL.iter().map(|f| f.label()).collect();
        assert_eq!(record.reasons(), expected);
        assert_eq!(
            record.reasons_text(),
            "Util Spike, Min Due Streak, Low Payment Ratio, Cash Advance, Merchant Mix Shift"
        );
    }

    #[test]
    fn test_aliased_headers_are_scored() {
        let batch = score("CustomerID,UtilisationPct,RecentSpendChangePct\nC9,88,30\n");
        assert!(batch.records[0].flags.util_spike);
    }
}

#[cfg(test)]
mod missing_data_tests {
    use super::*;

    #[test]
    fn test_absent_utilisation_column() {
        let batch = score("Customer ID,Recent Spend Change %,Cash Withdrawal %\nC1,50,10\n");
        let record = &batch.records[0];

        assert!(!record.flags.util_spike);
        assert!(!record.flags.cash_advance);
        assert_eq!(record.input.utilisation_pct, None);
    }

    #[test]
    fn test_garbage_numbers_degrade_to_zero() {
        let batch = score("Utilisation %,Recent Spend Change %,Min Due Paid Frequency\nhigh,n/a,??\n");
        let record = &batch.records[0];

        assert_eq!(record.risk_score, 0);
        assert_eq!(record.input.utilisation_pct, None);
    }

    #[test]
    fn test_missing_merchant_mix_is_not_a_shift() {
        let batch = score("Customer ID,Merchant Mix Index\nC1,\nC2,0.1\n");

        assert_eq!(batch.records[0].merchant_mix_norm, None);
        assert!(!batch.records[0].flags.merchant_shift);
        assert!(batch.records[1].flags.merchant_shift);
    }

    #[test]
    fn test_entirely_missing_merchant_column_passes_through() {
        let batch = score("Customer ID,Merchant Mix Index\nC1,\nC2,\n");
        assert!(batch.records.iter().all(|r| r.merchant_mix_norm.is_none()));
    }

    #[test]
    fn test_payment_ratio_fill_policy() {
        let csv = "Customer ID,Avg Payment Ratio\nC1,\nC2,0.8\n";

        let paid = score(csv);
        assert_eq!(paid.records[0].avg_payment_ratio_norm, 1.0);
        assert!(!paid.records[0].flags.low_pay_ratio);

        let unpaid_engine = FlagEngine::new(EngineConfig {
            payment_ratio_fill: MissingPaymentRatio::AssumeUnpaid,
            ..Default::default()
        });
        let unpaid = unpaid_engine.compute_flags(read_csv(csv.as_bytes()).unwrap());
        assert_eq!(unpaid.records[0].avg_payment_ratio_norm, 0.0);
        assert!(unpaid.records[0].flags.low_pay_ratio);
        // Present values are unaffected by the policy
        assert!(!unpaid.records[1].flags.low_pay_ratio);
    }

    #[test]
    fn test_empty_table() {
        let batch = score("Customer ID,Utilisation %\n");
        assert!(batch.is_empty());
    }
}

#[cfg(test)]
mod target_tests {
    use super::*;

    #[test]
    fn test_roll_forward_label() {
        let batch = score(
            "Customer ID,DPD Bucket Next Month,Current DPD Bucket\nC1,2,1\nC2,1,1\nC3,,0\n",
        );
        let targets: Vec<Option<bool>> = batch.records.iter().map(|r| r.target_positive).collect();
        assert_eq!(targets, vec![Some(true), Some(false), Some(false)]);
    }

    #[test]
    fn test_next_month_only_label() {
        let batch = score("Customer ID,DPD Bucket Next Month\nC1,0\nC2,1\n");
        let targets: Vec<Option<bool>> = batch.records.iter().map(|r| r.target_positive).collect();
        assert_eq!(targets, vec![Some(false), Some(true)]);
    }

    #[test]
    fn test_no_dpd_columns_no_label() {
        let batch = score("Customer ID\nC1\n");
        assert_eq!(batch.records[0].target_positive, None);
    }

    #[test]
    fn test_empty_dpd_columns_no_label() {
        let batch = score("Customer ID,DPD Bucket Next Month,Current DPD Bucket\nC1,,\nC2,,\n");
        assert_eq!(batch.records[0].target_positive, None);
        assert_eq!(batch.records[1].target_positive, None);
    }

    #[test]
    fn test_rescored_output_keeps_missing_label() {
        let first = score("Customer ID\nC1\n");
        let mut out = Vec::new();
        write_augmented_csv(&first, &mut out).unwrap();

        let second = compute_flags(read_csv(&out).unwrap(), &EngineConfig::default());
        assert_eq!(first.records[0].target_positive, None);
        assert_eq!(second.records[0].target_positive, None);
    }

    #[test]
    fn test_label_does_not_affect_score() {
        let batch = score("DPD Bucket Next Month\n3\n");
        assert_eq!(batch.records[0].risk_score, 0);
    }
}
