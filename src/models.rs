use crate::table::Cell;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============ Input Models ============

/// One customer row after schema mapping.
///
/// Numeric fields are `None` when the value is missing, unparseable, or the
/// column is absent from the input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRecord {
    /// Opaque customer identifier, passed through untouched.
    pub customer_id: Cell,
    /// Credit limit (informational only).
    pub credit_limit: Option<f64>,
    /// Credit utilisation, expected on a 0-100 scale.
    pub utilisation_pct: Option<f64>,
    /// Average payment ratio on a 0-1 or 0-100 scale.
    pub avg_payment_ratio: Option<f64>,
    /// How often only the minimum due was paid.
    pub min_due_paid_frequency: Option<f64>,
    /// Merchant diversity on a 0-1 or 0-100 scale.
    pub merchant_mix_index: Option<f64>,
    /// Share of spend withdrawn as cash.
    pub cash_withdrawal_pct: Option<f64>,
    /// Recent change in spend, in percent.
    pub recent_spend_change_pct: Option<f64>,
    /// Days-past-due bucket observed next month.
    pub dpd_bucket_next_month: Option<f64>,
    /// Days-past-due bucket this month.
    pub current_dpd_bucket: Option<f64>,
}

impl Default for InputRecord {
    fn default() -> Self {
        Self {
            customer_id: Cell::Null,
            credit_limit: None,
            utilisation_pct: None,
            avg_payment_ratio: None,
            min_due_paid_frequency: None,
            merchant_mix_index: None,
            cash_withdrawal_pct: None,
            recent_spend_change_pct: None,
            dpd_bucket_next_month: None,
            current_dpd_bucket: None,
        }
    }
}

// ============ Flags ============

/// The five early-risk rules, in canonical evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskFlag {
    UtilSpike,
    MinDueStreak,
    LowPayRatio,
    CashAdvance,
    MerchantShift,
}

impl RiskFlag {
    pub const ALL: [RiskFlag; 5] = [
        RiskFlag::UtilSpike,
        RiskFlag::MinDueStreak,
        RiskFlag::LowPayRatio,
        RiskFlag::CashAdvance,
        RiskFlag::MerchantShift,
    ];

    /// Output column name.
    pub fn column(self) -> &'static str {
        match self {
            RiskFlag::UtilSpike => "flag_util_spike",
            RiskFlag::MinDueStreak => "flag_min_due_streak",
            RiskFlag::LowPayRatio => "flag_low_pay_ratio",
            RiskFlag::CashAdvance => "flag_cash_advance",
            RiskFlag::MerchantShift => "flag_merchant_shift",
        }
    }

    /// Dashboard label used in the reasons string.
    pub fn label(self) -> &'static str {
        match self {
            RiskFlag::UtilSpike => "Util Spike",
            RiskFlag::MinDueStreak => "Min Due Streak",
            RiskFlag::LowPayRatio => "Low Payment Ratio",
            RiskFlag::CashAdvance => "Cash Advance",
            RiskFlag::MerchantShift => "Merchant Mix Shift",
        }
    }
}

/// Outcome of the five rules for one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlagSet {
    pub util_spike: bool,
    pub min_due_streak: bool,
    pub low_pay_ratio: bool,
    pub cash_advance: bool,
    pub merchant_shift: bool,
}

impl FlagSet {
    pub fn get(&self, flag: RiskFlag) -> bool {
        match flag {
            RiskFlag::UtilSpike => self.util_spike,
            RiskFlag::MinDueStreak => self.min_due_streak,
            RiskFlag::LowPayRatio => self.low_pay_ratio,
            RiskFlag::CashAdvance => self.cash_advance,
            RiskFlag::MerchantShift => self.merchant_shift,
        }
    }

    /// Raised flags in canonical order.
    pub fn raised(&self) -> impl Iterator<Item = RiskFlag> + '_ {
        RiskFlag::ALL.into_iter().filter(|f| self.get(*f))
    }

    pub fn count(&self) -> u8 {
        self.raised().count() as u8
    }
}

// ============ Tiers ============

/// Dashboard tier derived from the risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [RiskTier::Low, RiskTier::Medium, RiskTier::High];

    /// Buckets `(-1, 0]`, `(0, 1]`, `(1, 999]`.
    pub fn from_score(score: u8) -> Self {
        match score {
            0 => RiskTier::Low,
            1 => RiskTier::Medium,
            _ => RiskTier::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Output Models ============

/// An input record plus everything the engine derives from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub input: InputRecord,
    pub flags: FlagSet,
    /// Merchant mix on a 0-1 scale; `None` when the source value is missing.
    pub merchant_mix_norm: Option<f64>,
    /// Payment ratio on a 0-1 scale with the missing-value fill applied.
    pub avg_payment_ratio_norm: f64,
    pub risk_score: u8,
    pub risk_tier: RiskTier,
    /// Training label; `None` when the input carries no DPD columns.
    pub target_positive: Option<bool>,
}

impl ScoredRecord {
    pub fn new(
        input: InputRecord,
        flags: FlagSet,
        merchant_mix_norm: Option<f64>,
        avg_payment_ratio_norm: f64,
        target_positive: Option<bool>,
    ) -> Self {
        let risk_score = flags.count();
        Self {
            input,
            flags,
            merchant_mix_norm,
            avg_payment_ratio_norm,
            risk_score,
            risk_tier: RiskTier::from_score(risk_score),
            target_positive,
        }
    }

    /// Labels of the raised flags, in canonical order.
    pub fn reasons(&self) -> Vec<&'static str> {
        self.flags.raised().map(RiskFlag::label).collect()
    }

    /// Reasons joined with ", ", or "None" when nothing fired.
    pub fn reasons_text(&self) -> String {
        let reasons = self.reasons();
        if reasons.is_empty() {
            "None".to_string()
        } else {
            reasons.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_buckets() {
        assert_eq!(RiskTier::from_score(0), RiskTier::Low);
        assert_eq!(RiskTier::from_score(1), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(2), RiskTier::High);
        assert_eq!(RiskTier::from_score(5), RiskTier::High);
    }

    #[test]
    fn test_reasons_follow_declaration_order() {
        let flags = FlagSet {
            merchant_shift: true,
            util_spike: true,
            cash_advance: true,
            ..Default::default()
        };
        let record = ScoredRecord::new(InputRecord::default(), flags, None, 1.0, None);

        assert_eq!(record.risk_score, 3);
        assert_eq!(record.risk_tier, RiskTier::High);
        assert_eq!(
            record.reasons_text(),
            "Util Spike, Cash Advance, Merchant Mix Shift"
        );
    }

    #[test]
    fn test_empty_reasons_render_none() {
        let record =
            ScoredRecord::new(InputRecord::default(), FlagSet::default(), None, 1.0, None);
        assert_eq!(record.risk_score, 0);
        assert_eq!(record.reasons_text(), "None");
    }
}
