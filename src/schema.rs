//! Boundary schema mapping.
//!
//! Input files arrive with loosely named headers ("Utilisation %",
//! "UtilisationPct", "utilization_pct", ...). This module maps them onto the
//! recognized columns once, so the engine only ever sees [`InputRecord`]s.
//! Columns that are absent map to an all-missing sentinel.

use crate::models::InputRecord;
use crate::table::{Cell, Table};
use regex::Regex;
use std::sync::OnceLock;

/// Columns the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    CustomerId,
    CreditLimit,
    UtilisationPct,
    AvgPaymentRatio,
    MinDuePaidFrequency,
    MerchantMixIndex,
    CashWithdrawalPct,
    RecentSpendChangePct,
    DpdBucketNextMonth,
    CurrentDpdBucket,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::CustomerId,
        Column::CreditLimit,
        Column::UtilisationPct,
        Column::AvgPaymentRatio,
        Column::MinDuePaidFrequency,
        Column::MerchantMixIndex,
        Column::CashWithdrawalPct,
        Column::RecentSpendChangePct,
        Column::DpdBucketNextMonth,
        Column::CurrentDpdBucket,
    ];

    /// Header written to files and JSON.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Column::CustomerId => "Customer ID",
            Column::CreditLimit => "Credit Limit",
            Column::UtilisationPct => "Utilisation %",
            Column::AvgPaymentRatio => "Avg Payment Ratio",
            Column::MinDuePaidFrequency => "Min Due Paid Frequency",
            Column::MerchantMixIndex => "Merchant Mix Index",
            Column::CashWithdrawalPct => "Cash Withdrawal %",
            Column::RecentSpendChangePct => "Recent Spend Change %",
            Column::DpdBucketNextMonth => "DPD Bucket Next Month",
            Column::CurrentDpdBucket => "Current DPD Bucket",
        }
    }

    /// Alternative spellings accepted on input.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::CustomerId => &["CustomerID", "customer_id", "Cust ID"],
            Column::CreditLimit => &["CreditLimit", "credit_limit"],
            Column::UtilisationPct => &[
                "UtilisationPct",
                "Utilisation",
                "Utilization %",
                "UtilizationPct",
                "Utilization",
            ],
            Column::AvgPaymentRatio => &["AvgPaymentRatio", "Average Payment Ratio"],
            Column::MinDuePaidFrequency => &["MinDuePaidFrequency", "min_due_paid_freq"],
            Column::MerchantMixIndex => &["MerchantMixIndex", "Merchant Mix"],
            Column::CashWithdrawalPct => &["CashWithdrawalPct", "Cash Withdrawal"],
            Column::RecentSpendChangePct => &["RecentSpendChangePct", "Recent Spend Change"],
            Column::DpdBucketNextMonth => &["DPDBucketNextMonth", "Next Month DPD Bucket"],
            Column::CurrentDpdBucket => &["CurrentDPDBucket", "DPD Bucket Current"],
        }
    }

    fn position(self) -> usize {
        Column::ALL
            .iter()
            .position(|c| *c == self)
            .unwrap_or_default()
    }

    fn matches(self, header: &str) -> bool {
        let key = header_key(header);
        header_key(self.canonical_name()) == key
            || self.aliases().iter().any(|alias| header_key(alias) == key)
    }
}

/// Headers produced by the engine itself. Stripped from a re-scored input.
pub const DERIVED_COLUMNS: [&str; 13] = [
    "MerchantMixNorm",
    "AvgPaymentRatioNorm",
    "flag_util_spike",
    "flag_min_due_streak",
    "flag_low_pay_ratio",
    "flag_cash_advance",
    "flag_merchant_shift",
    "risk_score",
    "risk_tier",
    "reasons",
    "target_positive",
    // Older exports used these names
    "MerchantMix_norm",
    "AvgPaymentRatio_norm",
];

pub fn is_derived_column(header: &str) -> bool {
    DERIVED_COLUMNS.iter().any(|d| *d == header.trim())
}

/// Lowercased alphanumerics with "pct"/"percent" folded into "%" semantics.
fn header_key(header: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

    let lowered = header.trim().to_lowercase().replace('%', "pct");
    let key = re.replace_all(&lowered, "").into_owned();
    key.strip_suffix("percent")
        .map(|s| format!("{}pct", s))
        .unwrap_or(key)
}

/// Which source column (if any) backs each recognized column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMapping {
    indices: [Option<usize>; 10],
}

impl SchemaMapping {
    /// Resolves headers against the recognized columns.
    ///
    /// An exact canonical header wins over an alias; otherwise the first
    /// matching header is used.
    pub fn resolve(headers: &[String]) -> Self {
        let mut indices = [None; 10];

        for column in Column::ALL {
            let exact = headers
                .iter()
                .position(|h| h.trim() == column.canonical_name());
            let loose = || headers.iter().position(|h| column.matches(h));
            indices[column.position()] = exact.or_else(loose);
        }

        let mapping = Self { indices };
        let missing = mapping.missing_columns();
        if !missing.is_empty() {
            tracing::debug!(
                "Columns absent from input, synthesized as missing: {:?}",
                missing
                    .iter()
                    .map(|c| c.canonical_name())
                    .collect::<Vec<_>>()
            );
        }
        mapping
    }

    pub fn index_of(&self, column: Column) -> Option<usize> {
        self.indices[column.position()]
    }

    pub fn is_present(&self, column: Column) -> bool {
        self.index_of(column).is_some()
    }

    pub fn missing_columns(&self) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|c| !self.is_present(*c))
            .collect()
    }

    fn cell<'a>(&self, table: &'a Table, row: usize, column: Column) -> Option<&'a Cell> {
        self.index_of(column).map(|idx| table.cell(row, idx))
    }

    fn number(&self, table: &Table, row: usize, column: Column) -> Option<f64> {
        self.cell(table, row, column).and_then(Cell::as_f64)
    }

    /// Builds the typed record for one row.
    pub fn record(&self, table: &Table, row: usize) -> InputRecord {
        InputRecord {
            customer_id: self
                .cell(table, row, Column::CustomerId)
                .cloned()
                .unwrap_or(Cell::Null),
            credit_limit: self.number(table, row, Column::CreditLimit),
            utilisation_pct: self.number(table, row, Column::UtilisationPct),
            avg_payment_ratio: self.number(table, row, Column::AvgPaymentRatio),
            min_due_paid_frequency: self.number(table, row, Column::MinDuePaidFrequency),
            merchant_mix_index: self.number(table, row, Column::MerchantMixIndex),
            cash_withdrawal_pct: self.number(table, row, Column::CashWithdrawalPct),
            recent_spend_change_pct: self.number(table, row, Column::RecentSpendChangePct),
            dpd_bucket_next_month: self.number(table, row, Column::DpdBucketNextMonth),
            current_dpd_bucket: self.number(table, row, Column::CurrentDpdBucket),
        }
    }

    /// Typed records for the whole table, in row order.
    pub fn records(&self, table: &Table) -> Vec<InputRecord> {
        (0..table.len()).map(|row| self.record(table, row)).collect()
    }
}
