use analysis_core::{AnalysisRow, OhlcRecord, RankedSymbols, ScanError};
use chrono::NaiveDate;

use crate::aligner::AlignedTable;

/// Minimum filled rows needed to have both a low and a prior close
const MIN_ROWS: usize = 2;

/// Treatment of zero open/high/low values reported by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroPricePolicy {
    /// Use prices exactly as reported
    #[default]
    Keep,
    /// Replace a zero open, high or low with that row's close
    SubstituteClose,
}

impl ZeroPricePolicy {
    pub fn apply(&self, record: OhlcRecord) -> OhlcRecord {
        match self {
            ZeroPricePolicy::Keep => record,
            ZeroPricePolicy::SubstituteClose => {
                let or_close = |price: f64| if price == 0.0 { record.close } else { price };
                OhlcRecord {
                    open: or_close(record.open),
                    high: or_close(record.high),
                    low: or_close(record.low),
                    ..record
                }
            }
        }
    }
}

/// `(prior_close / min_low - 1) * 100`, or 0 when the low is exactly zero
pub fn gap_percentage(prior_close: f64, min_low: f64) -> f64 {
    if min_low == 0.0 {
        0.0
    } else {
        (prior_close / min_low - 1.0) * 100.0
    }
}

/// Measures how far each symbol's prior close sits above its 52-week low.
#[derive(Debug, Clone, Default)]
pub struct LowProximityAnalyzer {
    zero_price_policy: ZeroPricePolicy,
}

impl LowProximityAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zero_price_policy(mut self, policy: ZeroPricePolicy) -> Self {
        self.zero_price_policy = policy;
        self
    }

    pub fn zero_price_policy(&self) -> ZeroPricePolicy {
        self.zero_price_policy
    }

    /// One report row from a symbol's filled rows (oldest first).
    pub fn analyze_symbol(
        &self,
        code: &str,
        rows: &[(NaiveDate, OhlcRecord)],
        ranked: &RankedSymbols,
    ) -> Result<AnalysisRow, ScanError> {
        if rows.len() < MIN_ROWS {
            return Err(ScanError::InsufficientData(format!(
                "{} has {} aligned rows, need {}",
                code,
                rows.len(),
                MIN_ROWS
            )));
        }

        // First occurrence wins on ties
        let mut min_date = rows[0].0;
        let mut min_low = self.zero_price_policy.apply(rows[0].1).low;
        for (date, record) in &rows[1..] {
            let low = self.zero_price_policy.apply(*record).low;
            if low < min_low {
                min_low = low;
                min_date = *date;
            }
        }

        let prior_close = rows[rows.len() - 2].1.close;
        let last_close = rows[rows.len() - 1].1.close;

        Ok(AnalysisRow {
            code: code.to_string(),
            name: ranked.name_of(code).unwrap_or(code).to_string(),
            rank: ranked.rank_of(code),
            min_52_date: min_date,
            min_52_price: min_low,
            prior_close,
            last_close,
            gap: prior_close - min_low,
            gap_percentage: gap_percentage(prior_close, min_low),
        })
    }

    /// Report rows sorted ascending by gap percentage, ties in rank order.
    ///
    /// Symbols with fewer than two filled rows are skipped. An empty result
    /// means nothing qualified.
    pub fn analyze(&self, table: &AlignedTable, ranked: &RankedSymbols) -> Vec<AnalysisRow> {
        let mut rows: Vec<AnalysisRow> = table
            .symbols()
            .filter_map(|code| match self.analyze_symbol(code, &table.filled_rows(code), ranked) {
                Ok(row) => Some(row),
                Err(e) => {
                    tracing::warn!(symbol = code, error = %e, "Skipping symbol");
                    None
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            a.gap_percentage
                .total_cmp(&b.gap_percentage)
                .then_with(|| a.rank.unwrap_or(usize::MAX).cmp(&b.rank.unwrap_or(usize::MAX)))
        });

        tracing::info!("Analyzed {}/{} symbols", rows.len(), table.symbol_count());
        rows
    }
}
