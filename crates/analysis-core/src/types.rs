use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Listing partition of the market-cap ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Kospi,
    Kosdaq,
}

impl Market {
    /// Partition code expected by the ranking listing (`sosok` parameter)
    pub fn listing_code(&self) -> &'static str {
        match self {
            Market::Kospi => "0",
            Market::Kosdaq => "1",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Market::Kospi => "KOSPI",
            Market::Kosdaq => "KOSDAQ",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KOSPI" => Ok(Market::Kospi),
            "KOSDAQ" => Ok(Market::Kosdaq),
            other => Err(format!("market must be KOSPI or KOSDAQ, got '{}'", other)),
        }
    }
}

/// A listed equity as named by the ranking listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
    pub display_name: String,
    pub code: String,
}

/// Ranked symbol listing in first-seen order.
///
/// Codes and display names are both unique. The code -> rank index is built as
/// entries are inserted, so rank lookups never scan the list.
#[derive(Debug, Clone, Default)]
pub struct RankedSymbols {
    symbols: Vec<SymbolRef>,
    rank_by_code: HashMap<String, usize>,
    names: HashSet<String>,
}

impl RankedSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a symbol unless its code or display name was already seen.
    /// Returns `true` when the symbol was added.
    pub fn insert(&mut self, display_name: &str, code: &str) -> bool {
        if self.rank_by_code.contains_key(code) || self.names.contains(display_name) {
            return false;
        }
        self.symbols.push(SymbolRef {
            display_name: display_name.to_string(),
            code: code.to_string(),
        });
        self.rank_by_code.insert(code.to_string(), self.symbols.len());
        self.names.insert(display_name.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolRef> {
        self.symbols.iter()
    }

    /// Codes in ranking order
    pub fn codes(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.code.clone()).collect()
    }

    /// 1-based position of `code` in the listing
    pub fn rank_of(&self, code: &str) -> Option<usize> {
        self.rank_by_code.get(code).copied()
    }

    pub fn get(&self, code: &str) -> Option<&SymbolRef> {
        self.rank_of(code).map(|rank| &self.symbols[rank - 1])
    }

    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.get(code).map(|s| s.display_name.as_str())
    }
}

/// One daily price row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcRecord {
    pub date: NaiveDate,
    pub close: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
}

impl OhlcRecord {
    /// All four prices are finite and non-negative
    pub fn is_valid(&self) -> bool {
        [self.close, self.open, self.high, self.low]
            .iter()
            .all(|p| p.is_finite() && *p >= 0.0)
    }
}

/// Daily prices of one symbol keyed by trading date
pub type SymbolSeries = BTreeMap<NaiveDate, OhlcRecord>;

/// Share structure reported by the company overview page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolMetadata {
    pub outstanding_shares: u64,
    /// Free-float ratio in percent (0-100)
    pub floating_ratio: f64,
}

/// Inclusive calendar window `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AnalysisWindow {
    /// Default trailing lookback for a 52-week window
    pub const DEFAULT_LOOKBACK_DAYS: i64 = 366;

    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window ending at `end` and reaching `lookback_days` back
    pub fn trailing(end: NaiveDate, lookback_days: i64) -> Self {
        Self {
            start: end - Duration::days(lookback_days),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days in the window (0 when start > end)
    pub fn len_days(&self) -> usize {
        let span = (self.end - self.start).num_days();
        if span < 0 {
            0
        } else {
            span as usize + 1
        }
    }

    /// Every calendar day from start to end, inclusive
    pub fn calendar(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take(self.len_days())
            .collect()
    }
}

/// One line of the 52-week-low proximity report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub code: String,
    pub name: String,
    /// 1-based market-cap rank; `None` when the code is not in the ranking
    pub rank: Option<usize>,
    pub min_52_date: NaiveDate,
    pub min_52_price: f64,
    pub prior_close: f64,
    pub last_close: f64,
    pub gap: f64,
    pub gap_percentage: f64,
}

impl AnalysisRow {
    pub fn rank_label(&self) -> String {
        match self.rank {
            Some(rank) => rank.to_string(),
            None => "N/A".to_string(),
        }
    }

    pub fn gap_label(&self) -> String {
        format!("{:.1}%", self.gap_percentage)
    }
}
