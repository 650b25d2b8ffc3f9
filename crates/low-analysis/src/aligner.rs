use analysis_core::{AnalysisWindow, OhlcRecord, ScanError, SymbolSeries};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// Where an aligned cell's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// Reported by the source for this date
    Observed,
    /// Carried forward from the most recent earlier observation
    Forward,
    /// Carried back from the first observation (leading gap)
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedCell {
    pub record: OhlcRecord,
    pub fill: Fill,
}

/// Calendar-complete price grid: one row per day of the window, one column per symbol.
#[derive(Debug, Clone)]
pub struct AlignedTable {
    window: AnalysisWindow,
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<Option<AlignedCell>>>,
}

impl AlignedTable {
    pub fn window(&self) -> AnalysisWindow {
        self.window
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn symbol_count(&self) -> usize {
        self.columns.len()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, code: &str) -> Option<&[Option<AlignedCell>]> {
        self.columns.get(code).map(Vec::as_slice)
    }

    pub fn cell(&self, code: &str, date: NaiveDate) -> Option<&AlignedCell> {
        let row = self.dates.binary_search(&date).ok()?;
        self.columns.get(code)?.get(row)?.as_ref()
    }

    /// Filled rows of one symbol as (calendar date, record), unfilled rows dropped
    pub fn filled_rows(&self, code: &str) -> Vec<(NaiveDate, OhlcRecord)> {
        match self.columns.get(code) {
            Some(column) => self
                .dates
                .iter()
                .zip(column)
                .filter_map(|(date, cell)| cell.map(|c| (*date, c.record)))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Pivots per-symbol series onto the window's calendar and fills the gaps.
pub struct SeriesAligner;

impl SeriesAligner {
    /// Reindex every series to each calendar day of `window`, forward-fill,
    /// then back-fill leading gaps.
    ///
    /// Observations outside the window are ignored. Fails when no symbol has
    /// any observation at all.
    pub fn align(
        series: &HashMap<String, SymbolSeries>,
        window: AnalysisWindow,
    ) -> Result<AlignedTable, ScanError> {
        if series.values().all(|s| s.is_empty()) {
            return Err(ScanError::EmptyUpstream(
                "no symbol produced a price series to align".to_string(),
            ));
        }

        let dates = window.calendar();
        if dates.is_empty() {
            return Err(ScanError::InsufficientData(format!(
                "analysis window {} .. {} contains no days",
                window.start, window.end
            )));
        }

        let mut columns = BTreeMap::new();
        for (code, symbol_series) in series {
            let column = align_column(symbol_series, &dates);
            let observed = column
                .iter()
                .filter(|c| matches!(c, Some(AlignedCell { fill: Fill::Observed, .. })))
                .count();
            if observed == 0 {
                tracing::warn!(symbol = %code, "No observations inside {} .. {}", window.start, window.end);
            } else {
                tracing::debug!(symbol = %code, observed, days = dates.len(), "Aligned series");
            }
            columns.insert(code.clone(), column);
        }

        Ok(AlignedTable {
            window,
            dates,
            columns,
        })
    }
}

fn align_column(series: &SymbolSeries, dates: &[NaiveDate]) -> Vec<Option<AlignedCell>> {
    let mut column: Vec<Option<AlignedCell>> = dates
        .iter()
        .map(|date| {
            series.get(date).map(|record| AlignedCell {
                record: *record,
                fill: Fill::Observed,
            })
        })
        .collect();

    let mut last: Option<OhlcRecord> = None;
    for cell in column.iter_mut() {
        match *cell {
            Some(c) => last = Some(c.record),
            None => {
                *cell = last.map(|record| AlignedCell {
                    record,
                    fill: Fill::Forward,
                })
            }
        }
    }

    // After the forward pass only a leading run can still be empty
    if let Some(first) = column.iter().flatten().next().map(|c| c.record) {
        for cell in column.iter_mut().take_while(|c| c.is_none()) {
            *cell = Some(AlignedCell {
                record: first,
                fill: Fill::Backward,
            });
        }
    }

    column
}
