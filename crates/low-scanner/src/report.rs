use analysis_core::{AnalysisRow, SymbolMetadata};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// An analysis row with the symbol's share structure, when known
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(flatten)]
    pub analysis: AnalysisRow,
    pub outstanding_shares: Option<u64>,
    pub floating_ratio: Option<f64>,
    pub gap_label: String,
}

impl ReportRow {
    pub fn new(analysis: AnalysisRow, metadata: Option<SymbolMetadata>) -> Self {
        Self {
            gap_label: analysis.gap_label(),
            outstanding_shares: metadata.map(|m| m.outstanding_shares),
            floating_ratio: metadata.map(|m| m.floating_ratio),
            analysis,
        }
    }
}

pub fn render(rows: &[ReportRow], format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(rows)),
        OutputFormat::Json => serde_json::to_string_pretty(rows),
    }
}

pub fn render_table(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4}  {:<20} {:<8} {:<10} {:>12} {:>12} {:>12} {:>8} {:>16} {:>7}",
        "Rank", "Name", "Code", "Low date", "52W low", "Prior close", "Last close", "Gap %", "Shares", "Float"
    );
    let _ = writeln!(out, "{}", "-".repeat(120));

    for row in rows {
        let a = &row.analysis;
        let shares = row.outstanding_shares.map(group_thousands).unwrap_or_else(|| "-".to_string());
        let float = row
            .floating_ratio
            .map(|r| format!("{:.2}%", r))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:>4}  {} {:<8} {:<10} {:>12.0} {:>12.0} {:>12.0} {:>8} {:>16} {:>7}",
            a.rank_label(),
            pad_display(&a.name, 20),
            a.code,
            a.min_52_date.format("%Y-%m-%d"),
            a.min_52_price,
            a.prior_close,
            a.last_close,
            row.gap_label,
            shares,
            float
        );
    }
    out
}

/// `1234567` -> `1,234,567`
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Left-align to `width` terminal columns; Hangul takes two columns.
fn pad_display(text: &str, width: usize) -> String {
    let columns: usize = text.chars().map(|c| if is_wide(c) { 2 } else { 1 }).sum();
    format!("{}{}", text, " ".repeat(width.saturating_sub(columns)))
}

fn is_wide(c: char) -> bool {
    matches!(c, '\u{1100}'..='\u{115F}' | '\u{3130}'..='\u{318F}' | '\u{AC00}'..='\u{D7A3}' | '\u{4E00}'..='\u{9FFF}')
}
