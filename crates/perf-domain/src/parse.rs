//! Best-effort parser for the engine's pipe-table console output.
//!
//! Fallback path for ingesting a log instead of the structured return value.
//! Never fails: a missing section yields an `{"error": ...}` placeholder.

use crate::metrics::percentile;
use crate::outcome::{MetricValue, PercentileTable, SummaryTable};

pub const SUMMARY_MARKER: &str = "Benchmarking summary:";
pub const PERCENTILE_MARKER: &str = "Percentile results:";
/// Key of the placeholder entry left when a section cannot be parsed.
pub const ERROR_KEY: &str = "error";

const SUMMARY_PARSE_ERROR: &str = "Could not parse summary section";
const PERCENTILE_PARSE_ERROR: &str = "Could not parse percentile section";

/// Both tables reconstructed from console text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    pub summary: SummaryTable,
    pub percentiles: PercentileTable,
}

impl ParsedOutput {
    pub fn summary_error(&self) -> Option<&str> {
        self.summary.get(ERROR_KEY).and_then(MetricValue::as_str)
    }

    pub fn percentile_error(&self) -> Option<&str> {
        self.percentiles
            .get(ERROR_KEY)
            .and_then(|column| column.first())
            .and_then(MetricValue::as_str)
    }

    /// True when neither section fell back to a placeholder.
    pub fn is_complete(&self) -> bool {
        self.summary_error().is_none() && self.percentile_error().is_none()
    }
}

pub fn parse_benchmark_output(output: &str) -> ParsedOutput {
    let summary = parse_summary(output).unwrap_or_else(|| {
        let mut placeholder = SummaryTable::new();
        placeholder.insert(ERROR_KEY.to_string(), SUMMARY_PARSE_ERROR.into());
        placeholder
    });
    let percentiles = parse_percentiles(output).unwrap_or_else(|| {
        let mut placeholder = PercentileTable::new();
        placeholder.insert(ERROR_KEY.to_string(), vec![PERCENTILE_PARSE_ERROR.into()]);
        placeholder
    });
    ParsedOutput {
        summary,
        percentiles,
    }
}

/// Rows of `| key | value |` between the two section markers.
fn parse_summary(output: &str) -> Option<SummaryTable> {
    let start = output.find(SUMMARY_MARKER)?;
    let rest = &output[start..];
    let end = rest.find(PERCENTILE_MARKER)?;

    let mut table = SummaryTable::new();
    for line in rest[..end].lines() {
        let line = line.trim();
        if !line.contains('|') || is_table_noise(line) || line.contains("Key") {
            continue;
        }
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 3 {
            continue;
        }
        let key = parts[1].trim();
        let value = parts[2].trim();
        if !key.is_empty() && !value.is_empty() {
            table.insert(key.to_string(), MetricValue::String(value.to_string()));
        }
    }
    Some(table)
}

/// Header row naming `Percentiles` and `TTFT`, then data rows until the table ends.
fn parse_percentiles(output: &str) -> Option<PercentileTable> {
    let start = output.find(PERCENTILE_MARKER)?;

    let mut headers: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for line in output[start..].lines() {
        let line = line.trim();
        if headers.is_none() {
            if line.contains(percentile::PERCENTILES) && line.contains("TTFT") {
                headers = Some(cells(line));
            }
            continue;
        }
        if line.starts_with('+') {
            // grid border between rows
            continue;
        }
        if line.starts_with('|') {
            if !is_table_noise(line) && line.split('|').count() > 3 {
                rows.push(cells(line));
            }
        } else if !rows.is_empty() {
            break;
        }
    }

    let mut table = PercentileTable::new();
    let Some(headers) = headers else {
        return Some(table);
    };
    for header in &headers {
        table.entry(header.clone()).or_default();
    }
    for row in rows.into_iter().filter(|r| r.len() == headers.len()) {
        for (header, value) in headers.iter().zip(row) {
            if let Some(column) = table.get_mut(header) {
                column.push(MetricValue::String(value));
            }
        }
    }
    Some(table)
}

fn is_table_noise(line: &str) -> bool {
    line.contains("---") || line.contains("===")
}

fn cells(line: &str) -> Vec<String> {
    line.split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}
