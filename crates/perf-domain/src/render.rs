//! Stable text encoding of metric tables for storage and display.
//!
//! One `key|value` line per metric. Vocabulary keys come first in vocabulary
//! order, then any uncatalogued keys in the order the engine produced them.

use indexmap::IndexMap;

use crate::metrics::{self, percentile};
use crate::outcome::{MetricValue, PercentileTable, SummaryTable};

/// Strings are written bare; everything else uses its JSON form.
pub fn format_value(value: &MetricValue) -> String {
    match value {
        MetricValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Encode `table` as `key|value` lines, `ordered_keys` first.
pub fn to_text<V>(
    table: &IndexMap<String, V>,
    ordered_keys: &[&str],
    render: impl Fn(&V) -> String,
) -> String {
    let mut out = String::new();
    for key in ordered_keys {
        if let Some(value) = table.get(*key) {
            push_line(&mut out, key, &render(value));
        }
    }
    for (key, value) in table {
        if !ordered_keys.contains(&key.as_str()) {
            push_line(&mut out, key, &render(value));
        }
    }
    out
}

fn push_line(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push('|');
    out.push_str(value);
    out.push('\n');
}

pub fn summary_to_text(summary: &SummaryTable) -> String {
    to_text(summary, &metrics::summary_order(), format_value)
}

/// Columns are comma-joined in their original row order, never re-sorted.
pub fn percentiles_to_text(percentiles: &PercentileTable) -> String {
    to_text(percentiles, &metrics::percentile_order(), |column| {
        column
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(",")
    })
}

/// Human-readable transcript of a run, kept verbatim for auditing.
pub fn raw_transcript(summary: &SummaryTable, percentiles: &PercentileTable) -> String {
    let mut out = String::from("Benchmarking summary:\n");
    for (key, value) in summary {
        out.push_str(&format!("{key}: {}\n", format_value(value)));
    }
    out.push_str("\nPercentile results:\n");

    let rows = percentiles
        .get(percentile::PERCENTILES)
        .map(Vec::len)
        .unwrap_or_else(|| percentiles.values().map(Vec::len).max().unwrap_or(0));
    for i in 0..rows {
        let cells: Vec<String> = percentiles
            .iter()
            .filter_map(|(key, column)| {
                column
                    .get(i)
                    .map(|value| format!("{key}: {}", format_value(value)))
            })
            .collect();
        out.push_str(&cells.join(", "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::summary;
    use serde_json::json;

    fn summary_table(entries: &[(&str, MetricValue)]) -> SummaryTable {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn vocabulary_keys_first_then_tail_in_input_order() {
        // B is uncatalogued and sits between A and C in the input.
        let table = summary_table(&[
            (summary::FAILED_REQUESTS, json!(0)),
            ("Custom B", json!("x")),
            ("Custom A", json!("y")),
            (summary::TIME_TAKEN_FOR_TESTS, json!(12.3)),
        ]);
        let text = summary_to_text(&table);
        assert_eq!(
            text,
            "Time taken for tests (s)|12.3\nFailed requests|0\nCustom B|x\nCustom A|y\n"
        );
    }

    #[test]
    fn ordering_is_independent_of_input_order() {
        let forward = summary_table(&[
            (summary::TOTAL_REQUESTS, json!(20)),
            ("Extra", json!(1)),
            (summary::AVERAGE_LATENCY, json!(0.5)),
        ]);
        let reversed = summary_table(&[
            (summary::AVERAGE_LATENCY, json!(0.5)),
            ("Extra", json!(1)),
            (summary::TOTAL_REQUESTS, json!(20)),
        ]);
        assert_eq!(summary_to_text(&forward), summary_to_text(&reversed));
        let text = summary_to_text(&forward);
        let total = text.find(summary::TOTAL_REQUESTS).unwrap();
        let latency = text.find(summary::AVERAGE_LATENCY).unwrap();
        let extra = text.find("Extra").unwrap();
        assert!(total < latency && latency < extra);
    }

    #[test]
    fn percentile_columns_keep_shared_index() {
        let mut table = PercentileTable::new();
        table.insert("ttft".to_string(), vec![json!(1), json!(2), json!(3)]);
        table.insert("latency".to_string(), vec![json!(10), json!(20), json!(30)]);
        let text = percentiles_to_text(&table);
        assert_eq!(text, "ttft|1,2,3\nlatency|10,20,30\n");
    }

    #[test]
    fn percentiles_label_column_leads() {
        let mut table = PercentileTable::new();
        table.insert("TTFT".to_string(), vec![json!("0.1"), json!("0.4")]);
        table.insert(
            percentile::PERCENTILES.to_string(),
            vec![json!("p50"), json!("p90")],
        );
        let text = percentiles_to_text(&table);
        assert_eq!(text, "Percentiles|p50,p90\nTTFT|0.1,0.4\n");
    }

    #[test]
    fn empty_tables_render_empty() {
        assert_eq!(summary_to_text(&SummaryTable::new()), "");
        assert_eq!(percentiles_to_text(&PercentileTable::new()), "");
    }

    #[test]
    fn transcript_rows_follow_percentile_index() {
        let summary = summary_table(&[("Total requests", json!("20"))]);
        let mut pct = PercentileTable::new();
        pct.insert(
            percentile::PERCENTILES.to_string(),
            vec![json!("p50"), json!("p90")],
        );
        pct.insert("TTFT".to_string(), vec![json!("0.1"), json!("0.4")]);
        let transcript = raw_transcript(&summary, &pct);
        assert_eq!(
            transcript,
            "Benchmarking summary:\nTotal requests: 20\n\nPercentile results:\n\
             Percentiles: p50, TTFT: 0.1\nPercentiles: p90, TTFT: 0.4\n"
        );
    }

    #[test]
    fn format_value_strips_string_quotes_only() {
        assert_eq!(format_value(&json!("12.3s")), "12.3s");
        assert_eq!(format_value(&json!(7)), "7");
        assert_eq!(format_value(&json!(0.25)), "0.25");
        assert_eq!(format_value(&json!(null)), "null");
    }
}
