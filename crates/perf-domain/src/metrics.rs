//! Metric vocabulary: the benchmark engine's column names in display order,
//! with titles and explanations for presentation code.

use crate::outcome::SummaryTable;

/// Static description of one metric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricInfo {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// How the value is computed. Absent for raw measurements.
    pub derivation: Option<&'static str>,
}

/// Summary metric keys as emitted by the engine.
pub mod summary {
    pub const TIME_TAKEN_FOR_TESTS: &str = "Time taken for tests (s)";
    pub const NUMBER_OF_CONCURRENCY: &str = "Number of concurrency";
    pub const TOTAL_REQUESTS: &str = "Total requests";
    pub const SUCCEED_REQUESTS: &str = "Succeed requests";
    pub const FAILED_REQUESTS: &str = "Failed requests";
    pub const OUTPUT_TOKEN_THROUGHPUT: &str = "Output token throughput (tok/s)";
    pub const TOTAL_TOKEN_THROUGHPUT: &str = "Total token throughput (tok/s)";
    pub const REQUEST_THROUGHPUT: &str = "Request throughput (req/s)";
    pub const AVERAGE_LATENCY: &str = "Average latency (s)";
    pub const AVERAGE_TIME_TO_FIRST_TOKEN: &str = "Average time to first token (s)";
    pub const AVERAGE_TIME_PER_OUTPUT_TOKEN: &str = "Average time per output token (s)";
    pub const AVERAGE_INPUT_TOKENS_PER_REQUEST: &str = "Average input tokens per request";
    pub const AVERAGE_OUTPUT_TOKENS_PER_REQUEST: &str = "Average output tokens per request";
    pub const AVERAGE_PACKAGE_LATENCY: &str = "Average package latency (s)";
    pub const AVERAGE_PACKAGE_PER_REQUEST: &str = "Average package per request";
}

/// Percentile column keys as emitted by the engine.
pub mod percentile {
    /// Bucket label column (`10%`, `50%`, ...). Shares the row index with every other column.
    pub const PERCENTILES: &str = "Percentiles";
    pub const TTFT: &str = "TTFT (s)";
    pub const ITL: &str = "ITL (s)";
    pub const TPOT: &str = "TPOT (s)";
    pub const LATENCY: &str = "Latency (s)";
    pub const INPUT_TOKENS: &str = "Input tokens";
    pub const OUTPUT_TOKENS: &str = "Output tokens";
    pub const OUTPUT_THROUGHPUT: &str = "Output (tok/s)";
    pub const TOTAL_THROUGHPUT: &str = "Total (tok/s)";
}

/// Engine bookkeeping fields that are not metrics.
pub const HOUSEKEEPING_KEYS: &[&str] = &["Result DB path"];

pub static SUMMARY_METRICS: &[MetricInfo] = &[
    MetricInfo {
        key: summary::TIME_TAKEN_FOR_TESTS,
        title: "Total test duration",
        description: "Wall-clock time of the whole run, first request sent to last response received",
        derivation: Some("end time of last request - start time of first request"),
    },
    MetricInfo {
        key: summary::NUMBER_OF_CONCURRENCY,
        title: "Concurrency",
        description: "Number of clients sending requests at the same time",
        derivation: Some("configured value"),
    },
    MetricInfo {
        key: summary::TOTAL_REQUESTS,
        title: "Total requests",
        description: "All requests sent during the run",
        derivation: Some("succeeded requests + failed requests"),
    },
    MetricInfo {
        key: summary::SUCCEED_REQUESTS,
        title: "Succeeded requests",
        description: "Requests that completed and returned the expected response",
        derivation: Some("counted"),
    },
    MetricInfo {
        key: summary::FAILED_REQUESTS,
        title: "Failed requests",
        description: "Requests that did not complete successfully",
        derivation: Some("counted"),
    },
    MetricInfo {
        key: summary::OUTPUT_TOKEN_THROUGHPUT,
        title: "Output throughput",
        description: "Average output tokens produced per second",
        derivation: Some("total output tokens / total test duration"),
    },
    MetricInfo {
        key: summary::TOTAL_TOKEN_THROUGHPUT,
        title: "Total throughput",
        description: "Average input plus output tokens processed per second",
        derivation: Some("(total input tokens + total output tokens) / total test duration"),
    },
    MetricInfo {
        key: summary::REQUEST_THROUGHPUT,
        title: "Request throughput",
        description: "Average successful requests completed per second",
        derivation: Some("succeeded requests / total test duration"),
    },
    MetricInfo {
        key: summary::AVERAGE_LATENCY,
        title: "Average latency",
        description: "Mean time from sending a request to receiving the complete response",
        derivation: Some("total latency / succeeded requests"),
    },
    MetricInfo {
        key: summary::AVERAGE_TIME_TO_FIRST_TOKEN,
        title: "Average time to first token",
        description: "Mean time from sending a request to receiving the first response token",
        derivation: Some("total first-chunk latency / succeeded requests"),
    },
    MetricInfo {
        key: summary::AVERAGE_TIME_PER_OUTPUT_TOKEN,
        title: "Average time per output token",
        description: "Mean time to generate each output token, excluding the first",
        derivation: Some("total time per output token / succeeded requests"),
    },
    MetricInfo {
        key: summary::AVERAGE_INPUT_TOKENS_PER_REQUEST,
        title: "Average input tokens",
        description: "Mean number of input tokens per request",
        derivation: Some("total input tokens / succeeded requests"),
    },
    MetricInfo {
        key: summary::AVERAGE_OUTPUT_TOKENS_PER_REQUEST,
        title: "Average output tokens",
        description: "Mean number of output tokens per request",
        derivation: Some("total output tokens / succeeded requests"),
    },
    MetricInfo {
        key: summary::AVERAGE_PACKAGE_LATENCY,
        title: "Average package latency",
        description: "Mean delay between received stream packages",
        derivation: Some("total package time / total packages"),
    },
    MetricInfo {
        key: summary::AVERAGE_PACKAGE_PER_REQUEST,
        title: "Average packages per request",
        description: "Mean number of stream packages received per request",
        derivation: Some("total packages / succeeded requests"),
    },
];

pub static PERCENTILE_METRICS: &[MetricInfo] = &[
    MetricInfo {
        key: percentile::PERCENTILES,
        title: "Percentile",
        description: "Percentile bucket each row describes",
        derivation: None,
    },
    MetricInfo {
        key: percentile::TTFT,
        title: "Time to first token",
        description: "Seconds from sending the request to the first generated token; first-packet delay",
        derivation: None,
    },
    MetricInfo {
        key: percentile::ITL,
        title: "Inter-token latency",
        description: "Seconds between consecutive output tokens; smoothness of the stream",
        derivation: None,
    },
    MetricInfo {
        key: percentile::TPOT,
        title: "Time per output token",
        description: "Seconds to generate each output token excluding the first; decode speed",
        derivation: None,
    },
    MetricInfo {
        key: percentile::LATENCY,
        title: "End-to-end latency",
        description: "Seconds from sending the request to the complete response",
        derivation: Some("TTFT + TPOT * output tokens"),
    },
    MetricInfo {
        key: percentile::INPUT_TOKENS,
        title: "Input tokens",
        description: "Number of tokens in the request",
        derivation: None,
    },
    MetricInfo {
        key: percentile::OUTPUT_TOKENS,
        title: "Output tokens",
        description: "Number of tokens generated in the response",
        derivation: None,
    },
    MetricInfo {
        key: percentile::OUTPUT_THROUGHPUT,
        title: "Output throughput",
        description: "Output tokens per second for the request",
        derivation: Some("output tokens / end-to-end latency"),
    },
    MetricInfo {
        key: percentile::TOTAL_THROUGHPUT,
        title: "Total throughput",
        description: "Input plus output tokens per second for the request",
        derivation: Some("(input tokens + output tokens) / end-to-end latency"),
    },
];

/// Summary keys in display order.
pub fn summary_order() -> Vec<&'static str> {
    SUMMARY_METRICS.iter().map(|m| m.key).collect()
}

/// Percentile keys in display order.
pub fn percentile_order() -> Vec<&'static str> {
    PERCENTILE_METRICS.iter().map(|m| m.key).collect()
}

pub fn lookup_summary(key: &str) -> Option<&'static MetricInfo> {
    SUMMARY_METRICS.iter().find(|m| m.key == key)
}

pub fn lookup_percentile(key: &str) -> Option<&'static MetricInfo> {
    PERCENTILE_METRICS.iter().find(|m| m.key == key)
}

/// Remove engine bookkeeping fields, keeping the order of what remains.
pub fn strip_housekeeping(summary: &mut SummaryTable) {
    for key in HOUSEKEEPING_KEYS {
        summary.shift_remove(*key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn vocabulary_sizes() {
        assert_eq!(SUMMARY_METRICS.len(), 15);
        assert_eq!(PERCENTILE_METRICS.len(), 9);
    }

    #[test]
    fn keys_are_unique() {
        let summary: HashSet<_> = summary_order().into_iter().collect();
        assert_eq!(summary.len(), SUMMARY_METRICS.len());
        let pct: HashSet<_> = percentile_order().into_iter().collect();
        assert_eq!(pct.len(), PERCENTILE_METRICS.len());
    }

    #[test]
    fn percentile_label_column_comes_first() {
        assert_eq!(percentile_order()[0], percentile::PERCENTILES);
        assert_eq!(summary_order()[0], summary::TIME_TAKEN_FOR_TESTS);
    }

    #[test]
    fn lookup_by_key() {
        let info = lookup_percentile("TTFT (s)").unwrap();
        assert_eq!(info.title, "Time to first token");
        assert!(lookup_summary("Result DB path").is_none());
        assert!(lookup_summary(summary::REQUEST_THROUGHPUT).is_some());
    }

    #[test]
    fn strip_housekeeping_keeps_order() {
        let mut table = SummaryTable::new();
        table.insert("b".to_string(), "1".into());
        table.insert("Result DB path".to_string(), "/tmp/x.db".into());
        table.insert("a".to_string(), "2".into());
        strip_housekeeping(&mut table);
        let keys: Vec<&str> = table.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
