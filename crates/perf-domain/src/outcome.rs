use indexmap::IndexMap;

/// A single metric cell as reported by the engine (number or string).
pub type MetricValue = serde_json::Value;

/// Flat summary metrics, in engine iteration order.
pub type SummaryTable = IndexMap<String, MetricValue>;

/// Per-percentile metric columns. All columns share one positional index:
/// `table[k][i]` for every `k` refers to the same percentile bucket.
pub type PercentileTable = IndexMap<String, Vec<MetricValue>>;

/// Handoff record written once by the worker and consumed by the monitor.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeRecord {
    Ok {
        summary: SummaryTable,
        percentiles: PercentileTable,
    },
    Error {
        message: String,
    },
}

impl OutcomeRecord {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Serialize for the outcome file.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from outcome file contents.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if the bytes are not a valid record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_record_preserves_key_order() {
        let bytes = br#"{"ok":{"summary":{"Zeta":"1","Alpha":2},"percentiles":{"Percentiles":["p50","p90"],"TTFT":[0.1,0.4]}}}"#;
        let record = OutcomeRecord::from_bytes(bytes).unwrap();
        let OutcomeRecord::Ok {
            summary,
            percentiles,
        } = record
        else {
            panic!("expected Ok");
        };
        let keys: Vec<&str> = summary.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Zeta", "Alpha"]);
        assert_eq!(percentiles["TTFT"], vec![json!(0.1), json!(0.4)]);
    }

    #[test]
    fn error_record_wire_format() {
        let record = OutcomeRecord::error("execution timed out");
        let value: serde_json::Value =
            serde_json::from_slice(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(value, json!({"error": {"message": "execution timed out"}}));
        assert!(!record.is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(OutcomeRecord::from_bytes(b"").is_err());
        assert!(OutcomeRecord::from_bytes(b"{\"ok\":").is_err());
        assert!(OutcomeRecord::from_bytes(br#"{"partial":{}}"#).is_err());
    }

    #[test]
    fn percentile_columns_must_be_arrays() {
        let bytes = br#"{"ok":{"summary":{},"percentiles":{"TTFT":0.1}}}"#;
        assert!(OutcomeRecord::from_bytes(bytes).is_err());
    }
}
