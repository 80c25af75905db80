use crate::error::EngineError;

/// Lowercase fragments that mark a failure as transport-level.
const TRANSPORT_SIGNATURES: &[&str] = &[
    "502",
    "bad gateway",
    "connection",
    "refused",
    "timeout",
    "timed out",
    "network",
    "unreachable",
];

pub fn is_transport_failure(detail: &str) -> bool {
    let detail = detail.to_lowercase();
    TRANSPORT_SIGNATURES.iter().any(|sig| detail.contains(sig))
}

/// Operator-facing message for a failed engine run.
pub fn classify_failure(err: &EngineError) -> String {
    let detail = err.to_string();
    if is_transport_failure(&detail) {
        format!("target endpoint unavailable: {detail}")
    } else {
        format!("execution failed: {detail}")
    }
}
