use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use perfbench_domain::{EngineConfig, PercentileTable, SummaryTable};

use crate::error::EngineError;

/// The two tables a successful run returns together.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EngineOutput {
    pub summary: SummaryTable,
    pub percentiles: PercentileTable,
}

/// External benchmark engine, treated as a black box.
///
/// Implementations block for the duration of the benchmark, run inside
/// `workdir`, and must stop promptly once `cancel` fires.
#[async_trait]
pub trait BenchmarkEngine: Send + Sync {
    async fn run(
        &self,
        config: &EngineConfig,
        workdir: &Path,
        cancel: CancellationToken,
    ) -> Result<EngineOutput, EngineError>;
}
