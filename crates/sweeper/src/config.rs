use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub outcome_dir: PathBuf,
    /// Entries younger than this are never touched.
    pub max_age: Duration,
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            outcome_dir: std::env::temp_dir().join("perfbench"),
            max_age: Duration::from_secs(30 * 60),
            interval: Duration::from_secs(10 * 60),
        }
    }
}
