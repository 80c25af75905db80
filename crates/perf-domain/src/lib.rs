pub mod engine;
pub mod error;
pub mod ids;
pub mod keys;
pub mod metrics;
pub mod outcome;
pub mod parse;
pub mod render;
pub mod state;
pub mod task;

pub use engine::{DatasetSource, EngineConfig, EngineTarget};
pub use error::DomainError;
pub use ids::{DatasetId, DatasetRef, EndpointId, OwnerId, TaskId};
pub use metrics::MetricInfo;
pub use outcome::{MetricValue, OutcomeRecord, PercentileTable, SummaryTable};
pub use parse::{ParsedOutput, parse_benchmark_output};
pub use state::TaskState;
pub use task::{NewTask, RequestBounds, Task, TaskConfig, TaskResults, Transition, now_millis};
