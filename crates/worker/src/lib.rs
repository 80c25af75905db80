mod classify;
mod command;
mod engine;
mod error;
pub mod outcome_file;
mod worker;

pub use classify::{classify_failure, is_transport_failure};
pub use command::CommandEngine;
pub use engine::{BenchmarkEngine, EngineOutput};
pub use error::{EngineError, WorkerError};
pub use worker::{TIMEOUT_MESSAGE, WorkerOptions, run_worker, workdir_for};
