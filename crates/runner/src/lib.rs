mod catalog;
mod config;
mod error;
mod launcher;
mod monitor;
mod spawn;
mod supervisor;

pub use catalog::{Catalog, Dataset, Endpoint, StaticCatalog};
pub use config::RunnerConfig;
pub use error::LaunchError;
pub use launcher::{CreateTaskRequest, Launcher};
pub use monitor::{FileState, Monitor, NO_OUTPUT_MESSAGE, check_outcome};
pub use spawn::{InProcessSpawner, ProcessSpawner, WorkerHandle, WorkerJob, WorkerSpawner};
pub use supervisor::{LaunchClaim, SubmitError, Supervisor};
