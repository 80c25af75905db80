mod config;
mod error;
mod sweeper;

pub use config::SweeperConfig;
pub use error::SweeperError;
pub use sweeper::{OutcomeSweeper, SweepReport};
