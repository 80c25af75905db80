mod error;
mod filter;
mod store;

pub use error::TaskStoreError;
pub use filter::{TaskFilter, TaskPage, newest_first};
pub use store::TaskStore;
