mod codec;
mod error;
mod store;

pub use store::{RedisTaskStore, RedisTaskStoreConfig};
