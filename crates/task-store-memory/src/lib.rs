mod store;

pub use store::MemoryTaskStore;
