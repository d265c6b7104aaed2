mod store;

pub use store::MemoryCacheStore;
