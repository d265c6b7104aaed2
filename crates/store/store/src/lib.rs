pub mod context;
pub mod error;
pub mod store;
pub mod testing;

pub use context::Context;
pub use error::CacheError;
pub use store::{CacheStore, ttl_millis};
