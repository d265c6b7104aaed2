use std::sync::Arc;

use refcache_store::{CacheError, CacheStore};
use refcache_store_memory::MemoryCacheStore;
use refcache_store_redis::RedisCacheStore;

use crate::config::CacheConfig;

/// Create the store backend named by `config.backend`.
///
/// No I/O happens here; the connectivity probe is run by
/// [`CacheService::init`](crate::CacheService::init).
pub fn create_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryCacheStore::new())),
        "redis" => {
            let store = RedisCacheStore::new(&config.redis_config())?;
            Ok(Arc::new(store))
        }
        other => Err(CacheError::Config(format!(
            "unknown cache backend: {other}"
        ))),
    }
}
