use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, RedisError};

use refcache_store::context::Context;
use refcache_store::error::CacheError;
use refcache_store::store::{CacheStore, ttl_millis};

use crate::config::RedisConfig;

/// Map a command error, keeping transport failures distinct from errors
/// reported by the server.
fn command_error(e: &RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
        CacheError::Connection(e.to_string())
    } else {
        CacheError::Backend(e.to_string())
    }
}

/// Redis-backed implementation of [`CacheStore`].
///
/// Uses a `deadpool-redis` connection pool. Values are plain Redis strings
/// and reference sets are Redis sets, so data written by other clients of
/// the same database is readable as-is.
pub struct RedisCacheStore {
    pool: Pool,
}

impl RedisCacheStore {
    /// Create a new `RedisCacheStore` from the provided configuration.
    ///
    /// No connection is opened until the first call; use
    /// [`ping`](CacheStore::ping) to verify the server is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connection`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let cfg = Config::from_url(config.url());
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .create_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| CacheError::Connection(e.to_string()))?
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn ping(&self, ctx: &Context) -> Result<(), CacheError> {
        ctx.run(async {
            let mut conn = self.conn().await?;
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| command_error(&e))?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.pool.close();
        Ok(())
    }

    async fn get(&self, ctx: &Context, key: &str) -> Result<Option<String>, CacheError> {
        ctx.run(async {
            let mut conn = self.conn().await?;
            let val: Option<String> = conn.get(key).await.map_err(|e| command_error(&e))?;
            Ok(val)
        })
        .await
    }

    async fn set(
        &self,
        ctx: &Context,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        ctx.run(async {
            let mut conn = self.conn().await?;
            match ttl_millis(ttl) {
                Some(ms) => {
                    let () = conn
                        .pset_ex(key, value, ms)
                        .await
                        .map_err(|e| command_error(&e))?;
                }
                None => {
                    let () = conn
                        .set(key, value)
                        .await
                        .map_err(|e| command_error(&e))?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn set_add(
        &self,
        ctx: &Context,
        key: &str,
        members: &[&str],
    ) -> Result<u64, CacheError> {
        ctx.run(async {
            // SADD without members is a syntax error on the server.
            if members.is_empty() {
                return Ok(0);
            }
            let mut conn = self.conn().await?;
            let added: u64 = conn
                .sadd(key, members)
                .await
                .map_err(|e| command_error(&e))?;
            Ok(added)
        })
        .await
    }

    async fn set_members(&self, ctx: &Context, key: &str) -> Result<Vec<String>, CacheError> {
        ctx.run(async {
            let mut conn = self.conn().await?;
            let members: Vec<String> = conn
                .smembers(key)
                .await
                .map_err(|e| command_error(&e))?;
            Ok(members)
        })
        .await
    }

    async fn multi_get(
        &self,
        ctx: &Context,
        keys: &[&str],
    ) -> Result<Vec<Option<String>>, CacheError> {
        ctx.run(async {
            if keys.is_empty() {
                return Ok(Vec::new());
            }
            let mut conn = self.conn().await?;
            let vals: Vec<Option<String>> = redis::cmd("MGET")
                .arg(keys)
                .query_async(&mut conn)
                .await
                .map_err(|e| command_error(&e))?;
            Ok(vals)
        })
        .await
    }

    async fn delete(&self, ctx: &Context, keys: &[&str]) -> Result<u64, CacheError> {
        ctx.run(async {
            if keys.is_empty() {
                return Ok(0);
            }
            let mut conn = self.conn().await?;
            let removed: u64 = conn.del(keys).await.map_err(|e| command_error(&e))?;
            Ok(removed)
        })
        .await
    }
}


#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;
    use crate::config::RedisConfig;

    fn test_config() -> RedisConfig {
        let address = std::env::var("REDIS_ADDR").unwrap_or_else(|_| "127.0.0.1:6379".to_string());
        RedisConfig::new(address)
    }

    #[tokio::test]
    async fn store_conformance() {
        let config = test_config();
        let store = RedisCacheStore::new(&config).expect("pool creation should succeed");
        let namespace = format!("refcache-test-{}", uuid::Uuid::new_v4());
        refcache_store::testing::run_store_conformance_tests(&store, &namespace)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn ping_unreachable_server_fails() {
        let mut config = RedisConfig::new("127.0.0.1:1");
        config.connection_timeout = Duration::from_millis(200);
        let store = RedisCacheStore::new(&config).unwrap();
        let res = store.ping(&Context::new()).await;
        assert!(res.is_err_and(|e| e.is_connectivity()));
    }
}
