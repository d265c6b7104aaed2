//! Redis cache backend for refcache.
//!
//! This crate provides a Redis-backed implementation of the [`CacheStore`]
//! trait from `refcache-store`.
//!
//! # Features
//!
//! - **String values**: `GET`, `SET` and `PSETEX` for values with a TTL.
//! - **Reference sets**: `SADD` and `SMEMBERS`.
//! - **Batch access**: `MGET` and multi-key `DEL`.
//! - **Connection pooling**: Uses `deadpool-redis`; pool sizing and
//!   connection reuse are left entirely to the pool.
//!
//! Every command runs under the caller's [`Context`], so an elapsed deadline
//! or a cancelled token aborts the round trip. Commands are never retried.
//!
//! # Example
//!
//! ```ignore
//! use refcache_store::{CacheStore, Context};
//! use refcache_store_redis::{RedisCacheStore, RedisConfig};
//!
//! let config = RedisConfig::new("localhost:6379");
//! let store = RedisCacheStore::new(&config)?;
//! store.ping(&Context::new()).await?;
//! ```
//!
//! [`CacheStore`]: refcache_store::CacheStore
//! [`Context`]: refcache_store::Context

mod config;
mod store;

pub use config::RedisConfig;
pub use store::RedisCacheStore;
