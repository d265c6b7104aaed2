//! Cache service façade for refcache.
//!
//! [`CacheService`] wraps a [`CacheStore`] with connection lifecycle
//! handling, structured logging, JSON helpers and reference-set expansion.
//!
//! # Example
//!
//! ```ignore
//! use refcache::{CacheConfig, CacheService, Context};
//!
//! let config = CacheConfig::load("refcache.toml")?;
//! refcache::telemetry::init(&config.logging);
//!
//! let cache = CacheService::connect(&config).await?;
//! let ctx = Context::new().with_timeout(Duration::from_secs(2));
//!
//! let mut orders: Vec<Order> = Vec::new();
//! cache.expand_members_into(&ctx, "idx:orders", &mut orders).await?;
//!
//! cache.disconnect().await?;
//! ```
//!
//! [`CacheStore`]: refcache_store::CacheStore

pub mod config;
mod expand;
pub mod factory;
mod service;
pub mod telemetry;

pub use config::{CacheConfig, LoggingConfig};
pub use factory::create_store;
pub use refcache_store::{CacheError, CacheStore, Context};
pub use service::CacheService;
