use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::CacheError;

/// Trait for a key-value cache store with string values and set collections.
///
/// Every call except [`close`](CacheStore::close) is bound to a [`Context`]
/// and must fail with [`CacheError::Timeout`] or [`CacheError::Cancelled`]
/// once that context expires. Implementations must be `Send + Sync` and safe
/// for concurrent access; callers add no locking of their own.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Round-trip to the store to verify it is reachable.
    async fn ping(&self, ctx: &Context) -> Result<(), CacheError>;

    /// Release the underlying connections. Later calls fail with
    /// [`CacheError::Connection`].
    async fn close(&self) -> Result<(), CacheError>;

    /// Get the string value for a key. Returns `None` if not found or expired.
    async fn get(&self, ctx: &Context, key: &str) -> Result<Option<String>, CacheError>;

    /// Set a string value, overwriting any previous value of any type.
    /// A `None` or zero `ttl` stores the value without expiry.
    async fn set(
        &self,
        ctx: &Context,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Add members to the set at `key`, creating it if needed.
    /// Returns how many members were not already present.
    async fn set_add(
        &self,
        ctx: &Context,
        key: &str,
        members: &[&str],
    ) -> Result<u64, CacheError>;

    /// List the members of the set at `key`. A missing key is an empty set.
    async fn set_members(&self, ctx: &Context, key: &str) -> Result<Vec<String>, CacheError>;

    /// Get several string values at once. The result is positional: entry
    /// `i` is `None` when `keys[i]` is missing or not a string.
    async fn multi_get(
        &self,
        ctx: &Context,
        keys: &[&str],
    ) -> Result<Vec<Option<String>>, CacheError>;

    /// Delete keys of any type. Returns how many existed.
    async fn delete(&self, ctx: &Context, keys: &[&str]) -> Result<u64, CacheError>;
}

/// Convert a TTL into whole milliseconds, treating zero as "no expiry".
pub fn ttl_millis(ttl: Option<Duration>) -> Option<u64> {
    ttl.filter(|d| !d.is_zero())
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1))
}
