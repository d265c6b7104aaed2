use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::time::Instant;

use refcache_store::context::Context;
use refcache_store::error::CacheError;
use refcache_store::store::{CacheStore, ttl_millis};

/// A stored value. Strings and sets share one keyspace, as in Redis.
#[derive(Debug, Clone)]
enum Value {
    String(String),
    /// Members in first-insertion order.
    Set(Vec<String>),
}

/// A single entry in the in-memory store.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    /// Returns `true` if this entry has passed its TTL deadline.
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Compute the expiry instant from an optional TTL duration.
fn expiry_from_ttl(ttl: Option<Duration>) -> Option<Instant> {
    ttl_millis(ttl).map(|ms| Instant::now() + Duration::from_millis(ms))
}

fn wrong_type() -> CacheError {
    CacheError::Backend(
        "WRONGTYPE Operation against a key holding the wrong kind of value".to_owned(),
    )
}

/// In-memory [`CacheStore`] backed by a [`DashMap`].
///
/// Entries are lazily evicted on access when their TTL has elapsed. Set
/// members are returned in the order they were first added, which makes
/// expansion order deterministic in tests.
///
/// The store can simulate failures: [`disconnect`](Self::disconnect) makes
/// every call fail with [`CacheError::Connection`], and
/// [`fail_key`](Self::fail_key) makes calls touching one key fail with
/// [`CacheError::Backend`].
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    data: DashMap<String, Entry>,
    disconnected: AtomicBool,
    failing: DashSet<String>,
}

impl MemoryCacheStore {
    /// Create a new, empty in-memory cache store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the connection to the store.
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    /// Undo [`disconnect`](Self::disconnect) or [`close`](CacheStore::close).
    pub fn reconnect(&self) {
        self.disconnected.store(false, Ordering::SeqCst);
    }

    /// Make every call that touches `key` fail.
    pub fn fail_key(&self, key: &str) {
        self.failing.insert(key.to_owned());
    }

    /// Remove all failures registered with [`fail_key`](Self::fail_key).
    pub fn clear_failures(&self) {
        self.failing.clear();
    }

    fn check(&self, keys: &[&str]) -> Result<(), CacheError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(CacheError::Connection("store is disconnected".to_owned()));
        }
        if let Some(key) = keys.iter().find(|k| self.failing.contains(**k)) {
            return Err(CacheError::Backend(format!("injected failure for key {key}")));
        }
        Ok(())
    }

    /// Apply `f` to the live value at `key`, evicting it if expired.
    fn with_live<R>(&self, key: &str, f: impl FnOnce(&Value) -> R) -> Option<R> {
        let expired = match self.data.get(key) {
            Some(entry) if !entry.is_expired() => return Some(f(&entry.value)),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.data.remove_if(key, |_, entry| entry.is_expired());
        }
        None
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn ping(&self, ctx: &Context) -> Result<(), CacheError> {
        ctx.run(async { self.check(&[]) }).await
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.disconnect();
        Ok(())
    }

    async fn get(&self, ctx: &Context, key: &str) -> Result<Option<String>, CacheError> {
        ctx.run(async {
            self.check(&[key])?;
            self.with_live(key, |value| match value {
                Value::String(s) => Ok(Some(s.clone())),
                Value::Set(_) => Err(wrong_type()),
            })
            .unwrap_or(Ok(None))
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
            self.check(&[key])?;
            self.data.insert(
                key.to_owned(),
                Entry {
                    value: Value::String(value.to_owned()),
                    expires_at: expiry_from_ttl(ttl),
                },
            );
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
            self.check(&[key])?;
            if members.is_empty() {
                return Ok(0);
            }

            // Remove any expired entry so the set starts fresh.
            self.data.remove_if(key, |_, entry| entry.is_expired());

            let mut entry = self.data.entry(key.to_owned()).or_insert_with(|| Entry {
                value: Value::Set(Vec::new()),
                expires_at: None,
            });

            let Value::Set(existing) = &mut entry.value else {
                return Err(wrong_type());
            };

            let mut added = 0;
            for member in members {
                if !existing.iter().any(|m| m.as_str() == *member) {
                    existing.push((*member).to_owned());
                    added += 1;
                }
            }
            Ok(added)
        })
        .await
    }

    async fn set_members(&self, ctx: &Context, key: &str) -> Result<Vec<String>, CacheError> {
        ctx.run(async {
            self.check(&[key])?;
            self.with_live(key, |value| match value {
                Value::Set(members) => Ok(members.clone()),
                Value::String(_) => Err(wrong_type()),
            })
            .unwrap_or_else(|| Ok(Vec::new()))
        })
        .await
    }

    async fn multi_get(
        &self,
        ctx: &Context,
        keys: &[&str],
    ) -> Result<Vec<Option<String>>, CacheError> {
        ctx.run(async {
            self.check(keys)?;
            Ok(keys
                .iter()
                .map(|key| {
                    self.with_live(key, |value| match value {
                        Value::String(s) => Some(s.clone()),
                        Value::Set(_) => None,
                    })
                    .flatten()
                })
                .collect())
        })
        .await
    }

    async fn delete(&self, ctx: &Context, keys: &[&str]) -> Result<u64, CacheError> {
        ctx.run(async {
            self.check(keys)?;
            let mut removed = 0;
            for key in keys {
                // Expired entries count as already gone.
                if let Some((_, entry)) = self.data.remove(*key)
                    && !entry.is_expired()
                {
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use refcache_store::testing::run_store_conformance_tests;

    use super::*;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryCacheStore::new();
        run_store_conformance_tests(&store, "conformance")
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry_via_get() {
        let store = MemoryCacheStore::new();
        let ctx = Context::new();

        store
            .set(&ctx, "session:1", "short-lived", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        let val = store.get(&ctx, "session:1").await.unwrap();
        assert_eq!(val.as_deref(), Some("short-lived"));

        tokio::time::advance(Duration::from_secs(6)).await;

        let val = store.get(&ctx, "session:1").await.unwrap();
        assert!(val.is_none(), "value should be expired");
        assert!(store.data.is_empty(), "expired entry should be evicted");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_keys_are_not_counted_by_delete() {
        let store = MemoryCacheStore::new();
        let ctx = Context::new();

        store
            .set(&ctx, "k", "v", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.delete(&ctx, &["k"]).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn set_add_replaces_expired_string() {
        let store = MemoryCacheStore::new();
        let ctx = Context::new();

        store
            .set(&ctx, "idx", "stale", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        let added = store.set_add(&ctx, "idx", &["a"]).await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(store.set_members(&ctx, "idx").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn set_members_keep_insertion_order() {
        let store = MemoryCacheStore::new();
        let ctx = Context::new();

        store
            .set_add(&ctx, "idx:orders", &["o:3", "o:1"])
            .await
            .unwrap();
        store
            .set_add(&ctx, "idx:orders", &["o:2", "o:3"])
            .await
            .unwrap();

        let members = store.set_members(&ctx, "idx:orders").await.unwrap();
        assert_eq!(members, vec!["o:3", "o:1", "o:2"]);
    }

    #[tokio::test]
    async fn disconnect_fails_every_call() {
        let store = MemoryCacheStore::new();
        let ctx = Context::new();
        store.set(&ctx, "k", "v", None).await.unwrap();

        store.disconnect();
        assert!(matches!(
            store.ping(&ctx).await,
            Err(CacheError::Connection(_))
        ));
        assert!(matches!(
            store.get(&ctx, "k").await,
            Err(CacheError::Connection(_))
        ));
        assert!(matches!(
            store.set_members(&ctx, "idx").await,
            Err(CacheError::Connection(_))
        ));

        store.reconnect();
        assert_eq!(store.get(&ctx, "k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn close_behaves_like_disconnect() {
        let store = MemoryCacheStore::new();
        let ctx = Context::new();
        store.close().await.unwrap();
        assert!(matches!(
            store.get(&ctx, "k").await,
            Err(CacheError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn failing_key_only_affects_that_key() {
        let store = MemoryCacheStore::new();
        let ctx = Context::new();
        store.set(&ctx, "good", "1", None).await.unwrap();
        store.set(&ctx, "bad", "2", None).await.unwrap();
        store.fail_key("bad");

        assert!(matches!(
            store.get(&ctx, "bad").await,
            Err(CacheError::Backend(_))
        ));
        assert_eq!(store.get(&ctx, "good").await.unwrap().as_deref(), Some("1"));
        assert!(store.multi_get(&ctx, &["good", "bad"]).await.is_err());

        store.clear_failures();
        assert_eq!(store.get(&ctx, "bad").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_fails_call() {
        let store = MemoryCacheStore::new();
        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;

        assert!(matches!(
            store.get(&ctx, "k").await,
            Err(CacheError::Timeout(_))
        ));
    }
}
