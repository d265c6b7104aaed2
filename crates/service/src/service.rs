use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, info};

use refcache_store::{CacheError, CacheStore, Context};

use crate::config::CacheConfig;
use crate::factory::create_store;

/// Logging and convenience layer over a [`CacheStore`].
///
/// The service holds one shared store handle and is cheap to clone; clones
/// talk to the same store. No locking is added on top of the store: thread
/// safety of concurrent calls is the store's (and its pool's) business.
///
/// Every single-key operation logs a failure with the service name and the
/// key involved, then returns the store's error unchanged.
#[derive(Clone)]
pub struct CacheService {
    pub(crate) store: Arc<dyn CacheStore>,
    pub(crate) name: Arc<str>,
}

impl fmt::Debug for CacheService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheService")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl CacheService {
    /// Wrap an existing store. Log lines carry `service = "{trace_name}_cache"`.
    pub fn new(store: Arc<dyn CacheStore>, trace_name: &str) -> Self {
        Self {
            store,
            name: Arc::from(format!("{trace_name}_cache")),
        }
    }

    /// Build the configured backend and verify it is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] for an unknown backend and the probe
    /// error if the store cannot be reached within the ping timeout.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let store = create_store(config).inspect_err(|e| {
            error!(service = %config.trace_name, error = %e, "failed to create cache store");
        })?;
        let service = Self::new(store, &config.trace_name);
        service.init(config.ping_timeout()).await?;
        Ok(service)
    }

    /// Run the start-up connectivity probe, bounded by `ping_timeout`.
    pub async fn init(&self, ping_timeout: Duration) -> Result<(), CacheError> {
        let ctx = Context::new().with_timeout(ping_timeout);
        if let Err(e) = self.store.ping(&ctx).await {
            error!(service = %self.name, error = %e, "failed to connect to cache store");
            return Err(e);
        }

        info!(service = %self.name, "connected to cache store");
        Ok(())
    }

    /// Close the store. Later calls on any clone of this service fail.
    pub async fn disconnect(&self) -> Result<(), CacheError> {
        if let Err(e) = self.store.close().await {
            error!(service = %self.name, error = %e, "failed to disconnect from cache store");
            return Err(e);
        }

        info!(service = %self.name, "disconnected from cache store");
        Ok(())
    }

    /// Get a string value.
    ///
    /// A missing key and a key holding an empty string both fail with
    /// [`CacheError::NotFound`].
    pub async fn get(&self, ctx: &Context, key: &str) -> Result<String, CacheError> {
        match self.store.get(ctx, key).await {
            Ok(Some(value)) if !value.is_empty() => Ok(value),
            Ok(_) => {
                let e = CacheError::NotFound(key.to_owned());
                error!(service = %self.name, key, error = %e, "failed to get key");
                Err(e)
            }
            Err(e) => {
                error!(service = %self.name, key, error = %e, "failed to get key");
                Err(e)
            }
        }
    }

    /// Get a value and decode it from JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        key: &str,
    ) -> Result<T, CacheError> {
        let raw = self.get(ctx, key).await?;
        serde_json::from_str(&raw).map_err(|e| {
            let e = CacheError::Decode(format!("{key}: {e}"));
            error!(service = %self.name, key, error = %e, "failed to decode key");
            e
        })
    }

    /// Set a string value. A `None` or zero `ttl` keeps it until deleted.
    pub async fn set(
        &self,
        ctx: &Context,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.store
            .set(ctx, key, value, ttl)
            .await
            .inspect_err(|e| error!(service = %self.name, key, error = %e, "failed to set key"))
    }

    /// Encode a value as JSON and set it.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        ctx: &Context,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(value).map_err(|e| {
            let e = CacheError::Encode(format!("{key}: {e}"));
            error!(service = %self.name, key, error = %e, "failed to encode value");
            e
        })?;
        self.set(ctx, key, &encoded, ttl).await
    }

    /// Add members to the reference set at `key`. Returns how many were new.
    pub async fn set_add(
        &self,
        ctx: &Context,
        key: &str,
        members: &[&str],
    ) -> Result<u64, CacheError> {
        self.store.set_add(ctx, key, members).await.inspect_err(|e| {
            error!(service = %self.name, key, error = %e, "failed to add members to set");
        })
    }

    /// List the members of the reference set at `key`.
    pub async fn set_members(&self, ctx: &Context, key: &str) -> Result<Vec<String>, CacheError> {
        self.store.set_members(ctx, key).await.inspect_err(|e| {
            error!(service = %self.name, key, error = %e, "failed to get set members");
        })
    }

    /// Get several values at once; missing keys are `None` in place.
    pub async fn multi_get(
        &self,
        ctx: &Context,
        keys: &[&str],
    ) -> Result<Vec<Option<String>>, CacheError> {
        self.store.multi_get(ctx, keys).await.inspect_err(|e| {
            error!(service = %self.name, ?keys, error = %e, "failed to get keys");
        })
    }

    /// Delete keys. Returns how many existed.
    pub async fn delete(&self, ctx: &Context, keys: &[&str]) -> Result<u64, CacheError> {
        self.store.delete(ctx, keys).await.inspect_err(|e| {
            error!(service = %self.name, ?keys, error = %e, "failed to delete keys");
        })
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use refcache_store_memory::MemoryCacheStore;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        total: f64,
    }

    fn service() -> (Arc<MemoryCacheStore>, CacheService) {
        let store = Arc::new(MemoryCacheStore::new());
        let svc = CacheService::new(store.clone(), "orders");
        (store, svc)
    }

    #[tokio::test]
    async fn init_succeeds_on_reachable_store() {
        let (_, svc) = service();
        svc.init(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn init_fails_on_unreachable_store() {
        let (store, svc) = service();
        store.disconnect();
        let err = svc.init(Duration::from_secs(1)).await.unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn connect_uses_configured_backend() {
        let svc = CacheService::connect(&CacheConfig::default()).await.unwrap();
        assert_eq!(&*svc.name, "refcache_cache");
    }

    #[tokio::test]
    async fn connect_rejects_unknown_backend() {
        let config = CacheConfig {
            backend: "nope".into(),
            ..CacheConfig::default()
        };
        let err = CacheService::connect(&config).await.unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[tokio::test]
    async fn disconnect_closes_store_for_all_clones() {
        let (_, svc) = service();
        let other = svc.clone();
        svc.disconnect().await.unwrap();

        let err = other.get(&Context::new(), "k").await.unwrap_err();
        assert!(matches!(err, CacheError::Connection(_)));
    }

    #[tokio::test]
    async fn get_returns_value() {
        let (_, svc) = service();
        let ctx = Context::new();
        svc.set(&ctx, "k", "v", None).await.unwrap();
        assert_eq!(svc.get(&ctx, "k").await.unwrap(), "v");
    }

    #[tokio::test]
    async fn get_missing_or_empty_is_not_found() {
        let (_, svc) = service();
        let ctx = Context::new();

        let err = svc.get(&ctx, "missing").await.unwrap_err();
        assert!(err.is_not_found());

        svc.set(&ctx, "empty", "", None).await.unwrap();
        let err = svc.get(&ctx, "empty").await.unwrap_err();
        assert!(matches!(err, CacheError::NotFound(key) if key == "empty"));
    }

    #[tokio::test]
    async fn get_propagates_store_errors() {
        let (store, svc) = service();
        store.fail_key("k");
        let err = svc.get(&Context::new(), "k").await.unwrap_err();
        assert!(matches!(err, CacheError::Backend(_)));
    }

    #[tokio::test]
    async fn json_round_trip() {
        let (_, svc) = service();
        let ctx = Context::new();
        let order = Order { id: 7, total: 12.5 };

        svc.set_json(&ctx, "o:7", &order, None).await.unwrap();
        let back: Order = svc.get_json(&ctx, "o:7").await.unwrap();
        assert_eq!(back, order);
    }

    #[tokio::test]
    async fn get_json_malformed_is_decode_error() {
        let (_, svc) = service();
        let ctx = Context::new();
        svc.set(&ctx, "o:1", "{\"id\":", None).await.unwrap();

        let err = svc.get_json::<Order>(&ctx, "o:1").await.unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }

    #[tokio::test]
    async fn get_json_missing_is_not_found() {
        let (_, svc) = service();
        let err = svc
            .get_json::<Order>(&Context::new(), "o:404")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn set_json_rejects_unencodable_value() {
        let (_, svc) = service();
        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1u8], "non-string map keys cannot be JSON");

        let err = svc
            .set_json(&Context::new(), "bad", &bad, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Encode(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn set_with_ttl_expires() {
        let (_, svc) = service();
        let ctx = Context::new();
        svc.set(&ctx, "k", "v", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(svc.get(&ctx, "k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn set_operations() {
        let (_, svc) = service();
        let ctx = Context::new();

        assert_eq!(svc.set_add(&ctx, "idx", &["a", "b"]).await.unwrap(), 2);
        assert_eq!(svc.set_add(&ctx, "idx", &["b"]).await.unwrap(), 0);
        assert_eq!(svc.set_members(&ctx, "idx").await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn multi_get_and_delete() {
        let (_, svc) = service();
        let ctx = Context::new();
        svc.set(&ctx, "a", "1", None).await.unwrap();
        svc.set(&ctx, "c", "3", None).await.unwrap();

        let vals = svc.multi_get(&ctx, &["a", "b", "c"]).await.unwrap();
        assert_eq!(vals, vec![Some("1".into()), None, Some("3".into())]);

        assert_eq!(svc.delete(&ctx, &["a", "b", "c"]).await.unwrap(), 2);
        assert_eq!(svc.multi_get(&ctx, &["a", "c"]).await.unwrap(), vec![None, None]);
    }

    #[tokio::test]
    async fn errors_propagate_verbatim() {
        let (store, svc) = service();
        let ctx = Context::new();
        store.disconnect();

        assert!(matches!(
            svc.set(&ctx, "k", "v", None).await,
            Err(CacheError::Connection(_))
        ));
        assert!(matches!(
            svc.set_add(&ctx, "idx", &["a"]).await,
            Err(CacheError::Connection(_))
        ));
        assert!(matches!(
            svc.set_members(&ctx, "idx").await,
            Err(CacheError::Connection(_))
        ));
        assert!(matches!(
            svc.multi_get(&ctx, &["k"]).await,
            Err(CacheError::Connection(_))
        ));
        assert!(matches!(
            svc.delete(&ctx, &["k"]).await,
            Err(CacheError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_context_fails_call() {
        let (_, svc) = service();
        let ctx = Context::new();
        ctx.cancel();
        assert!(matches!(
            svc.set(&ctx, "k", "v", None).await,
            Err(CacheError::Cancelled)
        ));
    }
}
