use std::time::Duration;

use crate::context::Context;
use crate::error::CacheError;
use crate::store::CacheStore;

fn test_key(namespace: &str, id: &str) -> String {
    format!("{namespace}:{id}")
}

/// Run the full cache store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
/// All keys are created under `namespace` so the suite can share a live
/// store with other data.
///
/// # Errors
///
/// Returns an error if any store call fails unexpectedly.
pub async fn run_store_conformance_tests(
    store: &dyn CacheStore,
    namespace: &str,
) -> Result<(), CacheError> {
    let ctx = Context::new().with_timeout(Duration::from_secs(10));
    test_ping(store, &ctx).await?;
    test_get_missing(store, &ctx, namespace).await?;
    test_set_and_get(store, &ctx, namespace).await?;
    test_set_overwrites(store, &ctx, namespace).await?;
    test_ttl_set(store, &ctx, namespace).await?;
    test_set_add_and_members(store, &ctx, namespace).await?;
    test_set_members_missing(store, &ctx, namespace).await?;
    test_multi_get(store, &ctx, namespace).await?;
    test_delete(store, &ctx, namespace).await?;
    test_empty_inputs(store, &ctx, namespace).await?;
    test_wrong_type(store, &ctx, namespace).await?;
    test_cancelled_context(store, namespace).await?;
    Ok(())
}

async fn test_ping(store: &dyn CacheStore, ctx: &Context) -> Result<(), CacheError> {
    store.ping(ctx).await
}

async fn test_get_missing(
    store: &dyn CacheStore,
    ctx: &Context,
    ns: &str,
) -> Result<(), CacheError> {
    let val = store.get(ctx, &test_key(ns, "missing")).await?;
    assert!(val.is_none(), "get on missing key should return None");
    Ok(())
}

async fn test_set_and_get(
    store: &dyn CacheStore,
    ctx: &Context,
    ns: &str,
) -> Result<(), CacheError> {
    let key = test_key(ns, "set-get");
    store.set(ctx, &key, "hello", None).await?;
    let val = store.get(ctx, &key).await?;
    assert_eq!(val.as_deref(), Some("hello"));
    Ok(())
}

async fn test_set_overwrites(
    store: &dyn CacheStore,
    ctx: &Context,
    ns: &str,
) -> Result<(), CacheError> {
    let key = test_key(ns, "overwrite");
    store.set(ctx, &key, "v1", None).await?;
    store.set(ctx, &key, "v2", None).await?;
    let val = store.get(ctx, &key).await?;
    assert_eq!(val.as_deref(), Some("v2"), "second set should win");
    Ok(())
}

async fn test_ttl_set(store: &dyn CacheStore, ctx: &Context, ns: &str) -> Result<(), CacheError> {
    let key = test_key(ns, "ttl");
    store
        .set(ctx, &key, "ephemeral", Some(Duration::from_secs(3600)))
        .await?;
    let val = store.get(ctx, &key).await?;
    assert_eq!(val.as_deref(), Some("ephemeral"));

    let key = test_key(ns, "ttl-zero");
    store
        .set(ctx, &key, "persistent", Some(Duration::ZERO))
        .await?;
    let val = store.get(ctx, &key).await?;
    assert_eq!(val.as_deref(), Some("persistent"), "zero TTL means no expiry");
    Ok(())
}

async fn test_set_add_and_members(
    store: &dyn CacheStore,
    ctx: &Context,
    ns: &str,
) -> Result<(), CacheError> {
    let key = test_key(ns, "set");
    let added = store.set_add(ctx, &key, &["a", "b"]).await?;
    assert_eq!(added, 2, "both members are new");

    let added = store.set_add(ctx, &key, &["b", "c"]).await?;
    assert_eq!(added, 1, "duplicate members are not counted");

    let mut members = store.set_members(ctx, &key).await?;
    members.sort();
    assert_eq!(members, vec!["a", "b", "c"]);
    Ok(())
}

async fn test_set_members_missing(
    store: &dyn CacheStore,
    ctx: &Context,
    ns: &str,
) -> Result<(), CacheError> {
    let members = store.set_members(ctx, &test_key(ns, "no-set")).await?;
    assert!(members.is_empty(), "missing set should have no members");
    Ok(())
}

async fn test_multi_get(store: &dyn CacheStore, ctx: &Context, ns: &str) -> Result<(), CacheError> {
    let first = test_key(ns, "mget-1");
    let missing = test_key(ns, "mget-missing");
    let second = test_key(ns, "mget-2");
    store.set(ctx, &first, "one", None).await?;
    store.set(ctx, &second, "two", None).await?;

    let vals = store
        .multi_get(ctx, &[first.as_str(), missing.as_str(), second.as_str()])
        .await?;
    assert_eq!(
        vals,
        vec![Some("one".to_owned()), None, Some("two".to_owned())],
        "multi_get should be positional"
    );
    Ok(())
}

async fn test_delete(store: &dyn CacheStore, ctx: &Context, ns: &str) -> Result<(), CacheError> {
    let string_key = test_key(ns, "del-string");
    let set_key = test_key(ns, "del-set");
    let missing = test_key(ns, "del-missing");
    store.set(ctx, &string_key, "bye", None).await?;
    store.set_add(ctx, &set_key, &["m"]).await?;

    let removed = store
        .delete(ctx, &[string_key.as_str(), set_key.as_str(), missing.as_str()])
        .await?;
    assert_eq!(removed, 2, "delete should count only existing keys");

    assert!(store.get(ctx, &string_key).await?.is_none());
    assert!(store.set_members(ctx, &set_key).await?.is_empty());

    let removed = store.delete(ctx, &[string_key.as_str()]).await?;
    assert_eq!(removed, 0, "delete on missing key should return 0");
    Ok(())
}

async fn test_empty_inputs(
    store: &dyn CacheStore,
    ctx: &Context,
    ns: &str,
) -> Result<(), CacheError> {
    assert_eq!(store.set_add(ctx, &test_key(ns, "empty"), &[]).await?, 0);
    assert!(store.multi_get(ctx, &[]).await?.is_empty());
    assert_eq!(store.delete(ctx, &[]).await?, 0);
    Ok(())
}

async fn test_wrong_type(store: &dyn CacheStore, ctx: &Context, ns: &str) -> Result<(), CacheError> {
    let key = test_key(ns, "wrong-type");
    store.set_add(ctx, &key, &["x"]).await?;
    let res = store.get(ctx, &key).await;
    assert!(
        matches!(res, Err(CacheError::Backend(_))),
        "get on a set key should fail with a backend error"
    );

    let vals = store.multi_get(ctx, &[key.as_str()]).await?;
    assert_eq!(vals, vec![None], "multi_get treats non-strings as missing");

    store.set(ctx, &key, "now-a-string", None).await?;
    let res = store.set_members(ctx, &key).await;
    assert!(
        matches!(res, Err(CacheError::Backend(_))),
        "set_members on a string key should fail with a backend error"
    );
    Ok(())
}

async fn test_cancelled_context(store: &dyn CacheStore, ns: &str) -> Result<(), CacheError> {
    let ctx = Context::new();
    ctx.cancel();
    let res = store.get(&ctx, &test_key(ns, "cancelled")).await;
    assert!(
        matches!(res, Err(CacheError::Cancelled)),
        "calls under a cancelled context should fail"
    );
    Ok(())
}
