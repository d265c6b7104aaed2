//! Reference-set expansion.
//!
//! A reference set is a store set whose members are themselves keys. Expanding
//! it lists the members and dereferences each one with a plain get. The set is
//! an index that can outlive the entries it points at, so the two hops have
//! different failure rules:
//!
//! - listing the set must succeed, otherwise the whole call fails;
//! - a member that errors, is missing, or holds an empty value is skipped with
//!   a warning and never surfaces to the caller.
//!
//! Decoding is stricter than resolution. [`CacheService::expand_members_into`]
//! stops at the first value that is not valid JSON for the element type.

use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use refcache_store::{CacheError, Context};

use crate::service::CacheService;

/// A member that dereferenced to a non-empty value.
struct Resolved {
    member: String,
    value: String,
}

impl CacheService {
    async fn resolve(
        &self,
        ctx: &Context,
        reference_key: &str,
    ) -> Result<Vec<Resolved>, CacheError> {
        info!(service = %self.name, reference_key, "expanding reference set");

        let members = self
            .store
            .set_members(ctx, reference_key)
            .await
            .inspect_err(|e| {
                error!(
                    service = %self.name,
                    reference_key,
                    error = %e,
                    "failed to get set members"
                );
            })?;

        let total = members.len();
        let mut resolved = Vec::with_capacity(total);
        for member in members {
            let lookup = self.store.get(ctx, &member).await;
            match lookup {
                Ok(Some(value)) if !value.is_empty() => resolved.push(Resolved { member, value }),
                Ok(_) => {
                    warn!(
                        service = %self.name,
                        reference_key,
                        member = %member,
                        "skipping member with no value"
                    );
                }
                Err(e) => {
                    warn!(
                        service = %self.name,
                        reference_key,
                        member = %member,
                        error = %e,
                        "skipping member that failed to resolve"
                    );
                }
            }
        }

        debug!(
            service = %self.name,
            reference_key,
            resolved = resolved.len(),
            skipped = total - resolved.len(),
            "reference set expanded"
        );
        Ok(resolved)
    }

    /// Resolve every member of the set at `reference_key` to its value.
    ///
    /// Values come back in the order the store listed the members. Members
    /// that cannot be resolved are left out, so an empty result is a success.
    ///
    /// # Errors
    ///
    /// Fails only if the set itself cannot be listed.
    pub async fn expand_members(
        &self,
        ctx: &Context,
        reference_key: &str,
    ) -> Result<Vec<String>, CacheError> {
        let resolved = self.resolve(ctx, reference_key).await?;
        Ok(resolved.into_iter().map(|r| r.value).collect())
    }

    /// Expand the set at `reference_key` and decode each value as JSON into
    /// `out`, in order.
    ///
    /// Elements are appended as they are decoded. On a decode failure `out`
    /// keeps the elements decoded before the bad value and nothing after it.
    ///
    /// # Errors
    ///
    /// Returns the listing error from [`expand_members`](Self::expand_members)
    /// with `out` untouched, or [`CacheError::Decode`] naming the first member
    /// whose value does not decode.
    pub async fn expand_members_into<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        reference_key: &str,
        out: &mut Vec<T>,
    ) -> Result<(), CacheError> {
        let resolved = self.resolve(ctx, reference_key).await?;

        out.reserve(resolved.len());
        for Resolved { member, value } in resolved {
            let item = serde_json::from_str(&value).map_err(|e| {
                let e = CacheError::Decode(format!("{member}: {e}"));
                error!(
                    service = %self.name,
                    reference_key,
                    member = %member,
                    error = %e,
                    "failed to decode member"
                );
                e
            })?;
            out.push(item);
        }
        Ok(())
    }
}
