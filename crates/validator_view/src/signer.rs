//! Signer address to validator id resolution with a bounded cache.

use crate::cache::{BoundedCache, CacheStats};
use crate::errors::*;
use crate::ports::SignerResolver;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;
use valset_types::{CallOptions, SignerAddress, ValidatorId};

/// Default capacity, roughly three times the expected validator count.
pub const DEFAULT_SIGNER_CACHE_CAPACITY: usize = 500;

/// Cached signer → validator id resolver.
///
/// A signer is assumed to belong to one validator for the lifetime of the
/// process. Entries are never re-verified, so a signer reassigned on the
/// ledger keeps resolving to its first validator until evicted.
pub struct SignerCache {
    resolver: Arc<dyn SignerResolver>,
    cache: BoundedCache<SignerAddress, ValidatorId>,
}

impl SignerCache {
    /// Create a cache holding at most `capacity` signers (minimum one).
    pub fn new(resolver: Arc<dyn SignerResolver>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            resolver,
            cache: BoundedCache::new(capacity),
        }
    }

    pub fn with_default_capacity(resolver: Arc<dyn SignerResolver>) -> Self {
        Self::new(resolver, DEFAULT_SIGNER_CACHE_CAPACITY)
    }

    /// Resolve a signer address string.
    pub async fn resolve(&self, signer: &str, opts: &CallOptions) -> Result<ValidatorId> {
        let signer = SignerAddress::parse(signer)?;
        self.resolve_address(&signer, opts).await
    }

    /// Resolve an already parsed signer.
    ///
    /// A hit returns without a remote call. A miss issues exactly one call
    /// and stores the result; a failed call leaves the cache untouched.
    pub async fn resolve_address(
        &self,
        signer: &SignerAddress,
        opts: &CallOptions,
    ) -> Result<ValidatorId> {
        if let Some(id) = self.cache.get(signer) {
            return Ok(id);
        }

        debug!("signer cache miss for {} at {}", signer, opts);
        let id = self.resolver.signer_to_validator_id(signer, opts).await?;

        if let Some((evicted, _)) = self.cache.insert(signer.clone(), id) {
            debug!("evicted signer {} from cache", evicted);
        }

        Ok(id)
    }

    /// Cached id for `signer`, without a remote call or recency update.
    pub fn cached(&self, signer: &SignerAddress) -> Option<ValidatorId> {
        self.cache.peek(signer)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
