//! Validator-set service: wires collaborators into the query surface.

use crate::aggregator::{ActiveSetSnapshot, ValidatorAggregator};
use crate::cache::CacheStats;
use crate::config::ValidatorSetConfig;
use crate::errors::*;
use crate::ledger::InMemoryLedger;
use crate::monikers::{MonikerDiff, MonikerStore};
use crate::ports::*;
use crate::registry::RegistryVersionResolver;
use crate::signer::SignerCache;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;
use valset_types::{CallOptions, RegistryVersion, ValidatorId, ValidatorRecord};

/// External collaborators the service reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub signer_resolver: Arc<dyn SignerResolver>,
    pub registry_v1: Arc<dyn RegistryV1>,
    pub registry_v2: Arc<dyn RegistryV2>,
    pub token_index: Arc<dyn TokenIndex>,
    pub ledger: Arc<dyn ValidatorLedger>,
    pub moniker_source: Arc<dyn MonikerSource>,
}

impl Collaborators {
    /// Serve every remote port from one in-memory ledger.
    pub fn from_ledger(ledger: Arc<InMemoryLedger>, moniker_source: Arc<dyn MonikerSource>) -> Self {
        Self {
            signer_resolver: ledger.clone(),
            registry_v1: ledger.clone(),
            registry_v2: ledger.clone(),
            token_index: ledger.clone(),
            ledger,
            moniker_source,
        }
    }
}

/// Query surface over the validator set.
///
/// Construct with [`new`](Self::new), then call
/// [`initialize`](Self::initialize) once before serving lookups.
pub struct ValidatorSetService {
    config: ValidatorSetConfig,
    signers: SignerCache,
    monikers: Arc<MonikerStore>,
    aggregator: ValidatorAggregator,
}

impl ValidatorSetService {
    pub fn new(config: ValidatorSetConfig, collaborators: Collaborators) -> Self {
        let registry =
            RegistryVersionResolver::new(collaborators.registry_v1, collaborators.registry_v2);
        let aggregator = ValidatorAggregator::new(
            registry,
            collaborators.token_index,
            collaborators.ledger,
            config.static_ids.clone(),
        );

        Self {
            signers: SignerCache::new(collaborators.signer_resolver, config.signer_cache_capacity),
            monikers: Arc::new(MonikerStore::new(collaborators.moniker_source)),
            aggregator,
            config,
        }
    }

    /// Load the initial moniker mapping. A failing source fails startup.
    pub async fn initialize(&self) -> Result<MonikerDiff> {
        let diff = self.monikers.refresh().await?;
        info!("loaded {} validator monikers", diff.len());
        Ok(diff)
    }

    pub fn config(&self) -> &ValidatorSetConfig {
        &self.config
    }

    pub fn monikers(&self) -> Arc<MonikerStore> {
        self.monikers.clone()
    }

    /// Start periodic moniker refreshes at the configured interval.
    pub fn spawn_moniker_watcher(&self) -> tokio::task::JoinHandle<Result<()>> {
        self.monikers
            .clone()
            .start_watcher(self.config.moniker_refresh_interval())
    }

    pub async fn refresh_monikers(&self) -> Result<MonikerDiff> {
        self.monikers.refresh().await
    }

    pub fn moniker(&self, id: ValidatorId) -> String {
        self.monikers.lookup(id)
    }

    pub async fn signer_to_validator_id(
        &self,
        signer: &str,
        opts: &CallOptions,
    ) -> Result<ValidatorId> {
        self.signers.resolve(signer, opts).await
    }

    /// Moniker of the validator `signer` signs for.
    pub async fn moniker_for_signer(&self, signer: &str, opts: &CallOptions) -> Result<String> {
        let id = self.signers.resolve(signer, opts).await?;
        Ok(self.monikers.lookup(id))
    }

    pub fn signer_cache_stats(&self) -> CacheStats {
        self.signers.stats()
    }

    pub async fn registry_version(&self, opts: &CallOptions) -> Result<RegistryVersion> {
        self.aggregator.registry().detect_version(opts).await
    }

    pub async fn active_ids(&self, opts: &CallOptions) -> Result<BTreeSet<ValidatorId>> {
        self.aggregator.registry().active_ids(opts).await
    }

    pub async fn tracked_ids(&self, opts: &CallOptions) -> Result<Vec<ValidatorId>> {
        self.aggregator.tracked_ids(opts).await
    }

    pub async fn all_ids(&self, opts: &CallOptions) -> Result<Vec<ValidatorId>> {
        self.aggregator.all_ids(opts).await
    }

    pub async fn all_validators(&self, opts: &CallOptions) -> Result<Vec<ValidatorRecord>> {
        self.aggregator.all_validators(opts).await
    }

    pub async fn active_set(&self, opts: &CallOptions) -> Result<Vec<ValidatorRecord>> {
        self.aggregator.active_set(opts).await
    }

    pub async fn active_snapshot(&self, opts: &CallOptions) -> Result<ActiveSetSnapshot> {
        self.aggregator.active_snapshot(opts).await
    }
}
