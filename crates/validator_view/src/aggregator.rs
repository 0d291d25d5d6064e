//! Enumeration of the validator universe and the active set.

use crate::activity::is_active;
use crate::errors::*;
use crate::ports::{TokenIndex, ValidatorLedger};
use crate::registry::RegistryVersionResolver;
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use valset_types::{CallOptions, Epoch, ValidatorId, ValidatorRecord};

/// Active validators together with the epoch they were filtered against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSetSnapshot {
    pub epoch: Epoch,
    pub validators: Vec<ValidatorRecord>,
}

/// Composes the registry, token index and ledger into validator queries.
///
/// Every fan-out issues all sub-requests at once and fails as a whole when
/// any of them fails.
pub struct ValidatorAggregator {
    registry: RegistryVersionResolver,
    token_index: Arc<dyn TokenIndex>,
    ledger: Arc<dyn ValidatorLedger>,
    static_ids: Vec<ValidatorId>,
}

impl ValidatorAggregator {
    pub fn new(
        registry: RegistryVersionResolver,
        token_index: Arc<dyn TokenIndex>,
        ledger: Arc<dyn ValidatorLedger>,
        static_ids: Vec<ValidatorId>,
    ) -> Self {
        Self {
            registry,
            token_index,
            ledger,
            static_ids,
        }
    }

    pub fn registry(&self) -> &RegistryVersionResolver {
        &self.registry
    }

    /// Operationally tracked ids: the static override when configured,
    /// otherwise the registry's active ids.
    pub async fn tracked_ids(&self, opts: &CallOptions) -> Result<Vec<ValidatorId>> {
        if !self.static_ids.is_empty() {
            return Ok(self.static_ids.clone());
        }
        Ok(self.registry.active_ids(opts).await?.into_iter().collect())
    }

    /// Every id in the token index, in index order. Repeats are dropped.
    pub async fn all_ids(&self, opts: &CallOptions) -> Result<Vec<ValidatorId>> {
        let count = self.token_index.total_count(opts).await?;
        debug!("token index holds {} validators at {}", count, opts);

        let ids = try_join_all((0..count).map(|index| self.token_index.id_at_index(index, opts)))
            .await?;
        let mut seen = HashSet::with_capacity(ids.len());
        Ok(ids.into_iter().filter(|id| seen.insert(*id)).collect())
    }

    /// Full records for every id in the token index, unfiltered.
    pub async fn all_validators(&self, opts: &CallOptions) -> Result<Vec<ValidatorRecord>> {
        let ids = self.all_ids(opts).await?;
        self.records(&ids, opts).await
    }

    /// Records for `ids`, each tagged with the id it was fetched for.
    pub async fn records(
        &self,
        ids: &[ValidatorId],
        opts: &CallOptions,
    ) -> Result<Vec<ValidatorRecord>> {
        let records = try_join_all(ids.iter().map(|&id| async move {
            let mut record = self.ledger.validator_record(id, opts).await?;
            record.id = id;
            Ok::<_, ValidatorSetError>(record)
        }))
        .await?;
        Ok(records)
    }

    /// Validators active at the current epoch.
    pub async fn active_set(&self, opts: &CallOptions) -> Result<Vec<ValidatorRecord>> {
        Ok(self.active_snapshot(opts).await?.validators)
    }

    /// Like [`active_set`](Self::active_set) but also returns the epoch used.
    ///
    /// The epoch is read once, before the records. The two reads are not
    /// atomic; an epoch that advances in between is tolerated.
    pub async fn active_snapshot(&self, opts: &CallOptions) -> Result<ActiveSetSnapshot> {
        let epoch = self.ledger.current_epoch(opts).await?;
        let validators = self
            .all_validators(opts)
            .await?
            .into_iter()
            .filter(|record| is_active(record, epoch))
            .collect();
        Ok(ActiveSetSnapshot { epoch, validators })
    }
}
