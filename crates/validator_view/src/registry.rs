//! Active validator ids across both operator-registry generations.

use crate::errors::*;
use crate::ports::{RegistryV1, RegistryV2, RemoteCallError};
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use valset_types::{CallOptions, OperatorStatus, RegistryVersion, ValidatorId};

/// Picks the authoritative registry schema on every call and collects the
/// ids of active validators from it.
#[derive(Clone)]
pub struct RegistryVersionResolver {
    v1: Arc<dyn RegistryV1>,
    v2: Arc<dyn RegistryV2>,
}

impl RegistryVersionResolver {
    pub fn new(v1: Arc<dyn RegistryV1>, v2: Arc<dyn RegistryV2>) -> Self {
        Self { v1, v2 }
    }

    /// Probe which schema is deployed at the reference point in `opts`.
    ///
    /// Never cached: the registry may be migrated between calls. A revert
    /// from the probe means the V1 shape is gone; other failures propagate.
    pub async fn detect_version(&self, opts: &CallOptions) -> Result<RegistryVersion> {
        let version = match self.v1.probe_version(opts).await {
            Ok(version) => version,
            Err(RemoteCallError::Reverted(reason)) => {
                debug!("registry v1 probe reverted at {}: {}", opts, reason);
                RegistryVersion::V2
            }
            Err(e) => return Err(e.into()),
        };
        debug!("registry {} is authoritative at {}", version, opts);
        Ok(version)
    }

    /// Ids of validators whose registry entry is active.
    pub async fn active_ids(&self, opts: &CallOptions) -> Result<BTreeSet<ValidatorId>> {
        match self.detect_version(opts).await? {
            RegistryVersion::V1 => self.active_ids_v1(opts).await,
            RegistryVersion::V2 => self.active_ids_v2(opts).await,
        }
    }

    async fn active_ids_v1(&self, opts: &CallOptions) -> Result<BTreeSet<ValidatorId>> {
        let operator_ids = self.v1.list_operator_ids(opts).await?;

        let records = try_join_all(
            operator_ids
                .iter()
                .map(|&operator_id| self.v1.operator_record(operator_id, opts)),
        )
        .await?;

        Ok(records
            .iter()
            .filter_map(|record| record.active_validator())
            .collect())
    }

    async fn active_ids_v2(&self, opts: &CallOptions) -> Result<BTreeSet<ValidatorId>> {
        let validator_ids = self.v2.list_validator_ids(opts).await?;

        let statuses = try_join_all(validator_ids.iter().map(|&id| async move {
            let status = self.v2.validator_status(id, opts).await?;
            Ok::<_, RemoteCallError>((id, status))
        }))
        .await?;

        Ok(statuses
            .into_iter()
            .filter(|(_, status)| *status == OperatorStatus::Active)
            .map(|(id, _)| id)
            .collect())
    }
}
