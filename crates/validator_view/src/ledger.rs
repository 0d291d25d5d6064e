//! In-memory ledger implementing every collaborator port.
//!
//! Serves one mutable snapshot regardless of the block pinned in
//! [`CallOptions`]. Used by the node binary for offline snapshots and by
//! tests, which can also inject per-call failures.

use crate::ports::*;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use valset_types::{
    CallOptions, Epoch, OperatorRecord, OperatorStatus, RegistryVersion, SignerAddress,
    ValidatorId, ValidatorRecord,
};

/// Serializable ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub epoch: Epoch,
    pub registry_version: RegistryVersion,
    /// V1 operator id → operator record
    #[serde(default)]
    pub operators: BTreeMap<u64, OperatorRecord>,
    /// V2 validator id → registry status
    #[serde(default)]
    pub registry_statuses: BTreeMap<ValidatorId, OperatorStatus>,
    #[serde(default)]
    pub validators: BTreeMap<ValidatorId, ValidatorRecord>,
    /// Token index order; defaults to ascending validator ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_order: Option<Vec<ValidatorId>>,
}

impl LedgerSnapshot {
    pub fn empty(registry_version: RegistryVersion) -> Self {
        Self {
            epoch: 0,
            registry_version,
            operators: BTreeMap::new(),
            registry_statuses: BTreeMap::new(),
            validators: BTreeMap::new(),
            token_order: None,
        }
    }

    fn token_ids(&self) -> Vec<ValidatorId> {
        self.token_order
            .clone()
            .unwrap_or_else(|| self.validators.keys().copied().collect())
    }
}

#[derive(Debug, Default)]
struct FaultPlan {
    probe: Option<RemoteCallError>,
    operators: BTreeSet<u64>,
    indices: BTreeSet<u64>,
    statuses: BTreeSet<ValidatorId>,
    records: BTreeSet<ValidatorId>,
    epoch: bool,
}

/// Ledger backed by a [`LedgerSnapshot`] held in memory.
#[derive(Debug)]
pub struct InMemoryLedger {
    state: RwLock<LedgerSnapshot>,
    faults: RwLock<FaultPlan>,
    signer_lookups: AtomicUsize,
    record_fetches: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new(registry_version: RegistryVersion) -> Self {
        Self::from_snapshot(LedgerSnapshot::empty(registry_version))
    }

    /// Serve `snapshot`. Each record's `id` is taken from its map key.
    pub fn from_snapshot(mut snapshot: LedgerSnapshot) -> Self {
        for (id, record) in snapshot.validators.iter_mut() {
            record.id = *id;
        }
        Self {
            state: RwLock::new(snapshot),
            faults: RwLock::new(FaultPlan::default()),
            signer_lookups: AtomicUsize::new(0),
            record_fetches: AtomicUsize::new(0),
        }
    }

    /// Load a snapshot from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("failed to read ledger snapshot {}: {}", path.display(), e))?;
        let snapshot: LedgerSnapshot = serde_json::from_slice(&raw).map_err(|e| {
            anyhow::anyhow!("failed to parse ledger snapshot {}: {}", path.display(), e)
        })?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn with_epoch(self, epoch: Epoch) -> Self {
        self.set_epoch(epoch);
        self
    }

    pub fn with_validator(self, record: ValidatorRecord) -> Self {
        self.upsert_validator(record);
        self
    }

    pub fn with_operator(self, operator_id: u64, record: OperatorRecord) -> Self {
        self.state.write().operators.insert(operator_id, record);
        self
    }

    pub fn with_registry_status(self, id: ValidatorId, status: OperatorStatus) -> Self {
        self.state.write().registry_statuses.insert(id, status);
        self
    }

    /// Make the registry shape probe fail with `error`.
    pub fn failing_probe(self, error: RemoteCallError) -> Self {
        self.faults.write().probe = Some(error);
        self
    }

    /// Make V1 operator record reads for `operator_id` fail.
    pub fn failing_operator(self, operator_id: u64) -> Self {
        self.faults.write().operators.insert(operator_id);
        self
    }

    /// Make token index reads at `index` fail.
    pub fn failing_index(self, index: u64) -> Self {
        self.faults.write().indices.insert(index);
        self
    }

    /// Make V2 status reads for `id` fail.
    pub fn failing_status(self, id: ValidatorId) -> Self {
        self.faults.write().statuses.insert(id);
        self
    }

    /// Make record reads for `id` fail.
    pub fn failing_record(self, id: ValidatorId) -> Self {
        self.faults.write().records.insert(id);
        self
    }

    pub fn failing_epoch(self) -> Self {
        self.faults.write().epoch = true;
        self
    }

    pub fn set_epoch(&self, epoch: Epoch) {
        self.state.write().epoch = epoch;
    }

    pub fn upsert_validator(&self, record: ValidatorRecord) {
        self.state.write().validators.insert(record.id, record);
    }

    /// Switch the authoritative registry schema.
    pub fn migrate_registry(&self, version: RegistryVersion) {
        self.state.write().registry_version = version;
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().clone()
    }

    /// Number of signer resolutions served so far.
    pub fn signer_lookups(&self) -> usize {
        self.signer_lookups.load(Ordering::SeqCst)
    }

    /// Number of validator record reads served so far.
    pub fn record_fetches(&self) -> usize {
        self.record_fetches.load(Ordering::SeqCst)
    }
}

fn reverted(reason: impl Into<String>) -> RemoteCallError {
    RemoteCallError::Reverted(reason.into())
}

#[async_trait]
impl SignerResolver for InMemoryLedger {
    async fn signer_to_validator_id(
        &self,
        signer: &SignerAddress,
        _opts: &CallOptions,
    ) -> RemoteResult<ValidatorId> {
        self.signer_lookups.fetch_add(1, Ordering::SeqCst);
        self.state
            .read()
            .validators
            .iter()
            .find(|(_, record)| &record.signer == signer)
            .map(|(id, _)| *id)
            .ok_or_else(|| reverted(format!("no validator for signer {signer}")))
    }
}

#[async_trait]
impl RegistryV1 for InMemoryLedger {
    async fn probe_version(&self, _opts: &CallOptions) -> RemoteResult<RegistryVersion> {
        if let Some(error) = self.faults.read().probe.clone() {
            return Err(error);
        }
        match self.state.read().registry_version {
            RegistryVersion::V1 => Ok(RegistryVersion::V1),
            RegistryVersion::V2 => Err(reverted("operator registry v1 not deployed")),
        }
    }

    async fn list_operator_ids(&self, _opts: &CallOptions) -> RemoteResult<Vec<u64>> {
        Ok(self.state.read().operators.keys().copied().collect())
    }

    async fn operator_record(
        &self,
        operator_id: u64,
        _opts: &CallOptions,
    ) -> RemoteResult<OperatorRecord> {
        if self.faults.read().operators.contains(&operator_id) {
            return Err(RemoteCallError::Transport(format!(
                "operator read for {operator_id} failed"
            )));
        }
        self.state
            .read()
            .operators
            .get(&operator_id)
            .cloned()
            .ok_or_else(|| reverted(format!("unknown operator {operator_id}")))
    }
}

#[async_trait]
impl RegistryV2 for InMemoryLedger {
    async fn list_validator_ids(&self, _opts: &CallOptions) -> RemoteResult<Vec<ValidatorId>> {
        Ok(self.state.read().registry_statuses.keys().copied().collect())
    }

    async fn validator_status(
        &self,
        id: ValidatorId,
        _opts: &CallOptions,
    ) -> RemoteResult<OperatorStatus> {
        if self.faults.read().statuses.contains(&id) {
            return Err(RemoteCallError::Transport(format!("status read for {id} failed")));
        }
        self.state
            .read()
            .registry_statuses
            .get(&id)
            .copied()
            .ok_or_else(|| reverted(format!("unknown validator {id}")))
    }
}

#[async_trait]
impl TokenIndex for InMemoryLedger {
    async fn total_count(&self, _opts: &CallOptions) -> RemoteResult<u64> {
        Ok(self.state.read().token_ids().len() as u64)
    }

    async fn id_at_index(&self, index: u64, _opts: &CallOptions) -> RemoteResult<ValidatorId> {
        if self.faults.read().indices.contains(&index) {
            return Err(RemoteCallError::Timeout);
        }
        let ids = self.state.read().token_ids();
        usize::try_from(index)
            .ok()
            .and_then(|i| ids.get(i).copied())
            .ok_or_else(|| reverted(format!("token index {index} out of bounds")))
    }
}

#[async_trait]
impl ValidatorLedger for InMemoryLedger {
    async fn current_epoch(&self, _opts: &CallOptions) -> RemoteResult<Epoch> {
        if self.faults.read().epoch {
            return Err(RemoteCallError::Timeout);
        }
        Ok(self.state.read().epoch)
    }

    async fn validator_record(
        &self,
        id: ValidatorId,
        _opts: &CallOptions,
    ) -> RemoteResult<ValidatorRecord> {
        self.record_fetches.fetch_add(1, Ordering::SeqCst);
        if self.faults.read().records.contains(&id) {
            return Err(RemoteCallError::Transport(format!("record read for {id} failed")));
        }
        self.state
            .read()
            .validators
            .get(&id)
            .cloned()
            .ok_or_else(|| reverted(format!("unknown validator {id}")))
    }
}
