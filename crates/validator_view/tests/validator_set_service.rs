//! End-to-end behaviour of the validator-set service

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use valset_types::*;
use valset_view::*;

fn signer(id: ValidatorId) -> SignerAddress {
    let mut raw = [0u8; ADDRESS_BYTES];
    raw[12..].copy_from_slice(&id.to_be_bytes());
    SignerAddress::from_bytes(&raw)
}

fn validator(id: ValidatorId, amount: u128, status: ValidatorStatus) -> ValidatorRecord {
    ValidatorRecord::new(id, amount, status, 1, signer(id))
}

fn moniker_file(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

fn staked_ledger(version: RegistryVersion) -> InMemoryLedger {
    InMemoryLedger::new(version)
        .with_epoch(100)
        .with_validator(validator(10, 5, ValidatorStatus::Active))
        .with_validator(validator(20, 5, ValidatorStatus::Active).with_deactivation(101))
        .with_validator(validator(30, 5, ValidatorStatus::Active).with_deactivation(100))
        .with_validator(validator(40, 0, ValidatorStatus::Active))
        .with_operator(1, OperatorRecord::new(OperatorStatus::Active, Some(10)))
        .with_operator(2, OperatorRecord::new(OperatorStatus::Active, Some(20)))
        .with_operator(3, OperatorRecord::new(OperatorStatus::Inactive, Some(30)))
        .with_registry_status(10, OperatorStatus::Active)
        .with_registry_status(20, OperatorStatus::Active)
        .with_registry_status(30, OperatorStatus::Inactive)
}

fn service(
    ledger: Arc<InMemoryLedger>,
    monikers: &tempfile::NamedTempFile,
    config: ValidatorSetConfig,
) -> ValidatorSetService {
    let source = Arc::new(FileMonikerSource::new(monikers.path()));
    ValidatorSetService::new(config, Collaborators::from_ledger(ledger, source))
}

#[tokio::test]
async fn initialize_loads_monikers_and_refresh_is_idempotent() {
    let file = moniker_file(r#"{"10":"Alpha","20":"Beta"}"#);
    let svc = service(
        Arc::new(staked_ledger(RegistryVersion::V1)),
        &file,
        ValidatorSetConfig::default(),
    );

    let initial = svc.initialize().await.unwrap();
    assert_eq!(initial.len(), 2);
    let before = (svc.moniker(10), svc.moniker(20));

    assert!(svc.refresh_monikers().await.unwrap().is_empty());
    assert_eq!((svc.moniker(10), svc.moniker(20)), before);
    assert_eq!(svc.moniker(999), "Anonymous 999");
}

#[tokio::test]
async fn refresh_diff_after_source_edit() {
    let file = moniker_file(r#"{"1":"a","2":"b"}"#);
    let svc = service(
        Arc::new(staked_ledger(RegistryVersion::V1)),
        &file,
        ValidatorSetConfig::default(),
    );
    svc.initialize().await.unwrap();

    std::fs::write(file.path(), r#"{"1":"a","2":"c","3":"d"}"#).unwrap();
    let diff = svc.refresh_monikers().await.unwrap();
    let expected: MonikerDiff = [(2, "c"), (3, "d")]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();
    assert_eq!(diff, expected);
    assert_eq!(svc.monikers().snapshot().len(), 3);
    assert_eq!(svc.moniker(2), "c");
}

#[test]
fn unreadable_moniker_source_fails_initialize() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FileMonikerSource::new(dir.path().join("missing.json")));
    let ledger = Arc::new(staked_ledger(RegistryVersion::V1));
    let svc = ValidatorSetService::new(
        ValidatorSetConfig::default(),
        Collaborators::from_ledger(ledger, source),
    );

    let err = tokio_test::block_on(svc.initialize()).unwrap_err();
    assert!(err.is_source_error());
    assert!(svc.monikers().is_empty());
}

#[tokio::test]
async fn signer_lookups_are_cached() {
    let file = moniker_file(r#"{"10":"Alpha"}"#);
    let ledger = Arc::new(staked_ledger(RegistryVersion::V2));
    let svc = service(ledger.clone(), &file, ValidatorSetConfig::default());
    svc.initialize().await.unwrap();
    let opts = CallOptions::latest();
    let addr = signer(10).to_string().to_uppercase().replacen("0X", "0x", 1);

    assert_eq!(svc.signer_to_validator_id(&addr, &opts).await.unwrap(), 10);
    assert_eq!(svc.moniker_for_signer(signer(10).as_str(), &opts).await.unwrap(), "Alpha");
    assert_eq!(ledger.signer_lookups(), 1);
    assert_eq!(svc.signer_cache_stats().len, 1);
}

#[tokio::test]
async fn registry_generations_agree_and_follow_migration() {
    let file = moniker_file("{}");
    let ledger = Arc::new(staked_ledger(RegistryVersion::V1));
    let svc = service(ledger.clone(), &file, ValidatorSetConfig::default());
    let opts = CallOptions::latest();
    let expected: BTreeSet<ValidatorId> = [10, 20].into_iter().collect();

    assert_eq!(svc.registry_version(&opts).await.unwrap(), RegistryVersion::V1);
    assert_eq!(svc.active_ids(&opts).await.unwrap(), expected);

    ledger.migrate_registry(RegistryVersion::V2);
    assert_eq!(svc.registry_version(&opts).await.unwrap(), RegistryVersion::V2);
    assert_eq!(svc.active_ids(&opts).await.unwrap(), expected);
    assert_eq!(svc.tracked_ids(&opts).await.unwrap(), vec![10, 20]);
}

#[tokio::test]
async fn static_ids_override_tracked_ids() {
    let file = moniker_file("{}");
    let config = ValidatorSetConfig {
        static_ids: vec![99],
        ..ValidatorSetConfig::default()
    };
    let svc = service(Arc::new(staked_ledger(RegistryVersion::V1)), &file, config);
    assert_eq!(
        svc.tracked_ids(&CallOptions::latest()).await.unwrap(),
        vec![99]
    );
}

#[tokio::test]
async fn active_set_filters_at_current_epoch() {
    let file = moniker_file("{}");
    let svc = service(
        Arc::new(staked_ledger(RegistryVersion::V2)),
        &file,
        ValidatorSetConfig::default(),
    );
    let opts = CallOptions::latest();

    assert_eq!(svc.all_ids(&opts).await.unwrap(), vec![10, 20, 30, 40]);
    assert_eq!(svc.all_validators(&opts).await.unwrap().len(), 4);

    let snapshot = svc.active_snapshot(&opts).await.unwrap();
    assert_eq!(snapshot.epoch, 100);
    let active: Vec<_> = snapshot.validators.iter().map(|r| r.id).collect();
    assert_eq!(active, vec![10, 20]);
    assert_eq!(svc.active_set(&opts).await.unwrap(), snapshot.validators);
}

#[tokio::test]
async fn one_failed_record_aborts_all_validators() {
    let file = moniker_file("{}");
    let ledger = InMemoryLedger::new(RegistryVersion::V2)
        .with_validator(validator(1, 5, ValidatorStatus::Active))
        .with_validator(validator(2, 5, ValidatorStatus::Active))
        .with_validator(validator(3, 5, ValidatorStatus::Active))
        .failing_record(3);
    let svc = service(Arc::new(ledger), &file, ValidatorSetConfig::default());

    let result = svc.all_validators(&CallOptions::latest()).await;
    assert!(matches!(result, Err(ValidatorSetError::RemoteCall(_))));
    assert!(svc.active_set(&CallOptions::latest()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn zero_refresh_period_still_watches() {
    let file = moniker_file(r#"{"10":"Alpha"}"#);
    let config = ValidatorSetConfig {
        moniker_refresh_secs: 0,
        ..ValidatorSetConfig::default()
    };
    let svc = service(Arc::new(staked_ledger(RegistryVersion::V1)), &file, config);
    svc.initialize().await.unwrap();

    let watcher = svc.spawn_moniker_watcher();
    std::fs::write(file.path(), r#"{"10":"Gamma"}"#).unwrap();
    tokio::time::sleep(MIN_WATCH_PERIOD * 2).await;

    assert!(!watcher.is_finished());
    assert_eq!(svc.moniker(10), "Gamma");
    watcher.abort();
}

/// Ledger wrapper recording which port method saw which options.
struct RecordingLedger {
    inner: InMemoryLedger,
    seen: Mutex<Vec<(&'static str, CallOptions)>>,
}

impl RecordingLedger {
    fn new(inner: InMemoryLedger) -> Arc<Self> {
        Arc::new(Self {
            inner,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn record(&self, method: &'static str, opts: &CallOptions) {
        self.seen.lock().push((method, opts.clone()));
    }

    fn methods(&self) -> BTreeSet<&'static str> {
        self.seen.lock().iter().map(|(method, _)| *method).collect()
    }
}

#[async_trait]
impl SignerResolver for RecordingLedger {
    async fn signer_to_validator_id(
        &self,
        signer: &SignerAddress,
        opts: &CallOptions,
    ) -> RemoteResult<ValidatorId> {
        self.record("signer_to_validator_id", opts);
        self.inner.signer_to_validator_id(signer, opts).await
    }
}

#[async_trait]
impl RegistryV1 for RecordingLedger {
    async fn probe_version(&self, opts: &CallOptions) -> RemoteResult<RegistryVersion> {
        self.record("probe_version", opts);
        self.inner.probe_version(opts).await
    }

    async fn list_operator_ids(&self, opts: &CallOptions) -> RemoteResult<Vec<u64>> {
        self.record("list_operator_ids", opts);
        self.inner.list_operator_ids(opts).await
    }

    async fn operator_record(
        &self,
        operator_id: u64,
        opts: &CallOptions,
    ) -> RemoteResult<OperatorRecord> {
        self.record("operator_record", opts);
        self.inner.operator_record(operator_id, opts).await
    }
}

#[async_trait]
impl RegistryV2 for RecordingLedger {
    async fn list_validator_ids(&self, opts: &CallOptions) -> RemoteResult<Vec<ValidatorId>> {
        self.record("list_validator_ids", opts);
        self.inner.list_validator_ids(opts).await
    }

    async fn validator_status(
        &self,
        id: ValidatorId,
        opts: &CallOptions,
    ) -> RemoteResult<OperatorStatus> {
        self.record("validator_status", opts);
        self.inner.validator_status(id, opts).await
    }
}

#[async_trait]
impl TokenIndex for RecordingLedger {
    async fn total_count(&self, opts: &CallOptions) -> RemoteResult<u64> {
        self.record("total_count", opts);
        self.inner.total_count(opts).await
    }

    async fn id_at_index(&self, index: u64, opts: &CallOptions) -> RemoteResult<ValidatorId> {
        self.record("id_at_index", opts);
        self.inner.id_at_index(index, opts).await
    }
}

#[async_trait]
impl ValidatorLedger for RecordingLedger {
    async fn current_epoch(&self, opts: &CallOptions) -> RemoteResult<Epoch> {
        self.record("current_epoch", opts);
        self.inner.current_epoch(opts).await
    }

    async fn validator_record(
        &self,
        id: ValidatorId,
        opts: &CallOptions,
    ) -> RemoteResult<ValidatorRecord> {
        self.record("validator_record", opts);
        self.inner.validator_record(id, opts).await
    }
}

#[tokio::test]
async fn call_options_reach_every_remote_read() {
    let registry = Arc::new(staked_ledger(RegistryVersion::V2));
    let recording = RecordingLedger::new(staked_ledger(RegistryVersion::V2));
    let aggregator = ValidatorAggregator::new(
        RegistryVersionResolver::new(registry.clone(), registry),
        recording.clone(),
        recording.clone(),
        Vec::new(),
    );

    let opts = CallOptions::at_block(18_500_000);
    aggregator.active_set(&opts).await.unwrap();

    let seen = recording.seen.lock();
    // epoch + count + 4 indices + 4 records
    assert_eq!(seen.len(), 10);
    assert!(seen.iter().all(|(_, o)| o == &opts));
}

#[tokio::test]
async fn call_options_reach_every_port_through_the_service() {
    let file = moniker_file("{}");
    let recording = RecordingLedger::new(staked_ledger(RegistryVersion::V1));
    let collaborators = Collaborators {
        signer_resolver: recording.clone(),
        registry_v1: recording.clone(),
        registry_v2: recording.clone(),
        token_index: recording.clone(),
        ledger: recording.clone(),
        moniker_source: Arc::new(FileMonikerSource::new(file.path())),
    };
    let svc = ValidatorSetService::new(ValidatorSetConfig::default(), collaborators);
    let opts = CallOptions::at_block(18_500_000).with_timeout(Duration::from_secs(3));

    svc.active_ids(&opts).await.unwrap();
    recording.inner.migrate_registry(RegistryVersion::V2);
    svc.active_ids(&opts).await.unwrap();
    svc.active_set(&opts).await.unwrap();
    svc.signer_to_validator_id(signer(20).as_str(), &opts)
        .await
        .unwrap();

    let expected: BTreeSet<&'static str> = [
        "signer_to_validator_id",
        "probe_version",
        "list_operator_ids",
        "operator_record",
        "list_validator_ids",
        "validator_status",
        "total_count",
        "id_at_index",
        "current_epoch",
        "validator_record",
    ]
    .into_iter()
    .collect();
    assert_eq!(recording.methods(), expected);
    assert!(recording.seen.lock().iter().all(|(_, o)| o == &opts));
}
