//! Read-only collaborators the view depends on.
//!
//! Every remote read takes the caller's [`CallOptions`] and must forward it
//! unchanged to the transport. Implementations own retries and deadlines.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use valset_types::{
    CallOptions, Epoch, OperatorRecord, OperatorStatus, RegistryVersion, SignerAddress,
    ValidatorId, ValidatorRecord,
};

/// Failure of a remote collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteCallError {
    #[error("remote transport error: {0}")]
    Transport(String),

    #[error("failed to decode remote response: {0}")]
    Decode(String),

    #[error("remote call reverted: {0}")]
    Reverted(String),

    #[error("remote call timed out")]
    Timeout,
}

impl From<anyhow::Error> for RemoteCallError {
    fn from(value: anyhow::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteCallError>;

/// Maps a signer address to the validator it signs for.
#[async_trait]
pub trait SignerResolver: Send + Sync {
    async fn signer_to_validator_id(
        &self,
        signer: &SignerAddress,
        opts: &CallOptions,
    ) -> RemoteResult<ValidatorId>;
}

/// First-generation operator registry.
#[async_trait]
pub trait RegistryV1: Send + Sync {
    /// Shape probe. `Ok(V1)` when the deployed registry answers in the V1
    /// shape. A revert is read as "not V1" by the resolver.
    async fn probe_version(&self, opts: &CallOptions) -> RemoteResult<RegistryVersion>;

    async fn list_operator_ids(&self, opts: &CallOptions) -> RemoteResult<Vec<u64>>;

    async fn operator_record(
        &self,
        operator_id: u64,
        opts: &CallOptions,
    ) -> RemoteResult<OperatorRecord>;
}

/// Second-generation registry exposing validator ids directly.
#[async_trait]
pub trait RegistryV2: Send + Sync {
    async fn list_validator_ids(&self, opts: &CallOptions) -> RemoteResult<Vec<ValidatorId>>;

    async fn validator_status(
        &self,
        id: ValidatorId,
        opts: &CallOptions,
    ) -> RemoteResult<OperatorStatus>;
}

/// Enumerable index over every validator ever minted.
#[async_trait]
pub trait TokenIndex: Send + Sync {
    async fn total_count(&self, opts: &CallOptions) -> RemoteResult<u64>;

    async fn id_at_index(&self, index: u64, opts: &CallOptions) -> RemoteResult<ValidatorId>;
}

/// Staking ledger holding validator records and the epoch counter.
#[async_trait]
pub trait ValidatorLedger: Send + Sync {
    async fn current_epoch(&self, opts: &CallOptions) -> RemoteResult<Epoch>;

    async fn validator_record(
        &self,
        id: ValidatorId,
        opts: &CallOptions,
    ) -> RemoteResult<ValidatorRecord>;
}

/// Byte source for the moniker mapping. Re-read in full on every refresh.
#[async_trait]
pub trait MonikerSource: Send + Sync {
    /// Human readable location, used in errors and logs.
    fn describe(&self) -> String;

    async fn read(&self) -> io::Result<Vec<u8>>;
}

/// Moniker source backed by a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileMonikerSource {
    path: PathBuf,
}

impl FileMonikerSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MonikerSource for FileMonikerSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn file_source_rereads_on_every_call() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"1\":\"alpha\"}}").unwrap();
        let source = FileMonikerSource::new(file.path());

        assert_eq!(source.read().await.unwrap(), br#"{"1":"alpha"}"#.to_vec());

        std::fs::write(file.path(), br#"{"1":"beta"}"#).unwrap();
        assert_eq!(source.read().await.unwrap(), br#"{"1":"beta"}"#.to_vec());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileMonikerSource::new(dir.path().join("absent.json"));
        let err = source.read().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(source.describe().ends_with("absent.json"));
    }

    #[test]
    fn anyhow_errors_become_transport_failures() {
        let err: RemoteCallError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err, RemoteCallError::Transport("connection reset".into()));
    }
}
