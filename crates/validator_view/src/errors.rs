//! Error types for the validator-set view

use crate::ports::RemoteCallError;
use thiserror::Error;
use valset_types::AddressError;

#[derive(Error, Debug)]
pub enum ValidatorSetError {
    #[error("Moniker source {path} unavailable: {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Moniker source {path} is malformed: {source}")]
    SourceMalformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Moniker source {path} has non-canonical validator id {key:?}")]
    InvalidMonikerKey { path: String, key: String },

    #[error(transparent)]
    RemoteCall(#[from] RemoteCallError),

    #[error("Invalid signer address: {0}")]
    InvalidSigner(#[from] AddressError),
}

impl ValidatorSetError {
    /// True when the moniker source could not be read or parsed.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            ValidatorSetError::SourceUnavailable { .. }
                | ValidatorSetError::SourceMalformed { .. }
                | ValidatorSetError::InvalidMonikerKey { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ValidatorSetError>;
