//! Validator records as exposed by the staking ledger.

use crate::address::SignerAddress;
use serde::{Deserialize, Serialize};

/// Stable integer identifier of a validator on the ledger.
pub type ValidatorId = u64;

/// Ledger-maintained, monotonically non-decreasing epoch counter.
pub type Epoch = u64;

/// Sentinel deactivation epoch meaning "never scheduled to deactivate".
pub const NO_DEACTIVATION: Epoch = 0;

/// Lifecycle status of a validator as reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    Inactive,
    Active,
    Locked,
    Unstaked,
}

/// Full validator record fetched from the ledger.
///
/// Records are only held for the duration of a single query; nothing
/// caches them wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    /// Validator id, attached by the aggregator after the fetch
    #[serde(default)]
    pub id: ValidatorId,
    /// Staked amount in the ledger's smallest unit
    pub amount: u128,
    pub status: ValidatorStatus,
    #[serde(default)]
    pub activation_epoch: Epoch,
    /// `NO_DEACTIVATION` unless an unstake has been scheduled
    #[serde(default)]
    pub deactivation_epoch: Epoch,
    pub signer: SignerAddress,
}

impl ValidatorRecord {
    /// Create a record for a validator that has never been scheduled to
    /// deactivate.
    pub fn new(
        id: ValidatorId,
        amount: u128,
        status: ValidatorStatus,
        activation_epoch: Epoch,
        signer: SignerAddress,
    ) -> Self {
        Self {
            id,
            amount,
            status,
            activation_epoch,
            deactivation_epoch: NO_DEACTIVATION,
            signer,
        }
    }

    pub fn with_deactivation(mut self, epoch: Epoch) -> Self {
        self.deactivation_epoch = epoch;
        self
    }

    pub fn has_scheduled_deactivation(&self) -> bool {
        self.deactivation_epoch != NO_DEACTIVATION
    }
}
