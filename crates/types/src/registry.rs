//! Operator-registry schema types shared by both registry generations.

use crate::validator::ValidatorId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which operator-registry schema is authoritative on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryVersion {
    /// Operator ids mapped to validator ids through operator records
    V1,
    /// Validator ids exposed directly with a per-id status
    V2,
}

impl fmt::Display for RegistryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryVersion::V1 => f.write_str("v1"),
            RegistryVersion::V2 => f.write_str("v2"),
        }
    }
}

/// Status of an operator (V1) or validator (V2) in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorStatus {
    Inactive,
    Active,
    Jailed,
    Ejected,
}

/// Operator entry of the V1 registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorRecord {
    pub status: OperatorStatus,
    /// Validator backing the operator, if one has been assigned
    #[serde(default)]
    pub validator_id: Option<ValidatorId>,
}

impl OperatorRecord {
    pub fn new(status: OperatorStatus, validator_id: Option<ValidatorId>) -> Self {
        Self {
            status,
            validator_id,
        }
    }

    /// Validator id contributed to the active set, if any.
    pub fn active_validator(&self) -> Option<ValidatorId> {
        match self.status {
            OperatorStatus::Active => self.validator_id,
            _ => None,
        }
    }
}
