//! Runtime settings for the validator-set view

use crate::signer::DEFAULT_SIGNER_CACHE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use valset_types::ValidatorId;

/// Default moniker refresh period in seconds.
pub const DEFAULT_MONIKER_REFRESH_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSetConfig {
    /// Operational override for tracked ids; empty means "ask the registry"
    pub static_ids: Vec<ValidatorId>,
    pub signer_cache_capacity: usize,
    pub moniker_refresh_secs: u64,
}

impl Default for ValidatorSetConfig {
    fn default() -> Self {
        Self {
            static_ids: Vec::new(),
            signer_cache_capacity: DEFAULT_SIGNER_CACHE_CAPACITY,
            moniker_refresh_secs: DEFAULT_MONIKER_REFRESH_SECS,
        }
    }
}

impl ValidatorSetConfig {
    pub fn moniker_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.moniker_refresh_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: ValidatorSetConfig = serde_json::from_str(r#"{"static_ids":[3,1]}"#).unwrap();
        assert_eq!(config.static_ids, vec![3, 1]);
        assert_eq!(config.signer_cache_capacity, 500);
        assert_eq!(config.moniker_refresh_interval(), Duration::from_secs(300));
    }
}
