//! Validator id → human readable moniker mapping.
//!
//! The store accumulates: a refresh inserts new ids and overwrites changed
//! labels but never drops ids that vanished from the source.

use crate::errors::*;
use crate::ports::MonikerSource;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use valset_types::ValidatorId;

/// Labels that changed in one refresh.
pub type MonikerDiff = BTreeMap<ValidatorId, String>;

/// Shortest period the watcher accepts.
pub const MIN_WATCH_PERIOD: Duration = Duration::from_secs(1);

/// Process-lifetime moniker cache fed by a [`MonikerSource`].
pub struct MonikerStore {
    source: Arc<dyn MonikerSource>,
    entries: RwLock<HashMap<ValidatorId, String>>,
}

impl MonikerStore {
    /// Create an empty store. Nothing is read until [`refresh`](Self::refresh).
    pub fn new(source: Arc<dyn MonikerSource>) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Re-read the source and merge it into the store.
    ///
    /// Returns only the entries that were added or changed. On a read or
    /// parse failure the store is left exactly as it was.
    pub async fn refresh(&self) -> Result<MonikerDiff> {
        let raw = self
            .source
            .read()
            .await
            .map_err(|source| ValidatorSetError::SourceUnavailable {
                path: self.source.describe(),
                source,
            })?;

        let labels: BTreeMap<String, String> =
            serde_json::from_slice(&raw).map_err(|source| ValidatorSetError::SourceMalformed {
                path: self.source.describe(),
                source,
            })?;

        let candidate = labels
            .into_iter()
            .map(|(key, label)| Ok((self.parse_key(&key)?, label)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(self.merge(candidate))
    }

    /// Keys must be in the decimal form `lookup` formats; "01" or " 1" are
    /// rejected.
    fn parse_key(&self, key: &str) -> Result<ValidatorId> {
        match key.parse::<ValidatorId>() {
            Ok(id) if id.to_string() == key => Ok(id),
            _ => Err(ValidatorSetError::InvalidMonikerKey {
                path: self.source.describe(),
                key: key.to_string(),
            }),
        }
    }

    fn merge(&self, candidate: BTreeMap<ValidatorId, String>) -> MonikerDiff {
        let mut entries = self.entries.write();
        let mut diff = MonikerDiff::new();

        for (id, label) in candidate {
            if entries.get(&id) == Some(&label) {
                continue;
            }
            entries.insert(id, label.clone());
            diff.insert(id, label);
        }

        diff
    }

    /// Label for `id`, or `Anonymous <id>` when none is known.
    pub fn lookup(&self, id: ValidatorId) -> String {
        self.get(id).unwrap_or_else(|| anonymous_moniker(id))
    }

    /// Stored label for `id`, if any.
    pub fn get(&self, id: ValidatorId) -> Option<String> {
        self.entries.read().get(&id).cloned()
    }

    /// Copy of every stored label.
    pub fn snapshot(&self) -> BTreeMap<ValidatorId, String> {
        self.entries
            .read()
            .iter()
            .map(|(id, label)| (*id, label.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refresh every `period` until a refresh fails.
    ///
    /// Periods shorter than [`MIN_WATCH_PERIOD`] are raised to it. Each
    /// non-empty diff is logged. The task ends with the first refresh error,
    /// which the owner observes through the join handle.
    pub fn start_watcher(
        self: Arc<Self>,
        period: Duration,
    ) -> tokio::task::JoinHandle<Result<()>> {
        let period = period.max(MIN_WATCH_PERIOD);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; callers refresh in initialize().
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match self.refresh().await {
                    Ok(diff) if diff.is_empty() => {}
                    Ok(diff) => {
                        for (id, label) in &diff {
                            info!("moniker for validator {} is now {:?}", id, label);
                        }
                    }
                    Err(e) => {
                        warn!("moniker watcher stopped: {}", e);
                        return Err(e);
                    }
                }
            }
        })
    }
}

/// Placeholder label for a validator without a moniker.
pub fn anonymous_moniker(id: ValidatorId) -> String {
    format!("Anonymous {id}")
}
