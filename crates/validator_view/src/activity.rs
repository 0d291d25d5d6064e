//! Validator activity predicate.
//!
//! Must agree exactly with the ledger's own enforcement.

use valset_types::{Epoch, ValidatorRecord, ValidatorStatus, NO_DEACTIVATION};

/// Whether `record` counts as active at `epoch`.
///
/// Requires non-zero stake, `Active` status, and a deactivation epoch that is
/// either the `NO_DEACTIVATION` sentinel or strictly after `epoch`.
pub fn is_active(record: &ValidatorRecord, epoch: Epoch) -> bool {
    record.amount > 0
        && (record.deactivation_epoch == NO_DEACTIVATION || record.deactivation_epoch > epoch)
        && record.status == ValidatorStatus::Active
}
