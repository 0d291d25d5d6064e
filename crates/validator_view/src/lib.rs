//! Validator-set view
//!
//! Read-only view of a validator set held on an external ledger:
//! - Signer address → validator id resolution behind a bounded LRU cache
//! - Active validator ids across both operator-registry generations
//! - Full validator enumeration and the active set at the current epoch
//! - Validator monikers refreshed from a JSON source, reported as diffs

pub mod activity;
pub mod aggregator;
pub mod cache;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod monikers;
pub mod ports;
pub mod registry;
pub mod service;
pub mod signer;

pub use activity::*;
pub use aggregator::*;
pub use cache::*;
pub use config::*;
pub use errors::*;
pub use ledger::*;
pub use monikers::*;
pub use ports::*;
pub use registry::*;
pub use service::*;
pub use signer::*;
