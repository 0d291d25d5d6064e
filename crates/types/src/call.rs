//! Per-call options forwarded verbatim to every remote read.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Ledger reference point a read is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => f.write_str("latest"),
            BlockTag::Number(n) => write!(f, "#{n}"),
        }
    }
}

/// Opaque options passed through to the transport.
///
/// There is intentionally no `Default`: callers choose the reference point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOptions {
    pub block: BlockTag,
    /// Deadline enforced by the transport, not by the caller of the port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn latest() -> Self {
        Self {
            block: BlockTag::Latest,
            timeout: None,
        }
    }

    /// Pin every read to a historical block.
    pub fn at_block(number: u64) -> Self {
        Self {
            block: BlockTag::Number(number),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Display for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.block.fmt(f)
    }
}
