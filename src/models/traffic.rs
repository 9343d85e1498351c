// Ledger entry models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved ledger key holding the baseline absorbed by past resets.
pub const RESET_SUM_KEY: &str = "resetSum";

/// Cumulative byte counters for one boot session (or the baseline).
/// Field names match the on-disk ledger format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    #[serde(rename = "total_bytes_sent")]
    pub bytes_sent: u64,
    #[serde(rename = "total_bytes_recv")]
    pub bytes_recv: u64,
}

impl TrafficSnapshot {
    pub const ZERO: TrafficSnapshot = TrafficSnapshot {
        bytes_sent: 0,
        bytes_recv: 0,
    };

    pub fn new(bytes_sent: u64, bytes_recv: u64) -> Self {
        Self {
            bytes_sent,
            bytes_recv,
        }
    }

    pub fn saturating_add(self, other: TrafficSnapshot) -> Self {
        Self {
            bytes_sent: self.bytes_sent.saturating_add(other.bytes_sent),
            bytes_recv: self.bytes_recv.saturating_add(other.bytes_recv),
        }
    }

    pub fn saturating_sub(self, other: TrafficSnapshot) -> Self {
        Self {
            bytes_sent: self.bytes_sent.saturating_sub(other.bytes_sent),
            bytes_recv: self.bytes_recv.saturating_sub(other.bytes_recv),
        }
    }

    /// True when either direction is lower than in `previous`.
    pub fn regressed_from(&self, previous: &TrafficSnapshot) -> bool {
        self.bytes_sent < previous.bytes_sent || self.bytes_recv < previous.bytes_recv
    }
}

/// Identifies one continuous uptime period of the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BootSessionKey(String);

impl BootSessionKey {
    /// Returns `None` for empty keys and for the reserved baseline key.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == RESET_SUM_KEY {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BootSessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
