// Query response models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::TrafficSnapshot;

/// Sentinel for live counter fields when the ad-hoc sample failed.
pub const UNAVAILABLE: i64 = -1;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Response of GET /total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalTrafficReport {
    pub total_bytes_sent: u64,
    pub total_bytes_received: u64,
    pub total_bytes_sent_mb: f64,
    pub total_bytes_received_mb: f64,
    pub current_bytes_sent: i64,
    pub current_bytes_received: i64,
    pub current_bytes_sent_mb: f64,
    pub current_bytes_received_mb: f64,
}

impl TotalTrafficReport {
    /// `current` is `None` when the live sample could not be taken.
    pub fn new(aggregate: TrafficSnapshot, current: Option<TrafficSnapshot>) -> Self {
        let (current_sent, current_recv) = match current {
            Some(c) => (clamp_i64(c.bytes_sent), clamp_i64(c.bytes_recv)),
            None => (UNAVAILABLE, UNAVAILABLE),
        };
        Self {
            total_bytes_sent: aggregate.bytes_sent,
            total_bytes_received: aggregate.bytes_recv,
            total_bytes_sent_mb: to_mb(aggregate.bytes_sent as f64),
            total_bytes_received_mb: to_mb(aggregate.bytes_recv as f64),
            current_bytes_sent: current_sent,
            current_bytes_received: current_recv,
            current_bytes_sent_mb: to_mb(current_sent as f64),
            current_bytes_received_mb: to_mb(current_recv as f64),
        }
    }
}

fn clamp_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn to_mb(bytes: f64) -> f64 {
    bytes / BYTES_PER_MB
}

/// Response of GET /api/ledger: the in-memory ledger as the worker last left it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerView {
    pub sessions: BTreeMap<String, TrafficSnapshot>,
    pub baseline: TrafficSnapshot,
    pub live_total: TrafficSnapshot,
    pub aggregate: TrafficSnapshot,
}
