// Traffic ledger: boot session -> cumulative snapshot, plus the reset baseline
// under RESET_SUM_KEY. Persisted as a flat JSON object.

use crate::error::{AccountingError, Result};
use crate::models::{BootSessionKey, LedgerView, RESET_SUM_KEY, TrafficSnapshot};
use crate::persist;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// Ledger shared between the accounting loop (sole writer) and query handlers.
pub type SharedLedger = Arc<RwLock<TrafficLedger>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficLedger {
    entries: BTreeMap<String, TrafficSnapshot>,
}

impl TrafficLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from raw entries, e.g. a decoded file. The baseline may
    /// be present under RESET_SUM_KEY.
    pub fn from_entries(entries: BTreeMap<String, TrafficSnapshot>) -> Self {
        Self { entries }
    }

    pub fn into_shared(self) -> SharedLedger {
        Arc::new(RwLock::new(self))
    }

    /// Reads the ledger at `path`. A missing file yields an empty ledger that
    /// is written out immediately, so the file exists from the first run on.
    #[instrument(skip(path), fields(operation = "load_ledger", path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let ledger = Self::new();
            ledger.persist(path)?;
            tracing::info!(path = %path.display(), "Created new traffic ledger");
            return Ok(ledger);
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AccountingError::LedgerIo(format!("read {}: {}", path.display(), e)))?;
        let entries: BTreeMap<String, TrafficSnapshot> = serde_json::from_str(&raw)
            .map_err(|e| AccountingError::LedgerIo(format!("parse {}: {}", path.display(), e)))?;
        tracing::debug!(entries = entries.len(), "Loaded traffic ledger");
        Ok(Self { entries })
    }

    /// Writes the full ledger atomically (temp file + fsync + rename).
    pub fn persist(&self, path: &Path) -> Result<()> {
        persist::write_json_atomic(path, &self.entries)
            .map_err(|e| AccountingError::LedgerIo(format!("write {}: {}", path.display(), e)))
    }

    /// Replaces the snapshot for `key` and returns the previous one. Counters are
    /// cumulative since boot, so the latest sample is the session's total.
    pub fn upsert_session(
        &mut self,
        key: &BootSessionKey,
        snapshot: TrafficSnapshot,
    ) -> Option<TrafficSnapshot> {
        self.entries.insert(key.as_str().to_string(), snapshot)
    }

    pub fn session(&self, key: &BootSessionKey) -> Option<TrafficSnapshot> {
        self.entries.get(key.as_str()).copied()
    }

    /// Live sessions, excluding the baseline entry.
    pub fn sessions(&self) -> impl Iterator<Item = (&str, &TrafficSnapshot)> {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != RESET_SUM_KEY)
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn session_count(&self) -> usize {
        self.sessions().count()
    }

    pub fn baseline(&self) -> TrafficSnapshot {
        self.entries
            .get(RESET_SUM_KEY)
            .copied()
            .unwrap_or(TrafficSnapshot::ZERO)
    }

    pub fn live_total(&self) -> TrafficSnapshot {
        self.sessions()
            .fold(TrafficSnapshot::ZERO, |acc, (_, s)| acc.saturating_add(*s))
    }

    /// Live sum minus baseline, per direction, floored at zero.
    pub fn aggregate(&self) -> TrafficSnapshot {
        self.live_total().saturating_sub(self.baseline())
    }

    /// Folds the current aggregate into the baseline and drops every live
    /// session. Returns the amount absorbed.
    pub fn absorb_into_baseline(&mut self) -> TrafficSnapshot {
        let absorbed = self.aggregate();
        let baseline = self.baseline().saturating_add(absorbed);
        self.entries.clear();
        self.entries.insert(RESET_SUM_KEY.to_string(), baseline);
        absorbed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn view(&self) -> LedgerView {
        LedgerView {
            sessions: self
                .sessions()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            baseline: self.baseline(),
            live_total: self.live_total(),
            aggregate: self.aggregate(),
        }
    }
}
