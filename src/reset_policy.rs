// Monthly reset: once per calendar occurrence of reset_day, fold the reported
// total into the baseline and drop the live sessions.
//
// Armed: no reset recorded at or after this month's boundary yet.
// Fired: last_reset_date >= this month's boundary. Re-arms implicitly when the
// calendar reaches the next month's boundary computation.

use crate::config::AppConfig;
use crate::error::Result;
use crate::ledger::TrafficLedger;
use crate::models::TrafficSnapshot;
use chrono::{Datelike, Months, NaiveDate};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPhase {
    Armed,
    Fired,
}

/// Reset boundary for `reset_day` in the given month. Days past the end of the
/// month clamp to its last day (31 in February is Feb 28 or 29).
pub fn reset_boundary(reset_day: u32, year: i32, month: u32) -> Option<NaiveDate> {
    (1..=reset_day.clamp(1, 31))
        .rev()
        .find_map(|day| NaiveDate::from_ymd_opt(year, month, day))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetState {
    pub reset_day: u32,
    pub last_reset_date: Option<NaiveDate>,
}

impl ResetState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            reset_day: config.reset_day,
            last_reset_date: config.last_reset_date,
        }
    }

    /// This month's boundary as seen from `today`.
    pub fn boundary(&self, today: NaiveDate) -> NaiveDate {
        reset_boundary(self.reset_day, today.year(), today.month()).unwrap_or(today)
    }

    pub fn phase(&self, today: NaiveDate) -> ResetPhase {
        let boundary = self.boundary(today);
        match self.last_reset_date {
            Some(last) if last >= boundary => ResetPhase::Fired,
            _ => ResetPhase::Armed,
        }
    }

    /// Armed and the boundary has been reached (boundaries are at midnight).
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.phase(today) == ResetPhase::Armed && today >= self.boundary(today)
    }

    /// Date the next reset will fire: today when due, otherwise the upcoming boundary.
    pub fn next_reset_date(&self, today: NaiveDate) -> NaiveDate {
        let boundary = self.boundary(today);
        if self.is_due(today) {
            return today;
        }
        if today < boundary {
            return boundary;
        }
        today
            .with_day(1)
            .and_then(|first| first.checked_add_months(Months::new(1)))
            .and_then(|next| reset_boundary(self.reset_day, next.year(), next.month()))
            .unwrap_or(boundary)
    }
}

/// What a fired reset did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOutcome {
    pub date: NaiveDate,
    /// Aggregate folded into the baseline.
    pub absorbed: TrafficSnapshot,
    /// Baseline after the reset.
    pub baseline: TrafficSnapshot,
    pub sessions_cleared: usize,
}

/// Owns the config (the persisted half of the reset state) and applies resets.
#[derive(Debug, Clone)]
pub struct ResetPolicy {
    config: AppConfig,
    config_path: PathBuf,
}

impl ResetPolicy {
    pub fn new(config: AppConfig, config_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            config_path: config_path.into(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> ResetState {
        ResetState::from_config(&self.config)
    }

    /// Applies the reset if it is due; a no-op returning `Ok(None)` otherwise.
    ///
    /// The ledger is written before the config. A failed ledger write restores
    /// the in-memory ledger and leaves the policy armed, so the next tick retries.
    /// A failed config write after the ledger landed is returned as `ConfigIo`.
    pub fn evaluate(
        &mut self,
        ledger: &mut TrafficLedger,
        ledger_path: &Path,
        today: NaiveDate,
    ) -> Result<Option<ResetOutcome>> {
        if !self.state().is_due(today) {
            return Ok(None);
        }

        let before = ledger.clone();
        let sessions_cleared = ledger.session_count();
        let absorbed = ledger.absorb_into_baseline();
        if let Err(e) = ledger.persist(ledger_path) {
            *ledger = before;
            return Err(e);
        }

        self.config.last_reset_date = Some(match self.config.last_reset_date {
            Some(last) => last.max(today),
            None => today,
        });
        self.config.save(&self.config_path)?;

        Ok(Some(ResetOutcome {
            date: today,
            absorbed,
            baseline: ledger.baseline(),
            sessions_cleared,
        }))
    }
}
