// Accounting loop: the single writer of the ledger and the reset state.
// Each tick: sample counters -> resolve boot session -> upsert -> persist -> reset policy.
// Ledger and config writes run on the blocking pool, outside the ledger lock.

use crate::boot_session::current_boot_session;
use crate::config::AppConfig;
use crate::error::{AccountingError, Result};
use crate::ledger::SharedLedger;
use crate::models::{BootSessionKey, TrafficSnapshot};
use crate::reset_policy::{ResetOutcome, ResetPolicy};
use crate::sysinfo_repo::{BootClock, CounterSource, sample_counters};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Duration, interval};
use tracing::Instrument;

/// Capabilities, shared ledger and shutdown for the loop.
pub struct WorkerDeps {
    pub counter_source: Arc<dyn CounterSource>,
    pub boot_clock: Arc<dyn BootClock>,
    pub ledger: SharedLedger,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// The loop owns the config from here on; it is the only code that rewrites it.
pub struct WorkerConfig {
    pub app_config: AppConfig,
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sample stored for the session; no reset was due.
    Recorded {
        session: BootSessionKey,
        snapshot: TrafficSnapshot,
    },
    /// Sample stored, then the monthly reset fired. `earlier_sessions` counts
    /// cleared sessions that belonged to a previous boot.
    Reset {
        outcome: ResetOutcome,
        earlier_sessions: usize,
    },
}

/// Counters reported in the periodic "accounting stats" log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub recorded: u64,
    pub skipped: u64,
    pub resets: u64,
}

pub struct AccountingLoop {
    counter_source: Arc<dyn CounterSource>,
    boot_clock: Arc<dyn BootClock>,
    ledger: SharedLedger,
    ledger_path: PathBuf,
    interface: Option<String>,
    policy: ResetPolicy,
    /// Resolved on the first successful tick; the host cannot reboot under a running loop.
    session: Option<BootSessionKey>,
    stats: LoopStats,
}

impl AccountingLoop {
    pub fn new(
        counter_source: Arc<dyn CounterSource>,
        boot_clock: Arc<dyn BootClock>,
        ledger: SharedLedger,
        config: WorkerConfig,
    ) -> Self {
        let WorkerConfig {
            app_config,
            config_path,
        } = config;
        Self {
            counter_source,
            boot_clock,
            ledger,
            ledger_path: app_config.data_path(),
            interface: app_config.interface_filter(),
            policy: ResetPolicy::new(app_config, config_path),
            session: None,
            stats: LoopStats::default(),
        }
    }

    pub fn policy(&self) -> &ResetPolicy {
        &self.policy
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn session(&self) -> Option<&BootSessionKey> {
        self.session.as_ref()
    }

    /// Runs one accounting cycle for calendar date `today`.
    ///
    /// Errors abort the remaining steps of this tick without touching the
    /// ledger further. Callers decide fatality via `AccountingError::is_fatal`.
    pub async fn tick(&mut self, today: NaiveDate) -> Result<TickOutcome> {
        self.stats.ticks += 1;
        let outcome = self.run_steps(today).await;
        match &outcome {
            Ok(TickOutcome::Recorded { .. }) => self.stats.recorded += 1,
            Ok(TickOutcome::Reset { .. }) => {
                self.stats.recorded += 1;
                self.stats.resets += 1;
            }
            Err(_) => self.stats.skipped += 1,
        }
        outcome
    }

    async fn boot_session(&mut self) -> Result<BootSessionKey> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        let known: Vec<String> = self
            .ledger
            .read()
            .await
            .sessions()
            .map(|(key, _)| key.to_string())
            .collect();
        let session = current_boot_session(self.boot_clock.clone(), &known).await?;
        tracing::info!(
            session = %session,
            existing = known.iter().any(|key| key == session.as_str()),
            "Boot session resolved"
        );
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn run_steps(&mut self, today: NaiveDate) -> Result<TickOutcome> {
        let snapshot = sample_counters(self.counter_source.clone(), self.interface.clone()).await?;
        let session = self.boot_session().await?;

        let working = {
            let mut ledger = self.ledger.write().await;
            if let Some(previous) = ledger.upsert_session(&session, snapshot)
                && snapshot.regressed_from(&previous)
            {
                tracing::warn!(
                    session = %session,
                    previous_sent = previous.bytes_sent,
                    previous_recv = previous.bytes_recv,
                    sent = snapshot.bytes_sent,
                    recv = snapshot.bytes_recv,
                    "counters went backwards within one boot session"
                );
            }
            ledger.clone()
        };
        let earlier_sessions = working
            .sessions()
            .filter(|(key, _)| *key != session.as_str())
            .count();

        // Disk writes run on the blocking pool with the ledger lock released.
        let ledger_path = self.ledger_path.clone();
        let policy = self.policy.clone();
        let (working, policy, result) = tokio::task::spawn_blocking(move || {
            let (mut working, mut policy) = (working, policy);
            let result = working
                .persist(&ledger_path)
                .and_then(|()| policy.evaluate(&mut working, &ledger_path, today));
            (working, policy, result)
        })
        .await
        .map_err(|e| AccountingError::LedgerIo(format!("persist task join: {}", e)))?;
        self.policy = policy;

        match result {
            Ok(Some(outcome)) => {
                // Single writer: nothing changed the shared ledger since the clone.
                *self.ledger.write().await = working;
                tracing::info!(
                    date = %outcome.date,
                    absorbed_sent = outcome.absorbed.bytes_sent,
                    absorbed_recv = outcome.absorbed.bytes_recv,
                    baseline_sent = outcome.baseline.bytes_sent,
                    baseline_recv = outcome.baseline.bytes_recv,
                    sessions_cleared = outcome.sessions_cleared,
                    "Traffic data has been reset"
                );
                if earlier_sessions > 0 {
                    tracing::warn!(
                        session = %session,
                        earlier_sessions,
                        "reset cleared sessions from earlier boots; totals read zero until this boot passes the absorbed amount"
                    );
                }
                Ok(TickOutcome::Reset {
                    outcome,
                    earlier_sessions,
                })
            }
            Ok(None) => Ok(TickOutcome::Recorded { session, snapshot }),
            Err(e) => {
                if e.is_fatal() {
                    // The reset reached the ledger file; mirror it before stopping.
                    *self.ledger.write().await = working;
                }
                Err(e)
            }
        }
    }
}

/// Spawns the accounting loop. The task ends on shutdown (Ok) or on a fatal
/// error such as a config write failing mid-reset (Err).
pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    let WorkerDeps {
        counter_source,
        boot_clock,
        ledger,
        mut shutdown_rx,
    } = deps;
    let sample_interval_ms = config.app_config.sample_interval_ms;
    let stats_log_interval = Duration::from_secs(config.app_config.stats_log_interval_secs);
    let mut accounting = AccountingLoop::new(counter_source, boot_clock, ledger, config);

    let span = tracing::span!(tracing::Level::DEBUG, "accounting", sample_interval_ms);
    tokio::spawn(
        async move {
            let today = chrono::Local::now().date_naive();
            tracing::info!(
                reset_day = accounting.policy().config().reset_day,
                next_reset = %accounting.policy().state().next_reset_date(today),
                "Accounting loop started"
            );

            let mut tick = interval(Duration::from_millis(sample_interval_ms));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut stats_log_tick = interval(stats_log_interval);
            stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let today = chrono::Local::now().date_naive();
                        match accounting.tick(today).await {
                            Ok(outcome) => tracing::trace!(?outcome, "tick complete"),
                            Err(e) if e.is_fatal() => {
                                tracing::error!(
                                    error = %e,
                                    kind = e.kind(),
                                    operation = "reset_traffic",
                                    "reset could not be recorded; stopping"
                                );
                                return Err(anyhow::Error::new(e));
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    kind = e.kind(),
                                    operation = "accounting_tick",
                                    "tick skipped"
                                );
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Accounting loop shutting down");
                        break;
                    }
                    _ = stats_log_tick.tick() => {
                        let stats = accounting.stats();
                        tracing::info!(
                            ticks = stats.ticks,
                            recorded = stats.recorded,
                            skipped = stats.skipped,
                            resets = stats.resets,
                            "accounting stats"
                        );
                    }
                }
            }
            Ok(())
        }
        .instrument(span),
    )
}
