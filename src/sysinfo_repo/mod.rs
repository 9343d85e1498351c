// Host capabilities: cumulative interface counters and boot time, via sysinfo.
// The accounting core only sees the CounterSource / BootClock traits.

use crate::error::{AccountingError, Result};
use crate::models::TrafficSnapshot;
use chrono::{DateTime, Local, Utc};
use std::sync::{Arc, Mutex};
use sysinfo::{Networks, System};
use tracing::instrument;

/// Format of boot-session keys; the same layout `uptime -s` prints.
pub const BOOT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cumulative sent/received bytes since boot, summed over matching interfaces.
/// Implementations may block; async callers go through [`sample_counters`].
pub trait CounterSource: Send + Sync + 'static {
    fn sample(&self, interface: Option<&str>) -> Result<TrafficSnapshot>;
}

/// Last boot timestamp of the host, rendered as a stable string.
pub trait BootClock: Send + Sync + 'static {
    fn boot_timestamp(&self) -> Result<String>;
}

/// Runs a counter sample on the blocking pool.
pub async fn sample_counters(
    source: Arc<dyn CounterSource>,
    interface: Option<String>,
) -> Result<TrafficSnapshot> {
    tokio::task::spawn_blocking(move || source.sample(interface.as_deref()))
        .await
        .map_err(|e| AccountingError::CounterSource(format!("sample task join: {}", e)))?
}

/// Reads the boot timestamp on the blocking pool.
pub async fn read_boot_timestamp(clock: Arc<dyn BootClock>) -> Result<String> {
    tokio::task::spawn_blocking(move || clock.boot_timestamp())
        .await
        .map_err(|e| AccountingError::BootTime(format!("boot time task join: {}", e)))?
}

pub struct SysinfoRepo {
    networks: Mutex<Networks>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        Self {
            networks: Mutex::new(Networks::new_with_refreshed_list()),
        }
    }
}

impl CounterSource for SysinfoRepo {
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "sample_counters"))]
    fn sample(&self, interface: Option<&str>) -> Result<TrafficSnapshot> {
        let mut networks = self
            .networks
            .lock()
            .map_err(|e| AccountingError::CounterSource(format!("networks lock poisoned: {}", e)))?;
        networks.refresh(true);

        let mut matched = 0usize;
        let total = networks
            .list()
            .iter()
            .filter(|(name, _)| interface.is_none_or(|wanted| wanted == name.as_str()))
            .fold(TrafficSnapshot::ZERO, |acc, (_, data)| {
                matched += 1;
                acc.saturating_add(TrafficSnapshot::new(
                    data.total_transmitted(),
                    data.total_received(),
                ))
            });

        if matched == 0 {
            return Err(AccountingError::CounterSource(match interface {
                Some(name) => format!("interface {:?} not found", name),
                None => "no network interfaces reported".into(),
            }));
        }
        Ok(total)
    }
}

/// Earliest plausible boot time (2000-01-01T00:00:00Z). Smaller values are
/// seconds since boot, which sysinfo reports when `/proc/stat` has no `btime`.
pub const MIN_BOOT_EPOCH_SECS: u64 = 946_684_800;

/// Boot time as Unix seconds, given what sysinfo reported and the current time.
pub fn boot_epoch_secs(reported: u64, now_secs: i64) -> Result<i64> {
    if reported == 0 {
        return Err(AccountingError::BootTime(
            "boot time unavailable on this platform".into(),
        ));
    }
    let secs = i64::try_from(reported)
        .map_err(|_| AccountingError::BootTime(format!("boot time out of range: {}", reported)))?;
    if reported < MIN_BOOT_EPOCH_SECS {
        return Ok(now_secs.saturating_sub(secs));
    }
    Ok(secs)
}

/// Renders Unix seconds as a local-time boot-session key.
pub fn render_boot_time(epoch_secs: i64) -> Result<String> {
    let boot = DateTime::from_timestamp(epoch_secs, 0)
        .ok_or_else(|| AccountingError::BootTime(format!("invalid boot time: {}", epoch_secs)))?;
    Ok(boot.with_timezone(&Local).format(BOOT_TIME_FORMAT).to_string())
}

impl BootClock for SysinfoRepo {
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "boot_timestamp"))]
    fn boot_timestamp(&self) -> Result<String> {
        let reported = System::boot_time();
        if reported != 0 && reported < MIN_BOOT_EPOCH_SECS {
            tracing::debug!(uptime_secs = reported, "boot time reported as uptime");
        }
        render_boot_time(boot_epoch_secs(reported, Utc::now().timestamp())?)
    }
}
