// Boot session identification: the host's last-boot timestamp is the ledger key,
// since interface counters restart from zero on every boot.

use crate::error::{AccountingError, Result};
use crate::models::{BootSessionKey, RESET_SUM_KEY};
use crate::sysinfo_repo::{BOOT_TIME_FORMAT, BootClock, read_boot_timestamp};
use chrono::NaiveDateTime;
use std::sync::Arc;

/// Largest gap, in seconds, between a fresh boot timestamp and a known key
/// for both to name the same boot. Platform boot times jitter across second
/// boundaries within one boot.
pub const BOOT_TIME_TOLERANCE_SECS: i64 = 5;

/// Canonical key for a raw boot timestamp. Empty output or a value colliding
/// with the baseline key is a BootTime error.
pub fn boot_session_key(raw: &str) -> Result<BootSessionKey> {
    BootSessionKey::new(raw).ok_or_else(|| {
        AccountingError::BootTime(format!(
            "unusable boot timestamp {:?} (empty or reserved {:?})",
            raw.trim(),
            RESET_SUM_KEY
        ))
    })
}

/// Parses a key written in [`BOOT_TIME_FORMAT`]; other keys are opaque.
pub fn parse_boot_timestamp(key: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(key.trim(), BOOT_TIME_FORMAT).ok()
}

/// Key for `raw`, reusing the closest `known` key within
/// [`BOOT_TIME_TOLERANCE_SECS`]. Keys that do not parse as timestamps only
/// match exactly.
pub fn resolve_session_key<'a>(
    raw: &str,
    known: impl IntoIterator<Item = &'a str>,
) -> Result<BootSessionKey> {
    let fresh = boot_session_key(raw)?;
    let Some(at) = parse_boot_timestamp(fresh.as_str()) else {
        return Ok(fresh);
    };
    let nearest = known
        .into_iter()
        .filter_map(|key| {
            let gap = (parse_boot_timestamp(key)? - at).num_seconds().abs();
            (gap <= BOOT_TIME_TOLERANCE_SECS).then_some((key, gap))
        })
        .min_by_key(|(_, gap)| *gap)
        .and_then(|(key, _)| BootSessionKey::new(key));
    Ok(nearest.unwrap_or(fresh))
}

/// Key of the boot session the host is currently in, matched against `known`.
pub async fn current_boot_session(
    clock: Arc<dyn BootClock>,
    known: &[String],
) -> Result<BootSessionKey> {
    let raw = read_boot_timestamp(clock).await?;
    resolve_session_key(&raw, known.iter().map(String::as_str))
}
