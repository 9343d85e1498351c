// Agent config: one JSON object, created with defaults on first run and
// rewritten by the reset policy when it records a new reset date.

use crate::error::{AccountingError, Result};
use crate::persist;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Highest config layout this build understands.
pub const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_DATA_FILE: &str = "traffic_data.json";
pub const DEFAULT_PORT: u16 = 28080;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 3000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    /// Day of month (1..=31) on which the total is reset; clamped to month end.
    #[serde(alias = "resetDay")]
    pub reset_day: u32,
    /// Ledger file path.
    #[serde(alias = "dataFile")]
    pub data_file: String,
    /// Date of the most recent reset; empty string in the file when none yet.
    #[serde(alias = "lastResetDate", with = "date_or_empty")]
    pub last_reset_date: Option<NaiveDate>,
    pub port: u16,
    pub host: String,
    /// Interface to count; empty sums every interface.
    #[serde(rename = "ifName", alias = "interfaceName", alias = "interface_name")]
    pub interface_name: String,
    pub sample_interval_ms: u64,
    /// How often the accounting loop logs its counters at INFO level.
    pub stats_log_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            reset_day: 1,
            data_file: DEFAULT_DATA_FILE.into(),
            last_reset_date: None,
            port: DEFAULT_PORT,
            host: "0.0.0.0".into(),
            interface_name: String::new(),
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            stats_log_interval_secs: 3600,
        }
    }
}

impl AppConfig {
    /// Config path from `CONFIG_FILE`, else `config.json` in the working directory.
    pub fn path_from_env() -> PathBuf {
        std::env::var("CONFIG_FILE")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into())
            .into()
    }

    /// Loads the config at `path`, writing one with defaults if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            tracing::info!(path = %path.display(), "Created default config file");
            return Ok(config);
        }
        let s = std::fs::read_to_string(path)
            .map_err(|e| AccountingError::ConfigIo(format!("read {}: {}", path.display(), e)))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(s)
            .map_err(|e| AccountingError::ConfigIo(format!("parse: {}", e)))?;
        config
            .validate()
            .map_err(|e| AccountingError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        persist::write_json_atomic(path, self)
            .map_err(|e| AccountingError::ConfigIo(format!("write {}: {}", path.display(), e)))
    }

    /// Interface filter for the counter source; `None` means all interfaces.
    pub fn interface_filter(&self) -> Option<String> {
        let name = self.interface_name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_file)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=CONFIG_VERSION).contains(&self.version),
            "version must be between 1 and {}, got {}",
            CONFIG_VERSION,
            self.version
        );
        anyhow::ensure!(
            (1..=31).contains(&self.reset_day),
            "reset_day must be between 1 and 31, got {}",
            self.reset_day
        );
        anyhow::ensure!(
            !self.data_file.trim().is_empty(),
            "data_file must be non-empty"
        );
        anyhow::ensure!(
            self.port > 0,
            "port must be between 1 and 65535, got {}",
            self.port
        );
        anyhow::ensure!(!self.host.trim().is_empty(), "host must be non-empty");
        anyhow::ensure!(
            self.sample_interval_ms > 0,
            "sample_interval_ms must be > 0, got {}",
            self.sample_interval_ms
        );
        anyhow::ensure!(
            self.stats_log_interval_secs > 0,
            "stats_log_interval_secs must be > 0, got {}",
            self.stats_log_interval_secs
        );
        Ok(())
    }
}

/// `Option<NaiveDate>` as `"YYYY-MM-DD"`, with `""` for none.
mod date_or_empty {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format(FORMAT).to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(raw, FORMAT)
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("last_reset_date {:?}: {}", raw, e)))
    }
}
