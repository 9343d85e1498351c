// Shared test helpers: scripted capabilities and temp-dir config/ledger paths

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;
use trafficmeter::config::AppConfig;
use trafficmeter::error::{AccountingError, Result};
use trafficmeter::models::TrafficSnapshot;
use trafficmeter::sysinfo_repo::{BootClock, CounterSource};

/// Counter source returning whatever the test last set; `None` fails the sample.
pub struct FakeCounterSource {
    next: Mutex<Option<TrafficSnapshot>>,
    pub last_filter: Mutex<Option<String>>,
}

impl FakeCounterSource {
    pub fn new(sent: u64, recv: u64) -> Self {
        Self {
            next: Mutex::new(Some(TrafficSnapshot::new(sent, recv))),
            last_filter: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            next: Mutex::new(None),
            last_filter: Mutex::new(None),
        }
    }

    pub fn set(&self, sent: u64, recv: u64) {
        *self.next.lock().unwrap() = Some(TrafficSnapshot::new(sent, recv));
    }

    pub fn fail(&self) {
        *self.next.lock().unwrap() = None;
    }
}

impl CounterSource for FakeCounterSource {
    fn sample(&self, interface: Option<&str>) -> Result<TrafficSnapshot> {
        *self.last_filter.lock().unwrap() = interface.map(str::to_string);
        self.next
            .lock()
            .unwrap()
            .ok_or_else(|| AccountingError::CounterSource("scripted failure".into()))
    }
}

/// Boot clock returning a fixed timestamp; `None` fails the query.
pub struct FakeBootClock {
    boot: Mutex<Option<String>>,
}

impl FakeBootClock {
    pub fn new(boot: &str) -> Self {
        Self {
            boot: Mutex::new(Some(boot.to_string())),
        }
    }

    pub fn failing() -> Self {
        Self {
            boot: Mutex::new(None),
        }
    }

    pub fn reboot(&self, boot: &str) {
        *self.boot.lock().unwrap() = Some(boot.to_string());
    }
}

impl BootClock for FakeBootClock {
    fn boot_timestamp(&self) -> Result<String> {
        self.boot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AccountingError::BootTime("uptime unavailable".into()))
    }
}

/// Temp dir holding `config.json` and a ledger file referenced by the config.
pub struct Workspace {
    pub dir: TempDir,
    pub config_path: PathBuf,
    pub ledger_path: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        let ledger_path = dir.path().join("traffic_data.json");
        Self {
            dir,
            config_path,
            ledger_path,
        }
    }

    /// Config pointing at this workspace's ledger file.
    pub fn config(&self, reset_day: u32, last_reset_date: Option<&str>) -> AppConfig {
        AppConfig {
            reset_day,
            data_file: self.ledger_path.to_str().unwrap().to_string(),
            last_reset_date: last_reset_date.map(date),
            ..AppConfig::default()
        }
    }
}

pub fn date(s: &str) -> chrono::NaiveDate {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn snap(sent: u64, recv: u64) -> TrafficSnapshot {
    TrafficSnapshot::new(sent, recv)
}
