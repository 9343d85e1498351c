// Error kinds for the accounting core. Startup maps these into anyhow; the
// worker decides per kind whether a tick failure is recoverable.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AccountingError>;

#[derive(Debug, Error)]
pub enum AccountingError {
    /// Reading, creating or saving the config file failed.
    #[error("config I/O error: {0}")]
    ConfigIo(String),

    /// Config parsed but holds values outside their documented ranges.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Reading, parsing or persisting the traffic ledger failed.
    #[error("ledger I/O error: {0}")]
    LedgerIo(String),

    /// The platform counter query failed or matched no interface.
    #[error("counter source error: {0}")]
    CounterSource(String),

    /// The host boot time could not be determined.
    #[error("boot time error: {0}")]
    BootTime(String),
}

impl AccountingError {
    /// Variant name, used as the `kind` field in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            AccountingError::ConfigIo(_) => "ConfigIo",
            AccountingError::InvalidConfig(_) => "InvalidConfig",
            AccountingError::LedgerIo(_) => "LedgerIo",
            AccountingError::CounterSource(_) => "CounterSource",
            AccountingError::BootTime(_) => "BootTime",
        }
    }

    /// Whether the accounting loop must stop instead of retrying next tick.
    /// Config is only written during a reset, and an unsaved reset date risks
    /// folding traffic into the baseline twice.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AccountingError::ConfigIo(_) | AccountingError::InvalidConfig(_)
        )
    }
}
