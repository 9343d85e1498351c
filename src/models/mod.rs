// Domain models: ledger entries and query responses

mod report;
mod traffic;

pub use report::{LedgerView, TotalTrafficReport, UNAVAILABLE};
pub use traffic::{BootSessionKey, RESET_SUM_KEY, TrafficSnapshot};
