// Library for tests to access modules

pub mod boot_session;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod persist;
pub mod reset_policy;
pub mod routes;
pub mod sysinfo_repo;
pub mod version;
pub mod worker;
