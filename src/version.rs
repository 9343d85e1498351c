// Build-time identity for GET /version, GET / and the startup log

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// "name version", e.g. `trafficmeter 0.1.0`.
pub fn banner() -> String {
    format!("{} {}", NAME, VERSION)
}
