/// Library name used in log output
pub const APP_NAME: &str = "basket";

/// Library version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default length of one round wait period, in milliseconds
pub const DEFAULT_ROUND_TIMEOUT_MS: u64 = 10_000;

/// Log target for scheduler output
pub const SERVICE_LOG_TARGET: &str = "basket::services";
