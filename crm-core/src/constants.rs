//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Sales CRM";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory name under the platform data/config roots.
pub const APP_DIR_NAME: &str = "SalesCrm";

/// Base name of the rolling log file.
pub const LOG_FILE_NAME: &str = "crm.log";

/// Database schema version.
pub const DB_SCHEMA_VERSION: i32 = 1;

/// Default capacity of the application event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Local key-value cache keys owned by the token sync helper.
pub mod cache_keys {
    /// Access token of the current session.
    pub const AUTH_TOKEN: &str = "auth_token";
    /// JSON-serialized user of the current session.
    pub const AUTH_USER: &str = "auth_user";
}
