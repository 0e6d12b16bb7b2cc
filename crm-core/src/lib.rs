//! CRM Core - configuration, error handling, logging and platform paths.
//!
//! Shared foundation for every crate in the workspace:
//! - TOML application configuration with a shared async handle
//! - The unified `CrmError` type
//! - Structured logging with tracing
//! - Platform data/config directories and common constants

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod constants;

// Re-export commonly used items at the crate root
pub use config::{AppConfig, ConfigHandle};
pub use error::{CrmError, CrmResult};
pub use logging::init_logging;
pub use platform::Platform;
