//! Global error types for the CRM sync layer.
//!
//! All error categories across the workspace are unified into a single
//! `CrmError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using CrmError.
pub type CrmResult<T> = Result<T, CrmError>;

/// Unified error type covering all error categories.
#[derive(Error, Debug)]
pub enum CrmError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Storage errors --
    /// SQLite database error.
    #[error("database error: {0}")]
    Database(String),

    /// Database migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// Database connection pool error.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// Listing records from the repository failed.
    #[error("fetch failed for {entity}: {message}")]
    Fetch {
        /// Entity being fetched.
        entity: String,
        /// Underlying failure.
        message: String,
    },

    // -- Realtime errors --
    /// No realtime client could be constructed.
    #[error("realtime transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The transport refused to open a channel.
    #[error("failed to open channel for {entity}: {message}")]
    ChannelOpen {
        /// Entity whose channel failed.
        entity: String,
        /// Reason reported by the transport.
        message: String,
    },

    /// A channel was opened but the subscription failed afterwards.
    #[error("subscription failed for {entity}: {message}")]
    Subscription {
        /// Entity whose subscription failed.
        entity: String,
        /// Reason reported by the transport.
        message: String,
    },

    /// Reading the remote session failed.
    #[error("session error: {0}")]
    Session(String),

    // -- Data errors --
    /// An entity name outside the known set.
    #[error("unknown entity: {0}")]
    InvalidEntity(String),

    /// Record payload failed validation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A record that must exist was not found.
    #[error("not found: {0}")]
    NotFound(String),

    // -- Notification errors --
    /// Desktop notification failed.
    #[error("notification error: {0}")]
    Notification(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Service errors --
    /// A service failed to initialize.
    #[error("service init error: {0}")]
    ServiceInit(String),

    /// A service is not yet initialized.
    #[error("service not initialized: {0}")]
    ServiceNotInitialized(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CrmError {
    /// Whether this error came from the realtime transport rather than storage.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportUnavailable(_)
                | Self::ChannelOpen { .. }
                | Self::Subscription { .. }
                | Self::Session(_)
        )
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(e: serde_json::Error) -> Self {
        CrmError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for CrmError {
    fn from(e: toml::de::Error) -> Self {
        CrmError::Config(e.to_string())
    }
}
