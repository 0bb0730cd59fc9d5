//! Error types for the migration engine
//!
//! One fatal error aborts the current deployment; Changes already appended
//! for earlier migrations in the same run are kept on purpose, so partial
//! progress stays visible in the ledger.

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the migration engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed script metadata, section markers, or capability set
    #[error("Validation error at '{location}': {message}")]
    Validation { location: String, message: String },

    /// Checksum drift against what the history ledger recorded
    #[error("Migration '{location}' is out of sync with history: {message}")]
    OutOfSync { location: String, message: String },

    /// The requested migration does not exist in the store
    #[error("Migration '{0}' not found in store")]
    NotFound(String),

    /// Invalid selection options, rejected before any deployment logic runs
    #[error("Invalid options: {0}")]
    Options(String),

    /// Migration store failure (filesystem read, native registry)
    #[error("Store error: {0}")]
    Store(String),

    /// History ledger failure (query or append)
    #[error("History error: {0}")]
    History(String),

    /// Target session failure while executing a script
    #[error("Session error: {0}")]
    Session(String),

    /// Connectivity failure while opening a session or ledger
    #[error("Connection error: {0}")]
    Connection(String),

    /// Project or environment resolution failure
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A provisioning step failed; completed steps were compensated in
    /// reverse order. Compensation failures are carried alongside the
    /// original error, never in place of it.
    #[error("Provisioning failed at step '{step}': {source}")]
    Provision {
        step: String,
        #[source]
        source: Box<EngineError>,
        compensation_failures: Vec<String>,
    },
}

impl From<migratory_core::CoreError> for EngineError {
    fn from(err: migratory_core::CoreError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

impl EngineError {
    /// Shorthand for a validation error tied to a location.
    pub fn validation(location: impl std::fmt::Display, message: impl Into<String>) -> Self {
        EngineError::Validation {
            location: location.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for a consistency error tied to a location.
    pub fn out_of_sync(location: impl std::fmt::Display, message: impl Into<String>) -> Self {
        EngineError::OutOfSync {
            location: location.to_string(),
            message: message.into(),
        }
    }
}
