use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while resolving projects and environments
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or incomplete configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested environment is not defined for the project
    #[error("Project '{project}' has no environment named '{environment}'")]
    MissingEnvironment { project: String, environment: String },
}
