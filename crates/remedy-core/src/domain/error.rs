//! Domain-level error taxonomy for Remedy.

/// Errors produced while generating a candidate fix.
///
/// A generation failure is never recorded as an attempt: no code was
/// produced, so there is nothing to judge.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("fix generator unreachable: {0}")]
    Transport(String),

    #[error("fix generator returned an unusable response: {0}")]
    Response(String),
}

/// Remedy domain errors.
#[derive(Debug, thiserror::Error)]
pub enum RemedyError {
    #[error("invalid investigation request: {0}")]
    InvalidRequest(String),

    #[error("fix generation unavailable: {0}")]
    Generation(#[from] GenerationError),

    #[error("provisioning failed: {0}")]
    Provision(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("bug store error: {0}")]
    Store(String),

    #[error("bug report not found: {0}")]
    BugNotFound(uuid::Uuid),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Remedy domain operations.
pub type Result<T> = std::result::Result<T, RemedyError>;
