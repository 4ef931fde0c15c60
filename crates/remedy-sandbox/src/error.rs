//! Error types for the Remedy sandbox layer.

use thiserror::Error;

/// Errors that can occur while provisioning or executing in a sandbox.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Malformed or invalid manifest content. A missing manifest file is
    /// not an error; it means "no extra services".
    #[error("manifest error: {0}")]
    Config(String),

    /// Image build failed. Recovered by falling back to the default base
    /// image; surfaced only when even that is impossible.
    #[error("image build failed: {0}")]
    ImageBuild(String),

    /// Session network could not be created or removed. Creation failure
    /// is fatal to the investigation.
    #[error("network provisioning failed: {0}")]
    Network(String),

    /// A declared sidecar failed. Soft: logged and skipped per sidecar.
    #[error("sidecar {name} failed: {detail}")]
    Sidecar { name: String, detail: String },

    /// The container engine rejected or failed a command.
    #[error("container engine error: {0}")]
    Engine(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_error_display() {
        let err = SandboxError::Config("services[0].image: missing field".to_string());
        assert!(err.to_string().contains("manifest error"));

        let err = SandboxError::Sidecar {
            name: "postgres".to_string(),
            detail: "image pull failed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("postgres"));
        assert!(msg.contains("image pull failed"));
    }
}
