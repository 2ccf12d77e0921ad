//! Error types for step-state

use thiserror::Error;

/// Errors that can occur while reading or writing host-side step state
#[derive(Error, Debug)]
pub enum StorageError {
    /// No artifact with this name was stored
    #[error("Artifact not found: {name}")]
    ArtifactNotFound { name: String },

    /// A property holds a value the requested operation cannot use
    #[error("Invalid property {key}: {reason}")]
    InvalidProperty { key: String, reason: String },

    /// Filesystem error
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
