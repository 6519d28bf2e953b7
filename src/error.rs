//! Error types for the SiGa client

use thiserror::Error;

/// SiGa client error
#[derive(Debug, Error)]
pub enum SigaError {
    /// A required configuration field is missing or empty
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Session operation invoked without the container or signature id it needs
    #[error("Session precondition failed: {0}")]
    SessionPrecondition(String),

    /// Remote service reported a failure (errorMessage, non-OK result, invalid signatures)
    #[error("API response error {status}: {message}")]
    ApiResponse { status: u16, message: String },

    /// Response was well-formed JSON but lacked a field the protocol requires
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Digest algorithm named by the service is not supported
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedDigest(String),

    /// Artifact could not be assembled from the supplied files
    #[error("Assembly error: {0}")]
    Assembly(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decode error
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Hex decode error
    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Archive read/write error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Local filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SigaError {
    /// Error raised when an operation needs a container id that is not set
    pub(crate) fn container_missing() -> Self {
        SigaError::SessionPrecondition("ContainerId is missing".to_string())
    }
}

/// Result type for SiGa operations
pub type Result<T> = std::result::Result<T, SigaError>;
