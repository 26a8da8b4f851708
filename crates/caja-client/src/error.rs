//! # Client Error Types
//!
//! Errors raised while loading configuration or talking to the backend.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Client Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     HTTP / Payload      │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Unauthorized           │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  Forbidden · NotFound   │ │
//! │  │  ConfigLoad...  │  │  Interrupted    │  │  Validation · Conflict  │ │
//! │  │                 │  │                 │  │  Server · InvalidResp.  │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Every variant maps onto caja_core::CollaboratorError at the trait     │
//! │  boundary, so core logic never sees reqwest or toml types.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caja_core::CollaboratorError;
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The request could not be delivered.
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The connection broke after the request was sent.
    #[error("Connection interrupted: {0}")]
    Interrupted(String),

    // =========================================================================
    // HTTP Errors
    // =========================================================================
    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// 400 / 422
    #[error("Validation error ({status}): {message}")]
    Validation { status: u16, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    // =========================================================================
    // Payload Errors
    // =========================================================================
    /// The body was received but does not match what the payload's
    /// deserializer accepts.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Classifies a transport failure from reqwest.
    pub fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(timeout_secs)
        } else if err.is_connect() || err.is_builder() {
            ClientError::Connection(err.to_string())
        } else if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else {
            ClientError::Interrupted(err.to_string())
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_)
                | ClientError::InvalidUrl(_)
                | ClientError::ConfigLoadFailed(_)
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::InvalidResponse(err.to_string())
    }
}

impl From<ClientError> for CollaboratorError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::InvalidConfig(_)
            | ClientError::InvalidUrl(_)
            | ClientError::ConfigLoadFailed(_)
            | ClientError::Connection(_) => CollaboratorError::Unavailable(err.to_string()),
            ClientError::Timeout(seconds) => CollaboratorError::Timeout { seconds },
            ClientError::Interrupted(msg) => CollaboratorError::Interrupted(msg),
            ClientError::Unauthorized => CollaboratorError::Unauthorized,
            ClientError::Forbidden(message) => CollaboratorError::Rejected {
                status: 403,
                message,
            },
            ClientError::NotFound(message) => CollaboratorError::Rejected {
                status: 404,
                message,
            },
            ClientError::Validation { status, message } => {
                CollaboratorError::Rejected { status, message }
            }
            ClientError::Conflict(message) => CollaboratorError::Rejected {
                status: 409,
                message,
            },
            ClientError::Server { status, message } => CollaboratorError::Server { status, message },
            ClientError::InvalidResponse(msg) => CollaboratorError::InvalidPayload(msg),
        }
    }
}
