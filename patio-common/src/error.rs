//! Common error types for Patio

use thiserror::Error;

/// Common result type for Patio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Patio client
///
/// `Clone` lets fatal errors fan out over a broadcast channel to force
/// sign-out.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Request or transport failure; scoped to one operation, never blocks
    /// sibling collection loads
    #[error("Network error: {0}")]
    Network(String),

    /// Bearer credential rejected (HTTP 403); fatal at session scope,
    /// forces sign-out
    #[error("Authentication expired")]
    AuthExpired,

    /// Local synchronous validation failure (blocks submission)
    #[error("Invalid plate {plate:?}: {reason}")]
    InvalidPlate { plate: String, reason: String },

    /// Domain state conflicts with the requested operation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error ends the authenticated session (forced sign-out)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::AuthExpired)
    }
}
