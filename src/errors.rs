/*!
 * Error types for the subfall application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Fatal configuration problems, surfaced before any dispatch starts
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration value is out of its valid range or missing
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Error reading or parsing the configuration file
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

/// Transport-level failures from an endpoint call.
///
/// These are distinct from content rejections: a transport error never counts
/// against the content-retry ceiling, only against the overall attempt ceiling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The call did not return within the per-call timeout
    #[error("Request timed out")]
    Timeout,

    /// The endpoint asked us to slow down (HTTP 429)
    #[error("Rate limited by endpoint")]
    RateLimited,

    /// Credentials rejected; fatal for this endpoint identity only
    #[error("Authentication rejected: {0}")]
    AuthInvalid(String),

    /// Connection failures, server errors, malformed envelopes
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),
}

/// Why a structurally returned response was refused by the validator.
///
/// Rejections are recoverable by escalation to the fallback pool; they never
/// crash the session.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Response did not decode into a JSON array of strings
    #[error("Response is not a JSON array of strings")]
    InvalidFormat,

    /// Array length differs from the chunk's line count
    #[error("Response line count does not match the chunk")]
    WrongCount,

    /// A translated line still carries source-script characters
    #[error("Response still contains source-script characters")]
    ResidualSourceScript,

    /// Anything else (empty response body, non-text payload)
    #[error("Response unusable")]
    Other,
}

impl RejectionReason {
    /// Short identifier used in logs and statistics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "invalid_format",
            Self::WrongCount => "wrong_count",
            Self::ResidualSourceScript => "residual_source_script",
            Self::Other => "other",
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from configuration loading or validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Every identity in a pool role became unusable (auth failures)
    #[error("No usable endpoint left in {role} pool")]
    PoolExhausted {
        /// The pool role that ran out of identities
        role: String,
    },

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error parsing or writing subtitle data
    #[error("Subtitle error: {0}")]
    Subtitle(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}
