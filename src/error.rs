//! Error types for the Optiply tap
//!
//! Every failure the extraction core can surface is a variant of [`Error`].
//! The HTTP layer classifies responses into these variants; everything above
//! it treats an error as fatal to the current resource pass.

use thiserror::Error;

/// The main error type for the tap
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    /// Bad credentials or a malformed token response. Never self-heals.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The API kept rejecting the bearer token after a forced refresh.
    #[error("Access token rejected for {url} after a forced refresh")]
    AuthExpired { url: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Server returned {status} after {attempts} attempts")]
    TransientServer { status: u16, attempts: u32 },

    #[error("Request timeout after {timeout_ms}ms ({attempts} attempts)")]
    Timeout { timeout_ms: u64, attempts: u32 },

    #[error("Client error {status}: {body}")]
    ClientError { status: u16, body: String },

    #[error("HTTP {status}: {body}")]
    Fatal { status: u16, body: String },

    #[error("Protocol violation: {message}")]
    Protocol { message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    #[error("Resource '{name}' is not part of the catalog")]
    UnknownResource { name: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], used for exit codes and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials rejected or token endpoint misbehaved
    Authentication,
    /// Bearer token rejected mid-sync even after a refresh
    AuthExpired,
    /// HTTP 429
    RateLimited,
    /// 408/502/503/504 or network timeouts with the retry budget spent
    TransientServer,
    /// 4xx other than 401/408/429
    ClientError,
    /// Unparseable body on a successful response
    Protocol,
    /// Bad or missing configuration
    Config,
    /// Anything else (500, I/O, state files, ...)
    Fatal,
}

impl ErrorKind {
    /// Process exit code for this kind of failure
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Authentication | ErrorKind::AuthExpired => 2,
            ErrorKind::RateLimited => 3,
            ErrorKind::TransientServer => 4,
            ErrorKind::ClientError => 5,
            ErrorKind::Protocol => 6,
            ErrorKind::Config => 7,
            ErrorKind::Fatal => 1,
        }
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. }
            | Error::MissingConfigField { .. }
            | Error::InvalidConfigValue { .. }
            | Error::UnknownResource { .. } => ErrorKind::Config,
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::AuthExpired { .. } => ErrorKind::AuthExpired,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::TransientServer { .. } | Error::Timeout { .. } => ErrorKind::TransientServer,
            Error::ClientError { .. } => ErrorKind::ClientError,
            Error::Protocol { .. } => ErrorKind::Protocol,
            Error::Http(e) if e.is_timeout() || e.is_connect() => ErrorKind::TransientServer,
            _ => ErrorKind::Fatal,
        }
    }

    /// Check if the executor may repeat the request that produced this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TransientServer { .. } | Error::Timeout { .. } => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type alias for the tap
pub type Result<T> = std::result::Result<T, Error>;
