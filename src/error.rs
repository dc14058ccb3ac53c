//! Application error types for panel-sync
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Optimistic version check failed
    #[error("Version conflict")]
    VersionConflict,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => DbError::Sqlite(e),
            other => DbError::ConstraintViolation(other.to_string()),
        }
    }
}

/// Errors returned by control-panel adapters
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// Request exceeded the configured timeout
    #[error("Request timeout")]
    RequestTimeout,

    /// Could not connect to the panel API
    #[error("Connection refused")]
    ConnectionRefused,

    /// Panel API rejected the request
    #[error("Panel API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the panel
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found on the panel
    #[error("Resource not found")]
    NotFound,

    /// Credentials rejected
    #[error("Unauthorized")]
    Unauthorized,

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Caller asked for an update the vendor API cannot express
    #[error("Unsupported update: {0}")]
    UnsupportedUpdate(String),

    /// Invalid input before any request was made
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Generic network error
    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// HTTP status associated with this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            ProviderError::NotFound => Some(404),
            ProviderError::Unauthorized => Some(401),
            ProviderError::RateLimited(_) => Some(429),
            ProviderError::RequestTimeout => Some(408),
            _ => None,
        }
    }
}

/// Provider factory errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FactoryError {
    /// Provider record not found
    #[error("Provider not found: {0}")]
    NotFound(i64),

    /// Provider record is disabled
    #[error("Provider disabled: {0}")]
    Disabled(i64),

    /// Provider type has no adapter implementation
    #[error("Unsupported provider type: {0}")]
    Unsupported(String),

    /// Adapter construction failed
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

/// Orchestration-level sync errors
///
/// The taxonomy matters for retry policy: configuration and local-data
/// errors are terminal for the attempt, provider errors drive backoff.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// No provider resolvable or provider disabled
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resource, customer, or plan row missing locally
    #[error("Local data error: {0}")]
    LocalData(String),

    /// The panel adapter failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Another attempt holds the resource
    #[error("Sync already in progress")]
    AttemptInProgress,
}

/// Configuration error types
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Application-level error type
///
/// Aggregates all domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Provider adapter error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Factory error
    #[error("Factory error: {0}")]
    Factory(#[from] FactoryError),

    /// Sync error
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            // Retryable errors
            ProviderError::RequestTimeout => true,
            ProviderError::ConnectionRefused => true,
            ProviderError::RateLimited(_) => true,
            ProviderError::Api { status, .. } if *status >= 500 => true,
            ProviderError::Network(_) => true,
            ProviderError::InvalidResponse(_) => true,

            // Non-retryable errors
            ProviderError::Api { .. } => false, // remaining 4xx
            ProviderError::NotFound => false,
            ProviderError::Unauthorized => false,
            ProviderError::UnsupportedUpdate(_) => false,
            ProviderError::InvalidRequest(_) => false,
        }
    }
}

impl RetryableError for SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            SyncError::Provider(e) => e.is_retryable(),
            SyncError::Configuration(_) => false,
            SyncError::LocalData(_) => false,
            SyncError::AttemptInProgress => false,
        }
    }
}
