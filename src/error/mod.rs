//! Error handling module for preflight

use thiserror::Error;

/// Main error type for preflight operations
#[derive(Error, Debug)]
pub enum PreflightError {
    /// Root path not found or inaccessible
    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    /// Media probe invocation failed
    #[error("Failed to probe media file {path}: {message}")]
    ProbeError { path: String, message: String },

    /// External tool could not be spawned
    #[error("Failed to invoke {tool}: {message}")]
    ToolInvocation { tool: String, message: String },

    /// Profile store error
    #[error("Profile store error: {message}")]
    ProfileStore { message: String },

    /// Named profile does not exist
    #[error("Profile not found: {name}")]
    ProfileNotFound { name: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Settings store error
    #[error("Settings store error: {message}")]
    Settings { message: String },

    /// Run was cancelled via the callback signal
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for preflight operations
pub type PreflightResult<T> = std::result::Result<T, PreflightError>;
