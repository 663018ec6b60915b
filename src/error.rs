//! Error types for PECO
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias for PECO operations
pub type Result<T> = std::result::Result<T, PecoError>;

/// Main error type for PECO operations
#[derive(Error, Debug)]
pub enum PecoError {
    /// A user command was rejected before touching any state
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No device with this id in the store
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// CSV encoding or decoding failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Report file could not be written or read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration parsed but is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Exported report does not have the expected shape
    #[error("Malformed report at line {line}: {message}")]
    MalformedReport { line: u64, message: String },

    /// The dashboard task has shut down
    #[error("Dashboard engine is closed")]
    EngineClosed,
}

/// Reasons a device command is refused
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Name is blank and the template has no default name
    #[error("Device name is required")]
    EmptyName,

    /// Template id is not in the catalog
    #[error("Unknown device template: {0}")]
    UnknownTemplate(String),

    /// Power must be finite and non-negative
    #[error("Invalid power value: {0}")]
    InvalidPower(f64),
}
