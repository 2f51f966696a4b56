//! Error types for PrismKV
//!
//! Provides a unified error type for all fallible operations. Caller
//! programming errors (inserting a duplicate internal key, reading an
//! iterator that is not positioned) are assertions, not variants here.

use thiserror::Error;

/// Result type alias using PrismError
pub type Result<T> = std::result::Result<T, PrismError>;

/// Unified error type for PrismKV operations
#[derive(Debug, Error)]
pub enum PrismError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Encoding Errors
    // -------------------------------------------------------------------------
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid numeric value: {0}")]
    InvalidNumeric(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for PrismError {
    fn from(e: bincode::Error) -> Self {
        PrismError::Serialization(e.to_string())
    }
}
