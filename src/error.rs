//! Error types for PermaKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using PermaError
pub type Result<T> = std::result::Result<T, PermaError>;

/// Unified error type for PermaKV operations
#[derive(Debug, Error)]
pub enum PermaError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The temporary file could not be published at its final path.
    /// The previous file at that path (if any) is untouched.
    #[error("Could not rename temporary file {} to {}: {source}", .from.display(), .to.display())]
    FileRename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // File Errors
    // -------------------------------------------------------------------------
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid comparison: {0}")]
    InvalidComparison(String),

    #[error("Naming conflict: {0}")]
    NamingConflict(String),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    /// Declared entry count, header kind or chain sequence does not match
    #[error("Header mismatch: {0}")]
    HeaderMismatch(String),

    #[error("Corrupted file: {0}")]
    Corrupted(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Codec error: {0}")]
    Codec(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
