//! Error types for flashdiag.
//!
//! This module defines all error types used throughout the flashdiag crate.
//! The pipeline is designed to degrade rather than fail: redaction and log
//! capture never error, so the variants here cover configuration loading,
//! bundle serialization, and artifact output only.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for flashdiag operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Bundle Errors ===
    /// Serializing the bundle payload to JSON failed.
    #[error("bundle serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Producing the gzip companion failed. The uncompressed bundle is
    /// unaffected by this error.
    #[error("bundle compression failed: {source}")]
    Compression {
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Writing a bundle artifact to disk failed.
    #[error("failed to write bundle artifact {path}: {source}")]
    BundleWrite {
        /// Path that couldn't be written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === I/O Errors ===
    /// A byte source fed to the digest engine failed mid-read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for flashdiag operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error came from the gzip companion step.
    #[must_use]
    pub fn is_compression(&self) -> bool {
        matches!(self, Self::Compression { .. })
    }
}
