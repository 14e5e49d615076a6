use std::path::PathBuf;
use thiserror::Error;

use crate::chat::GenerationError;
use crate::embedding::ProviderError;
use crate::store::StoreError;

/// Main error type for the vellum pipeline
#[derive(Error, Debug)]
pub enum VellumError {
    /// Invalid input that stops an operation before it starts
    /// (empty document text, missing tenant id, unparseable mode)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Embedding backend failure (quota, timeout, malformed input)
    #[error("Embedding provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Vector store unavailable or rejecting an operation
    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    /// A namespace was seeded with a different embedding dimension than the
    /// configured provider produces. Fatal: no automatic remediation is safe.
    #[error("Dimension mismatch in namespace '{namespace}': expected {expected}, got {actual}")]
    DimensionMismatch {
        namespace: String,
        expected: usize,
        actual: usize,
    },

    /// Downstream generation capability failed; distinct from retrieval errors
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for vellum operations
pub type Result<T> = std::result::Result<T, VellumError>;
