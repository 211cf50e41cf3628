//! Error types for pipewright
//!
//! This module defines the error types used throughout the library.
//! Construction errors are raised eagerly while a configuration is being
//! turned into objects; nothing in this crate retries or re-wraps a
//! failure from a stage factory.

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PipewrightError>;

/// Main error type for pipewright
#[derive(Error, Debug, Clone)]
pub enum PipewrightError {
    /// The configuration was empty (`{}` or `[]`), so there is nothing
    /// to construct
    #[error("Empty configuration: {message}")]
    EmptyConfig { message: String },

    /// A descriptor named a kind that is not registered in the table it
    /// was resolved against
    #[error("Unknown {namespace} kind: '{kind}'")]
    UnknownKind { namespace: String, kind: String },

    /// A configuration value did not have the shape of a stage descriptor
    #[error("Invalid descriptor: {message}")]
    InvalidDescriptor { message: String },

    /// A stage factory rejected one of its parameters or inputs
    #[error("Invalid parameter '{name}' for '{kind}': {message}")]
    InvalidParam {
        kind: String,
        name: String,
        message: String,
    },

    /// A requested combination is recognized but not supported
    #[error("Unsupported: {message}")]
    Unsupported { message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl PipewrightError {
    /// Create an empty configuration error
    pub fn empty_config(message: impl Into<String>) -> Self {
        Self::EmptyConfig {
            message: message.into(),
        }
    }

    /// Create an unknown kind error
    pub fn unknown_kind(namespace: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnknownKind {
            namespace: namespace.into(),
            kind: kind.into(),
        }
    }

    /// Create an invalid descriptor error
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_param(
        kind: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Check if this error came from a registry miss
    /// (callers probing whether a kind exists can branch on this)
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, Self::UnknownKind { .. })
    }
}

impl From<serde_json::Error> for PipewrightError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
