//! Error types for the whitelist manager
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for whitelist manager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the whitelist manager
#[derive(Error, Debug)]
pub enum Error {
    /// A single IP source failed or returned something that is not an IP
    #[error("IP source error: {0}")]
    IpSource(String),

    /// Every configured IP source failed; the cycle is aborted
    #[error("no IP source succeeded ({attempted} attempted), last error: {last_error}")]
    SourceExhausted {
        /// Number of sources tried
        attempted: usize,
        /// Error reported by the last source tried
        last_error: String,
    },

    /// The configured whitelist group does not exist on the instance
    #[error("whitelist group {group} not found for instance {instance}")]
    GroupNotFound {
        /// Instance identifier
        instance: String,
        /// Whitelist group name
        group: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider API call failed
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an IP source error
    pub fn ip_source(msg: impl Into<String>) -> Self {
        Self::IpSource(msg.into())
    }

    /// Create a "group not found" error
    pub fn group_not_found(instance: impl Into<String>, group: impl Into<String>) -> Self {
        Self::GroupNotFound {
            instance: instance.into(),
            group: group.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a configuration defect rather than a transient failure
    pub fn is_config_defect(&self) -> bool {
        matches!(self, Self::GroupNotFound { .. } | Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}
