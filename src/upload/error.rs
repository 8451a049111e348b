//! Error types for the upload module.
//!
//! Transport failures are recorded on the file and reported through the
//! observer; these errors only cross the public API for invalid options.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or performing a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Transfer options are malformed (caller misuse, raised at construction).
    #[error("invalid transfer options: {reason}")]
    InvalidOptions {
        /// What is wrong with the options.
        reason: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error uploading to {url}: {source}")]
    Network {
        /// The target URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout uploading to {url}")]
    Timeout {
        /// The target URL.
        url: String,
    },

    /// The payload could not be read from disk.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// The payload path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The resolved URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl TransferError {
    /// Creates an invalid-options error.
    pub fn invalid_options(reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            reason: reason.into(),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}
