//! Centralized error types for the CAS impersonation proxy

use thiserror::Error;

/// Proxy error types
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Outbound HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream target URL could not be parsed
    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    /// Upstream did not answer within the configured timeout
    #[error("Upstream timed out after {0}ms")]
    UpstreamTimeout(u64),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ProxyError>;
