//! Registry Error Hierarchy
//!
//! Defines the error types surfaced by the registry adapter, categorized by
//! the layer that produced them: configuration, URL parsing, the underlying
//! watch client, and remote registry operations.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration source failures (file, environment, deserialization)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registry address or settings rejected during validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Malformed service URL
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),

    /// Caller broke an argument contract (e.g. lookup without a url)
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// A register/unregister/subscribe/unsubscribe/lookup call failed against
    /// the coordination service
    #[error("Failed to {operation} {url} to registry {registry}, cause: {source}")]
    RemoteOperation {
        operation: &'static str,
        url: String,
        registry: String,
        #[source]
        source: ClientError,
    },

    /// Raw watch client failures outside of a registry operation
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Reconnect-triggered recovery did not complete
    #[error("Recovery failed: {0}")]
    Recovery(String),

    /// Retry policy exhaustion
    #[error("Task timed out")]
    RetryTimeout,

    /// Operation attempted on a destroyed registry
    #[error("Registry {0} is destroyed")]
    Destroyed(String),
}

/// Errors raised by a [`crate::WatchClient`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Session is not connected to the coordination service
    #[error("Connection loss")]
    ConnectionLoss,

    /// Node (or one of its parents) does not exist
    #[error("No node: {0}")]
    NoNode(String),

    /// Node still has children
    #[error("Node not empty: {0}")]
    NotEmpty(String),

    /// Path is not an absolute, well-formed node path
    #[error("Bad path: {0}")]
    BadPath(String),

    /// Client was closed
    #[error("Client closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Errors produced while parsing a service URL string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("Missing protocol in url: {0}")]
    MissingProtocol(String),

    #[error("Invalid port in url: {0}")]
    InvalidPort(String),

    #[error("Empty url")]
    Empty,

    /// Percent-encoded path segment with a bad escape or non-UTF-8 payload
    #[error("Undecodable segment: {0}")]
    Decode(String),
}
