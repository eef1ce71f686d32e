//! Error types for client setup.

use std::{io, time::Duration};

/// Errors returned by [`crate::client::Client::connect`].
///
/// Every variant is a setup failure: the client is left disconnected and
/// the caller may retry.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The resolver failed.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        /// Host that was looked up.
        host: String,
        /// Port that was looked up.
        port: u16,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The resolver succeeded but returned nothing to connect to.
    #[error("{host}:{port} resolved to no endpoints")]
    NoEndpoints {
        /// Host that was looked up.
        host: String,
        /// Port that was looked up.
        port: u16,
    },
    /// Every endpoint refused or failed; holds the last error seen.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),
    /// No endpoint accepted within the configured timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    /// `connect` was called on a client with a live connection.
    #[error("client is already connected")]
    AlreadyConnected,
    /// The reactor thread could not be started or stopped unexpectedly.
    #[error("reactor failure: {0}")]
    Runtime(#[source] io::Error),
}
