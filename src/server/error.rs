//! Error types for server startup.

use std::io;

/// Errors returned by [`crate::server::Server::start`].
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding or configuring the listener failed.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),
    /// `start` was called on a running server.
    #[error("server is already running")]
    AlreadyRunning,
    /// The reactor thread could not be started.
    #[error("failed to start reactor: {0}")]
    Runtime(#[source] io::Error),
}
