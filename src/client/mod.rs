//! Client side of a peer link.
//!
//! A [`Client`] owns exactly one [`Connection`] and a private reactor
//! thread. Its methods are blocking and must be called from ordinary
//! threads, never from inside an async runtime.

mod connect;
mod error;

use std::{io, sync::Arc};

pub use error::ClientError;
use tokio::{sync::oneshot, time::timeout};
use tracing::{error, info};

use crate::{
    config::ClientConfig,
    connection::{Connection, Role, SendError},
    message::{Message, OwnedMessage},
    queue::HandoffQueue,
    reactor::Reactor,
    resolve::{Resolve, SystemResolver},
};

/// Connects to a single server and exchanges messages with it.
///
/// Inbound messages land in [`Client::incoming_messages`] with no remote
/// attached. Dropping the client disconnects it.
///
/// # Examples
///
/// ```no_run
/// use peerwire::{Client, Message, config::ClientConfig};
///
/// let mut client = Client::new(ClientConfig::default());
/// client.connect("127.0.0.1", 60_000).expect("connect");
/// client.send(Message::new(0)).expect("send");
/// client.incoming_messages().wait();
/// ```
pub struct Client {
    config: ClientConfig,
    resolver: Arc<dyn Resolve>,
    reactor: Option<Reactor>,
    connection: Option<Arc<Connection>>,
    inbox: Arc<HandoffQueue<OwnedMessage>>,
}

impl Client {
    /// Create a disconnected client resolving names through the OS.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self { Self::with_resolver(config, SystemResolver) }

    /// Create a disconnected client using `resolver` for name lookups.
    #[must_use]
    pub fn with_resolver(config: ClientConfig, resolver: impl Resolve) -> Self {
        Self {
            config,
            resolver: Arc::new(resolver),
            reactor: None,
            connection: None,
            inbox: Arc::new(HandoffQueue::new()),
        }
    }

    /// Resolve `host:port`, start the reactor and connect.
    ///
    /// Endpoints are tried in resolver order. Blocks until one accepts or
    /// [`ClientConfig::connect_timeout`] elapses. A previous connection
    /// that has since closed is discarded first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on any setup failure; the failure is also
    /// logged and the client is left disconnected.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        if self.is_connected() {
            return Err(ClientError::AlreadyConnected);
        }
        self.disconnect();
        let result = self.try_connect(host, port);
        match &result {
            Ok(()) => info!(%host, port, "client connected"),
            Err(e) => {
                error!(%host, port, error = %e, "client connect failed");
                self.disconnect();
            }
        }
        result
    }

    fn try_connect(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        let endpoints =
            self.resolver
                .resolve(host, port)
                .map_err(|source| ClientError::Resolve {
                    host: host.to_owned(),
                    port,
                    source,
                })?;
        if endpoints.is_empty() {
            return Err(ClientError::NoEndpoints {
                host: host.to_owned(),
                port,
            });
        }

        let reactor = Reactor::start("peerwire-client").map_err(ClientError::Runtime)?;
        let (connection, outbound) = Connection::new(
            Role::Client,
            self.config.connection_options(),
            reactor.shutdown_token(),
        );
        let (done_tx, done_rx) = oneshot::channel();

        let socket = self.config.socket;
        let limit = self.config.connect_timeout;
        let inbox = Arc::clone(&self.inbox);
        let tracker = reactor.tracker().clone();
        let conn = Arc::clone(&connection);
        reactor.spawn(async move {
            let result = match timeout(limit, connect::connect_any(&endpoints, &socket)).await {
                Ok(Ok(stream)) => {
                    if let Ok(addr) = stream.peer_addr() {
                        conn.set_peer_addr(addr);
                    }
                    conn.start(stream, outbound, inbox, &tracker);
                    Ok(())
                }
                Ok(Err(e)) => Err(ClientError::Connect(e)),
                Err(_) => Err(ClientError::ConnectTimeout(limit)),
            };
            let _ = done_tx.send(result);
        });

        self.reactor = Some(reactor);
        self.connection = Some(connection);
        done_rx.blocking_recv().unwrap_or_else(|_| {
            Err(ClientError::Runtime(io::Error::other(
                "reactor stopped before connect completed",
            )))
        })
    }

    /// Close the connection, stop the reactor and join its thread.
    ///
    /// Messages still queued for sending are discarded. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.disconnect();
        }
        if let Some(mut reactor) = self.reactor.take() {
            reactor.stop();
        }
    }

    /// Whether a connection exists and its socket is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_connected())
    }

    /// Queue `message` for the server.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::NotConnected`] when there is no open
    /// connection, or any error from [`Connection::send`].
    pub fn send(&self, message: Message) -> Result<(), SendError> {
        self.connection
            .as_ref()
            .ok_or(SendError::NotConnected)?
            .send(message)
    }

    /// Current connection, if `connect` has succeeded and `disconnect` has
    /// not been called since.
    #[must_use]
    pub fn connection(&self) -> Option<&Arc<Connection>> { self.connection.as_ref() }

    /// Inbox of messages received from the server.
    #[must_use]
    pub fn incoming_messages(&self) -> &HandoffQueue<OwnedMessage> { &self.inbox }

    /// Shared handle to the inbox, for draining on another thread.
    #[must_use]
    pub fn inbox(&self) -> Arc<HandoffQueue<OwnedMessage>> { Arc::clone(&self.inbox) }

    /// Configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig { &self.config }
}

impl Drop for Client {
    fn drop(&mut self) { self.disconnect(); }
}

#[cfg(test)]
mod tests;
