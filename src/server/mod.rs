//! Server side of a peer link.
//!
//! A [`Server`] owns a listener, a reactor thread and the registry of
//! accepted connections. The reactor accepts sockets and fills the inbox;
//! the application drains the inbox with [`Server::process_messages`] on its
//! own thread, which is where [`ServerHandler::on_message`] runs.

mod accept;
mod error;
mod handler;
mod registry;

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::{Arc, atomic::AtomicU32},
};

pub use error::ServerError;
pub use handler::ServerHandler;
use registry::Registry;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::{
    config::ServerConfig,
    connection::{Connection, ConnectionId, SendError},
    message::{Message, OwnedMessage},
    queue::HandoffQueue,
    reactor::Reactor,
};

/// State shared between the application-facing [`Server`] and the accept
/// loop on the reactor.
struct Shared {
    config: ServerConfig,
    handler: Box<dyn ServerHandler>,
    registry: Registry,
    next_id: AtomicU32,
    inbox: Arc<HandoffQueue<OwnedMessage>>,
}

/// Accepts peers and exchanges messages with them.
///
/// # Examples
///
/// ```no_run
/// use peerwire::{Message, Remote, Server, ServerHandler, config::ServerConfig};
///
/// struct Echo;
///
/// impl ServerHandler for Echo {
///     fn on_message(&self, _server: &Server, remote: &Remote, message: Message) {
///         let _ = remote.send(message);
///     }
/// }
///
/// let mut server = Server::new(ServerConfig::new(60_000), Echo);
/// server.start().expect("start server");
/// loop {
///     server.process_messages(true, usize::MAX);
/// }
/// ```
pub struct Server {
    shared: Arc<Shared>,
    reactor: Option<Reactor>,
    local_addr: Option<SocketAddr>,
}

impl Server {
    /// Create a stopped server.
    #[must_use]
    pub fn new(config: ServerConfig, handler: impl ServerHandler) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                handler: Box::new(handler),
                registry: Registry::default(),
                next_id: AtomicU32::new(config.first_connection_id),
                inbox: Arc::new(HandoffQueue::new()),
            }),
            reactor: None,
            local_addr: None,
        }
    }

    /// Bind [`ServerConfig::bind_addr`] and start accepting.
    ///
    /// Binding happens on the calling thread, so an address already in use
    /// is reported here rather than on the reactor.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the server is running, the bind fails or
    /// the reactor cannot start. Failures are also logged.
    pub fn start(&mut self) -> Result<(), ServerError> {
        if self.is_running() {
            return Err(ServerError::AlreadyRunning);
        }
        let listener = StdTcpListener::bind(self.shared.config.bind_addr).map_err(|e| {
            error!(addr = %self.shared.config.bind_addr, error = %e, "server bind failed");
            ServerError::Bind(e)
        })?;
        self.start_with_listener(listener)
    }

    /// Start accepting on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the server is running, the listener cannot
    /// be adopted or the reactor cannot start.
    pub fn start_with_listener(&mut self, listener: StdTcpListener) -> Result<(), ServerError> {
        if self.is_running() {
            return Err(ServerError::AlreadyRunning);
        }
        let result = self.launch(listener);
        if let Err(e) = &result {
            error!(error = %e, "server start failed");
        }
        result
    }

    fn launch(&mut self, listener: StdTcpListener) -> Result<(), ServerError> {
        listener.set_nonblocking(true).map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ServerError::Bind)?;
        let reactor = Reactor::start("peerwire-server").map_err(ServerError::Runtime)?;
        let listener = {
            let _guard = reactor.handle().enter();
            TcpListener::from_std(listener).map_err(ServerError::Bind)?
        };
        reactor.spawn(accept::accept_loop(
            listener,
            Arc::clone(&self.shared),
            reactor.shutdown_token().clone(),
            reactor.tracker().clone(),
        ));
        info!(%local_addr, "server started");
        self.local_addr = Some(local_addr);
        self.reactor = Some(reactor);
        Ok(())
    }

    /// Stop accepting, close every connection and join the reactor thread.
    ///
    /// The registry is emptied without disconnect callbacks. Messages
    /// already in the inbox stay there. Idempotent.
    pub fn stop(&mut self) {
        let Some(mut reactor) = self.reactor.take() else {
            return;
        };
        reactor.stop();
        let closed = self.shared.registry.drain();
        self.local_addr = None;
        info!(connections = closed.len(), "server stopped");
    }

    /// Whether the accept loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool { self.reactor.is_some() }

    /// Address the listener is bound to while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.local_addr }

    /// Configuration this server was built with.
    #[must_use]
    pub fn config(&self) -> &ServerConfig { &self.shared.config }

    /// Queue `message` for the connection registered as `id`.
    ///
    /// A registered connection found closed is removed and reported through
    /// [`ServerHandler::on_client_disconnect`].
    ///
    /// # Errors
    ///
    /// Returns [`SendError::NotConnected`] for unknown or closed
    /// connections, or any other error from [`Connection::send`].
    pub fn send(&self, id: ConnectionId, message: Message) -> Result<(), SendError> {
        let connection = self.shared.registry.get(id).ok_or(SendError::NotConnected)?;
        match connection.send(message) {
            Err(SendError::NotConnected) => {
                self.reap(&connection);
                Err(SendError::NotConnected)
            }
            other => other,
        }
    }

    /// Queue a copy of `message` for every live connection except `except`.
    ///
    /// Closed connections found along the way are removed from the registry
    /// in one pass and each is reported once through
    /// [`ServerHandler::on_client_disconnect`]. Returns the number of
    /// connections the message was queued for.
    pub fn send_to_all(&self, message: &Message, except: Option<ConnectionId>) -> usize {
        let (live, dead) = self.shared.registry.sweep();
        let mut delivered = 0;
        for connection in live.iter().filter(|c| Some(c.id()) != except) {
            match connection.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(SendError::NotConnected) => self.reap(connection),
                Err(e) => warn!(id = %connection.id(), error = %e, "broadcast send failed"),
            }
        }
        for connection in &dead {
            self.shared.handler.on_client_disconnect(connection);
        }
        delivered
    }

    /// Dispatch up to `max` queued messages to [`ServerHandler::on_message`]
    /// on the calling thread.
    ///
    /// With `wait` set, blocks until at least one message is queued. Returns
    /// the number of messages dispatched.
    pub fn process_messages(&self, wait: bool, max: usize) -> usize {
        if wait {
            self.shared.inbox.wait();
        }
        let mut dispatched = 0;
        while dispatched < max {
            let Some(OwnedMessage { remote, message }) = self.shared.inbox.pop_front() else {
                break;
            };
            dispatched += 1;
            match remote {
                Some(remote) => self.shared.handler.on_message(self, &remote, message),
                None => warn!(%message, "dropping message with no remote"),
            }
        }
        dispatched
    }

    /// Registered connection with identifier `id`.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.shared.registry.get(id)
    }

    /// Identifiers of registered connections in acceptance order.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> { self.shared.registry.ids() }

    /// Number of registered connections, including closed ones not yet
    /// reaped.
    #[must_use]
    pub fn connection_count(&self) -> usize { self.shared.registry.len() }

    /// Disconnect and deregister `id` without invoking
    /// [`ServerHandler::on_client_disconnect`].
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let connection = self.shared.registry.remove_id(id)?;
        connection.disconnect();
        Some(connection)
    }

    /// Inbox of messages received from every connection.
    #[must_use]
    pub fn incoming_messages(&self) -> &HandoffQueue<OwnedMessage> { &self.shared.inbox }

    fn reap(&self, connection: &Arc<Connection>) {
        if self.shared.registry.remove(connection) {
            info!(id = %connection.id(), "reaped closed connection");
            self.shared.handler.on_client_disconnect(connection);
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) { self.stop(); }
}
