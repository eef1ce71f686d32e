//! A single peer connection and its socket pumps.
//!
//! A [`Connection`] owns one socket through two tasks running on the
//! reactor: a read pump that decodes frames into the shared inbox and a
//! write pump that drains a private outbound queue. [`Connection::send`] may
//! be called from any thread; it only enqueues, and the write pump is the
//! sole writer of the socket.

mod counter;
mod pump;
mod state;

use std::{
    fmt,
    net::SocketAddr,
    sync::{
        Arc,
        OnceLock,
        Weak,
        atomic::{AtomicU32, Ordering},
    },
};

pub use state::ConnectionState;
use state::AtomicState;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, warn};

use crate::{
    message::{Message, OwnedMessage},
    queue::HandoffQueue,
};

/// Identifier assigned to an accepted connection.
///
/// Client-side connections keep the default value of zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u32);

impl ConnectionId {
    /// Create a [`ConnectionId`] with the provided value.
    #[must_use]
    pub const fn new(id: u32) -> Self { Self(id) }

    /// Return the inner `u32` representation.
    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }
}

impl From<u32> for ConnectionId {
    fn from(value: u32) -> Self { Self(value) }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Which side of the conversation owns a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Owned by a [`crate::client::Client`]; inbound messages carry no remote.
    Client,
    /// Owned by a [`crate::server::Server`]; inbound messages are tagged with
    /// the sending connection.
    Server,
}

/// Errors returned when queueing an outbound message.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The connection is closed or was never established.
    #[error("not connected")]
    NotConnected,
    /// The outbound queue is at capacity; the message was dropped.
    #[error("outbound queue full")]
    QueueFull,
    /// The message exceeds the configured maximum frame size.
    #[error("message of {size} bytes exceeds max size {max}")]
    TooLarge {
        /// Frame size of the rejected message.
        size: u32,
        /// Configured maximum.
        max: u32,
    },
}

/// Per-connection limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ConnectionOptions {
    pub(crate) outbound_capacity: usize,
    pub(crate) max_message_size: u32,
}

/// One live or closed peer connection.
///
/// Shared as `Arc<Connection>`. Once closed, a connection is never reopened;
/// reconnecting requires a new one.
pub struct Connection {
    id: AtomicU32,
    role: Role,
    state: AtomicState,
    outbound: mpsc::Sender<Message>,
    close: CancellationToken,
    max_message_size: u32,
    peer_addr: OnceLock<SocketAddr>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("role", &self.role)
            .field("state", &self.state())
            .field("peer_addr", &self.peer_addr())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create an unattached connection and the receiving end of its
    /// outbound queue.
    ///
    /// `parent` is the reactor's shutdown token; stopping the reactor closes
    /// the connection.
    pub(crate) fn new(
        role: Role,
        options: ConnectionOptions,
        parent: &CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(options.outbound_capacity.max(1));
        let connection = Arc::new(Self {
            id: AtomicU32::new(0),
            role,
            state: AtomicState::new(),
            outbound: tx,
            close: parent.child_token(),
            max_message_size: options.max_message_size,
            peer_addr: OnceLock::new(),
        });
        (connection, rx)
    }

    /// Identifier assigned by the server, or the default for client
    /// connections and connections not yet admitted.
    #[must_use]
    pub fn id(&self) -> ConnectionId { ConnectionId(self.id.load(Ordering::Acquire)) }

    pub(crate) fn assign_id(&self, id: ConnectionId) { self.id.store(id.0, Ordering::Release); }

    /// Side of the conversation owning this connection.
    #[must_use]
    pub fn role(&self) -> Role { self.role }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        if self.close.is_cancelled() {
            ConnectionState::Closed
        } else {
            self.state.load()
        }
    }

    /// Whether the pumps are running.
    #[must_use]
    pub fn is_connected(&self) -> bool { self.state() == ConnectionState::Connected }

    /// Whether the connection has closed for good.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.state() == ConnectionState::Closed }

    /// Address of the remote peer, once known.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> { self.peer_addr.get().copied() }

    pub(crate) fn set_peer_addr(&self, addr: SocketAddr) { let _ = self.peer_addr.set(addr); }

    /// Queue `message` for delivery to the peer.
    ///
    /// Returns as soon as the message is queued. Messages may be queued
    /// while the socket is still being attached.
    ///
    /// # Errors
    ///
    /// - [`SendError::NotConnected`] if the connection is closed.
    /// - [`SendError::TooLarge`] if the frame exceeds the configured maximum.
    /// - [`SendError::QueueFull`] if the outbound queue is at capacity.
    pub fn send(&self, message: Message) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::NotConnected);
        }
        if message.size() > self.max_message_size {
            return Err(SendError::TooLarge {
                size: message.size(),
                max: self.max_message_size,
            });
        }
        self.outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(dropped) => {
                warn!(id = %self.id(), message = %dropped, "outbound queue full, message dropped");
                SendError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => SendError::NotConnected,
        })
    }

    /// Request the socket be closed.
    ///
    /// Fire-and-forget: the pumps observe the request on the reactor and drop
    /// the socket, discarding any messages still queued. Idempotent.
    pub fn disconnect(&self) {
        if !self.is_closed() {
            info!(id = %self.id(), "disconnect requested");
        }
        self.mark_closed();
    }

    /// Attach `stream` and spawn both pumps on the current reactor.
    ///
    /// Must run inside the reactor's runtime. Does nothing if the connection
    /// was closed before the socket arrived.
    pub(crate) fn start<S>(
        self: &Arc<Self>,
        stream: S,
        outbound: mpsc::Receiver<Message>,
        inbox: Arc<HandoffQueue<OwnedMessage>>,
        tracker: &TaskTracker,
    ) where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if !self.state.mark_connected() {
            return;
        }
        let (reader, writer) = tokio::io::split(stream);
        tracker.spawn(pump::read_pump(Arc::clone(self), reader, inbox));
        tracker.spawn(pump::write_pump(Arc::clone(self), writer, outbound));
    }

    pub(crate) fn mark_closed(&self) {
        if self.state.mark_closed() {
            info!(id = %self.id(), peer = ?self.peer_addr(), "connection closed");
        }
        self.close.cancel();
    }
}

/// Non-owning reference to the connection a message arrived on.
///
/// Holding a `Remote` never keeps a closed socket alive. Once the connection
/// is gone, [`Remote::send`] reports [`SendError::NotConnected`].
#[derive(Clone, Debug)]
pub struct Remote {
    id: ConnectionId,
    connection: Weak<Connection>,
}

impl Remote {
    pub(crate) fn new(connection: &Arc<Connection>) -> Self {
        Self {
            id: connection.id(),
            connection: Arc::downgrade(connection),
        }
    }

    /// Identifier of the originating connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.id }

    /// Upgrade to the connection if it is still alive.
    #[must_use]
    pub fn connection(&self) -> Option<Arc<Connection>> { self.connection.upgrade() }

    /// Whether the originating connection is still open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection().is_some_and(|c| c.is_connected())
    }

    /// Reply on the originating connection.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::NotConnected`] if the connection has been dropped
    /// or closed, or any error from [`Connection::send`].
    pub fn send(&self, message: Message) -> Result<(), SendError> {
        self.connection()
            .ok_or(SendError::NotConnected)?
            .send(message)
    }
}
