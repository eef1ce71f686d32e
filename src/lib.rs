#![doc(html_root_url = "https://docs.rs/peerwire/latest")]
//! Public API for the `peerwire` library.
//!
//! A TCP client and server exchanging typed, length-framed binary
//! messages. Each side runs its socket I/O on a dedicated reactor thread and
//! hands completed messages to application threads through a blocking
//! [`HandoffQueue`].

#[cfg(not(loom))]
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod queue;
mod reactor;
pub mod resolve;
#[cfg(not(loom))]
pub mod server;

#[cfg(not(loom))]
pub use client::{Client, ClientError};
pub use config::{BackoffConfig, ClientConfig, ServerConfig, SocketOptions};
pub use connection::{Connection, ConnectionId, ConnectionState, Remote, Role, SendError};
pub use message::{Field, HEADER_SIZE, Header, Message, MessageError, OwnedMessage};
pub use queue::HandoffQueue;
pub use resolve::{Resolve, StaticResolver, SystemResolver};
#[cfg(not(loom))]
pub use server::{Server, ServerError, ServerHandler};
