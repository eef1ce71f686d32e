//! Configuration for clients and servers.
//!
//! Every type derives `serde` so embedding applications can load settings
//! from their own configuration files; missing fields fall back to
//! [`Default`].

mod backoff;
mod socket;

use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

pub use backoff::BackoffConfig;
use serde::{Deserialize, Serialize};
pub use socket::SocketOptions;

use crate::{codec::DEFAULT_MAX_MESSAGE_SIZE, connection::ConnectionOptions};

/// Default capacity of each connection's outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// Identifier handed to the first accepted connection.
pub const DEFAULT_FIRST_CONNECTION_ID: u32 = 10_000;

/// Settings for a [`crate::client::Client`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound on resolving and connecting to every endpoint.
    pub connect_timeout: Duration,
    /// Messages that may wait in the outbound queue before sends fail.
    pub outbound_capacity: usize,
    /// Largest frame, header included, accepted in either direction.
    pub max_message_size: u32,
    /// Options applied to the socket before connecting.
    pub socket: SocketOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            socket: SocketOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Override the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the socket options.
    #[must_use]
    pub fn socket(mut self, socket: SocketOptions) -> Self {
        self.socket = socket;
        self
    }

    pub(crate) fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            outbound_capacity: self.outbound_capacity,
            max_message_size: self.max_message_size,
        }
    }
}

/// Settings for a [`crate::server::Server`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to. Port `0` picks an ephemeral port.
    pub bind_addr: SocketAddr,
    /// Identifier assigned to the first accepted connection; later
    /// connections count up from here.
    pub first_connection_id: u32,
    /// Messages that may wait in each outbound queue before sends fail.
    pub outbound_capacity: usize,
    /// Largest frame, header included, accepted in either direction.
    pub max_message_size: u32,
    /// Set `TCP_NODELAY` on accepted sockets.
    pub nodelay: bool,
    /// Retry timing after accept failures.
    pub backoff: BackoffConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
            first_connection_id: DEFAULT_FIRST_CONNECTION_ID,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            nodelay: false,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Listen on every IPv4 interface at `port`.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port),
            ..Self::default()
        }
    }

    /// Override the bind address.
    #[must_use]
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Override the first connection identifier.
    #[must_use]
    pub fn first_connection_id(mut self, id: u32) -> Self {
        self.first_connection_id = id;
        self
    }

    /// Toggle `TCP_NODELAY` on accepted sockets.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    pub(crate) fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            outbound_capacity: self.outbound_capacity,
            max_message_size: self.max_message_size,
        }
    }
}
