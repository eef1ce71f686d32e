//! Host name resolution used by [`crate::client::Client::connect`].

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
};

/// Turns a host and port into endpoints to try, in order.
pub trait Resolve: Send + Sync + 'static {
    /// Resolve `host:port`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name cannot be resolved.
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Resolver backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok((host, port).to_socket_addrs()?.collect())
    }
}

/// Resolver returning a fixed list of endpoints regardless of input.
#[derive(Clone, Debug, Default)]
pub struct StaticResolver(Vec<SocketAddr>);

impl StaticResolver {
    /// Always resolve to `endpoints`.
    #[must_use]
    pub fn new(endpoints: Vec<SocketAddr>) -> Self { Self(endpoints) }
}

impl Resolve for StaticResolver {
    fn resolve(&self, _host: &str, _port: u16) -> io::Result<Vec<SocketAddr>> { Ok(self.0.clone()) }
}
