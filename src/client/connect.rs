//! Endpoint dialling on the client reactor.

use std::{io, net::SocketAddr};

use tokio::net::{TcpSocket, TcpStream};
use tracing::debug;

use crate::config::SocketOptions;

/// Try `endpoints` in order and return the first stream that connects.
///
/// # Errors
///
/// Returns the error from the last endpoint tried, or
/// [`io::ErrorKind::AddrNotAvailable`] if `endpoints` is empty.
pub(super) async fn connect_any(
    endpoints: &[SocketAddr],
    options: &SocketOptions,
) -> io::Result<TcpStream> {
    let mut last_err = None;
    for &addr in endpoints {
        match connect_one(addr, options).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "endpoint failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no endpoints to connect to")
    }))
}

async fn connect_one(addr: SocketAddr, options: &SocketOptions) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    options.apply(&socket)?;
    socket.connect(addr).await
}
