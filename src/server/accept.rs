//! Accept loop for the server reactor.

use std::{
    net::SocketAddr,
    sync::{Arc, atomic::Ordering},
};

use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

use super::Shared;
use crate::{
    config::BackoffConfig,
    connection::{Connection, ConnectionId, Role},
};

/// Accept connections until `shutdown` is cancelled.
///
/// Accept failures never end the loop: each one is logged and followed by
/// an exponentially growing pause, reset by the next successful accept.
pub(super) async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    let backoff = shared.config.backoff.normalized();
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) =
        accept_iteration(&listener, &shared, &shutdown, &tracker, &backoff, delay).await
    {
        delay = next_delay;
    }
    debug!("accept loop stopped");
}

async fn accept_iteration(
    listener: &TcpListener,
    shared: &Shared,
    shutdown: &CancellationToken,
    tracker: &TaskTracker,
    backoff: &BackoffConfig,
    delay: Duration,
) -> Option<Duration> {
    select! {
        biased;

        () = shutdown.cancelled() => None,
        res = listener.accept() => match res {
            Ok((stream, peer)) => {
                admit(shared, stream, peer, shutdown, tracker);
                Some(backoff.initial_delay)
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!(error = %e, ?local_addr, "accept error");
                select! {
                    biased;

                    () = shutdown.cancelled() => None,
                    () = sleep(delay) => Some(backoff.next_delay(delay)),
                }
            }
        },
    }
}

/// Vet, register and start one accepted socket.
fn admit(
    shared: &Shared,
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: &CancellationToken,
    tracker: &TaskTracker,
) {
    if shared.config.nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(%peer, error = %e, "failed to set TCP_NODELAY");
        }
    }
    let (connection, outbound) =
        Connection::new(Role::Server, shared.config.connection_options(), shutdown);
    connection.set_peer_addr(peer);

    if !shared.handler.on_client_connect(&connection) {
        info!(%peer, "connection rejected");
        connection.disconnect();
        return;
    }

    let id = ConnectionId::new(shared.next_id.fetch_add(1, Ordering::Relaxed));
    connection.assign_id(id);
    shared.registry.insert(Arc::clone(&connection));
    connection.start(stream, outbound, Arc::clone(&shared.inbox), tracker);
    info!(%id, %peer, "connection accepted");
}
