//! Shared utilities for integration tests.
//!
//! Provides a recording [`ServerHandler`], loopback server and client
//! constructors, and polling helpers with bounded waits.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use peerwire::{
    Client,
    ClientConfig,
    Connection,
    ConnectionId,
    Message,
    Remote,
    Server,
    ServerConfig,
    ServerHandler,
    StaticResolver,
};

/// Upper bound on every wait in the integration tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Create a TCP listener bound to a free local port.
pub fn unused_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("failed to bind port")
}

/// Handler recording every callback.
///
/// Type-0 messages are echoed back to their sender when `echo` is set.
#[derive(Default)]
pub struct Recorder {
    pub echo: AtomicBool,
    pub reject_first: AtomicBool,
    pub connects: AtomicUsize,
    pub disconnects: Mutex<Vec<ConnectionId>>,
    pub messages: Mutex<Vec<(ConnectionId, u32, Vec<u8>)>>,
}

impl Recorder {
    pub fn echoing() -> Arc<Self> {
        let recorder = Self::default();
        recorder.echo.store(true, Ordering::SeqCst);
        Arc::new(recorder)
    }

    pub fn rejecting_first() -> Arc<Self> {
        let recorder = Self::default();
        recorder.reject_first.store(true, Ordering::SeqCst);
        Arc::new(recorder)
    }

    pub fn messages(&self) -> Vec<(ConnectionId, u32, Vec<u8>)> {
        self.messages.lock().expect("messages lock").clone()
    }

    pub fn disconnects(&self) -> Vec<ConnectionId> {
        self.disconnects.lock().expect("disconnects lock").clone()
    }
}

impl ServerHandler for Recorder {
    fn on_client_connect(&self, _connection: &Arc<Connection>) -> bool {
        self.connects.fetch_add(1, Ordering::SeqCst);
        !self.reject_first.swap(false, Ordering::SeqCst)
    }

    fn on_client_disconnect(&self, connection: &Arc<Connection>) {
        self.disconnects
            .lock()
            .expect("disconnects lock")
            .push(connection.id());
    }

    fn on_message(&self, _server: &Server, remote: &Remote, message: Message) {
        self.messages.lock().expect("messages lock").push((
            remote.id(),
            message.message_type(),
            message.body().to_vec(),
        ));
        if self.echo.load(Ordering::SeqCst) && message.message_type() == 0 {
            let _ = remote.send(message);
        }
    }
}

/// Start a server on a free loopback port.
pub fn start_server(handler: Arc<Recorder>) -> Server {
    let mut server = Server::new(ServerConfig::default(), handler);
    server
        .start_with_listener(unused_listener())
        .expect("failed to start server");
    server
}

/// Connect a client to `server`'s loopback address.
pub fn connect_client(server: &Server) -> Client {
    let addr = server.local_addr().expect("server is running");
    let mut client = Client::with_resolver(
        ClientConfig::default().connect_timeout(WAIT),
        StaticResolver::new(vec![addr]),
    );
    client
        .connect("localhost", addr.port())
        .expect("failed to connect client");
    client
}

/// Poll `condition` until it holds or [`WAIT`] elapses.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Drive `server.process_messages` until `condition` holds or [`WAIT`]
/// elapses.
pub fn pump_until(server: &Server, mut condition: impl FnMut() -> bool) -> bool {
    wait_until(|| {
        server.process_messages(false, usize::MAX);
        condition()
    })
}
