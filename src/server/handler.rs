//! Application hooks invoked by the server.

use std::sync::Arc;

use super::Server;
use crate::{
    connection::{Connection, Remote},
    message::Message,
};

/// Callbacks supplied by the application at construction.
///
/// `on_client_connect` runs on the reactor thread and must not block.
/// `on_message` runs on whichever thread calls
/// [`Server::process_messages`]. `on_client_disconnect` runs on the thread
/// whose send or broadcast discovered the closed connection.
pub trait ServerHandler: Send + Sync + 'static {
    /// Decide whether to admit a freshly accepted connection.
    ///
    /// Called before the connection is registered or given an identifier.
    /// Returning `false` drops the socket without reading from it.
    fn on_client_connect(&self, connection: &Arc<Connection>) -> bool {
        let _ = connection;
        true
    }

    /// A registered connection was found closed and has been removed.
    ///
    /// Called at most once per connection.
    fn on_client_disconnect(&self, connection: &Arc<Connection>) { let _ = connection; }

    /// Handle one inbound message from `remote`.
    ///
    /// `server` may be used to reply or broadcast. The remote may already
    /// be disconnected.
    fn on_message(&self, server: &Server, remote: &Remote, message: Message);
}

impl<H: ServerHandler> ServerHandler for Arc<H> {
    fn on_client_connect(&self, connection: &Arc<Connection>) -> bool {
        (**self).on_client_connect(connection)
    }

    fn on_client_disconnect(&self, connection: &Arc<Connection>) {
        (**self).on_client_disconnect(connection);
    }

    fn on_message(&self, server: &Server, remote: &Remote, message: Message) {
        (**self).on_message(server, remote, message);
    }
}
