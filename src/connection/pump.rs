//! Read and write pumps driving one socket.
//!
//! Both pumps run as tasks on the owning reactor. The read pump decodes
//! frames until the stream fails or ends; the write pump drains the
//! connection's outbound queue. Whichever stops first closes the connection,
//! which cancels the other.

use std::{io, sync::Arc};

use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    select,
    sync::mpsc,
};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use super::{Connection, Remote, Role, counter::ActiveConnection};
use crate::{
    codec::{CodecError, MessageCodec},
    message::{Message, OwnedMessage},
    metrics::{self, Direction},
    queue::HandoffQueue,
};

/// Decode frames from `reader` into `inbox` until the connection closes.
///
/// Server-role connections tag every message with a [`Remote`]; client-role
/// messages carry none.
pub(super) async fn read_pump<R>(
    connection: Arc<Connection>,
    reader: R,
    inbox: Arc<HandoffQueue<OwnedMessage>>,
) where
    R: AsyncRead + Unpin,
{
    let _active = ActiveConnection::new();
    let mut frames = FramedRead::new(reader, MessageCodec::new(connection.max_message_size));
    let remote = match connection.role {
        Role::Server => Some(Remote::new(&connection)),
        Role::Client => None,
    };

    loop {
        let next = select! {
            biased;

            () = connection.close.cancelled() => break,
            next = frames.next() => next,
        };
        match next {
            Some(Ok(message)) => {
                metrics::inc_frames(Direction::Inbound, 1);
                debug!(id = %connection.id(), %message, "message received");
                inbox.push_back(OwnedMessage {
                    remote: remote.clone(),
                    message,
                });
            }
            Some(Err(e)) => {
                let err = CodecError::from_io(e);
                metrics::inc_errors(err.error_type());
                warn!(id = %connection.id(), error = %err, "message read failed");
                break;
            }
            None => {
                info!(id = %connection.id(), "peer closed connection");
                break;
            }
        }
    }
    connection.mark_closed();
}

/// Write queued messages to `writer` until the connection closes.
///
/// Each wake-up writes every message queued at that moment and flushes once,
/// then idles until the next send.
pub(super) async fn write_pump<W>(
    connection: Arc<Connection>,
    writer: W,
    mut outbound: mpsc::Receiver<Message>,
) where
    W: AsyncWrite + Unpin,
{
    let mut frames = FramedWrite::new(writer, MessageCodec::new(connection.max_message_size));

    loop {
        let first = select! {
            biased;

            () = connection.close.cancelled() => break,
            first = outbound.recv() => first,
        };
        let Some(first) = first else { break };

        let written = select! {
            biased;

            () = connection.close.cancelled() => break,
            written = write_batch(&mut frames, first, &mut outbound) => written,
        };
        match written {
            Ok(count) => metrics::inc_frames(Direction::Outbound, count),
            Err(e) => {
                let err = CodecError::from_io(e);
                metrics::inc_errors(err.error_type());
                warn!(id = %connection.id(), error = %err, "message write failed");
                break;
            }
        }
    }
    connection.mark_closed();
}

async fn write_batch<W>(
    frames: &mut FramedWrite<W, MessageCodec>,
    first: Message,
    outbound: &mut mpsc::Receiver<Message>,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    frames.feed(first).await?;
    let mut count = 1;
    while let Ok(next) = outbound.try_recv() {
        frames.feed(next).await?;
        count += 1;
    }
    frames.flush().await?;
    Ok(count)
}
