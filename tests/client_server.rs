#![cfg(not(loom))]
//! Client and server talking over real loopback sockets.

mod common;

use std::sync::{Arc, atomic::Ordering};

use common::{Recorder, WAIT, connect_client, pump_until, start_server, wait_until};
use peerwire::{ConnectionId, Message, SendError};
use rstest::rstest;

#[rstest]
fn empty_type_zero_message_is_echoed() {
    let recorder = Recorder::echoing();
    let server = start_server(Arc::clone(&recorder));
    let client = connect_client(&server);

    client.send(Message::new(0)).expect("send ping");

    assert!(pump_until(&server, || !client.incoming_messages().is_empty()));
    let reply = client
        .incoming_messages()
        .pop_front()
        .expect("echo received");
    assert!(reply.remote.is_none());
    assert_eq!(reply.message.message_type(), 0);
    assert!(reply.message.is_empty());
    assert_eq!(reply.message.size(), 8);
}

#[rstest]
fn client_inbox_wakes_blocked_waiter() {
    let server = start_server(Recorder::echoing());
    let client = connect_client(&server);
    let inbox = client.inbox();

    client.send(Message::new(0)).expect("send ping");
    let waiter = std::thread::spawn(move || inbox.wait_timeout(WAIT));
    assert!(pump_until(&server, || waiter.is_finished()));
    assert!(waiter.join().expect("waiter panicked"));
}

#[rstest]
fn messages_keep_per_connection_order_and_identity() {
    let recorder = Arc::new(Recorder::default());
    let server = start_server(Arc::clone(&recorder));
    let first = connect_client(&server);
    let second = connect_client(&server);

    for client in [&first, &second] {
        for ty in 1..=3_u32 {
            let mut msg = Message::new(ty);
            msg.push(ty * 100).expect("push payload");
            client.send(msg).expect("send");
        }
    }

    assert!(pump_until(&server, || recorder.messages().len() == 6));
    let messages = recorder.messages();
    let mut ids: Vec<ConnectionId> = messages.iter().map(|(id, _, _)| *id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids, vec![ConnectionId::new(10_000), ConnectionId::new(10_001)]);

    for id in ids {
        let types: Vec<u32> = messages
            .iter()
            .filter(|(from, _, _)| *from == id)
            .map(|(_, ty, _)| *ty)
            .collect();
        assert_eq!(types, vec![1, 2, 3], "order for {id}");
    }
    let (_, ty, body) = &messages[0];
    assert_eq!(body, &(ty * 100).to_le_bytes().to_vec());
}

#[rstest]
fn rejected_peer_is_never_registered() {
    let recorder = Recorder::rejecting_first();
    let server = start_server(Arc::clone(&recorder));

    let rejected = connect_client(&server);
    rejected.send(Message::new(66)).ok();
    assert!(wait_until(|| recorder.connects.load(Ordering::SeqCst) == 1));

    let accepted = connect_client(&server);
    accepted.send(Message::new(1)).expect("send from accepted peer");

    assert!(pump_until(&server, || !recorder.messages().is_empty()));
    assert!(wait_until(|| !rejected.is_connected()));
    server.process_messages(false, usize::MAX);

    let messages = recorder.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, ConnectionId::new(10_000));
    assert_eq!(messages[0].1, 1);
    assert_eq!(server.connection_ids(), vec![ConnectionId::new(10_000)]);
}

#[rstest]
fn broadcast_reaps_departed_client() {
    let recorder = Arc::new(Recorder::default());
    let server = start_server(Arc::clone(&recorder));
    let staying = connect_client(&server);
    let mut leaving = connect_client(&server);
    assert!(wait_until(|| server.connection_count() == 2));

    leaving.disconnect();
    let gone = ConnectionId::new(10_001);
    assert!(wait_until(|| {
        server
            .connection(gone)
            .is_some_and(|c| c.is_closed())
    }));

    let delivered = server.send_to_all(&Message::new(3), None);
    assert_eq!(delivered, 1);
    assert_eq!(recorder.disconnects(), vec![gone]);
    assert_eq!(server.connection_ids(), vec![ConnectionId::new(10_000)]);

    assert!(staying.incoming_messages().wait_timeout(WAIT));
    let received = staying.incoming_messages().pop_front().expect("broadcast");
    assert_eq!(received.message.message_type(), 3);
}

#[rstest]
fn server_send_targets_one_connection() {
    let server = start_server(Arc::new(Recorder::default()));
    let first = connect_client(&server);
    let second = connect_client(&server);
    assert!(wait_until(|| server.connection_count() == 2));

    server
        .send(ConnectionId::new(10_001), Message::new(8))
        .expect("send to second client");
    assert!(second.incoming_messages().wait_timeout(WAIT));
    assert!(first.incoming_messages().is_empty());
    assert_eq!(
        server.send(ConnectionId::new(42), Message::new(8)),
        Err(SendError::NotConnected)
    );
}

#[rstest]
fn stopping_server_disconnects_clients() {
    let mut server = start_server(Arc::new(Recorder::default()));
    let client = connect_client(&server);
    assert!(wait_until(|| server.connection_count() == 1));

    server.stop();

    assert!(wait_until(|| !client.is_connected()));
    assert_eq!(server.connection_count(), 0);
}
