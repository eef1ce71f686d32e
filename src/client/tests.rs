//! Client tests against a raw loopback peer.

use std::{
    io::{self, Read, Write},
    net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    time::Duration,
};

use rstest::{fixture, rstest};

use super::*;
use crate::{message::Header, resolve::StaticResolver};

const WAIT: Duration = Duration::from_secs(2);

#[fixture]
fn listener() -> TcpListener {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind loopback listener")
}

/// Address nothing is listening on.
#[fixture]
fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind loopback listener");
    listener.local_addr().expect("listener address")
}

struct FailingResolver;

impl Resolve for FailingResolver {
    fn resolve(&self, _host: &str, _port: u16) -> io::Result<Vec<SocketAddr>> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no such host"))
    }
}

fn client_for(addr: SocketAddr) -> Client {
    Client::with_resolver(
        ClientConfig::default().connect_timeout(WAIT),
        StaticResolver::new(vec![addr]),
    )
}

fn read_frame(stream: &mut TcpStream) -> Message {
    let mut header = [0; 8];
    stream.read_exact(&mut header).expect("read header");
    let header = Header::from_bytes(header);
    let mut body = vec![0; header.body_len().expect("valid size")];
    stream.read_exact(&mut body).expect("read body");
    Message::from_parts(header.message_type, body).expect("rebuild message")
}

fn write_frame(stream: &mut TcpStream, message: &Message) {
    stream
        .write_all(&message.header().to_bytes())
        .expect("write header");
    stream.write_all(message.body()).expect("write body");
}

#[rstest]
fn exchanges_messages_with_raw_peer(listener: TcpListener) {
    let addr = listener.local_addr().expect("listener address");
    let mut client = client_for(addr);
    client.connect("peer", addr.port()).expect("connect");
    assert!(client.is_connected());
    let (mut peer, _) = listener.accept().expect("accept client");
    peer.set_read_timeout(Some(WAIT)).expect("set timeout");

    let mut msg = Message::new(5);
    msg.push(42_u32).expect("push field");
    client.send(msg).expect("queue send");

    let mut received = read_frame(&mut peer);
    assert_eq!(received.message_type(), 5);
    assert_eq!(received.size(), 12);
    assert_eq!(received.pop::<u32>().expect("pop field"), 42);

    let mut reply = Message::new(6);
    reply.push_bytes(b"pong").expect("push payload");
    write_frame(&mut peer, &reply);

    assert!(client.incoming_messages().wait_timeout(WAIT));
    let owned = client.incoming_messages().pop_front().expect("reply queued");
    assert!(owned.remote.is_none());
    assert_eq!(owned.message, reply);
}

#[rstest]
fn refused_connect_leaves_client_disconnected(closed_addr: SocketAddr) {
    let mut client = client_for(closed_addr);
    let err = client
        .connect("peer", closed_addr.port())
        .expect_err("nothing is listening");
    assert!(matches!(err, ClientError::Connect(_)), "got {err:?}");
    assert!(!client.is_connected());
    assert!(client.connection().is_none());
    assert_eq!(client.send(Message::new(0)), Err(SendError::NotConnected));
}

#[rstest]
fn resolver_failure_is_reported() {
    let mut client = Client::with_resolver(ClientConfig::default(), FailingResolver);
    let err = client.connect("nowhere", 1).expect_err("resolution fails");
    assert!(matches!(err, ClientError::Resolve { port: 1, .. }), "got {err:?}");
}

#[rstest]
fn empty_resolution_is_reported() {
    let mut client = Client::with_resolver(ClientConfig::default(), StaticResolver::default());
    let err = client.connect("nowhere", 1).expect_err("no endpoints");
    assert!(matches!(err, ClientError::NoEndpoints { .. }), "got {err:?}");
}

#[rstest]
fn second_connect_is_rejected(listener: TcpListener) {
    let addr = listener.local_addr().expect("listener address");
    let mut client = client_for(addr);
    client.connect("peer", addr.port()).expect("connect");
    assert!(matches!(
        client.connect("peer", addr.port()),
        Err(ClientError::AlreadyConnected)
    ));
}

#[rstest]
fn disconnect_closes_socket(listener: TcpListener) {
    let addr = listener.local_addr().expect("listener address");
    let mut client = client_for(addr);
    client.connect("peer", addr.port()).expect("connect");
    let (mut peer, _) = listener.accept().expect("accept client");
    peer.set_read_timeout(Some(WAIT)).expect("set timeout");

    client.disconnect();
    client.disconnect();
    assert!(!client.is_connected());

    let mut buf = [0; 1];
    assert_eq!(peer.read(&mut buf).expect("read eof"), 0);
}

#[rstest]
fn peer_hangup_is_observed(listener: TcpListener) {
    let addr = listener.local_addr().expect("listener address");
    let mut client = client_for(addr);
    client.connect("peer", addr.port()).expect("connect");
    let (peer, _) = listener.accept().expect("accept client");
    drop(peer);

    let deadline = std::time::Instant::now() + WAIT;
    while client.is_connected() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!client.is_connected());
}
