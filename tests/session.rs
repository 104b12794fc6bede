//! Integration tests for sessions and the connection processor

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use game_protocol::config::ProtocolConfig;
use game_protocol::core::codec::GameCodec;
use game_protocol::core::packet::Packet;
use game_protocol::error::{ProtocolError, Result};
use game_protocol::protocol::dispatcher::GameHandler;
use game_protocol::protocol::handshake::ClientHello;
use game_protocol::protocol::inbound::ClientMessage;
use game_protocol::protocol::message::{ObjectUpdate, OutboundMessage, UdpInitReply};
use game_protocol::protocol::preprocess::ClientPhase;
use game_protocol::protocol::version::ProtocolVersion;
use game_protocol::transport::server::GameServer;
use game_protocol::transport::session::{Session, SessionHandle, SessionResources};
use game_protocol::transport::udp::UdpChannel;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug)]
enum Event {
    Message(ClientMessage),
    Disconnected,
}

struct Recorder {
    events: mpsc::UnboundedSender<Event>,
}

impl GameHandler for Recorder {
    fn handle(&self, session: &SessionHandle, message: ClientMessage) -> Result<()> {
        let _ = self.events.send(Event::Message(message.clone()));
        match message {
            ClientMessage::LoginRequest(_) => {
                session.set_phase(ClientPhase::CharacterSelect);
                Ok(())
            }
            ClientMessage::PingRequest { timestamp } => session.send(&OutboundMessage::PingReply {
                timestamp,
                sequence: 0,
            }),
            ClientMessage::RegionListRequest { .. } => panic!("region list exploded"),
            _ => Ok(()),
        }
    }

    fn on_disconnect(&self, _session: &SessionHandle) {
        let _ = self.events.send(Event::Disconnected);
    }
}

struct TestServer {
    addr: SocketAddr,
    events: mpsc::UnboundedReceiver<Event>,
    _shutdown: mpsc::Sender<()>,
}

async fn start_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events) = mpsc::unbounded_channel();
    let (shutdown, shutdown_rx) = mpsc::channel(1);

    let config = ProtocolConfig::default_with_overrides(|c| {
        c.server.shutdown_timeout = Duration::from_secs(1);
    });
    let server = GameServer::new(config, Recorder { events: events_tx });
    tokio::spawn(server.serve(listener, None, shutdown_rx));

    TestServer {
        addr,
        events,
        _shutdown: shutdown,
    }
}

async fn send_packet(stream: &mut TcpStream, opcode: u8, payload: Vec<u8>) {
    stream
        .write_all(&Packet::new(opcode, payload).to_tcp_frame())
        .await
        .unwrap();
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(WAIT, events.recv())
        .await
        .expect("event in time")
        .expect("server alive")
}

fn login_174(username: &str) -> Vec<u8> {
    let mut body = vec![0, 0, 1, 7, 4];
    body.extend_from_slice(&[0u8; 20]);
    body.extend_from_slice(&[0u8; 11 + 12 + 27]);
    let mut name = username.as_bytes().to_vec();
    name.resize(20, 0);
    body.extend_from_slice(&name);
    body
}

#[tokio::test]
async fn test_negotiation_replies_with_crypt_key() {
    let mut server = start_server().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    send_packet(&mut stream, 0xF4, vec![0x03, 1, 7, 4]).await;

    let (reader, _writer) = stream.into_split();
    let mut frames = FramedRead::new(reader, GameCodec);
    let reply = timeout(WAIT, frames.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(reply.opcode, 0x22);
    assert_eq!(&reply.payload[..], &[0x00, 0x32, 1, 7, 0x00]);

    match next_event(&mut server.events).await {
        Event::Message(ClientMessage::CryptKeyRequest(hello)) => {
            assert_eq!(hello.version, ProtocolVersion::V174);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_checksum_mismatch_disconnects_without_handler() {
    let mut server = start_server().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let mut frame = Packet::new(0xF4, vec![0x03, 1, 7, 4]).to_tcp_frame();
    let last = frame.len() - 1;
    frame[last] ^= 0x5A;
    stream.write_all(&frame).await.unwrap();

    assert!(matches!(next_event(&mut server.events).await, Event::Disconnected));

    let (reader, _writer) = stream.into_split();
    let mut frames = FramedRead::new(reader, GameCodec);
    let after = timeout(WAIT, frames.next()).await.unwrap();
    assert!(!matches!(after, Some(Ok(_))), "no reply after a corrupt frame");
}

#[tokio::test]
async fn test_unknown_version_closes_connection() {
    let mut server = start_server().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    send_packet(&mut stream, 0xF4, vec![0x03, 1, 5, 0]).await;

    assert!(matches!(next_event(&mut server.events).await, Event::Disconnected));
}

#[tokio::test]
async fn test_phase_gating_and_handler_panic_isolation() {
    let mut server = start_server().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    send_packet(&mut stream, 0xF4, vec![0x03, 1, 7, 4]).await;
    assert!(matches!(
        next_event(&mut server.events).await,
        Event::Message(ClientMessage::CryptKeyRequest(_))
    ));

    // requires a logged-in client: dropped silently
    send_packet(&mut stream, 0x9D, vec![0]).await;
    send_packet(&mut stream, 0xA7, login_174("arthur")).await;
    match next_event(&mut server.events).await {
        Event::Message(ClientMessage::LoginRequest(login)) => assert_eq!(login.username, "arthur"),
        other => panic!("unexpected {other:?}"),
    }

    // now allowed; the handler panics but the connection survives
    send_packet(&mut stream, 0x9D, vec![0]).await;
    assert!(matches!(
        next_event(&mut server.events).await,
        Event::Message(ClientMessage::RegionListRequest { slot: 0 })
    ));

    send_packet(&mut stream, 0xA3, vec![0, 0, 0, 0, 0, 0, 0x30, 0x39]).await;
    assert!(matches!(
        next_event(&mut server.events).await,
        Event::Message(ClientMessage::PingRequest { timestamp: 12345 })
    ));

    let (reader, _writer) = stream.into_split();
    let mut frames = FramedRead::new(reader, GameCodec);
    let crypt = timeout(WAIT, frames.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(crypt.opcode, 0x22);
    let pong = timeout(WAIT, frames.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(pong.opcode, 0x29);
    assert_eq!(&pong.payload[..4], &12345u32.to_be_bytes());
}

fn hello(version: ProtocolVersion) -> ClientHello {
    ClientHello {
        version,
        client_type: 3,
        revision: 0,
        build: [0, 0],
    }
}

fn object_update() -> OutboundMessage {
    OutboundMessage::ObjectUpdate(ObjectUpdate {
        object_id: 0x0BAD,
        ..Default::default()
    })
}

#[tokio::test]
async fn test_udp_falls_back_to_tcp_until_confirmed() {
    let channel = UdpChannel::bind("127.0.0.1:0").await.unwrap();
    let client_udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client_port = client_udp.local_addr().unwrap().port();

    let (server_end, client_end) = tokio::io::duplex(64 * 1024);
    let resources = SessionResources::new(Arc::new(ProtocolConfig::default()), Some(channel));
    let session = Session::new(
        1,
        "127.0.0.1:40000".parse().unwrap(),
        server_end,
        resources,
        CancellationToken::new(),
    );
    session.bind(hello(ProtocolVersion::V176)).unwrap();
    let mut tcp = FramedRead::new(client_end, GameCodec);

    // no endpoint: reframed onto TCP
    session.send(&object_update()).unwrap();
    let fallback = timeout(WAIT, tcp.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(fallback.opcode, 0xA1);
    assert_eq!(&fallback.payload[16..18], &[0x0B, 0xAD]);

    // endpoint known but unconfirmed: still TCP unless forced
    session.register_udp_endpoint(client_port);
    assert!(!session.udp_confirmed());
    session.send(&object_update()).unwrap();
    assert_eq!(timeout(WAIT, tcp.next()).await.unwrap().unwrap().unwrap().opcode, 0xA1);

    session
        .send(&OutboundMessage::UdpInitReply(UdpInitReply::default()))
        .unwrap();
    let mut buf = [0u8; 2048];
    let (len, _) = timeout(WAIT, client_udp.recv_from(&mut buf)).await.unwrap().unwrap();
    let (forced, sequence) = Packet::from_udp_frame(&buf[..len]).unwrap();
    assert_eq!(forced.opcode, 0x2F);
    assert_eq!(sequence, 1);

    session.confirm_udp();
    assert!(session.udp_confirmed());
    session.send(&object_update()).unwrap();
    let (len, _) = timeout(WAIT, client_udp.recv_from(&mut buf)).await.unwrap().unwrap();
    let (update, sequence) = Packet::from_udp_frame(&buf[..len]).unwrap();
    assert_eq!(update.opcode, 0xA1);
    assert_eq!(sequence, 2);
}

fn standalone_session(config: ProtocolConfig) -> (SessionHandle, tokio::io::DuplexStream) {
    let (server_end, client_end) = tokio::io::duplex(64 * 1024);
    let session = Session::new(
        2,
        "127.0.0.1:40001".parse().unwrap(),
        server_end,
        SessionResources::new(Arc::new(config), None),
        CancellationToken::new(),
    );
    session.bind(hello(ProtocolVersion::V168)).unwrap();
    (session, client_end)
}

#[tokio::test]
async fn test_oversized_frame_disconnects() {
    let (session, _client) = standalone_session(ProtocolConfig::default());
    let err = session.send_tcp(Bytes::from(vec![0u8; 3000])).unwrap_err();
    assert!(matches!(err, ProtocolError::OversizedPacket(3000)));
    assert!(session.is_closed());
    assert!(session.cancellation_token().is_cancelled());
}

#[tokio::test]
async fn test_oversized_frame_dropped_when_ignored() {
    let config = ProtocolConfig::default_with_overrides(|c| {
        c.transport.ignore_oversized_outgoing = true;
    });
    let (session, client) = standalone_session(config);
    session.send_tcp(Bytes::from(vec![0u8; 3000])).unwrap();
    assert!(!session.is_closed());

    // the next packet is the first thing on the wire
    session.send(&OutboundMessage::SessionId).unwrap();
    let mut tcp = FramedRead::new(client, GameCodec);
    let next = timeout(WAIT, tcp.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(next.opcode, 0x28);
    assert_eq!(&next.payload[..], &2u16.to_le_bytes());
}

#[tokio::test]
async fn test_sends_arrive_in_order() {
    let (session, client) = standalone_session(ProtocolConfig::default());
    for object_id in 0..50u16 {
        session
            .send(&OutboundMessage::ModelChange {
                object_id,
                model: 7,
            })
            .unwrap();
    }

    let mut tcp = FramedRead::new(client, GameCodec);
    for object_id in 0..50u16 {
        let packet = timeout(WAIT, tcp.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(&packet.payload[..2], &object_id.to_be_bytes());
    }
}
