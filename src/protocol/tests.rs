// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::core::codec::GameCodec;
use crate::protocol::codec::{Channel, EncodeContext};
use crate::protocol::handshake::negotiate_version;
use crate::protocol::message::{ChatMessage, ObjectUpdate, OutboundMessage};
use crate::protocol::opcodes::{ServerPacket, PLAYER_CREATE_172};
use crate::protocol::preprocess::ClientPhase;
use crate::protocol::registry::Registry;
use crate::protocol::version::ProtocolVersion;

fn context(hello: crate::protocol::handshake::ClientHello, phase: ClientPhase) -> EncodeContext<'static> {
    EncodeContext {
        hello,
        session_id: 0x0102,
        account_name: "merlin",
        server_name_short: "CAMELOT",
        server_id: 0x0C,
        phase,
    }
}

#[test]
fn test_negotiated_version_selects_crypt_key_layout() {
    let legacy = negotiate_version(&[0x03, 1, 7, 4]).expect("1.74 negotiates");
    let codec = Registry::global().codec(legacy.version).unwrap();
    let out = codec
        .encode(&context(legacy, ClientPhase::PreLogin), &OutboundMessage::VersionAndCryptKey)
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].packet.opcode, ServerPacket::CryptKey.base_code());
    assert_eq!(&out[0].packet.payload[..], &[0x00, 0x32, 1, 7, 0x00]);

    let modern = negotiate_version(&[0x03, 1, 1, 25, b'd', 0x2A, 0x07]).expect("1.125 negotiates");
    let codec = Registry::global().codec(modern.version).unwrap();
    let out = codec
        .encode(&context(modern, ClientPhase::PreLogin), &OutboundMessage::VersionAndCryptKey)
        .unwrap();
    let payload = &out[0].packet.payload;
    // u32 LE length prefix, then "1.125d", then the echoed build
    assert_eq!(&payload[..4], &[6, 0, 0, 0]);
    assert_eq!(&payload[4..10], b"1.125d");
    assert_eq!(&payload[10..], &[0x2A, 0x07]);
}

#[test]
fn test_encoded_frame_decodes_with_stream_codec() {
    let hello = negotiate_version(&[0x03, 1, 6, 8]).unwrap();
    let codec = Registry::global().codec(hello.version).unwrap();
    let chat = OutboundMessage::Message(ChatMessage {
        text: "Welcome".into(),
        chat_type: 0x00,
        ..Default::default()
    });
    let out = codec.encode(&context(hello, ClientPhase::InWorld), &chat).unwrap();
    assert_eq!(out[0].channel, Channel::Tcp);

    let mut buf = BytesMut::from(&out[0].packet.to_tcp_frame()[..]);
    let decoded = GameCodec.decode(&mut buf).unwrap().expect("complete frame");
    assert_eq!(decoded, out[0].packet);
    assert_eq!(decoded.opcode, ServerPacket::Message.base_code());
    assert_eq!(&decoded.payload[..2], &[0x01, 0x02]);
}

#[test]
fn test_chat_suppressed_on_character_select() {
    let hello = negotiate_version(&[0x03, 1, 8, 0]).unwrap();
    let codec = Registry::global().codec(hello.version).unwrap();
    let chat = OutboundMessage::Message(ChatMessage {
        text: "hidden".into(),
        ..Default::default()
    });
    let out = codec
        .encode(&context(hello, ClientPhase::CharacterSelect), &chat)
        .unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_object_update_prefers_udp() {
    let hello = negotiate_version(&[0x03, 1, 7, 2]).unwrap();
    let codec = Registry::global().codec(hello.version).unwrap();
    let out = codec
        .encode(
            &context(hello, ClientPhase::InWorld),
            &OutboundMessage::ObjectUpdate(ObjectUpdate {
                object_id: 9,
                ..Default::default()
            }),
        )
        .unwrap();
    assert_eq!(out[0].channel, Channel::Udp { forced: false });
    assert_eq!(out[0].packet.payload.len(), 24);
}

#[test]
fn test_opcode_table_follows_revision_chain() {
    let registry = Registry::global();
    let v171 = registry.codec(ProtocolVersion::V171).unwrap();
    let v199 = registry.codec(ProtocolVersion::new(199)).unwrap();
    assert_eq!(v171.opcode(ServerPacket::PlayerCreate), ServerPacket::PlayerCreate.base_code());
    assert_eq!(v199.opcode(ServerPacket::PlayerCreate), PLAYER_CREATE_172);
}

#[test]
fn test_handler_and_codec_tables_share_versions() {
    let registry = Registry::global();
    for version in crate::protocol::version::known_versions() {
        assert_eq!(registry.codec(version).unwrap().version(), version);
        assert_eq!(registry.handlers(version).unwrap().version(), version);
    }
}
