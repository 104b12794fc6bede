#![no_main]

use bytes::BytesMut;
use game_protocol::core::codec::GameCodec;
use game_protocol::core::packet::{reframe_udp_to_tcp, Packet};
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Single frames in both layouts
    let _ = Packet::from_tcp_frame(data);
    let _ = Packet::from_udp_frame(data);
    let _ = reframe_udp_to_tcp(data);

    // Stream reassembly must stop on the first error and never panic
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = GameCodec.decode(&mut buf) {}
});
