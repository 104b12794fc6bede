use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use game_protocol::core::checksum::checksum;
use game_protocol::core::codec::GameCodec;
use game_protocol::core::packet::Packet;
use game_protocol::protocol::codec::EncodeContext;
use game_protocol::protocol::handshake::negotiate_version;
use game_protocol::protocol::message::{ChatMessage, ObjectUpdate, OutboundMessage};
use game_protocol::protocol::preprocess::ClientPhase;
use game_protocol::protocol::registry::Registry;
use game_protocol::protocol::version::known_versions;
use game_protocol::transport::outbound::SendQueue;
use tokio_util::codec::Decoder;

fn random_payload(len: usize) -> Vec<u8> {
    (0..len).map(|_| rand::random::<u8>()).collect()
}

#[allow(clippy::unwrap_used)]
fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("framing");

    for &size in &[16usize, 256, 2040] {
        let payload = random_payload(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("checksum_{size}b"), |b| {
            b.iter(|| checksum(black_box(&payload)))
        });

        let frame = Packet::new(0xA9, payload.clone()).to_tcp_frame();
        group.bench_function(format!("decode_{size}b"), |b| {
            b.iter_batched(
                || BytesMut::from(&frame[..]),
                |mut buf| GameCodec.decode(&mut buf).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let registry = Registry::global();
    registry.warm_up().unwrap();

    let messages = [
        (
            "object_update",
            OutboundMessage::ObjectUpdate(ObjectUpdate {
                object_id: 512,
                speed: 191,
                ..Default::default()
            }),
        ),
        (
            "message",
            OutboundMessage::Message(ChatMessage {
                text: "You hit the forest giant for 42 damage!".into(),
                ..Default::default()
            }),
        ),
    ];

    let hellos: [(&[u8], &str); 2] = [
        (&[0x03, 1, 6, 8], "1.68"),
        (&[0x03, 1, 1, 25, b'd', 0, 0], "1.125"),
    ];
    for (payload, label) in hellos {
        let hello = negotiate_version(payload).unwrap();
        let codec = registry.codec(hello.version).unwrap();
        let ctx = EncodeContext {
            hello,
            session_id: 7,
            account_name: "bench",
            server_name_short: "BENCH",
            server_id: 1,
            phase: ClientPhase::InWorld,
        };
        for (name, msg) in &messages {
            group.bench_function(format!("{name}_{label}"), |b| {
                b.iter(|| codec.encode(black_box(&ctx), black_box(msg)).unwrap())
            });
        }
    }

    group.bench_function("resolve_all_versions", |b| {
        b.iter(|| {
            for version in known_versions() {
                black_box(registry.codec(version).unwrap());
            }
        })
    });

    group.finish();
}

fn bench_coalescing(c: &mut Criterion) {
    let frames: Vec<_> = (0..64)
        .map(|i| Packet::new(0xA1, random_payload(16 + i * 7)).to_tcp_frame().freeze())
        .collect();

    c.bench_function("coalesce_64_frames", |b| {
        b.iter_batched(
            || {
                let queue = SendQueue::new();
                for f in &frames {
                    queue.enqueue(f.clone());
                }
                queue
            },
            |queue| {
                let mut buf = BytesMut::with_capacity(2048);
                while queue.take_batch(&mut buf, 2048).packets > 0 {
                    buf.clear();
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_framing, bench_encode, bench_coalescing);
criterion_main!(benches);
