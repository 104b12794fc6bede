//! # Core Protocol Components
//!
//! Low-level packet handling: binary primitives, checksums and framing.
//!
//! ## Components
//! - **Buffer**: mixed-endian writer/reader with seek-back patching
//! - **Checksum**: rolling additive 16-bit checksum
//! - **Packet**: TCP and UDP frame layouts, UDP-to-TCP reframing
//! - **Codec**: Tokio codec reassembling frames from the TCP stream
//!
//! ## Wire Format
//! ```text
//! TCP: [Length(2)] [Opcode(1)] [Reserved(1)] [Payload(N)] [Checksum(2)]
//! UDP: [Length(2)] [Sequence(2)] [Opcode(1)] [Reserved(1)] [Payload(N)]
//! ```
//!
//! ## Limits
//! - Maximum frame size: 2048 bytes (the client crashes on larger packets)
//! - Length validation before any buffer growth

pub mod buffer;
pub mod checksum;
pub mod codec;
pub mod packet;
