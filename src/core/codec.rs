//! # TCP Stream Codec
//!
//! Reassembles checksummed frames from a TCP byte stream for use with
//! `tokio_util::codec::Framed` / `FramedRead`.
//!
//! Partial frames stay in the read buffer until the rest arrives; complete
//! frames are split off and verified one at a time, so packets come out in
//! strict arrival order. A checksum mismatch or an impossible length is an
//! integrity error: the stream cannot be resynchronised and the caller must
//! drop the connection.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{MAX_PACKET_SIZE, TCP_HEADER_SIZE};
use crate::core::packet::{check_frame_size, Packet, CHECKSUM_SIZE};
use crate::error::{ProtocolError, Result};

/// Framing codec for the TCP control channel
#[derive(Debug, Clone, Copy, Default)]
pub struct GameCodec;

impl Decoder for GameCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < 2 {
            return Ok(None);
        }

        let len = u16::from_be_bytes([src[0], src[1]]) as usize;
        if len < 2 {
            return Err(ProtocolError::InvalidHeader);
        }

        let total = 2 + len + CHECKSUM_SIZE;
        if total > MAX_PACKET_SIZE {
            return Err(ProtocolError::InvalidHeader);
        }

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total).freeze();
        let packet = Packet::from_tcp_frame(&frame)?;
        debug_assert_eq!(packet.payload.len() + TCP_HEADER_SIZE + CHECKSUM_SIZE, total);
        Ok(Some(packet))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(buf)? {
            Some(packet) => Ok(Some(packet)),
            None => {
                // trailing partial frame on a closed socket is simply dropped
                buf.advance(buf.len());
                Ok(None)
            }
        }
    }
}

impl Encoder<Packet> for GameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        if item.tcp_frame_len() > MAX_PACKET_SIZE {
            return Err(ProtocolError::OversizedPacket(item.tcp_frame_len()));
        }
        item.write_tcp_frame(dst);
        Ok(())
    }
}

/// Pass pre-framed bytes straight through, still enforcing the size limit
impl Encoder<bytes::Bytes> for GameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: bytes::Bytes, dst: &mut BytesMut) -> Result<()> {
        check_frame_size(&item)?;
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_decode_waits_for_full_frame() {
        let frame = Packet::new(0xA9, vec![1, 2, 3]).to_tcp_frame();
        let mut codec = GameCodec;
        let mut buf = BytesMut::from(&frame[..5]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(&frame[5..]);
        let pkt = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(pkt.opcode, 0xA9);
        assert_eq!(&pkt.payload[..], &[1, 2, 3]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_leftover_bytes_kept_at_front() {
        let a = Packet::new(0x01, vec![0xAA]).to_tcp_frame();
        let b = Packet::new(0x02, vec![0xBB, 0xCC]).to_tcp_frame();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&a);
        buf.extend_from_slice(&b[..3]);

        let mut codec = GameCodec;
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().opcode, 0x01);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], &b[..3]);
    }

    #[test]
    fn test_oversized_length_is_integrity_error() {
        let mut buf = BytesMut::from(&[0x08, 0x00, 0x01, 0x00][..]);
        let err = GameCodec.decode(&mut buf).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn test_encode_rejects_oversized() {
        let pkt = Packet::new(0x01, vec![0u8; MAX_PACKET_SIZE]);
        let mut dst = BytesMut::new();
        assert!(matches!(
            GameCodec.encode(pkt, &mut dst),
            Err(ProtocolError::OversizedPacket(_))
        ));
        assert!(dst.is_empty());
    }
}
