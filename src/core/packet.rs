//! # Packet Framing
//!
//! Logical packets and their two wire forms.
//!
//! ## Wire Format
//! ```text
//! TCP: [len:u16 BE] [opcode:u8] [reserved:u8] [payload: len-2] [checksum:u16 BE]
//! UDP: [len:u16 BE] [sequence:u16 BE] [opcode:u8] [reserved:u8] [payload: len-2]
//! ```
//!
//! `len` counts the opcode, the reserved byte and the payload. Both forms add
//! six bytes of framing, and a complete frame may never exceed
//! [`MAX_PACKET_SIZE`](crate::config::MAX_PACKET_SIZE) bytes: the client
//! crashes on anything larger.

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::{MAX_PACKET_SIZE, TCP_HEADER_SIZE, UDP_HEADER_SIZE};
use crate::core::checksum::{checksum, verify_frame};
use crate::error::{ProtocolError, Result};

/// Size of the trailing TCP checksum
pub const CHECKSUM_SIZE: usize = 2;

/// A logical packet: one opcode and its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub opcode: u8,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(opcode: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Value of the length field for this packet
    #[inline]
    pub fn length_field(&self) -> usize {
        self.payload.len() + 2
    }

    /// Size of the TCP frame this packet encodes to
    #[inline]
    pub fn tcp_frame_len(&self) -> usize {
        TCP_HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE
    }

    /// Encode into `dst` as a checksummed TCP frame
    pub fn write_tcp_frame(&self, dst: &mut BytesMut) {
        let start = dst.len();
        dst.reserve(self.tcp_frame_len());
        dst.put_u16(self.length_field() as u16);
        dst.put_u8(self.opcode);
        dst.put_u8(0);
        dst.extend_from_slice(&self.payload);
        let sum = checksum(&dst[start..]);
        dst.put_u16(sum);
    }

    /// Encode as a standalone TCP frame
    pub fn to_tcp_frame(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.tcp_frame_len());
        self.write_tcp_frame(&mut buf);
        buf
    }

    /// Encode as a UDP frame with a zero sequence slot.
    ///
    /// The sequence is stamped at send time by the session.
    pub fn to_udp_frame(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(UDP_HEADER_SIZE + self.payload.len());
        buf.put_u16(self.length_field() as u16);
        buf.put_u16(0);
        buf.put_u8(self.opcode);
        buf.put_u8(0);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode one complete TCP frame, verifying its checksum
    pub fn from_tcp_frame(frame: &[u8]) -> Result<Self> {
        let body_len = read_length(frame)?;
        let total = TCP_HEADER_SIZE - 2 + body_len + CHECKSUM_SIZE;
        if frame.len() != total {
            return Err(ProtocolError::InvalidHeader);
        }
        verify_frame(frame)
            .map_err(|(packet, calculated)| ProtocolError::ChecksumMismatch { packet, calculated })?;
        Ok(Self {
            opcode: frame[2],
            payload: Bytes::copy_from_slice(&frame[TCP_HEADER_SIZE..total - CHECKSUM_SIZE]),
        })
    }

    /// Decode one UDP frame, returning the packet and its sequence number
    pub fn from_udp_frame(frame: &[u8]) -> Result<(Self, u16)> {
        let body_len = read_length(frame)?;
        if frame.len() != UDP_HEADER_SIZE - 2 + body_len {
            return Err(ProtocolError::InvalidHeader);
        }
        let sequence = u16::from_be_bytes([frame[2], frame[3]]);
        Ok((
            Self {
                opcode: frame[4],
                payload: Bytes::copy_from_slice(&frame[UDP_HEADER_SIZE..]),
            },
            sequence,
        ))
    }
}

/// Read and sanity-check the length field of a frame
fn read_length(frame: &[u8]) -> Result<usize> {
    if frame.len() < 2 {
        return Err(ProtocolError::Truncated {
            needed: 2 - frame.len(),
        });
    }
    let len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    if len < 2 {
        return Err(ProtocolError::InvalidHeader);
    }
    Ok(len)
}

/// Write `sequence` into the sequence slot of a UDP frame
pub fn stamp_udp_sequence(frame: &mut [u8], sequence: u16) -> Result<()> {
    if frame.len() < UDP_HEADER_SIZE {
        return Err(ProtocolError::InvalidHeader);
    }
    frame[2..4].copy_from_slice(&sequence.to_be_bytes());
    Ok(())
}

/// Turn a UDP frame into a TCP frame without re-encoding the message.
///
/// The length bytes are kept, the two sequence bytes are dropped and a
/// checksum is appended over the result.
pub fn reframe_udp_to_tcp(frame: &[u8]) -> Result<BytesMut> {
    if frame.len() < UDP_HEADER_SIZE {
        return Err(ProtocolError::InvalidHeader);
    }
    let mut out = BytesMut::with_capacity(frame.len() - 2 + CHECKSUM_SIZE);
    out.extend_from_slice(&frame[0..2]);
    out.extend_from_slice(&frame[4..]);
    let sum = checksum(&out);
    out.put_u16(sum);
    Ok(out)
}

/// Reject frames the client cannot survive
#[inline]
pub fn check_frame_size(frame: &[u8]) -> Result<()> {
    if frame.len() > MAX_PACKET_SIZE {
        return Err(ProtocolError::OversizedPacket(frame.len()));
    }
    Ok(())
}
