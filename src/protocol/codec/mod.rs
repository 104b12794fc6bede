//! # Versioned Codec
//!
//! Encodes logical [`OutboundMessage`]s into the byte layout of one client
//! version.
//!
//! ## Revision chain
//! Each [`CodecRevision`] overrides a handful of encoders and opcodes of its
//! parent. The oldest revision (1.68) has no parent and defines everything.
//! Versions without an explicit revision inherit their predecessor
//! unchanged.
//!
//! At first use for a version the chain is folded into a [`ResolvedCodec`]:
//! one flat encoder array indexed by [`OperationId`] and one flat opcode
//! array indexed by [`ServerPacket`]. Encoding is then a single array index
//! with no walk up the chain.
//!
//! ```text
//! 168 (base) <- 170 <- 172 <- 173 <- 174 <- 175 <- 176 <- 180 <- 181 <- 1110 <- 1112 <- 1125
//!   all ops     keeps   0x4B   quests bonus  titles house  horse  spell  trainer items  login
//!                                                                 end
//! ```

pub mod split;

mod base;
mod v170;
mod v172;
mod v173;
mod v174;
mod v175;
mod v176;
mod v180;
mod v181;
mod v1110;
mod v1112;
mod v1125;

use crate::core::buffer::PacketWriter;
use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::handshake::ClientHello;
use crate::protocol::message::{OperationId, OutboundMessage};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::preprocess::ClientPhase;
use crate::protocol::version::ProtocolVersion;

use tracing::trace;

/// Transport a packet should leave on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Tcp,
    /// `forced` packets use UDP even before the endpoint is confirmed
    Udp { forced: bool },
}

/// One encoded packet and the channel it was written for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutPacket {
    pub packet: Packet,
    pub channel: Channel,
}

/// Session facts an encoder may need besides the message itself
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub hello: ClientHello,
    pub session_id: u16,
    pub account_name: &'a str,
    pub server_name_short: &'a str,
    pub server_id: u8,
    pub phase: ClientPhase,
}

impl EncodeContext<'_> {
    #[inline]
    pub fn version(&self) -> ProtocolVersion {
        self.hello.version
    }
}

/// Collects the packets produced by one encode call
#[derive(Debug)]
pub struct Outbox<'a> {
    opcodes: &'a [u8; ServerPacket::COUNT],
    packets: Vec<OutPacket>,
}

impl<'a> Outbox<'a> {
    pub fn new(opcodes: &'a [u8; ServerPacket::COUNT]) -> Self {
        Self {
            opcodes,
            packets: Vec::new(),
        }
    }

    /// Opcode byte of `packet` for this version
    #[inline]
    pub fn opcode(&self, packet: ServerPacket) -> u8 {
        self.opcodes[packet.index()]
    }

    pub fn tcp(&mut self, packet: ServerPacket, payload: PacketWriter) {
        let opcode = self.opcode(packet);
        self.tcp_raw(opcode, payload);
    }

    /// Send an already finished payload
    pub fn tcp_bytes(&mut self, packet: ServerPacket, payload: Vec<u8>) {
        let opcode = self.opcode(packet);
        self.push(opcode, payload, Channel::Tcp);
    }

    /// Send under an opcode that is not part of the versioned map
    pub fn tcp_raw(&mut self, opcode: u8, payload: PacketWriter) {
        self.push(opcode, payload.finish(), Channel::Tcp);
    }

    /// Send a single-packet layout that may have outgrown the payload limit
    pub fn tcp_checked(&mut self, packet: ServerPacket, payload: PacketWriter) -> Result<()> {
        if payload.is_overflowed() {
            return Err(ProtocolError::OversizedPacket(payload.len()));
        }
        self.tcp(packet, payload);
        Ok(())
    }

    pub fn udp(&mut self, packet: ServerPacket, payload: PacketWriter, forced: bool) {
        let opcode = self.opcode(packet);
        self.push(opcode, payload.finish(), Channel::Udp { forced });
    }

    pub(crate) fn push(&mut self, opcode: u8, payload: Vec<u8>, channel: Channel) {
        self.packets.push(OutPacket {
            packet: Packet::new(opcode, payload),
            channel,
        });
    }

    pub fn into_packets(self) -> Vec<OutPacket> {
        self.packets
    }
}

/// Encoder of one operation in one revision
pub type EncodeFn = fn(&EncodeContext<'_>, &OutboundMessage, &mut Outbox<'_>) -> Result<()>;

/// Overrides one version applies on top of its parent
#[derive(Debug)]
pub struct CodecRevision {
    pub version: ProtocolVersion,
    pub parent: Option<ProtocolVersion>,
    pub encoders: &'static [(OperationId, EncodeFn)],
    pub opcodes: &'static [(ServerPacket, u8)],
}

/// Every revision that changes something, oldest first
pub static REVISIONS: &[CodecRevision] = &[
    base::REVISION,
    v170::REVISION,
    v172::REVISION,
    v173::REVISION,
    v174::REVISION,
    v175::REVISION,
    v176::REVISION,
    v180::REVISION,
    v181::REVISION,
    v1110::REVISION,
    v1112::REVISION,
    v1125::REVISION,
];

/// Flat encoder and opcode tables of one version
pub struct ResolvedCodec {
    version: ProtocolVersion,
    encoders: [EncodeFn; OperationId::COUNT],
    opcodes: [u8; ServerPacket::COUNT],
}

impl std::fmt::Debug for ResolvedCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCodec")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

fn unresolved(_: &EncodeContext<'_>, msg: &OutboundMessage, _: &mut Outbox<'_>) -> Result<()> {
    Err(ProtocolError::Registry(format!(
        "no encoder for {}",
        msg.operation().name()
    )))
}

/// Build the mismatch error an encoder returns for a foreign message
#[inline]
pub(crate) fn mismatch(op: OperationId) -> ProtocolError {
    ProtocolError::MessageMismatch {
        expected: op.name(),
    }
}

impl ResolvedCodec {
    /// Fold the revision chain ending at `version`
    pub fn resolve(version: ProtocolVersion, revisions: &[CodecRevision]) -> Result<Self> {
        if !version.is_known() {
            return Err(ProtocolError::UnsupportedVersion(version.get()));
        }

        let chain = revision_chain(version, revisions)?;

        let mut encoders: [Option<EncodeFn>; OperationId::COUNT] = [None; OperationId::COUNT];
        let mut opcodes = [0u8; ServerPacket::COUNT];
        for packet in ServerPacket::ALL {
            opcodes[packet.index()] = packet.base_code();
        }

        // oldest first so newer revisions win
        for revision in chain.iter().rev() {
            for &(op, encoder) in revision.encoders {
                encoders[op.index()] = Some(encoder);
            }
            for &(packet, code) in revision.opcodes {
                opcodes[packet.index()] = code;
            }
        }

        let mut resolved = [unresolved as EncodeFn; OperationId::COUNT];
        for op in OperationId::ALL {
            match encoders[op.index()] {
                Some(encoder) => resolved[op.index()] = encoder,
                None => {
                    return Err(ProtocolError::Registry(format!(
                        "{}: {} missing for {version}",
                        constants::ERR_BASE_REVISION_INCOMPLETE,
                        op.name()
                    )))
                }
            }
        }

        trace!(%version, revisions = chain.len(), "Codec resolved");
        Ok(Self {
            version,
            encoders: resolved,
            opcodes,
        })
    }

    #[inline]
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Opcode byte of `packet` in this version
    #[inline]
    pub fn opcode(&self, packet: ServerPacket) -> u8 {
        self.opcodes[packet.index()]
    }

    /// Encode one message into zero or more packets
    pub fn encode(
        &self,
        ctx: &EncodeContext<'_>,
        msg: &OutboundMessage,
    ) -> Result<Vec<OutPacket>> {
        let mut outbox = Outbox::new(&self.opcodes);
        (self.encoders[msg.operation().index()])(ctx, msg, &mut outbox)?;
        Ok(outbox.into_packets())
    }
}

/// A delta over one parent version, walked by [`revision_chain`]
pub trait Revision {
    fn version(&self) -> ProtocolVersion;
    fn parent(&self) -> Option<ProtocolVersion>;
}

impl Revision for CodecRevision {
    fn version(&self) -> ProtocolVersion {
        self.version
    }

    fn parent(&self) -> Option<ProtocolVersion> {
        self.parent
    }
}

/// Explicit revisions from `version` back to the base, newest first.
///
/// Versions without a revision of their own fall through to their
/// predecessor.
pub fn revision_chain<R: Revision>(version: ProtocolVersion, revisions: &[R]) -> Result<Vec<&R>> {
    let mut chain = Vec::new();
    let mut cursor = Some(version);

    while let Some(v) = cursor {
        match revisions.iter().find(|r| r.version() == v) {
            Some(revision) => {
                chain.push(revision);
                cursor = revision.parent();
            }
            None => {
                cursor = v.predecessor();
                if cursor.is_none() {
                    return Err(ProtocolError::Registry(format!(
                        "{}: chain from {version} ends at {v}",
                        constants::ERR_PARENT_UNKNOWN
                    )));
                }
            }
        }
    }

    Ok(chain)
}

/// Structural checks over a revision list
pub fn validate_revisions(revisions: &[CodecRevision]) -> Result<()> {
    let bases: Vec<_> = revisions.iter().filter(|r| r.parent.is_none()).collect();
    if bases.len() != 1 {
        return Err(ProtocolError::Registry(format!(
            "expected exactly one base revision, found {}",
            bases.len()
        )));
    }

    let base = bases[0];
    for op in OperationId::ALL {
        if !base.encoders.iter().any(|(o, _)| o == op) {
            return Err(ProtocolError::Registry(format!(
                "{}: {}",
                constants::ERR_BASE_REVISION_INCOMPLETE,
                op.name()
            )));
        }
    }

    for revision in revisions {
        if !revision.version.is_known() {
            return Err(ProtocolError::UnsupportedVersion(revision.version.get()));
        }
        if let Some(parent) = revision.parent {
            if parent >= revision.version {
                return Err(ProtocolError::Registry(format!(
                    "{}: {} -> {}",
                    constants::ERR_PARENT_NOT_OLDER,
                    revision.version,
                    parent
                )));
            }
            if !parent.is_known() {
                return Err(ProtocolError::Registry(format!(
                    "{}: {parent}",
                    constants::ERR_PARENT_UNKNOWN
                )));
            }
        }
    }

    Ok(())
}
