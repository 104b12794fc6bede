//! 1.72: players move to a new opcode with face data and a flag byte.

use super::base::{guild_name, player_flags, push_object_guild_id};
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::message::{OperationId as Op, OutboundMessage as Msg, PlayerCreate};
use crate::protocol::opcodes::{ServerPacket, PLAYER_CREATE_172};
use crate::protocol::version::ProtocolVersion;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::V172,
    parent: Some(ProtocolVersion::V171),
    encoders: &[(Op::PlayerCreate, player_create)],
    opcodes: &[(ServerPacket::PlayerCreate, PLAYER_CREATE_172)],
};

/// Fields added to the player layout by later clients
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct PlayerCreateExtras {
    /// Zero byte after the flags (1.74+)
    pub spacer: bool,
    /// Pascal title after the prefix (1.74+)
    pub title: bool,
}

/// Player creation body from 1.72 on; the caller appends any trailer
pub(super) fn write_player_create(p: &PlayerCreate, extras: PlayerCreateExtras) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u16(p.session_id);
    w.write_u16(p.object_id);
    w.write_u16(p.model);
    w.write_u16(p.z);
    w.write_u16(p.zone);
    w.write_u16(p.x_offset);
    w.write_u16(p.y_offset);
    w.write_u16(p.heading);

    w.write_u8(p.face.eye_size);
    w.write_u8(p.face.lip_size);
    w.write_u8(p.face.mood);
    w.write_u8(p.face.eye_color);
    w.write_u8(p.level);
    w.write_u8(p.face.hair_color);
    w.write_u8(p.face.face_type);
    w.write_u8(p.face.hair_style);

    w.write_u8(player_flags(p));
    if extras.spacer {
        w.write_u8(0x00);
    }

    w.write_pascal(&p.name);
    w.write_pascal(guild_name(p));
    w.write_pascal(&p.last_name);
    w.write_pascal(&p.prefix);
    if extras.title {
        w.write_pascal(&p.title);
    }
    w
}

/// Send the player and the guild id that always follows it
pub(super) fn push_player_create(out: &mut Outbox<'_>, p: &PlayerCreate, w: PacketWriter) {
    out.tcp(ServerPacket::PlayerCreate, w);
    push_object_guild_id(out, p.object_id, p.guild.as_ref().map(|g| g.id));
}

fn player_create(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerCreate(p) = msg else {
        return Err(mismatch(Op::PlayerCreate));
    };
    let w = write_player_create(p, PlayerCreateExtras::default());
    push_player_create(out, p, w);
    Ok(())
}
