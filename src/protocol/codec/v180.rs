//! 1.80: mounted horses and longer skill list packets.
//!
//! Player creation sends the guild emblem little-endian; the horse packets
//! keep network order.

use super::base::{push_hybrid_skills, write_skill_168};
use super::split::SplitRule;
use super::v172::{push_player_create, write_player_create};
use super::v174::EXTRAS_174;
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::message::{Horse, OperationId as Op, OutboundMessage as Msg};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::version::ProtocolVersion;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::V180,
    parent: Some(ProtocolVersion::new(179)),
    encoders: &[
        (Op::PlayerCreate, player_create),
        (Op::HybridSkills, hybrid_skills),
        (Op::SetControlledHorse, set_controlled_horse),
        (Op::ControlledHorse, controlled_horse),
    ],
    opcodes: &[],
};

pub(super) const HYBRID_SKILLS_180: SplitRule = SplitRule {
    threshold: 1500,
    first_subtype: 99,
    subtype: 0x03,
    prefix: &[0x01],
};

/// Bytes of an empty set-horse packet
const NO_HORSE_LEN: usize = 8;

/// Horse block; a guild barding without dye shows the emblem instead
fn write_horse(w: &mut PacketWriter, horse: &Horse, emblem: Option<u32>, emblem_le: bool) {
    w.write_u8(horse.id);
    match emblem {
        Some(emblem) if horse.barding_color == 0 && horse.barding != 0 => {
            w.write_u8(horse.barding | ((emblem & 0x10000) >> 9) as u8);
            if emblem_le {
                w.write_u16_le(emblem as u16);
            } else {
                w.write_u16(emblem as u16);
            }
        }
        _ => {
            w.write_u8(horse.barding);
            w.write_u16(horse.barding_color);
        }
    }
    w.write_u8(horse.saddle);
    w.write_u8(horse.saddle_color);
}

fn player_create(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerCreate(p) = msg else {
        return Err(mismatch(Op::PlayerCreate));
    };
    let mut w = write_player_create(p, EXTRAS_174);
    match &p.horse {
        Some(horse) => write_horse(&mut w, horse, p.guild.as_ref().map(|g| g.emblem), true),
        None => w.write_u8(0),
    }
    push_player_create(out, p, w);
    Ok(())
}

fn hybrid_skills(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::HybridSkills(skills) = msg else {
        return Err(mismatch(Op::HybridSkills));
    };
    push_hybrid_skills(out, &HYBRID_SKILLS_180, skills, write_skill_168)
}

fn set_controlled_horse(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::SetControlledHorse(horse) = msg else {
        return Err(mismatch(Op::SetControlledHorse));
    };
    let mut w = PacketWriter::new();
    match horse {
        Some(h) => {
            // the player's own horse goes out with object id zero
            w.write_u16(0);
            write_horse(&mut w, &h.horse, h.guild_emblem, false);
            w.write_u8(h.saddlebag_slots);
            w.write_u8(h.armor);
            w.write_pascal(&h.name);
        }
        None => w.fill(0x00, NO_HORSE_LEN),
    }
    out.tcp(ServerPacket::ControlledHorse, w);
    Ok(())
}

fn controlled_horse(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::ControlledHorse {
        object_id,
        horse,
        guild_emblem,
    } = msg
    else {
        return Err(mismatch(Op::ControlledHorse));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*object_id);
    match horse {
        Some(horse) => write_horse(&mut w, horse, *guild_emblem, false),
        None => w.fill(0x00, 6),
    }
    out.tcp(ServerPacket::ControlledHorse, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::ControlledHorse;

    fn horse(barding_color: u16) -> Horse {
        Horse {
            id: 2,
            barding: 0x05,
            barding_color,
            saddle: 3,
            saddle_color: 4,
        }
    }

    #[test]
    fn test_guild_barding_shows_emblem() {
        let mut w = PacketWriter::new();
        write_horse(&mut w, &horse(0), Some(0x1_0203), true);
        assert_eq!(w.finish(), vec![2, 0x05 | 0x80, 0x03, 0x02, 3, 4]);
    }

    #[test]
    fn test_dyed_barding_keeps_color() {
        let mut w = PacketWriter::new();
        write_horse(&mut w, &horse(0x0102), Some(0x1_0203), true);
        assert_eq!(w.finish(), vec![2, 0x05, 0x01, 0x02, 3, 4]);
    }

    #[test]
    fn test_set_horse_sends_own_horse_with_zero_id() {
        let msg = Msg::SetControlledHorse(Some(ControlledHorse {
            horse: horse(0),
            saddlebag_slots: 2,
            armor: 1,
            name: "Ed".into(),
            guild_emblem: Some(0x0203),
        }));
        let packets = encode_at(ProtocolVersion::V180, &msg);
        assert_eq!(
            packets[0].payload,
            vec![0, 0, 2, 0x05, 0x02, 0x03, 3, 4, 2, 1, 2, b'E', b'd']
        );

        let none = encode_at(ProtocolVersion::V180, &Msg::SetControlledHorse(None));
        assert_eq!(none[0].payload, vec![0; NO_HORSE_LEN]);
        assert!(encode_at(ProtocolVersion::V176, &Msg::SetControlledHorse(None)).is_empty());
    }

    #[test]
    fn test_dismount_clears_horse_block() {
        let msg = Msg::ControlledHorse {
            object_id: 0x0102,
            horse: None,
            guild_emblem: None,
        };
        let packets = encode_at(ProtocolVersion::V180, &msg);
        assert_eq!(packets[0].payload, vec![1, 2, 0, 0, 0, 0, 0, 0]);
    }
}
