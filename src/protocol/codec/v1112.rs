//! 1.112: skills and spells carry their id, bag items gain a flag byte with
//! the charge spells, and the server may forge the player's own position.

use super::base::{
    damage_and_type, hand_byte, push_hybrid_skills, push_inventory_slots, push_spell_lines,
    truncated, SpellListLayout,
};
use super::v180::HYBRID_SKILLS_180;
use super::v181::SPELL_LIST_181;
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::message::{
    ForgedPosition, ItemData, OperationId as Op, OutboundMessage as Msg, SkillEntry,
};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::version::ProtocolVersion;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::new(1112),
    parent: Some(ProtocolVersion::new(1111)),
    encoders: &[
        (Op::HybridSkills, hybrid_skills),
        (Op::SpellList, spell_list),
        (Op::InventorySlotsUpdate, inventory_slots_update),
        (Op::PlayerForgedPosition, player_forged_position),
    ],
    opcodes: &[],
};

const SPELL_LIST_1112: SpellListLayout = SpellListLayout {
    line_head: |w| {
        w.write_u16_le(0);
        w.write_u16(0);
        w.write_u16(0);
    },
    spell: |w, s| {
        w.write_u16_le(u16::from(s.level));
        w.write_u16(s.tooltip);
        w.write_u16(s.icon);
        w.write_pascal(&s.name);
    },
    ..SPELL_LIST_181
};

const EMPTY_ITEM_LEN: usize = 21;
const MAX_ITEM_NAME: usize = 55;

const ITEM_NEW_EMBLEM: u8 = 0x01;
const ITEM_SALVAGE: u8 = 0x02;
const ITEM_CRAFT: u8 = 0x04;
const ITEM_SPELL: u8 = 0x08;
const ITEM_SPELL2: u8 = 0x10;

/// Speed word of a mounted player
const MOUNTED_SPEED: u16 = 0x1800;
const MAX_SPEED: u16 = 511;
const BACKWARDS: u16 = 0x200;
const STRAFING: u16 = 1 << 13;
/// Forged positions always put the player on the ground
const ON_GROUND: u16 = 0x1000;

fn write_skill_1112(w: &mut PacketWriter, skill: &SkillEntry) {
    w.write_u8(skill.level);
    w.write_u16(skill.id);
    w.write_u8(skill.page);
    w.write_u16(skill.requirement);
    w.write_u8(skill.bonus);
    w.write_u16(skill.icon);
    w.write_pascal(&skill.name);
}

fn hybrid_skills(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::HybridSkills(skills) = msg else {
        return Err(mismatch(Op::HybridSkills));
    };
    push_hybrid_skills(out, &HYBRID_SKILLS_180, skills, write_skill_1112)
}

fn spell_list(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::SpellList(lines) = msg else {
        return Err(mismatch(Op::SpellList));
    };
    push_spell_lines(out, lines, SPELL_LIST_1112)
}

/// Bag name with the stack count and the asking price
fn item_name(item: &ItemData) -> String {
    let mut name = item.display_name();
    if let Some(price) = &item.price_tag {
        name.push('[');
        name.push_str(price);
        name.push(']');
    }
    name
}

fn write_item_1112(w: &mut PacketWriter, item: Option<&ItemData>) {
    let Some(item) = item else {
        w.fill(0x00, EMPTY_ITEM_LEN);
        return;
    };
    w.write_u8(item.level);
    w.write_u8(item.value1);
    w.write_u8(item.value2);
    w.write_u8(hand_byte(item));
    w.write_u8(damage_and_type(item));
    w.write_u8(0);
    w.write_u16(item.weight);
    w.write_u8(item.condition);
    w.write_u8(item.durability);
    w.write_u8(item.quality);
    w.write_u8(item.bonus);
    w.write_u8(item.bonus_level);
    w.write_u16(item.model);
    w.write_u8(item.extension);

    let mut flag = ITEM_SALVAGE;
    if item.emblem != 0 {
        w.write_u16(item.emblem as u16);
        if item.emblem & 0x10000 != 0 {
            flag |= ITEM_NEW_EMBLEM;
        }
    } else {
        w.write_u16(item.color);
    }
    if item.craftable {
        flag |= ITEM_CRAFT;
    }
    if item.spell.is_some() {
        flag |= ITEM_SPELL;
    }
    if item.spell2.is_some() {
        flag |= ITEM_SPELL2;
    }
    w.write_u8(flag);
    for spell in [&item.spell, &item.spell2].into_iter().flatten() {
        w.write_u16(spell.icon);
        w.write_pascal(&spell.name);
    }
    w.write_u8(item.effect as u8);
    w.write_pascal(truncated(&item_name(item), MAX_ITEM_NAME));
}

fn inventory_slots_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::InventorySlotsUpdate(inv) = msg else {
        return Err(mismatch(Op::InventorySlotsUpdate));
    };
    push_inventory_slots(out, inv, write_item_1112)
}

fn speed_word(pos: &ForgedPosition) -> u16 {
    if pos.steed.is_some() {
        return MOUNTED_SPEED;
    }
    let speed = if pos.incapacitated { 0 } else { pos.speed };
    let magnitude = speed.unsigned_abs().min(MAX_SPEED);
    let mut word = if speed < 0 {
        magnitude + BACKWARDS
    } else {
        magnitude
    };
    word += pos.state.code() << 10;
    if pos.strafing {
        word += STRAFING;
    }
    word
}

fn player_forged_position(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerForgedPosition(pos) = msg else {
        return Err(mismatch(Op::PlayerForgedPosition));
    };
    let mut w = PacketWriter::new();
    w.write_u16(pos.session_id);
    w.write_u16(speed_word(pos));
    w.write_u16(pos.z);
    w.write_u16(pos.x_offset);
    w.write_u16(pos.y_offset);
    w.write_u16(pos.zone_skin);
    match pos.steed {
        Some((steed, seat)) => {
            w.write_u16(steed);
            w.write_u16(seat);
        }
        None => {
            w.write_u16(pos.heading.wrapping_add(ON_GROUND));
            w.write_u16(0);
        }
    }

    let mut flags = 0u8;
    if pos.wireframe {
        flags |= 0x01;
    }
    if pos.stealthed {
        flags |= 0x02;
    }
    if pos.diving {
        flags |= 0x04;
    }
    if pos.torch {
        flags |= 0x80;
    }
    w.write_u8(flags);
    w.write_u8(pos.health_percent.min(100) | if pos.attacking { 0x80 } else { 0 });
    w.write_u8(pos.mana_percent);
    w.write_u8(pos.endurance_percent);
    w.write_u8(pos.realm_points_flag);
    w.write_u8(0);
    out.udp(ServerPacket::PlayerPosition, w, false);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::{ctx, encode_at};
    use crate::protocol::codec::{Channel, ResolvedCodec, REVISIONS};
    use crate::protocol::message::{InventorySlots, ItemSpell, MoveState, SpellEntry, SpellLine};

    const V1112: ProtocolVersion = ProtocolVersion::new(1112);

    #[test]
    fn test_skill_entries_carry_id() {
        let msg = Msg::HybridSkills(vec![SkillEntry {
            id: 0x0304,
            level: 5,
            page: 1,
            icon: 7,
            name: "Slash".into(),
            ..Default::default()
        }]);
        let old = encode_at(ProtocolVersion::V1110, &msg);
        let new = encode_at(V1112, &msg);
        assert_eq!(new[0].payload.len(), old[0].payload.len() + 2);
        assert!(new[0]
            .payload
            .ends_with(&[5, 3, 4, 1, 0, 0, 0, 0, 7, 5, b'S', b'l', b'a', b's', b'h']));
    }

    #[test]
    fn test_spell_line_layout() {
        let msg = Msg::SpellList(vec![SpellLine {
            name: "Fire".into(),
            spells: vec![SpellEntry {
                level: 3,
                icon: 0x0102,
                tooltip: 0x0A0B,
                name: "Bolt".into(),
            }],
        }]);
        let packets = encode_at(V1112, &msg);
        assert_eq!(packets.len(), 2);
        assert_eq!(
            packets[0].payload,
            b"\x02\x02\x02\x00\x00\x00\x00\x00\x00\x00\x04Fire\x03\x00\x0a\x0b\x01\x02\x04Bolt"
                .to_vec()
        );
        assert_eq!(packets[1].payload, vec![0x02, 0x00, 99, 0x00]);
    }

    #[test]
    fn test_item_flags_and_spells() {
        let item = ItemData {
            emblem: 0x1_0005,
            craftable: true,
            spell2: Some(ItemSpell {
                icon: 0x0203,
                name: "Heal".into(),
            }),
            effect: 0x0107,
            count: 2,
            name: "Potion".into(),
            price_tag: Some("5g".into()),
            ..Default::default()
        };
        let mut w = PacketWriter::new();
        write_item_1112(&mut w, Some(&item));
        let bytes = w.finish();
        assert_eq!(&bytes[16..18], &[0x00, 0x05]);
        assert_eq!(bytes[18], ITEM_NEW_EMBLEM | ITEM_SALVAGE | ITEM_CRAFT | ITEM_SPELL2);
        assert_eq!(&bytes[19..26], b"\x02\x03\x04Heal");
        assert_eq!(bytes[26], 0x07);
        assert_eq!(&bytes[27..], b"\x0c2 Potion[5g]");
    }

    #[test]
    fn test_empty_slot_and_long_name() {
        let mut w = PacketWriter::new();
        write_item_1112(&mut w, None);
        assert_eq!(w.len(), EMPTY_ITEM_LEN);

        let item = ItemData {
            name: "n".repeat(80),
            ..Default::default()
        };
        let msg = Msg::InventorySlotsUpdate(InventorySlots {
            slots: vec![(40, Some(item))],
            ..Default::default()
        });
        let packets = encode_at(V1112, &msg);
        let p = &packets[0].payload;
        assert_eq!(p[4], 40);
        assert_eq!(p[5 + 20] as usize, MAX_ITEM_NAME);
        assert_eq!(p.len(), 5 + 20 + 1 + MAX_ITEM_NAME);
    }

    #[test]
    fn test_forged_position_over_udp() {
        let pos = ForgedPosition {
            session_id: 0x0102,
            speed: -600,
            state: MoveState::Swimming,
            strafing: true,
            heading: 0x0203,
            health_percent: 90,
            attacking: true,
            torch: true,
            stealthed: true,
            ..Default::default()
        };
        let msg = Msg::PlayerForgedPosition(pos);
        assert!(encode_at(ProtocolVersion::V1110, &msg).is_empty());

        let out = ResolvedCodec::resolve(V1112, REVISIONS)
            .unwrap()
            .encode(&ctx(V1112), &msg)
            .unwrap();
        assert_eq!(out[0].channel, Channel::Udp { forced: false });
        assert_eq!(out[0].packet.opcode, 0xA9);
        let p = &out[0].packet.payload;
        assert_eq!(p.len(), 22);
        // 511 backwards, swimming, strafing
        assert_eq!(&p[2..4], &[0x27, 0xFF]);
        assert_eq!(&p[12..16], &[0x12, 0x03, 0, 0]);
        assert_eq!(&p[16..18], &[0x82, 90 | 0x80]);
    }

    #[test]
    fn test_mounted_position_sends_steed() {
        let pos = ForgedPosition {
            speed: 200,
            steed: Some((0x0A0B, 1)),
            ..Default::default()
        };
        let packets = encode_at(V1112, &Msg::PlayerForgedPosition(pos));
        let p = &packets[0].payload;
        assert_eq!(&p[2..4], &[0x18, 0x00]);
        assert_eq!(&p[12..16], &[0x0A, 0x0B, 0, 1]);
    }
}
