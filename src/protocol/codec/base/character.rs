//! Character sheet, spell lines, targeting and death packets.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::buffer::PacketWriter;
use crate::error::{ProtocolError, Result};
use crate::protocol::codec::{mismatch, EncodeContext, Outbox};
use crate::protocol::message::{
    DisabledSkill, OperationId as Op, OutboundMessage as Msg, PlayerSheet, SpellEntry, SpellLine,
};
use crate::protocol::opcodes::ServerPacket;

use tracing::warn;

/// Sub-code of the player sheet on the various-update opcode
pub(crate) const PLAYER_SHEET_SUBCODE: u8 = 0x03;
const SPELL_LINE_SUBCODE: u8 = 0x02;
const CRAFTING_SUBCODE: u8 = 0x08;
const WEAPON_ARMOR_SUBCODE: u8 = 0x05;
/// Spells one line packet can announce next to the line itself
pub(crate) const MAX_LINE_SPELLS: usize = u8::MAX as usize - 1;

/// Header of each spell line packet and how its entries are written
#[derive(Clone, Copy)]
pub(crate) struct SpellListLayout {
    pub line_head: fn(&mut PacketWriter),
    pub spell: fn(&mut PacketWriter, &SpellEntry),
    /// 1.80+ clients expect a closing empty packet
    pub terminator: bool,
}

pub(crate) const SPELL_LIST_168: SpellListLayout = SpellListLayout {
    line_head: |w| {
        w.write_u8(0);
        w.write_u16(0);
    },
    spell: |w, s| {
        w.write_u8(s.level);
        w.write_u16(s.icon);
        w.write_pascal(&s.name);
    },
    terminator: false,
};

/// One packet per line; spells that do not fit are dropped with a warning
pub(crate) fn push_spell_lines(
    out: &mut Outbox<'_>,
    lines: &[SpellLine],
    layout: SpellListLayout,
) -> Result<()> {
    for (index, line) in lines.iter().enumerate() {
        let index = u8::try_from(index).map_err(|_| ProtocolError::ListTooLong {
            entries: lines.len(),
        })?;

        let mut w = PacketWriter::new();
        w.write_u8(SPELL_LINE_SUBCODE);
        let count_at = w.position();
        w.write_u8(0);
        w.write_u8(0x02);
        w.write_u8(index);
        (layout.line_head)(&mut w);
        w.write_pascal(&line.name);

        let mut written = 0usize;
        for spell in &line.spells {
            let mut entry = PacketWriter::new();
            (layout.spell)(&mut entry, spell);
            if written == MAX_LINE_SPELLS || w.len() + entry.len() > MAX_PAYLOAD_SIZE {
                warn!(
                    line = %line.name,
                    kept = written,
                    total = line.spells.len(),
                    "Spell line clipped to one packet"
                );
                break;
            }
            w.write_bytes(entry.as_slice());
            written += 1;
        }
        w.patch_u8(count_at, (written + 1) as u8)?;
        out.tcp(ServerPacket::VariousUpdate, w);
    }

    if layout.terminator {
        let mut w = PacketWriter::new();
        w.write_bytes(&[SPELL_LINE_SUBCODE, 0x00, 99, 0x00]);
        out.tcp(ServerPacket::VariousUpdate, w);
    }
    Ok(())
}

pub(crate) fn spell_list(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::SpellList(lines) = msg else {
        return Err(mismatch(Op::SpellList));
    };
    push_spell_lines(out, lines, SPELL_LIST_168)
}

/// Sheet entries; each string is preceded by one data byte.
///
/// 1.75 clients drop the master level byte and gain the title entry.
pub(crate) fn write_player_sheet(sheet: &PlayerSheet, with_title: bool) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u8(PLAYER_SHEET_SUBCODE);
    w.write_u8(if with_title { 0x0E } else { 0x0D });
    w.write_u8(0x00);
    w.write_u8(0x00);

    w.write_u8(sheet.level);
    w.write_pascal(&sheet.name);
    w.write_u8((sheet.max_health >> 8) as u8);
    w.write_pascal(&sheet.class_name);
    w.write_u8(sheet.max_health as u8);
    w.write_pascal(&sheet.profession);
    w.write_u8(0x00);
    w.write_pascal(&sheet.class_title);
    w.write_u8(sheet.realm_level);
    w.write_pascal(&sheet.realm_title);
    w.write_u8(sheet.realm_spec_points);
    w.write_pascal(&sheet.base_class);
    w.write_u8((sheet.house >> 8) as u8);
    w.write_pascal(&sheet.guild);
    w.write_u8(sheet.house as u8);
    w.write_pascal(&sheet.last_name);
    w.write_u8(if with_title {
        0
    } else {
        sheet.master_level.wrapping_add(1)
    });
    w.write_pascal(&sheet.race);
    w.write_u8(0x00);
    w.write_pascal(&sheet.guild_rank);
    w.write_u8(0x00);
    w.write_pascal(sheet.craft_skill.as_deref().unwrap_or("None"));
    w.write_u8(0x00);
    w.write_pascal(&sheet.craft_title);
    w.write_u8(0x00);
    if with_title {
        w.write_pascal("None");
        w.write_u8(0x00);
        w.write_pascal(sheet.title.as_deref().unwrap_or("None"));
    } else {
        w.write_pascal(&sheet.master_level_title);
    }
    w
}

pub(crate) fn update_player(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::UpdatePlayer(sheet) = msg else {
        return Err(mismatch(Op::UpdatePlayer));
    };
    out.tcp_checked(ServerPacket::VariousUpdate, write_player_sheet(sheet, false))
}

pub(crate) fn crafting_skills(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::CraftingSkills(skills) = msg else {
        return Err(mismatch(Op::CraftingSkills));
    };
    let mut w = PacketWriter::new();
    w.write_u8(CRAFTING_SUBCODE);
    w.write_u8(skills.len().min(u8::MAX as usize) as u8);
    w.write_u8(0x03);
    w.write_u8(0x00);
    for skill in skills.iter().take(u8::MAX as usize) {
        w.write_u16(skill.points);
        w.write_u8(skill.icon);
        w.write_u32(1);
        w.write_pascal(&skill.name);
    }
    out.tcp_checked(ServerPacket::VariousUpdate, w)
}

pub(crate) fn weapon_armor_stats(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::WeaponArmorStats {
        damage_x100,
        skill,
        effective_af,
    } = msg
    else {
        return Err(mismatch(Op::WeaponArmorStats));
    };
    let mut w = PacketWriter::new();
    w.write_bytes(&[WEAPON_ARMOR_SUBCODE, 6, 0x00, 0x00]);
    let values = [
        (damage_x100 / 100) as u8,
        (damage_x100 % 100) as u8,
        (skill >> 8) as u8,
        *skill as u8,
        (effective_af >> 8) as u8,
        *effective_af as u8,
    ];
    for value in values {
        w.write_u8(value);
        w.write_pascal(" ");
    }
    out.tcp(ServerPacket::VariousUpdate, w);
    Ok(())
}

pub(crate) fn encumberance(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Encumberance { max, used } = msg else {
        return Err(mismatch(Op::Encumberance));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*max);
    w.write_u16(*used);
    out.tcp(ServerPacket::Encumberance, w);
    Ok(())
}

pub(crate) fn disable_skill(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::DisableSkill { skill, duration } = msg else {
        return Err(mismatch(Op::DisableSkill));
    };
    let mut w = PacketWriter::new();
    match *skill {
        DisabledSkill::Ability { index } => {
            w.write_u16(*duration);
            w.write_u8(index);
            w.write_u8(0);
        }
        DisabledSkill::CasterSpell { line, spell } => {
            w.write_u16(*duration);
            w.write_u8(1);
            w.write_u8(2);
            w.write_u8(line);
            w.write_u8(spell);
        }
        DisabledSkill::HybridSpell { index } => {
            w.write_u16(0);
            w.write_u8(1);
            w.write_u8(1);
            w.write_u16(index);
            w.write_u16(*duration);
        }
    }
    out.tcp(ServerPacket::DisableSkills, w);
    Ok(())
}

pub(crate) fn player_died(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerDied { killed, killer } = msg else {
        return Err(mismatch(Op::PlayerDied));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*killed);
    w.write_u16(killer.unwrap_or(0));
    w.fill(0x00, 4);
    out.tcp(ServerPacket::PlayerDeath, w);
    Ok(())
}

pub(crate) fn player_revive(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerRevive { object_id } = msg else {
        return Err(mismatch(Op::PlayerRevive));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*object_id);
    w.write_u16(0);
    out.tcp(ServerPacket::PlayerRevive, w);
    Ok(())
}

pub(crate) fn change_target(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::ChangeTarget { target } = msg else {
        return Err(mismatch(Op::ChangeTarget));
    };
    let mut w = PacketWriter::new();
    w.write_u16(target.unwrap_or(0));
    w.write_u16(0);
    out.tcp(ServerPacket::ChangeTarget, w);
    Ok(())
}

pub(crate) fn change_ground_target(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::ChangeGroundTarget { target } = msg else {
        return Err(mismatch(Op::ChangeGroundTarget));
    };
    let (x, y, z) = target.unwrap_or((0, 0, 0));
    let mut w = PacketWriter::new();
    w.write_u32(x);
    w.write_u32(y);
    w.write_u32(z);
    out.tcp(ServerPacket::ChangeGroundTarget, w);
    Ok(())
}

pub(crate) fn interrupt_animation(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::InterruptAnimation { object_id } = msg else {
        return Err(mismatch(Op::InterruptAnimation));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*object_id);
    w.write_u16(1);
    out.tcp(ServerPacket::InterruptSpellCast, w);
    Ok(())
}

pub(crate) fn player_model_type_change(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::PlayerModelTypeChange {
        object_id,
        model_type,
    } = msg
    else {
        return Err(mismatch(Op::PlayerModelTypeChange));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*object_id);
    w.write_u8(*model_type);
    w.write_u8(if *model_type == 3 { 0x08 } else { 0x00 });
    out.tcp(ServerPacket::PlayerModelTypeChange, w);
    Ok(())
}

/// Older clients build delve text themselves
pub(crate) fn delve_info(_: &EncodeContext<'_>, msg: &Msg, _: &mut Outbox<'_>) -> Result<()> {
    let Msg::DelveInfo { .. } = msg else {
        return Err(mismatch(Op::DelveInfo));
    };
    Ok(())
}

/// The resist sheet appears with 1.75
pub(crate) fn char_resists_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    _: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::CharResistsUpdate(_) = msg else {
        return Err(mismatch(Op::CharResistsUpdate));
    };
    Ok(())
}

pub(crate) fn player_forged_position(
    _: &EncodeContext<'_>,
    msg: &Msg,
    _: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::PlayerForgedPosition(_) = msg else {
        return Err(mismatch(Op::PlayerForgedPosition));
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::version::ProtocolVersion;

    fn line(name: &str, spells: usize, spell_name: &str) -> SpellLine {
        SpellLine {
            name: name.into(),
            spells: (0..spells)
                .map(|i| SpellEntry {
                    level: i as u8,
                    icon: 100 + i as u16,
                    tooltip: 0,
                    name: spell_name.into(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_spell_line_counts_itself() {
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::SpellList(vec![line("Fire", 2, "Bolt"), line("Ice", 0, "")]),
        );
        assert_eq!(packets.len(), 2);
        assert_eq!(&packets[0].payload[..4], &[0x02, 3, 0x02, 0]);
        assert_eq!(&packets[1].payload[..4], &[0x02, 1, 0x02, 1]);
        // level, icon, pascal name
        assert!(packets[0].payload.ends_with(&[1, 0, 101, 4, b'B', b'o', b'l', b't']));
    }

    #[test]
    fn test_long_spell_line_is_clipped() {
        let long = "x".repeat(200);
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::SpellList(vec![line("Fire", 40, &long)]),
        );
        let payload = &packets[0].payload;
        assert!(payload.len() <= MAX_PAYLOAD_SIZE);
        // each entry is 204 bytes; the header and line name leave room for 9
        assert_eq!(payload[1], 10);
    }

    #[test]
    fn test_player_sheet_entries() {
        let sheet = PlayerSheet {
            level: 50,
            max_health: 0x0102,
            master_level: 3,
            ..Default::default()
        };
        let bytes = write_player_sheet(&sheet, false).finish();
        assert_eq!(&bytes[..5], &[0x03, 0x0D, 0, 0, 50]);
        // empty name, then the high health byte
        assert_eq!(bytes[6], 0x01);

        let with_title = write_player_sheet(&sheet, true).finish();
        assert_eq!(with_title[1], 0x0E);
        assert!(with_title.ends_with(b"\x00\x04None"));
    }

    #[test]
    fn test_disable_hybrid_spell() {
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::DisableSkill {
                skill: DisabledSkill::HybridSpell { index: 0x0203 },
                duration: 30,
            },
        );
        assert_eq!(packets[0].payload, vec![0, 0, 1, 1, 2, 3, 0, 30]);
    }

    #[test]
    fn test_delve_info_needs_newer_client() {
        let msg = Msg::DelveInfo {
            info: "(Spell (Index 1))".into(),
        };
        assert!(encode_at(ProtocolVersion::V168, &msg).is_empty());
    }
}
