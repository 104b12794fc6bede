//! 1.73: chat carries a sender marker, region changes grow, and the effect
//! bar is updated incrementally. Visual effects and the quest journal with
//! a task line also start here.

use super::base::{
    chat_text, clip_quest_text, listed_ammo, push_quest_list, siege_flag, siege_title,
    text_room, write_quest, write_siege_ammo, write_visual_effect,
};
use super::v170::write_keep_head;
use super::split::{pack_list, ListLayout, MAX_LIST_ENTRIES};
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::message::{
    EffectIcon, IconsUpdate, OperationId as Op, OutboundMessage as Msg, QuestText,
};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::preprocess::ClientPhase;
use crate::protocol::version::ProtocolVersion;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::V173,
    parent: Some(ProtocolVersion::V172),
    encoders: &[
        (Op::Message, message),
        (Op::RegionChanged, region_changed),
        (Op::UpdateIcons, update_icons),
        (Op::KeepInfo, keep_info),
        (Op::HexEffect, hex_effect),
        (Op::NpcsQuestEffect, npcs_quest_effect),
        (Op::QuestUpdate, quest_update),
        (Op::QuestListUpdate, quest_list_update),
        (Op::SiegeWeaponInterface, siege_weapon_interface),
    ],
    opcodes: &[],
};

fn message(ctx: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Message(chat) = msg else {
        return Err(mismatch(Op::Message));
    };
    if ctx.phase == ClientPhase::CharacterSelect {
        return Ok(());
    }
    let mut w = PacketWriter::new();
    w.write_u16(0xFFFF);
    w.write_u16(ctx.session_id);
    w.write_u8(chat.chat_type);
    w.fill(0, 3);
    w.write_cstring(&chat_text(chat.location, &chat.text));
    out.tcp(ServerPacket::Message, w);
    Ok(())
}

fn region_changed(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::RegionChanged { region, .. } = msg else {
        return Err(mismatch(Op::RegionChanged));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*region);
    w.write_u16(0x00);
    w.write_u16(0x00);
    w.write_u16(0x01);
    out.tcp(ServerPacket::RegionChanged, w);
    Ok(())
}

/// Layout differences of the incremental effect bar
#[derive(Debug, Clone, Copy)]
pub(super) struct IconsLayout {
    /// Tooltip id instead of internal id, plus a negative-effect byte (1.110+)
    pub tooltip: bool,
    /// Zero bytes sent for a cleared slot after its index
    pub clear_len: usize,
}

const ICONS_173: IconsLayout = IconsLayout {
    tooltip: false,
    clear_len: 9,
};

enum IconSlot<'a> {
    Changed(u8, &'a EffectIcon),
    Cleared(u8),
}

/// Send changed effects and clear slots that vanished since the last update.
///
/// Nothing is sent when no entry changed.
pub(super) fn push_icons(out: &mut Outbox<'_>, icons: &IconsUpdate, layout: IconsLayout) -> Result<()> {
    let shown = &icons.effects[..icons.effects.len().min(MAX_LIST_ENTRIES)];
    let mut slots: Vec<IconSlot<'_>> = shown
        .iter()
        .enumerate()
        .filter(|(_, fx)| fx.changed)
        .map(|(i, fx)| IconSlot::Changed(i as u8, fx))
        .collect();
    slots.extend((shown.len() as u8..icons.previous_count).map(IconSlot::Cleared));
    if slots.is_empty() {
        return Ok(());
    }

    let window = if layout.tooltip { icons.window } else { 0 };
    let header = [0, 0, window, 0];
    let payloads = pack_list(&ListLayout::counted(&header, 0), slots, |w, slot| match slot {
        IconSlot::Changed(index, fx) => {
            let spell_index = if layout.tooltip {
                fx.is_spell || fx.icon > 5000
            } else {
                fx.is_spell
            };
            w.write_u8(index);
            w.write_u8(if spell_index { index } else { 0xFF });
            w.write_bool(fx.immune);
            w.write_u16(fx.icon);
            w.write_u16(fx.remaining_secs);
            if layout.tooltip {
                w.write_u16(fx.tooltip_id);
                w.write_bool(fx.negative);
            } else {
                w.write_u16(fx.internal_id);
            }
            w.write_pascal(&fx.name);
        }
        IconSlot::Cleared(index) => {
            w.write_u8(index);
            w.fill(0, layout.clear_len);
        }
    })?;
    for payload in payloads {
        out.tcp_bytes(ServerPacket::UpdateIcons, payload);
    }
    Ok(())
}

fn update_icons(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::UpdateIcons(icons) = msg else {
        return Err(mismatch(Op::UpdateIcons));
    };
    push_icons(out, icons, ICONS_173)
}


fn keep_info(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::KeepInfo(keep) = msg else {
        return Err(mismatch(Op::KeepInfo));
    };
    let mut w = write_keep_head(keep);
    w.write_u8(0);
    out.tcp(ServerPacket::KeepInfo, w);
    Ok(())
}

const EFFECT_HEX: u8 = 0x03;
const EFFECT_QUEST: u8 = 0x07;

fn hex_effect(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::HexEffect { object_id, effects } = msg else {
        return Err(mismatch(Op::HexEffect));
    };
    let mut w = write_visual_effect(*object_id, EFFECT_HEX);
    w.write_bytes(effects);
    out.tcp(ServerPacket::VisualEffect, w);
    Ok(())
}

fn npcs_quest_effect(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::NpcsQuestEffect { object_id, flag } = msg else {
        return Err(mismatch(Op::NpcsQuestEffect));
    };
    let mut w = write_visual_effect(*object_id, EFFECT_QUEST);
    w.write_u8(*flag);
    w.write_u32(0);
    out.tcp(ServerPacket::VisualEffect, w);
    Ok(())
}

/// Index, name length and little-endian description length
const QUEST_HEADER_173: usize = 4;
/// Name kept when name and description together overflow the packet
const CLIPPED_QUEST_NAME: usize = 32;

/// Like 1.70 but the description length is little-endian, and a long entry
/// gives up most of its name to keep the description.
fn write_quest_173(w: &mut PacketWriter, quest: &QuestText) {
    let room = text_room(QUEST_HEADER_173);
    let mut name = clip_quest_text("name", &quest.name, u8::MAX as usize);
    let mut desc = quest.description.as_str();
    if name.chars().count() + desc.chars().count() > room {
        name = clip_quest_text("name", name, CLIPPED_QUEST_NAME);
        desc = clip_quest_text("description", desc, room - name.chars().count());
    }
    let name_len = name.chars().count();
    let desc_len = desc.chars().count();
    w.write_u8(name_len as u8);
    w.write_u16_le(desc_len as u16);
    w.write_string_max(name, name_len);
    w.write_string_max(desc, desc_len);
}

fn quest_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::QuestUpdate { position, quest } = msg else {
        return Err(mismatch(Op::QuestUpdate));
    };
    // index 0 is the task line
    out.tcp_checked(
        ServerPacket::QuestEntry,
        write_quest(position.saturating_add(1), quest.as_ref(), write_quest_173),
    )
}

fn quest_list_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::QuestListUpdate { task, quests } = msg else {
        return Err(mismatch(Op::QuestListUpdate));
    };
    let task = clip_quest_text("task", task, text_room(QUEST_HEADER_173));
    let task_len = task.chars().count();
    let mut w = PacketWriter::new();
    w.write_u8(0);
    w.write_u16_le(task_len as u16);
    w.write_u8(0);
    w.write_string_max(task, task_len);
    out.tcp(ServerPacket::QuestEntry, w);

    push_quest_list(out, quests, 1, write_quest_173)
}

fn siege_weapon_interface(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::SiegeWeaponInterface(siege) = msg else {
        return Err(mismatch(Op::SiegeWeaponInterface));
    };
    let ammo = listed_ammo(siege);

    let mut w = PacketWriter::new();
    w.write_u16(siege_flag(siege));
    w.write_u8(0);
    w.write_u8(0);
    w.write_u8(siege.time.min(u16::from(u8::MAX)) as u8);
    w.write_u8(ammo.len() as u8);
    w.write_u8(siege.action);
    w.write_u8(siege.ammo_slot);
    w.write_u16(siege.effect);
    w.write_u16(0);
    w.write_u16(0);
    w.write_u16(siege.object_id);
    w.write_pascal(&siege_title(siege));
    write_siege_ammo(&mut w, ammo);
    out.tcp_checked(ServerPacket::SiegeWeaponInterface, w)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::MAX_PAYLOAD_SIZE;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::{KeepInfo, SiegeWeaponInterface};

    #[test]
    fn test_keep_info_model_changes() {
        let packets = encode_at(ProtocolVersion::V173, &Msg::KeepInfo(KeepInfo::default()));
        assert_eq!(&packets[0].payload[18..], &[0x52, 0]);
    }

    #[test]
    fn test_hex_effect() {
        let msg = Msg::HexEffect {
            object_id: 0x0102,
            effects: [1, 2, 3, 4, 5],
        };
        let packets = encode_at(ProtocolVersion::V173, &msg);
        assert_eq!(packets[0].payload, vec![1, 2, EFFECT_HEX, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_quest_list_opens_with_task() {
        let msg = Msg::QuestListUpdate {
            task: "Kill".into(),
            quests: vec![
                None,
                Some(QuestText {
                    name: "Q".into(),
                    description: "ab".into(),
                }),
            ],
        };
        let packets = encode_at(ProtocolVersion::V173, &msg);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].payload, b"\x00\x04\x00\x00Kill".to_vec());
        assert_eq!(packets[1].payload, vec![1, 0, 0, 0]);
        assert_eq!(packets[2].payload, b"\x02\x01\x02\x00Qab".to_vec());
    }

    #[test]
    fn test_long_quest_gives_up_its_name() {
        let quest = QuestText {
            name: "n".repeat(100),
            description: "d".repeat(3000),
        };
        let packets = encode_at(
            ProtocolVersion::V173,
            &Msg::QuestUpdate {
                position: 0,
                quest: Some(quest),
            },
        );
        let p = &packets[0].payload;
        assert_eq!(p[0], 1);
        assert_eq!(p[1], CLIPPED_QUEST_NAME as u8);
        assert_eq!(p.len(), MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_siege_interface_object_id_is_a_word() {
        let siege = SiegeWeaponInterface {
            object_id: 0x0304,
            time: 300,
            name: "Ram".into(),
            state: "idle".into(),
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V173, &Msg::SiegeWeaponInterface(siege));
        let p = &packets[0].payload;
        assert_eq!(p[4], u8::MAX);
        assert_eq!(&p[14..16], &[3, 4]);
        assert_eq!(&p[16..], b"\x0aRam (idle)");
    }
}
