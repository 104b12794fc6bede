//! Group, dialog, effect bar, skill list and inventory packets.

use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::codec::split::{
    pack_list, threshold_for, ListLayout, SplitRule, SplitState, MAX_LIST_ENTRIES,
};
use crate::protocol::codec::{mismatch, EncodeContext, Outbox};
use crate::protocol::message::{
    DialogCode, DialogType, GroupMemberStatus, InventorySlots, ItemData, OperationId as Op,
    OutboundMessage as Msg, SkillEntry,
};
use crate::protocol::opcodes::ServerPacket;

/// Raw opcode of the line-of-sight check request
pub(crate) const CHECK_LOS_OPCODE: u8 = 0xD0;
/// Inventory slots per packet
pub(crate) const MAX_INVENTORY_UPDATE: usize = 32;
/// Index given to the first solo player of the find-group list
const FIRST_SOLO_INDEX: u8 = 0x1E;
/// Sub-code of the group window on the various-update opcode
pub(crate) const GROUP_WINDOW_SUBCODE: u8 = 0x06;

/// Fixed skill fields plus the longest pascal name
pub(crate) const MAX_SKILL_ENTRY_LEN: usize = 8 + u8::MAX as usize;

const HYBRID_SKILLS_168: SplitRule = SplitRule {
    threshold: threshold_for(MAX_SKILL_ENTRY_LEN),
    first_subtype: 0x03,
    subtype: 0x03,
    prefix: &[0x01],
};

pub(crate) fn find_group_window_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::FindGroupWindowUpdate(list) = msg else {
        return Err(mismatch(Op::FindGroupWindowUpdate));
    };

    let Some(players) = list else {
        let mut w = PacketWriter::new();
        w.write_u16(0x0000);
        out.tcp(ServerPacket::FindGroupUpdate, w);
        return Ok(());
    };

    let mut grouped = 0u8;
    let mut solo = FIRST_SOLO_INDEX;
    let payloads = pack_list(&ListLayout::counted(&[0], 0), players, |w, p| {
        let idx = if p.in_group { &mut grouped } else { &mut solo };
        w.write_u8(*idx);
        *idx = idx.wrapping_add(1);
        w.write_u8(p.level);
        w.write_pascal(&p.name);
        w.write_string_max(&p.class_name, 4);
        w.write_u8(p.zone.map_or(0xFF, |z| z as u8));
    })?;
    for payload in payloads {
        out.tcp_bytes(ServerPacket::FindGroupUpdate, payload);
    }
    Ok(())
}

/// Every dialog shares this body
pub(crate) fn write_dialog(
    code: DialogCode,
    data: [u16; 4],
    dialog_type: DialogType,
    auto_wrap: bool,
    text: &str,
) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u8(0x00);
    w.write_u8(code as u8);
    for d in data {
        w.write_u16(d);
    }
    w.write_u8(dialog_type as u8);
    w.write_bool(auto_wrap);
    w.write_string_max(text, text.len());
    w.write_u8(0x00);
    w
}

pub(crate) fn group_invite(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::GroupInvite {
        inviter_session,
        text,
    } = msg
    else {
        return Err(mismatch(Op::GroupInvite));
    };
    let w = write_dialog(
        DialogCode::GroupInvite,
        [*inviter_session, 0, 0, 0],
        DialogType::YesNo,
        false,
        text,
    );
    out.tcp(ServerPacket::Dialog, w);
    Ok(())
}

pub(crate) fn guild_invite(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::GuildInvite { inviter, text } = msg else {
        return Err(mismatch(Op::GuildInvite));
    };
    let w = write_dialog(
        DialogCode::GuildInvite,
        [*inviter, 0, 0, 0],
        DialogType::YesNo,
        false,
        text,
    );
    out.tcp(ServerPacket::Dialog, w);
    Ok(())
}

pub(crate) fn guild_leave(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::GuildLeave { leaver, text } = msg else {
        return Err(mismatch(Op::GuildLeave));
    };
    let w = write_dialog(
        DialogCode::GuildLeave,
        [*leaver, 0, 0, 0],
        DialogType::YesNo,
        false,
        text,
    );
    out.tcp(ServerPacket::Dialog, w);
    Ok(())
}

pub(crate) fn quest_subscribe(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::QuestSubscribe {
        quest_id,
        npc,
        text,
    } = msg
    else {
        return Err(mismatch(Op::QuestSubscribe));
    };
    let w = write_dialog(
        DialogCode::QuestSubscribe,
        [*quest_id, *npc, 0, 0],
        DialogType::YesNo,
        true,
        text,
    );
    out.tcp(ServerPacket::Dialog, w);
    Ok(())
}

pub(crate) fn quest_abort(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::QuestAbort {
        quest_id,
        npc,
        text,
    } = msg
    else {
        return Err(mismatch(Op::QuestAbort));
    };
    // data3 set marks an abort
    let w = write_dialog(
        DialogCode::QuestSubscribe,
        [*quest_id, *npc, 1, 0],
        DialogType::YesNo,
        true,
        text,
    );
    out.tcp(ServerPacket::Dialog, w);
    Ok(())
}

pub(crate) fn dialog_box(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::DialogBox(d) = msg else {
        return Err(mismatch(Op::DialogBox));
    };
    let w = write_dialog(d.code, d.data, d.dialog_type, d.auto_wrap, &d.text);
    out.tcp(ServerPacket::Dialog, w);
    Ok(())
}

pub(crate) fn custom_dialog(ctx: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::CustomDialog { text, yes_no } = msg else {
        return Err(mismatch(Op::CustomDialog));
    };
    let dialog_type = if *yes_no {
        DialogType::YesNo
    } else {
        DialogType::Ok
    };
    let w = write_dialog(
        DialogCode::CustomDialog,
        [ctx.session_id, 0x01, 0, 0],
        dialog_type,
        true,
        text,
    );
    out.tcp(ServerPacket::Dialog, w);
    Ok(())
}

pub(crate) fn check_los(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::CheckLos { checker, target } = msg else {
        return Err(mismatch(Op::CheckLos));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*checker);
    w.write_u16(target.unwrap_or(0));
    w.write_u16(0x00);
    w.write_u16(0x00);
    out.tcp_raw(CHECK_LOS_OPCODE, w);
    Ok(())
}

pub(crate) fn group_window_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::GroupWindowUpdate(group) = msg else {
        return Err(mismatch(Op::GroupWindowUpdate));
    };

    let layout = ListLayout::counted(&[GROUP_WINDOW_SUBCODE, 0, 0x01, 0x00], 1);
    let payloads = pack_list(&layout, group.iter().flatten(), |w, m| {
        w.write_u8(m.level);
        if m.same_region {
            w.write_u8(m.health_percent);
            w.write_u8(m.mana_percent);
            w.write_u8(m.status);
            w.write_u16(m.object_id);
        } else {
            w.write_u32(0x2000);
            w.write_u8(0);
        }
        w.write_pascal(&m.name);
        w.write_pascal(&m.class_name);
    })?;
    for payload in payloads {
        out.tcp_bytes(ServerPacket::VariousUpdate, payload);
    }
    Ok(())
}

/// Write a member's icon list, clipped to what its count byte can announce
pub(crate) fn write_member_icons(w: &mut PacketWriter, icons: &[u16], with_pad: bool) {
    let shown = &icons[..icons.len().min(MAX_LIST_ENTRIES)];
    w.write_u8(shown.len() as u8);
    for icon in shown {
        if with_pad {
            w.write_u8(0);
        }
        w.write_u16(*icon);
    }
}

/// Health bars and optional icons of one member in the 1.68 layout
pub(crate) fn write_group_member(w: &mut PacketWriter, m: &GroupMemberStatus) {
    w.write_u8(m.group_index.wrapping_add(1));
    if m.same_region {
        w.write_u8(m.health_percent);
        w.write_u8(m.mana_percent);
        w.write_u8(m.status);
        if let Some(icons) = &m.icons {
            w.write_u8(0x80 | m.group_index);
            write_member_icons(w, icons, false);
        }
    } else {
        w.write_u16(0);
        w.write_u8(0x20);
        if m.icons.is_some() {
            w.write_u8(0x80 | m.group_index);
            w.write_u8(0);
        }
    }
}

/// Map marker of a moving member (1.74+)
pub(crate) fn write_group_member_map(w: &mut PacketWriter, m: &GroupMemberStatus) {
    if let (true, Some(map)) = (m.same_region, m.map) {
        w.write_u8(0x40 | m.group_index);
        w.write_u16(map.zone_skin);
        w.write_u16(map.x_offset);
        w.write_u16(map.y_offset);
    }
}

/// Member entries close with a zero byte instead of carrying a count
const GROUP_MEMBERS: ListLayout<'static> = ListLayout {
    header: &[],
    count_at: None,
    trailer: &[0x00],
    max_entries: usize::MAX,
};

/// Wrap member entries written by `write` into zero-terminated packets
pub(crate) fn push_group_members(
    out: &mut Outbox<'_>,
    members: &[GroupMemberStatus],
    write: impl Fn(&mut PacketWriter, &GroupMemberStatus),
) -> Result<()> {
    if members.is_empty() {
        return Ok(());
    }
    for payload in pack_list(&GROUP_MEMBERS, members, write)? {
        out.tcp_bytes(ServerPacket::GroupMemberUpdate, payload);
    }
    Ok(())
}

pub(crate) fn group_member_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::GroupMemberUpdate(members) = msg else {
        return Err(mismatch(Op::GroupMemberUpdate));
    };
    push_group_members(out, members, write_group_member)
}

pub(crate) fn update_icons(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::UpdateIcons(icons) = msg else {
        return Err(mismatch(Op::UpdateIcons));
    };

    let mut index = 0u8;
    let payloads = pack_list(&ListLayout::counted(&[0; 4], 0), &icons.effects, |w, fx| {
        if fx.is_spell || fx.icon > 5000 {
            w.write_u8(index);
            index = index.wrapping_add(1);
        } else {
            w.write_u8(0xFF);
        }
        w.write_u8(0);
        w.write_u16(fx.icon);
        w.write_u16(fx.remaining_secs);
        w.write_u16(fx.internal_id);
        w.write_pascal(&fx.name);
    })?;
    for payload in payloads {
        out.tcp_bytes(ServerPacket::UpdateIcons, payload);
    }
    Ok(())
}

pub(crate) fn write_skill_168(w: &mut PacketWriter, skill: &SkillEntry) {
    w.write_u8(skill.level);
    w.write_u8(skill.page);
    w.write_u16(skill.requirement);
    w.write_u8(skill.bonus);
    w.write_u16(skill.icon);
    w.write_pascal(&skill.name);
}

/// Emit a skill list split according to `rule`
pub(crate) fn push_hybrid_skills(
    out: &mut Outbox<'_>,
    rule: &SplitRule,
    skills: &[SkillEntry],
    write_skill: fn(&mut PacketWriter, &SkillEntry),
) -> Result<()> {
    let mut state = SplitState::open(rule);
    for skill in skills {
        let (mut next, closed) = state.step(rule)?;
        if let Some(payload) = closed {
            out.tcp_bytes(ServerPacket::VariousUpdate, payload);
        }
        write_skill(&mut next.writer, skill);
        state = next;
    }
    if let Some(payload) = state.close(rule)? {
        out.tcp_bytes(ServerPacket::VariousUpdate, payload);
    }
    Ok(())
}

pub(crate) fn hybrid_skills(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::HybridSkills(skills) = msg else {
        return Err(mismatch(Op::HybridSkills));
    };
    push_hybrid_skills(out, &HYBRID_SKILLS_168, skills, write_skill_168)
}

/// Damage type and object type packed the way the bag expects
#[inline]
pub(crate) fn damage_and_type(item: &ItemData) -> u8 {
    let damage = if item.damage_type > 3 {
        0
    } else {
        item.damage_type << 6
    };
    damage | item.object_type
}

pub(crate) fn write_item_168(w: &mut PacketWriter, item: Option<&ItemData>) {
    let Some(item) = item else {
        w.fill(0x00, 18);
        return;
    };
    w.write_u8(item.level);
    w.write_u8(item.value1);
    w.write_u8(item.value2);
    w.write_u8(if item.is_garden_object {
        item.dps_af
    } else {
        item.hand << 6
    });
    w.write_u8(damage_and_type(item));
    w.write_u16(item.weight);
    w.write_u8(item.condition);
    w.write_u8(item.durability);
    w.write_u8(item.quality);
    w.write_u8(item.bonus);
    w.write_u16(item.model);
    w.write_u16(if item.emblem != 0 {
        item.emblem as u16
    } else {
        item.color
    });
    w.write_u16(item.effect);
    w.write_pascal(&item.display_name());
}

/// Send `inv` in packets of at most [`MAX_INVENTORY_UPDATE`] slots.
///
/// Only the first packet carries the pre-action byte.
pub(crate) fn push_inventory_slots(
    out: &mut Outbox<'_>,
    inv: &InventorySlots,
    write_item: fn(&mut PacketWriter, Option<&ItemData>),
) -> Result<()> {
    let header = [
        0,
        u8::from(inv.hood_up) | inv.active_quiver,
        inv.visible_weapons,
        inv.pre_action,
    ];
    let layout = ListLayout::counted(&header, 0).with_max_entries(MAX_INVENTORY_UPDATE);
    let payloads = pack_list(&layout, &inv.slots, |w, (slot, item)| {
        w.write_u8(*slot);
        write_item(w, item.as_ref());
    })?;

    for (i, mut payload) in payloads.into_iter().enumerate() {
        if i > 0 {
            payload[3] = 0;
        }
        out.tcp_bytes(ServerPacket::InventoryUpdate, payload);
    }
    Ok(())
}

pub(crate) fn inventory_slots_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::InventorySlotsUpdate(inv) = msg else {
        return Err(mismatch(Op::InventorySlotsUpdate));
    };
    push_inventory_slots(out, inv, write_item_168)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialog_layout() {
        let w = write_dialog(
            DialogCode::QuestSubscribe,
            [7, 8, 1, 0],
            DialogType::YesNo,
            true,
            "go",
        );
        assert_eq!(
            w.finish(),
            vec![0, 0x64, 0, 7, 0, 8, 0, 1, 0, 0, 1, 1, b'g', b'o', 0]
        );
    }

    #[test]
    fn test_damage_type_packing() {
        let item = ItemData {
            damage_type: 2,
            object_type: 5,
            ..Default::default()
        };
        assert_eq!(damage_and_type(&item), 0x85);

        let item = ItemData {
            damage_type: 10,
            object_type: 5,
            ..Default::default()
        };
        assert_eq!(damage_and_type(&item), 5);
    }
}
