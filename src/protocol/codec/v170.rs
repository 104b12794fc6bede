//! 1.70: New Frontiers keeps, the realm war map and long quest descriptions.

use super::base::{clip_quest_text, push_quest_list, text_room, write_quest};
use super::split::MAX_LIST_ENTRIES;
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::message::{
    KeepComponent, KeepInfo, OperationId as Op, OutboundMessage as Msg, QuestText,
    WarmapBonuses, WarmapKeep,
};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::version::ProtocolVersion;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::new(170),
    parent: Some(ProtocolVersion::V168),
    encoders: &[
        (Op::KeepInfo, keep_info),
        (Op::KeepRealmUpdate, keep_realm_update),
        (Op::KeepRemove, keep_remove),
        (Op::KeepComponentInfo, keep_component_info),
        (Op::KeepComponentDetailUpdate, keep_component_detail_update),
        (Op::KeepClaim, keep_claim),
        (Op::KeepComponentUpdate, keep_component_update),
        (Op::KeepComponentInteract, keep_component_interact),
        (Op::KeepComponentHookPoint, keep_component_hook_point),
        (Op::ClearKeepComponentHookPoint, clear_keep_component_hook_point),
        (Op::HookPointStore, hook_point_store),
        (Op::WarmapUpdate, warmap_update),
        (Op::WarmapDetailUpdate, warmap_detail_update),
        (Op::WarmapBonuses, warmap_bonuses),
        (Op::QuestUpdate, quest_update),
        (Op::QuestListUpdate, quest_list_update),
    ],
    opcodes: &[],
};

const KEEP_MODEL: u8 = 0x57;
const KEEP_INFO_TRAILER: u8 = 0xB7;
/// Lord type, always melee
const KEEP_LORD_MELEE: u8 = 1;

const COMPONENT_TALL: u8 = 0x10;
const COMPONENT_LEVEL_UP: u8 = 0x20;
const COMPONENT_DEAD: u8 = 0x40;
const COMPONENT_CLIMBABLE: u8 = 0x80;

const WARMAP_CLAIMED: u8 = 0x04;
const WARMAP_UNDER_SIEGE: u8 = 0x08;
const WARMAP_TELEPORTABLE: u8 = 0x10;

/// Keep info up to the model byte; 1.73 changes only what follows
pub(super) fn write_keep_head(keep: &KeepInfo) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u16(keep.keep);
    w.write_u16(0);
    w.write_u32(keep.x);
    w.write_u32(keep.y);
    w.write_u16(keep.heading);
    w.write_u8(keep.realm);
    w.write_u8(keep.level);
    w.write_u16(0);
    w.write_u8(KEEP_MODEL);
    w
}

fn keep_info(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::KeepInfo(keep) = msg else {
        return Err(mismatch(Op::KeepInfo));
    };
    let mut w = write_keep_head(keep);
    w.write_u8(KEEP_INFO_TRAILER);
    out.tcp(ServerPacket::KeepInfo, w);
    Ok(())
}

fn keep_realm_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::KeepRealmUpdate { keep, realm, level } = msg else {
        return Err(mismatch(Op::KeepRealmUpdate));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*keep);
    w.write_u8(*realm);
    w.write_u8(*level);
    out.tcp(ServerPacket::KeepRealmUpdate, w);
    Ok(())
}

fn keep_remove(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::KeepRemove { keep } = msg else {
        return Err(mismatch(Op::KeepRemove));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*keep);
    out.tcp(ServerPacket::KeepRemove, w);
    Ok(())
}

fn keep_component_info(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::KeepComponentInfo(c) = msg else {
        return Err(mismatch(Op::KeepComponentInfo));
    };
    let mut w = PacketWriter::new();
    w.write_u16(c.keep);
    w.write_u16(c.id);
    w.write_u32(c.object_id);
    w.write_u8(c.skin);
    w.write_u8(c.x);
    w.write_u8(c.y);
    w.write_u8(c.heading);
    w.write_u8(c.height);
    w.write_u8(c.health_percent);
    w.write_u8(c.flag());
    w.write_u8(0);
    out.tcp(ServerPacket::KeepComponentInfo, w);
    Ok(())
}

fn keep_component_detail_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::KeepComponentDetailUpdate(c) = msg else {
        return Err(mismatch(Op::KeepComponentDetailUpdate));
    };
    let mut w = PacketWriter::new();
    w.write_u16(c.keep);
    w.write_u16(c.id);
    w.write_u8(c.height);
    w.write_u8(c.health_percent);
    w.write_u8(c.flag());
    w.write_u8(0);
    out.tcp(ServerPacket::KeepComponentDetailUpdate, w);
    Ok(())
}

fn keep_claim(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::KeepClaim {
        keep,
        flag,
        max_level,
        level,
    } = msg
    else {
        return Err(mismatch(Op::KeepClaim));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*keep);
    w.write_u8(*flag);
    w.write_u8(KEEP_LORD_MELEE);
    w.write_u8(*max_level);
    w.write_u8(*level);
    out.tcp(ServerPacket::KeepClaim, w);
    Ok(())
}

/// Height with the state bits the update packet packs above it
fn component_state(c: &KeepComponent, level_up: bool) -> u8 {
    let mut flag = c.height;
    if c.status == 0 && c.climbing {
        flag |= COMPONENT_CLIMBABLE;
    }
    if c.raised {
        flag |= COMPONENT_TALL;
    }
    if level_up {
        flag |= COMPONENT_LEVEL_UP;
    }
    if !c.alive {
        flag |= COMPONENT_DEAD;
    }
    flag
}

fn keep_component_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::KeepComponentUpdate(update) = msg else {
        return Err(mismatch(Op::KeepComponentUpdate));
    };
    let components = &update.components[..update.components.len().min(MAX_LIST_ENTRIES)];

    let mut w = PacketWriter::new();
    w.write_u16(update.keep);
    w.write_u8(update.realm);
    w.write_u8(update.level);
    w.write_u8(components.len() as u8);
    for c in components {
        w.write_u8(component_state(c, update.level_up));
    }
    w.write_u8(0);
    out.tcp(ServerPacket::KeepComponentUpdate, w);
    Ok(())
}

fn keep_component_interact(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::KeepComponentInteract(interact) = msg else {
        return Err(mismatch(Op::KeepComponentInteract));
    };
    let mut w = PacketWriter::new();
    w.write_u16(interact.keep);
    w.write_u8(interact.realm);
    w.write_u8(interact.health_percent);
    w.write_u8(interact.level);
    w.write_u8(interact.max_level);
    w.write_u8(KEEP_LORD_MELEE);
    if let Some(guild) = &interact.guild {
        w.write_cstring(guild);
    }
    w.write_u8(0);
    out.tcp_checked(ServerPacket::KeepComponentInteractResponse, w)
}

fn keep_component_hook_point(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::KeepComponentHookPoint {
        keep,
        component,
        selected,
        free,
    } = msg
    else {
        return Err(mismatch(Op::KeepComponentHookPoint));
    };
    let free = &free[..free.len().min(MAX_LIST_ENTRIES)];
    let mut w = PacketWriter::new();
    w.write_u16(*keep);
    w.write_u16(*component);
    w.write_u8(free.len() as u8);
    w.write_u8(*selected);
    w.write_bytes(free);
    out.tcp(ServerPacket::KeepComponentHookpointUpdate, w);
    Ok(())
}

fn clear_keep_component_hook_point(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::ClearKeepComponentHookPoint {
        keep,
        component,
        selected,
    } = msg
    else {
        return Err(mismatch(Op::ClearKeepComponentHookPoint));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*keep);
    w.write_u16(*component);
    w.write_u8(0);
    w.write_u8(*selected);
    out.tcp(ServerPacket::KeepComponentHookpointUpdate, w);
    Ok(())
}

fn hook_point_store(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::HookPointStore(store) = msg else {
        return Err(mismatch(Op::HookPointStore));
    };
    let items = &store.items[..store.items.len().min(MAX_LIST_ENTRIES)];

    let mut w = PacketWriter::new();
    w.write_u16(store.keep);
    w.write_u16(store.component);
    w.write_u16(store.hook_point);
    w.fill(0x01, 3);
    w.write_u8(items.len() as u8);
    w.write_u16(0);
    for (i, item) in items.iter().enumerate() {
        w.write_u8(i as u8);
        w.write_u16(item.flag);
        w.fill(0x00, 6);
        w.write_u32(item.gold);
        w.write_u16(item.icon);
        w.write_pascal(&item.name);
    }
    out.tcp_checked(ServerPacket::KeepComponentHookpointStore, w)
}

/// Towers carry their index in the high byte of the keep id
#[inline]
fn is_tower(keep: &WarmapKeep) -> bool {
    keep.keep >> 8 != 0
}

/// `(map << 6) | (index << 3) | tower`, maps counted in blocks of 25 ids
fn warmap_position(keep: u16) -> u8 {
    let id = i32::from(keep & 0xFF);
    let tower = i32::from(keep >> 8);
    let map = (id - 25) / 25;
    let index = id - (map * 25 + 25);
    ((map << 6) | (index << 3) | tower) as u8
}

fn warmap_flag(keep: &WarmapKeep) -> u8 {
    let mut flag = keep.realm & 0x07;
    if keep.claimed {
        flag |= WARMAP_CLAIMED;
    }
    if keep.under_siege {
        flag |= WARMAP_UNDER_SIEGE;
    }
    if keep.teleportable {
        flag |= WARMAP_TELEPORTABLE;
    }
    flag
}

fn warmap_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::WarmapUpdate(map) = msg else {
        return Err(mismatch(Op::WarmapUpdate));
    };
    let keeps = &map.keeps[..map.keeps.len().min(MAX_LIST_ENTRIES)];
    let towers = keeps.iter().filter(|k| is_tower(k)).count();

    let mut w = PacketWriter::new();
    w.write_u16(0);
    w.write_u8((keeps.len() - towers) as u8);
    w.write_u8(towers as u8);
    w.write_bytes(&map.strength_relics);
    w.write_bytes(&map.magic_relics);
    for keep in keeps {
        w.write_u8(warmap_position(keep.keep));
        w.write_u8(warmap_flag(keep));
        w.write_pascal(if keep.claimed { &keep.guild } else { "" });
    }
    out.tcp_checked(ServerPacket::WarMapClaimedKeeps, w)
}

/// Group marker colour: albion 1, midgard 2, hibernia 4
fn group_color(realm: u8) -> u8 {
    match realm {
        3 => 0x04,
        2 => 0x02,
        _ => 0x01,
    }
}

/// Each realm keeps its group type in its own two bits
fn group_type(realm: u8, group_type: u8) -> u8 {
    match realm {
        2 => group_type << 2,
        3 => group_type << 4,
        _ => group_type,
    }
}

fn warmap_detail_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::WarmapDetailUpdate { fights, groups } = msg else {
        return Err(mismatch(Op::WarmapDetailUpdate));
    };
    let fights = &fights[..fights.len().min(MAX_LIST_ENTRIES)];
    let groups = &groups[..groups.len().min(MAX_LIST_ENTRIES)];

    let mut w = PacketWriter::new();
    w.write_u8(fights.len() as u8);
    w.write_u8(groups.len() as u8);
    for fight in fights {
        w.write_u8(fight.zone);
        w.write_u8(fight.x << 4 | (fight.y & 0x0F));
        w.write_u8(fight.color);
        w.write_u8(fight.size);
    }
    for group in groups {
        w.write_u8(group.zone);
        w.write_u8(group.x << 4 | group.y);
        w.write_u8(group_color(group.realm));
        w.write_u8(group_type(group.realm, group.group_type));
    }
    out.tcp_checked(ServerPacket::WarMapDetailUpdate, w)
}

/// Keep count, relics and the Darkness Falls owner; 1.74 appends towers
pub(super) fn write_warmap_bonuses(bonuses: &WarmapBonuses) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u8(bonuses.realm_keeps);
    w.write_u8(bonuses.magic << 4 | (bonuses.strength & 0x0F));
    w.write_u8(bonuses.df_owner);
    w
}

fn warmap_bonuses(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::WarmapBonuses(bonuses) = msg else {
        return Err(mismatch(Op::WarmapBonuses));
    };
    out.tcp(ServerPacket::WarmapBonuses, write_warmap_bonuses(bonuses));
    Ok(())
}

/// Name length byte, description length word, then both texts unterminated
fn write_quest_170(w: &mut PacketWriter, quest: &QuestText) {
    let name = clip_quest_text("name", &quest.name, u8::MAX as usize);
    let name_len = name.chars().count();
    let room = text_room(4 + name_len);
    let desc = clip_quest_text("description", &quest.description, room);
    w.write_u8(name_len as u8);
    w.write_u16(desc.chars().count() as u16);
    w.write_string_max(name, name_len);
    w.write_string_max(desc, room);
}

fn quest_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::QuestUpdate { position, quest } = msg else {
        return Err(mismatch(Op::QuestUpdate));
    };
    out.tcp_checked(
        ServerPacket::QuestEntry,
        write_quest(*position, quest.as_ref(), write_quest_170),
    )
}

fn quest_list_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::QuestListUpdate { quests, .. } = msg else {
        return Err(mismatch(Op::QuestListUpdate));
    };
    push_quest_list(out, quests, 0, write_quest_170)
}
