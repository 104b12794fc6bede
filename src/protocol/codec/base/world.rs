//! Object visibility, movement and combat feedback.

use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::codec::split::{pack_list, ListLayout};
use crate::protocol::codec::{mismatch, EncodeContext, Outbox};
use crate::protocol::message::{
    OperationId as Op, OutboundMessage as Msg, PlayerCreate, VisibleItem,
};
use crate::protocol::opcodes::ServerPacket;

/// Longest object name the client renders without crashing
pub(crate) const MAX_OBJECT_NAME: usize = 47;
/// Flag byte sent in front of a door id
pub(crate) const DOOR_FLAG: u8 = 0x04;

/// Clamp a string to `max` characters
pub(crate) fn truncated(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

pub(crate) fn player_position_and_object_id(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::PlayerPositionAndObjectId(pos) = msg else {
        return Err(mismatch(Op::PlayerPositionAndObjectId));
    };
    out.tcp(ServerPacket::PositionAndObjectId, write_position(pos));
    Ok(())
}

/// Shared 1.68 body of the position packet
pub(crate) fn write_position(pos: &crate::protocol::message::PlayerPosition) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u16(pos.object_id);
    w.write_u16(pos.z);
    w.write_u32(pos.x);
    w.write_u32(pos.y);
    w.write_u16(pos.heading);
    let flags = if pos.diving_enabled {
        0x80 | u8::from(pos.underwater)
    } else {
        0
    };
    w.write_u8(flags);
    w.write_u8(0x00);
    w
}

pub(crate) fn player_jump(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerJump(jump) = msg else {
        return Err(mismatch(Op::PlayerJump));
    };
    let (x, y, z) = match jump.position {
        Some((x, y)) => (x, y, jump.z),
        None => (0, 0, 0),
    };
    let mut w = PacketWriter::new();
    w.write_u32(x);
    w.write_u32(y);
    w.write_u16(jump.object_id);
    w.write_u16(z);
    w.write_u16(jump.heading);
    w.write_u16(jump.house);
    out.tcp(ServerPacket::CharacterJump, w);
    Ok(())
}

pub(crate) fn player_create(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerCreate(p) = msg else {
        return Err(mismatch(Op::PlayerCreate));
    };

    let mut w = PacketWriter::new();
    w.write_u16(p.session_id);
    w.write_u16(p.object_id);
    w.write_u16(p.x_offset);
    w.write_u16(p.y_offset);
    w.write_u8(p.zone as u8);
    w.write_u8(0);
    w.write_u16(p.z);
    w.write_u16(p.heading);
    w.write_u16(p.model);
    w.write_bool(p.alive);
    w.write_u8(0x00);
    w.write_u8(p.realm);
    w.write_u8(p.level);
    w.write_bool(p.stealthed);
    w.write_u8(0x00);
    w.write_pascal(&p.name);
    w.write_pascal(guild_name(p));
    w.write_pascal(&p.last_name);
    w.write_u8(0x00);
    out.tcp(ServerPacket::PlayerCreate, w);

    push_object_guild_id(out, p.object_id, p.guild.as_ref().map(|g| g.id));
    Ok(())
}

#[inline]
pub(crate) fn guild_name(p: &PlayerCreate) -> &str {
    p.guild.as_ref().map_or("", |g| g.name.as_str())
}

/// Player flag byte of the 1.72+ creation layouts
pub(crate) fn player_flags(p: &PlayerCreate) -> u8 {
    let mut flags = (p.realm & 0x03) << 2;
    if !p.alive {
        flags |= 0x01;
    }
    if p.underwater {
        flags |= 0x02;
    }
    if p.stealthed {
        flags |= 0x10;
    }
    if p.wireframe {
        flags |= 0x20;
    }
    if p.vampiir {
        flags |= 0x40;
    }
    flags
}

pub(crate) fn push_object_guild_id(out: &mut Outbox<'_>, object_id: u16, guild_id: Option<u16>) {
    let mut w = PacketWriter::new();
    w.write_u16(object_id);
    match guild_id {
        Some(id) => {
            w.write_u16(id);
            w.write_u16(id);
        }
        None => w.write_u32(0),
    }
    w.write_u16(0x00);
    out.tcp(ServerPacket::ObjectGuildId, w);
}

pub(crate) fn object_guild_id(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::ObjectGuildId {
        object_id,
        guild_id,
    } = msg
    else {
        return Err(mismatch(Op::ObjectGuildId));
    };
    push_object_guild_id(out, *object_id, *guild_id);
    Ok(())
}

pub(crate) fn object_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::ObjectUpdate(u) = msg else {
        return Err(mismatch(Op::ObjectUpdate));
    };

    let heading = if u.is_npc { u.heading & 0x0FFF } else { u.heading };
    let flags = u.flags | (((u.zone & 0x100) >> 6) as u8) | (((u.target_zone & 0x100) >> 5) as u8);

    let mut w = PacketWriter::new();
    w.write_u16(u.speed.min(0x07FF));
    w.write_u16(heading);
    w.write_u16(u.x_offset);
    w.write_u16(u.target_x_offset);
    w.write_u16(u.y_offset);
    w.write_u16(u.target_y_offset);
    w.write_u16(u.z);
    w.write_u16(u.target_z);
    w.write_u16(u.object_id);
    w.write_u16(u.target_object);
    w.write_u8(u.health_percent);
    w.write_u8(flags);
    w.write_u8(u.zone as u8);
    w.write_u8(u.target_zone as u8);
    out.udp(ServerPacket::ObjectUpdate, w, false);
    Ok(())
}

pub(crate) fn player_quit(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerQuit { total_out, level } = msg else {
        return Err(mismatch(Op::PlayerQuit));
    };
    let mut w = PacketWriter::new();
    w.write_bool(*total_out);
    w.write_u8(*level);
    out.tcp(ServerPacket::Quit, w);
    Ok(())
}

pub(crate) fn object_remove(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::ObjectRemove {
        object_id,
        object_type,
    } = msg
    else {
        return Err(mismatch(Op::ObjectRemove));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*object_id);
    w.write_u16(object_type.code());
    out.tcp(ServerPacket::RemoveObject, w);
    Ok(())
}

/// Realm, banner and owner bits of an object
pub(crate) fn object_flags(o: &crate::protocol::message::ObjectCreate) -> u16 {
    let mut flag = u16::from(o.realm & 0x03) << 4;
    if o.is_banner {
        flag |= 0x08;
    }
    if o.owned_by_viewer {
        flag |= 0x04;
    }
    flag
}

pub(crate) fn object_create(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::ObjectCreate(o) = msg else {
        return Err(mismatch(Op::ObjectCreate));
    };

    let mut w = PacketWriter::new();
    w.write_u16(o.object_id);
    w.write_u16(o.emblem as u16);
    w.write_u16(o.heading);
    w.write_u16(o.z);
    w.write_u32(o.x);
    w.write_u32(o.y);
    w.write_u16(o.model);
    w.write_u16(object_flags(o));
    w.write_pascal(&o.name);
    write_door(&mut w, o.door_id);
    out.tcp(ServerPacket::ObjectCreate, w);
    Ok(())
}

pub(crate) fn write_door(w: &mut PacketWriter, door_id: Option<u32>) {
    match door_id {
        Some(id) => {
            w.write_u8(DOOR_FLAG);
            w.write_u32(id);
        }
        None => w.write_u8(0x00),
    }
}

pub(crate) fn npc_create(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::NpcCreate(npc) = msg else {
        return Err(mismatch(Op::NpcCreate));
    };

    let mut flags = npc.realm << 6;
    if npc.transparent {
        flags |= 0x01;
    }
    if npc.has_inventory {
        flags |= 0x02;
    }
    if npc.peace {
        flags |= 0x10;
    }
    if npc.flying {
        flags |= 0x20;
    }

    let mut w = PacketWriter::new();
    w.write_u16(npc.object_id);
    w.write_u16(npc.speed);
    w.write_u16(npc.heading);
    w.write_u16(npc.z);
    w.write_u32(npc.x);
    w.write_u32(npc.y);
    w.write_u16(npc.speed_z);
    w.write_u16(npc.model);
    w.write_u8(npc.size);
    w.write_u8(npc.level);
    w.write_u8(flags);
    w.write_u8(0x20); // max stick distance
    w.write_pascal(truncated(&npc.name, MAX_OBJECT_NAME));
    w.write_pascal(truncated(&npc.guild_name, MAX_OBJECT_NAME));
    w.write_u8(0x00);
    out.tcp(ServerPacket::NpcCreate, w);

    if let Some(owner_guild) = npc.owner_guild {
        push_object_guild_id(out, npc.object_id, owner_guild);
    }
    Ok(())
}

/// Model word with the texture and effect marker bits
pub(crate) fn visible_model(item: &VisibleItem) -> u16 {
    let texture = item.texture();
    let mut model = item.model & 0x1FFF;
    if texture & !0xFF != 0 {
        model |= 0x8000;
    } else if texture & 0xFF != 0 {
        model |= 0x4000;
    }
    if item.effect != 0 {
        model |= 0x2000;
    }
    model
}

pub(crate) fn write_texture(w: &mut PacketWriter, item: &VisibleItem) {
    let texture = item.texture();
    if texture & !0xFF != 0 {
        w.write_u16(texture as u16);
    } else if texture & 0xFF != 0 {
        w.write_u8(texture as u8);
    }
}

/// Per-revision quirks of the equipment list
#[derive(Debug, Clone, Copy)]
pub(crate) struct EquipmentLayout {
    /// Extension byte after the model of armor slots (1.74+)
    pub extension: bool,
    /// Emblem bit folded into the slot of shield and cloak (1.76+)
    pub emblem_slot_bit: bool,
    /// Effect sent as one byte instead of two (1.76+)
    pub effect_byte: bool,
}

pub(crate) const EQUIPMENT_168: EquipmentLayout = EquipmentLayout {
    extension: false,
    emblem_slot_bit: false,
    effect_byte: false,
};

const SLOT_RIGHT_HAND: u8 = 0x0A;
const SLOT_LEFT_HAND: u8 = 0x0B;
const SLOT_RANGED: u8 = 0x0D;
const SLOT_CLOAK: u8 = 0x1A;

pub(crate) fn push_equipment(
    out: &mut Outbox<'_>,
    eq: &crate::protocol::message::EquipmentUpdate,
    layout: EquipmentLayout,
) -> Result<()> {
    let [id_hi, id_lo] = eq.object_id.to_be_bytes();
    let header = [
        id_hi,
        id_lo,
        u8::from(eq.hood_up) | eq.active_quiver,
        eq.visible_weapons,
        0,
    ];
    let items = eq.items.iter().flatten();
    let payloads = pack_list(&ListLayout::counted(&header, 4), items, |w, item| {
        let mut slot = item.slot;
        if layout.emblem_slot_bit && matches!(item.slot, SLOT_LEFT_HAND | SLOT_CLOAK) {
            slot |= ((item.texture() & 0x10000) >> 9) as u8;
        }
        w.write_u8(slot);
        w.write_u16(visible_model(item));
        if layout.extension && !(SLOT_RIGHT_HAND..=SLOT_RANGED).contains(&item.slot) {
            w.write_u8(item.extension);
        }
        write_texture(w, item);
        if item.effect != 0 {
            if layout.effect_byte {
                w.write_u8(item.effect as u8);
            } else {
                w.write_u16(item.effect);
            }
        }
    })?;
    for payload in payloads {
        out.tcp_bytes(ServerPacket::EquipmentUpdate, payload);
    }
    Ok(())
}

pub(crate) fn living_equipment_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::LivingEquipmentUpdate(eq) = msg else {
        return Err(mismatch(Op::LivingEquipmentUpdate));
    };
    push_equipment(out, eq, EQUIPMENT_168)
}

pub(crate) fn debug_mode(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::DebugMode { enabled } = msg else {
        return Err(mismatch(Op::DebugMode));
    };
    let mut w = PacketWriter::new();
    w.write_bool(*enabled);
    w.write_u8(0x00);
    out.tcp(ServerPacket::DebugMode, w);
    Ok(())
}

pub(crate) fn model_change(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::ModelChange { object_id, model } = msg else {
        return Err(mismatch(Op::ModelChange));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*object_id);
    w.write_u16(*model);
    w.write_u32(0);
    out.tcp(ServerPacket::ModelChange, w);
    Ok(())
}

pub(crate) fn emote_animation(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::EmoteAnimation { object_id, emote } = msg else {
        return Err(mismatch(Op::EmoteAnimation));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*object_id);
    w.write_u8(*emote);
    w.write_u8(0x00);
    out.tcp(ServerPacket::EmoteAnimation, w);
    Ok(())
}

pub(crate) fn region_changed(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::RegionChanged { region, .. } = msg else {
        return Err(mismatch(Op::RegionChanged));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*region);
    w.write_u16(0x00);
    out.tcp(ServerPacket::RegionChanged, w);
    Ok(())
}

pub(crate) fn update_points(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::UpdatePoints(p) = msg else {
        return Err(mismatch(Op::UpdatePoints));
    };
    let mut w = PacketWriter::new();
    w.write_u32(p.realm_points);
    w.write_u16(p.level_permill);
    w.write_u16(p.skill_spec_points);
    w.write_u32(p.bounty_points);
    w.write_u16(p.realm_spec_points);
    w.write_u16(0);
    out.tcp(ServerPacket::CharacterPointsUpdate, w);
    Ok(())
}

pub(crate) fn update_money(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::UpdateMoney(m) = msg else {
        return Err(mismatch(Op::UpdateMoney));
    };
    let mut w = PacketWriter::new();
    w.write_u8(m.copper);
    w.write_u8(m.silver);
    w.write_u16(m.gold);
    w.write_u16(m.mithril);
    w.write_u16(m.platinum);
    out.tcp(ServerPacket::MoneyUpdate, w);
    Ok(())
}

pub(crate) fn update_max_speed(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::UpdateMaxSpeed {
        percent,
        turning_disabled,
        water_speed,
    } = msg
    else {
        return Err(mismatch(Op::UpdateMaxSpeed));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*percent);
    w.write_bool(*turning_disabled);
    w.write_u8(*water_speed);
    out.tcp(ServerPacket::MaxSpeed, w);
    Ok(())
}

pub(crate) fn combat_animation(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::CombatAnimation(c) = msg else {
        return Err(mismatch(Op::CombatAnimation));
    };
    let result = if c.style > 0xFF { c.result | 0x80 } else { c.result };

    let mut w = PacketWriter::new();
    w.write_u16(c.attacker.unwrap_or(0));
    w.write_u16(c.defender.unwrap_or(0));
    w.write_u16(c.weapon);
    w.write_u16(c.shield);
    w.write_u8(c.style as u8);
    w.write_u8(c.stance);
    w.write_u8(result);
    w.write_u8(c.target_health_percent);
    out.tcp(ServerPacket::CombatAnimation, w);
    Ok(())
}

pub(crate) fn status_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::StatusUpdate(s) = msg else {
        return Err(mismatch(Op::StatusUpdate));
    };
    let mut w = PacketWriter::new();
    w.write_u8(s.health_percent);
    w.write_u8(s.mana_percent);
    w.write_u16(if s.alive { 0x00 } else { 0x0F });
    w.write_u8(if s.sitting { 0x02 } else { 0x00 });
    w.write_u8(s.endurance_percent);
    w.write_u8(s.concentration_percent);
    w.write_u8(0x00);
    out.tcp(ServerPacket::CharacterStatusUpdate, w);
    Ok(())
}

pub(crate) fn spell_cast_animation(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::SpellCastAnimation {
        caster,
        spell,
        cast_time,
    } = msg
    else {
        return Err(mismatch(Op::SpellCastAnimation));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*caster);
    w.write_u16(*spell);
    w.write_u16(*cast_time);
    w.write_u16(0x00);
    out.tcp(ServerPacket::SpellCastAnimation, w);
    Ok(())
}

/// Spell effect body shared by every layout
pub(crate) fn write_spell_effect(e: &crate::protocol::message::SpellEffect) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u16(e.caster);
    w.write_u16(e.spell);
    w.write_u16(e.target.unwrap_or(0));
    w.write_u16(e.bolt_time);
    w.write_bool(e.no_sound);
    w.write_u8(e.success);
    w
}

pub(crate) fn spell_effect_animation(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::SpellEffectAnimation(e) = msg else {
        return Err(mismatch(Op::SpellEffectAnimation));
    };
    let mut w = write_spell_effect(e);
    w.write_u16(0xFFBF);
    out.tcp(ServerPacket::SpellEffectAnimation, w);
    Ok(())
}

pub(crate) fn riding(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Riding {
        rider,
        steed,
        dismount,
        slot,
    } = msg
    else {
        return Err(mismatch(Op::Riding));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*rider);
    w.write_u16(*steed);
    w.write_bool(!*dismount);
    w.write_u8(*slot);
    w.write_u16(0x00);
    out.tcp(ServerPacket::Riding, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_counts_chars() {
        assert_eq!(truncated("abcdef", 3), "abc");
        assert_eq!(truncated("ab", 3), "ab");
        assert_eq!(truncated("äöüß", 2), "äö");
    }

    #[test]
    fn test_visible_model_bits() {
        let dyed = VisibleItem {
            model: 0xFFFF,
            color: 0x12,
            ..Default::default()
        };
        assert_eq!(visible_model(&dyed), 0x1FFF | 0x4000);

        let emblem = VisibleItem {
            model: 10,
            emblem: 0x1234,
            effect: 3,
            ..Default::default()
        };
        assert_eq!(visible_model(&emblem), 10 | 0x8000 | 0x2000);
    }

    #[test]
    fn test_player_flags() {
        let p = PlayerCreate {
            realm: 3,
            alive: false,
            vampiir: true,
            ..Default::default()
        };
        assert_eq!(player_flags(&p), 0x0C | 0x01 | 0x40);
    }
}
