//! 1.74: titles, zone skins for instanced regions, and map markers for
//! moving group members.

use super::base::{
    push_equipment, push_group_members, push_hybrid_skills, write_group_member,
    write_group_member_map, write_position, write_skill_168, write_spell_effect,
    write_visual_effect, EquipmentLayout,
};
use super::split::SplitRule;
use super::v170::write_warmap_bonuses;
use super::v172::{push_player_create, write_player_create, PlayerCreateExtras};
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::message::{OperationId as Op, OutboundMessage as Msg};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::version::ProtocolVersion;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::V174,
    parent: Some(ProtocolVersion::V173),
    encoders: &[
        (Op::PlayerCreate, player_create),
        (Op::PlayerPositionAndObjectId, player_position_and_object_id),
        (Op::RegionChanged, region_changed),
        (Op::SpellEffectAnimation, spell_effect_animation),
        (Op::LivingEquipmentUpdate, living_equipment_update),
        (Op::GroupMemberUpdate, group_member_update),
        (Op::HybridSkills, hybrid_skills),
        (Op::WarmapBonuses, warmap_bonuses),
        (Op::VampireEffect, vampire_effect),
    ],
    opcodes: &[],
};

pub(super) const EXTRAS_174: PlayerCreateExtras = PlayerCreateExtras {
    spacer: true,
    title: true,
};

const EQUIPMENT_174: EquipmentLayout = EquipmentLayout {
    extension: true,
    emblem_slot_bit: false,
    effect_byte: false,
};

const EFFECT_VAMPIRE: u8 = 0x04;

const HYBRID_SKILLS_174: SplitRule = SplitRule {
    threshold: 1000,
    first_subtype: 0x03,
    subtype: 0x03,
    prefix: &[0x01],
};

fn player_create(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerCreate(p) = msg else {
        return Err(mismatch(Op::PlayerCreate));
    };
    let w = write_player_create(p, EXTRAS_174);
    push_player_create(out, p, w);
    Ok(())
}

fn player_position_and_object_id(
    ctx: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::PlayerPositionAndObjectId(pos) = msg else {
        return Err(mismatch(Op::PlayerPositionAndObjectId));
    };
    let mut w = write_position(pos);
    let (dx, dy) = pos.dungeon_offset.unwrap_or((0, 0));
    w.write_u16(dx);
    w.write_u16(dy);
    w.write_u16(pos.region_skin);
    w.write_pascal(ctx.server_name_short);
    w.write_u8(0x00);
    out.tcp(ServerPacket::PositionAndObjectId, w);
    Ok(())
}

fn region_changed(ctx: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::RegionChanged { region, zone_skin } = msg else {
        return Err(mismatch(Op::RegionChanged));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*region);
    w.write_u16(*zone_skin);
    w.write_u16(0x00);
    w.write_u16(0x01);
    w.write_u8(ctx.server_id);
    w.write_u8(0);
    w.write_u16(0xFFBF);
    out.tcp(ServerPacket::RegionChanged, w);
    Ok(())
}

fn spell_effect_animation(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::SpellEffectAnimation(e) = msg else {
        return Err(mismatch(Op::SpellEffectAnimation));
    };
    out.tcp(ServerPacket::SpellEffectAnimation, write_spell_effect(e));
    Ok(())
}

fn living_equipment_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::LivingEquipmentUpdate(eq) = msg else {
        return Err(mismatch(Op::LivingEquipmentUpdate));
    };
    push_equipment(out, eq, EQUIPMENT_174)
}

fn group_member_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::GroupMemberUpdate(members) = msg else {
        return Err(mismatch(Op::GroupMemberUpdate));
    };
    push_group_members(out, members, |w, m| {
        write_group_member(w, m);
        write_group_member_map(w, m);
    })
}

fn hybrid_skills(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::HybridSkills(skills) = msg else {
        return Err(mismatch(Op::HybridSkills));
    };
    push_hybrid_skills(out, &HYBRID_SKILLS_174, skills, write_skill_168)
}

fn warmap_bonuses(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::WarmapBonuses(bonuses) = msg else {
        return Err(mismatch(Op::WarmapBonuses));
    };
    let mut w = write_warmap_bonuses(bonuses);
    w.write_u8(bonuses.realm_towers);
    w.write_u8(bonuses.df_owner_towers);
    out.tcp(ServerPacket::WarmapBonuses, w);
    Ok(())
}

fn vampire_effect(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::VampireEffect { object_id, show } = msg else {
        return Err(mismatch(Op::VampireEffect));
    };
    let mut w = write_visual_effect(*object_id, EFFECT_VAMPIRE);
    // zero turns the wings on
    w.write_bool(!show);
    w.write_u32(0);
    out.tcp(ServerPacket::VisualEffect, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::WarmapBonuses;

    #[test]
    fn test_bonuses_grow_tower_counts() {
        let bonuses = WarmapBonuses {
            realm_keeps: 3,
            realm_towers: 9,
            magic: 1,
            strength: 2,
            df_owner: 2,
            df_owner_towers: 12,
        };
        let old = encode_at(ProtocolVersion::new(170), &Msg::WarmapBonuses(bonuses));
        assert_eq!(old[0].payload, vec![3, 0x12, 2]);
        let new = encode_at(ProtocolVersion::V174, &Msg::WarmapBonuses(bonuses));
        assert_eq!(new[0].payload, vec![3, 0x12, 2, 9, 12]);
    }

    #[test]
    fn test_vampire_wings() {
        let msg = Msg::VampireEffect {
            object_id: 5,
            show: true,
        };
        assert!(encode_at(ProtocolVersion::V173, &msg).is_empty());
        let packets = encode_at(ProtocolVersion::V174, &msg);
        assert_eq!(packets[0].payload, vec![0, 5, EFFECT_VAMPIRE, 0, 0, 0, 0, 0]);
    }
}
