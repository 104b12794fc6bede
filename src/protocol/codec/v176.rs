//! 1.76: guild emblems grow a 17th bit, the find-group window lists
//! players by index, and bag items carry an extension byte. Furniture
//! entries only send the colour and size they use, and guild banners show
//! up over players.

use super::base::{
    damage_and_type, indoor_flags, object_flags, porch_flags, push_equipment, push_furniture,
    push_furniture_item, push_inventory_slots, truncated, write_door, write_enter_house,
    write_house, write_visual_effect, EquipmentLayout,
};
use super::split::{pack_list, ListLayout};
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::message::{
    FurnitureItem, ItemData, OperationId as Op, OutboundMessage as Msg,
};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::version::ProtocolVersion;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::V176,
    parent: Some(ProtocolVersion::V175),
    encoders: &[
        (Op::FindGroupWindowUpdate, find_group_window_update),
        (Op::ObjectCreate, object_create),
        (Op::LivingEquipmentUpdate, living_equipment_update),
        (Op::InventorySlotsUpdate, inventory_slots_update),
        (Op::House, house),
        (Op::EnterHouse, enter_house),
        (Op::Furniture, furniture),
        (Op::FurnitureItem, furniture_item),
        (Op::RvRGuildBanner, rvr_guild_banner),
    ],
    opcodes: &[],
};

const EQUIPMENT_176: EquipmentLayout = EquipmentLayout {
    extension: true,
    emblem_slot_bit: true,
    effect_byte: true,
};

const FIRST_SOLO_INDEX: u8 = 0x1E;
const MAX_OBJECT_NAME_176: usize = 48;
const EMPTY_ITEM_LEN: usize = 19;
/// 17th emblem bit
const NEW_EMBLEM: u32 = 0x1_0000;
const EFFECT_BANNER: u8 = 0x0C;

const FURNITURE_COLORED: u8 = 0x01;
const FURNITURE_EMBLEM: u8 = 0x02;
const FURNITURE_NEW_EMBLEM: u8 = 0x06;
const FURNITURE_SIZED: u8 = 0x08;

fn find_group_window_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::FindGroupWindowUpdate(seekers) = msg else {
        return Err(mismatch(Op::FindGroupWindowUpdate));
    };

    let mut grouped = 0u8;
    let mut solo = FIRST_SOLO_INDEX;
    let layout = ListLayout::counted(&[0], 0);
    let payloads = pack_list(&layout, seekers.iter().flatten(), |w, s| {
        let index = if s.in_group {
            grouped = grouped.wrapping_add(1);
            grouped.wrapping_sub(1)
        } else {
            solo = solo.wrapping_add(1);
            solo.wrapping_sub(1)
        };
        w.write_u8(index);
        w.write_u8(s.level);
        w.write_pascal(&s.name);
        w.write_string_max(&s.class_name, 4);
        w.write_u16(s.zone.unwrap_or(0));
        w.fill(0, 4);
        w.write_bool(s.in_group);
        w.write_u8(0);
    })?;
    for payload in payloads {
        out.tcp_bytes(ServerPacket::FindGroupUpdate, payload);
    }
    Ok(())
}

fn object_create(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::ObjectCreate(o) = msg else {
        return Err(mismatch(Op::ObjectCreate));
    };

    let mut flag = object_flags(o);
    if o.underwater {
        flag |= 0x01;
    }

    let mut w = PacketWriter::new();
    w.write_u16(o.object_id);
    w.write_u16(o.emblem as u16);
    w.write_u16(o.heading);
    w.write_u16(o.z);
    w.write_u32(o.x);
    w.write_u32(o.y);
    w.write_u16(o.model);
    w.write_u16(flag);
    w.write_u32((o.emblem & 0x10000) << 9);
    w.write_pascal(truncated(&o.name, MAX_OBJECT_NAME_176));
    write_door(&mut w, o.door_id);
    out.tcp(ServerPacket::ObjectCreate, w);
    Ok(())
}

fn living_equipment_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::LivingEquipmentUpdate(eq) = msg else {
        return Err(mismatch(Op::LivingEquipmentUpdate));
    };
    push_equipment(out, eq, EQUIPMENT_176)
}

/// Bag item with the extension byte and the high emblem bit in the effect
fn write_item_176(w: &mut PacketWriter, item: Option<&ItemData>) {
    let Some(item) = item else {
        w.fill(0x00, EMPTY_ITEM_LEN);
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
    w.write_u8(item.extension);

    let mut effect = item.effect;
    if item.emblem != 0 {
        w.write_u16(item.emblem as u16);
        effect |= ((item.emblem & 0x10000) >> 8) as u16;
    } else {
        w.write_u16(item.color);
    }
    w.write_u16(effect);
    w.write_pascal(&item.display_name());
}

fn inventory_slots_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::InventorySlotsUpdate(inv) = msg else {
        return Err(mismatch(Op::InventorySlotsUpdate));
    };
    push_inventory_slots(out, inv, write_item_176)
}

fn house(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::House(house) = msg else {
        return Err(mismatch(Op::House));
    };
    let flags = porch_flags(house) | ((house.emblem & NEW_EMBLEM) >> 13) as u16;
    out.tcp(ServerPacket::HouseCreate, write_house(house, flags));
    Ok(())
}

fn enter_house(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::EnterHouse(house) = msg else {
        return Err(mismatch(Op::EnterHouse));
    };
    let flags = indoor_flags(house) | ((house.emblem & NEW_EMBLEM) >> 14) as u8;
    out.tcp(ServerPacket::HouseEnter, write_enter_house(house, flags));
    Ok(())
}

/// Type byte of a furniture entry: how the colour is sent and whether a size follows
fn furniture_type(color: u32, size: u8) -> u8 {
    let mut kind = match color {
        0 => 0,
        1..=0xFF => FURNITURE_COLORED,
        0x100..=0xFFFF => FURNITURE_EMBLEM,
        _ => FURNITURE_NEW_EMBLEM,
    };
    if size != 0 {
        kind |= FURNITURE_SIZED;
    }
    kind
}

fn write_furniture_176(w: &mut PacketWriter, item: &FurnitureItem) {
    // an emblem replaces the colour
    let color = if item.emblem > 0 { item.emblem } else { item.color };
    let kind = furniture_type(color, item.size);

    w.write_u8(item.key);
    w.write_u8(kind);
    w.write_u16(item.model);
    if kind & FURNITURE_COLORED != 0 {
        w.write_u8(color as u8);
    } else if kind & FURNITURE_NEW_EMBLEM != 0 {
        w.write_u16((color & 0xFFFF) as u16);
    }
    w.write_u16(item.x);
    w.write_u16(item.y);
    w.write_u16(item.rotation);
    if kind & FURNITURE_SIZED != 0 {
        w.write_u8(item.size);
    }
    w.write_u8(item.position);
    w.write_u8(item.place_mode.wrapping_sub(2));
}

fn furniture(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Furniture { house, items } = msg else {
        return Err(mismatch(Op::Furniture));
    };
    push_furniture(out, *house, items, write_furniture_176)
}

fn furniture_item(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::FurnitureItem { house, item } = msg else {
        return Err(mismatch(Op::FurnitureItem));
    };
    push_furniture_item(out, *house, item, write_furniture_176);
    Ok(())
}

/// A player without a guild has no banner to show
fn rvr_guild_banner(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::RvRGuildBanner {
        object_id,
        show,
        emblem,
    } = msg
    else {
        return Err(mismatch(Op::RvRGuildBanner));
    };
    if *show && emblem.is_none() {
        return Ok(());
    }
    let emblem = emblem.unwrap_or(0);
    let mut w = write_visual_effect(*object_id, EFFECT_BANNER);
    w.write_bool(!show);
    w.write_u32((emblem & NEW_EMBLEM) << 8 | (emblem & 0xFFFF));
    out.tcp(ServerPacket::VisualEffect, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::HouseInfo;

    #[test]
    fn test_empty_slot_is_wider() {
        let mut w = PacketWriter::new();
        write_item_176(&mut w, None);
        assert_eq!(w.len(), EMPTY_ITEM_LEN);
    }

    #[test]
    fn test_high_emblem_bit_moves_into_effect() {
        let item = ItemData {
            emblem: 0x1_0005,
            effect: 0x0002,
            name: "Shield".into(),
            count: 1,
            ..Default::default()
        };
        let mut w = PacketWriter::new();
        write_item_176(&mut w, Some(&item));
        let bytes = w.finish();
        // level..model is 13 bytes, then the extension byte
        assert_eq!(&bytes[14..16], &[0x00, 0x05]);
        assert_eq!(&bytes[16..18], &[0x01, 0x02]);
        assert_eq!(bytes[18], 6);
    }

    #[test]
    fn test_house_flags_carry_new_emblem_bit() {
        let house = HouseInfo {
            porch: true,
            indoor_shield: true,
            emblem: 0x1_0003,
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V176, &Msg::House(house.clone()));
        assert_eq!(&packets[0].payload[16..20], &[0x00, 0x09, 0x00, 0x03]);

        let packets = encode_at(ProtocolVersion::V176, &Msg::EnterHouse(house));
        assert_eq!(packets[0].payload[15], 0x02 | 0x04);
    }

    #[test]
    fn test_furniture_type_picks_colour_width() {
        assert_eq!(furniture_type(0, 0), 0);
        assert_eq!(furniture_type(0x20, 0), FURNITURE_COLORED);
        assert_eq!(furniture_type(0x1234, 1), FURNITURE_EMBLEM | FURNITURE_SIZED);
        assert_eq!(furniture_type(0x1_0000, 0), FURNITURE_NEW_EMBLEM);
    }

    #[test]
    fn test_plain_furniture_entry() {
        let item = FurnitureItem {
            key: 4,
            model: 0x0102,
            place_mode: 3,
            ..Default::default()
        };
        let packets = encode_at(
            ProtocolVersion::V176,
            &Msg::FurnitureItem { house: 9, item },
        );
        assert_eq!(
            packets[0].payload,
            vec![0, 9, 1, 0, 4, 0, 1, 2, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn test_emblem_furniture_entry() {
        let item = FurnitureItem {
            key: 1,
            color: 0x05,
            emblem: 0x1_0203,
            size: 7,
            place_mode: 2,
            ..Default::default()
        };
        let mut w = PacketWriter::new();
        write_furniture_176(&mut w, &item);
        assert_eq!(
            w.finish(),
            vec![1, 0x0E, 0, 0, 2, 3, 0, 0, 0, 0, 0, 0, 7, 0, 0]
        );
    }

    #[test]
    fn test_banner_needs_a_guild() {
        let hidden = Msg::RvRGuildBanner {
            object_id: 2,
            show: true,
            emblem: None,
        };
        assert!(encode_at(ProtocolVersion::V176, &hidden).is_empty());

        let shown = Msg::RvRGuildBanner {
            object_id: 2,
            show: true,
            emblem: Some(0x1_0203),
        };
        let packets = encode_at(ProtocolVersion::V176, &shown);
        assert_eq!(packets[0].payload, vec![0, 2, EFFECT_BANNER, 0, 1, 0, 2, 3]);
    }
}
