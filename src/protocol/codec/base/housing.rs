//! House exteriors, interiors and the permission sheet.

use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::codec::split::{pack_list, ListLayout};
use crate::protocol::codec::{mismatch, EncodeContext, Outbox};
use crate::protocol::message::{
    DialogCode, FurnitureItem, GardenItem, HouseInfo, OperationId as Op, OutboundMessage as Msg,
};
use crate::protocol::opcodes::ServerPacket;

/// Marks a packet carrying the full item set rather than an update
const COMPLETE_SET: u8 = 0x80;
const HOUSE_NAME_MARK: u8 = 0x03;
const INTERIOR_Z: u16 = 25000;
const PAY_RENT_DIALOG_TYPE: u8 = 0x02;

/// Porch, outdoor banner and outdoor shield bits
#[inline]
pub(crate) fn porch_flags(house: &HouseInfo) -> u16 {
    u16::from(house.porch) | u16::from(house.outdoor_banner) << 1 | u16::from(house.outdoor_shield) << 2
}

#[inline]
pub(crate) fn indoor_flags(house: &HouseInfo) -> u8 {
    u8::from(house.indoor_banner) | u8::from(house.indoor_shield) << 1
}

/// Exterior with the porch flags as given
pub(crate) fn write_house(house: &HouseInfo, flags: u16) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u16(house.number);
    w.write_u16(house.z);
    w.write_u32(house.x);
    w.write_u32(house.y);
    w.write_u16(house.heading);
    w.write_u16(house.porch_roof_color);
    w.write_u16(flags);
    w.write_u16(house.emblem as u16);
    w.write_u8(house.model);
    w.write_u8(house.roof_material);
    w.write_u8(house.wall_material);
    w.write_u8(house.door_material);
    w.write_u8(house.truss_material);
    w.write_u8(house.porch_material);
    w.write_u8(house.window_material);
    w.write_u8(HOUSE_NAME_MARK);
    w.write_pascal(&house.name);
    w
}

pub(crate) fn house(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::House(house) = msg else {
        return Err(mismatch(Op::House));
    };
    out.tcp(ServerPacket::HouseCreate, write_house(house, porch_flags(house)));
    Ok(())
}

pub(crate) fn remove_house(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::RemoveHouse(house) = msg else {
        return Err(mismatch(Op::RemoveHouse));
    };
    let mut w = PacketWriter::new();
    w.write_u16(house.number);
    w.write_u16(house.z);
    w.write_u32(house.x);
    w.write_u32(house.y);
    w.fill(0x00, 15);
    w.write_u8(HOUSE_NAME_MARK);
    w.write_pascal("");
    out.tcp(ServerPacket::HouseCreate, w);
    Ok(())
}

/// Interior; `emblem_flags` is the indoor banner and shield byte
pub(crate) fn write_enter_house(house: &HouseInfo, emblem_flags: u8) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u16(house.number);
    w.write_u16(INTERIOR_Z);
    w.write_u32(house.x);
    w.write_u32(house.y);
    w.write_u16(house.heading);
    w.write_u8(0);
    w.write_u8(emblem_flags);
    w.write_u16(house.emblem as u16);
    w.write_u8(0);
    w.write_u8(0);
    w.write_u8(house.model);
    w.fill(0x00, 3);
    w.write_bytes(&house.rug_colors);
    w.write_u8(0);
    w
}

pub(crate) fn enter_house(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::EnterHouse(house) = msg else {
        return Err(mismatch(Op::EnterHouse));
    };
    out.tcp(
        ServerPacket::HouseEnter,
        write_enter_house(house, indoor_flags(house)),
    );
    Ok(())
}

pub(crate) fn toggle_house_points(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::ToggleHousePoints { house } = msg else {
        return Err(mismatch(Op::ToggleHousePoints));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*house);
    w.write_u8(0x04);
    w.write_u8(0x00);
    out.tcp(ServerPacket::HouseTogglePoints, w);
    Ok(())
}

pub(crate) fn house_permissions(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::HousePermissions(permissions) = msg else {
        return Err(mismatch(Op::HousePermissions));
    };
    let mut w = PacketWriter::new();
    w.write_u8(permissions.levels.len() as u8);
    w.write_u8(0);
    w.write_u16(permissions.house);
    for (level, p) in permissions.levels.iter().enumerate() {
        w.write_u8(level as u8);
        w.write_bool(p.enter);
        w.write_bytes(&p.vaults);
        w.write_bool(p.change_appearance);
        w.write_bool(p.change_interior);
        w.write_bool(p.change_garden);
        w.write_bool(p.banish);
        w.write_bool(p.use_merchants);
        w.write_bool(p.use_tools);
        w.write_bool(p.bind);
        w.write_u8(p.consignment);
        w.write_bool(p.pay_rent);
        w.write_u8(0);
    }
    out.tcp(ServerPacket::HousingPermissions, w);
    Ok(())
}

pub(crate) fn house_pay_rent_dialog(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::HousePayRentDialog { title } = msg else {
        return Err(mismatch(Op::HousePayRentDialog));
    };
    let mut w = PacketWriter::new();
    w.write_u8(0);
    w.write_u8(DialogCode::HousePayRent as u8);
    w.fill(0x00, 8);
    w.write_u8(PAY_RENT_DIALOG_TYPE);
    w.write_u8(1);
    w.write_cstring(title);
    w.write_u8(0);
    out.tcp_checked(ServerPacket::Dialog, w)
}

/// Items sorted by key, split with `[house][count][0x80]` headers.
///
/// Only the first packet is flagged as the complete set.
fn push_house_items<T: Copy>(
    out: &mut Outbox<'_>,
    packet: ServerPacket,
    house: u16,
    mut items: Vec<T>,
    key: fn(&T) -> u8,
    write: impl FnMut(&mut PacketWriter, T),
) -> Result<()> {
    items.sort_by_key(key);
    let [hi, lo] = house.to_be_bytes();
    let header = [hi, lo, 0, COMPLETE_SET];
    let layout = ListLayout::counted(&header, 2);
    for (i, mut payload) in pack_list(&layout, items, write)?.into_iter().enumerate() {
        if i > 0 {
            payload[3] = 0;
        }
        out.tcp_bytes(packet, payload);
    }
    Ok(())
}

fn write_garden_item(w: &mut PacketWriter, item: GardenItem) {
    w.write_u8(item.key);
    w.write_u16(item.model);
    w.write_u8(item.position);
    w.write_u8(item.rotation);
}

pub(crate) fn garden(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Garden { house, items } = msg else {
        return Err(mismatch(Op::Garden));
    };
    push_house_items(
        out,
        ServerPacket::HouseChangeGarden,
        *house,
        items.clone(),
        |i| i.key,
        write_garden_item,
    )
}

pub(crate) fn remove_garden(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::RemoveGarden { house } = msg else {
        return Err(mismatch(Op::RemoveGarden));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*house);
    w.write_u8(0x00);
    w.write_u8(0x01);
    out.tcp(ServerPacket::HouseChangeGarden, w);
    Ok(())
}

/// Furniture entry layout of one client generation
pub(crate) type FurnitureWriter = fn(&mut PacketWriter, &FurnitureItem);

pub(crate) fn write_furniture_168(w: &mut PacketWriter, item: &FurnitureItem) {
    w.write_u8(item.key);
    w.write_u16(item.model);
    w.write_u16(item.color as u16);
    w.write_u8(0);
    w.write_u8(0);
    w.write_u16(item.x);
    w.write_u16(item.y);
    w.write_u16(item.rotation);
    w.write_u8(item.size);
    w.write_u8(item.position);
    w.write_u8(item.place_mode.wrapping_sub(2));
}

pub(crate) fn push_furniture(
    out: &mut Outbox<'_>,
    house: u16,
    items: &[FurnitureItem],
    write: FurnitureWriter,
) -> Result<()> {
    push_house_items(
        out,
        ServerPacket::HousingItem,
        house,
        items.to_vec(),
        |i| i.key,
        |w, item| write(w, &item),
    )
}

pub(crate) fn push_furniture_item(
    out: &mut Outbox<'_>,
    house: u16,
    item: &FurnitureItem,
    write: FurnitureWriter,
) {
    let mut w = PacketWriter::new();
    w.write_u16(house);
    w.write_u8(0x01);
    w.write_u8(0x00);
    write(&mut w, item);
    out.tcp(ServerPacket::HousingItem, w);
}

pub(crate) fn furniture(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Furniture { house, items } = msg else {
        return Err(mismatch(Op::Furniture));
    };
    push_furniture(out, *house, items, write_furniture_168)
}

pub(crate) fn furniture_item(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::FurnitureItem { house, item } = msg else {
        return Err(mismatch(Op::FurnitureItem));
    };
    push_furniture_item(out, *house, item, write_furniture_168);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::HousePermissions;
    use crate::protocol::version::ProtocolVersion;

    #[test]
    fn test_house_exterior_flags() {
        let house = HouseInfo {
            number: 12,
            porch: true,
            outdoor_shield: true,
            name: "Keep".into(),
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V168, &Msg::House(house));
        let p = &packets[0].payload;
        assert_eq!(&p[..2], &[0, 12]);
        assert_eq!(&p[16..18], &[0, 0x05]);
        assert!(p.ends_with(b"\x03\x04Keep"));
    }

    #[test]
    fn test_garden_sorted_by_key() {
        let items = vec![
            GardenItem {
                key: 5,
                model: 0x0102,
                position: 1,
                rotation: 2,
            },
            GardenItem {
                key: 1,
                ..Default::default()
            },
        ];
        let packets = encode_at(ProtocolVersion::V168, &Msg::Garden { house: 3, items });
        assert_eq!(
            packets[0].payload,
            vec![0, 3, 2, 0x80, 1, 0, 0, 0, 0, 5, 1, 2, 1, 2]
        );
    }

    #[test]
    fn test_permission_sheet_has_ten_levels() {
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::HousePermissions(HousePermissions::default()),
        );
        let p = &packets[0].payload;
        assert_eq!(p.len(), 4 + 10 * 16);
        assert_eq!(p[4 + 9 * 16], 9);
    }

    #[test]
    fn test_pay_rent_dialog() {
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::HousePayRentDialog { title: "Rent".into() },
        );
        let p = &packets[0].payload;
        assert_eq!(&p[..2], &[0, 0x14]);
        assert_eq!(&p[10..12], &[2, 1]);
        assert!(p.ends_with(b"Rent\x00\x00"));
    }

    #[test]
    fn test_furniture_item_update() {
        let item = FurnitureItem {
            key: 4,
            place_mode: 2,
            ..Default::default()
        };
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::FurnitureItem { house: 1, item },
        );
        let p = &packets[0].payload;
        assert_eq!(&p[..5], &[0, 1, 1, 0, 4]);
        assert_eq!(p.len(), 4 + 16);
    }
}
