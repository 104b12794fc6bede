//! 1.125: the reworked login flow. Version strings and character names
//! become length-prefixed little-endian, the select screen shows ten slots
//! and group members report endurance.

use super::base::{
    damage_and_type, hand_byte, push_group_members, push_merchant_pages, race_gender_byte,
    truncated, write_group_member_map, write_member_icons, GROUP_WINDOW_SUBCODE,
};
use super::split::{pack_list, ListLayout};
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::config::MAX_PAYLOAD_SIZE;
use crate::protocol::message::{
    CharacterSummary, GroupMemberStatus, MarketItem, MarketPage, MerchantItem,
    OperationId as Op, OutboundMessage as Msg,
};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::version::ProtocolVersion;

use tracing::warn;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::V1125,
    parent: Some(ProtocolVersion::new(1124)),
    encoders: &[
        (Op::VersionAndCryptKey, version_and_crypt_key),
        (Op::LoginGranted, login_granted),
        (Op::Realm, realm),
        (Op::CharacterOverview, character_overview),
        (Op::UdpInitReply, udp_init_reply),
        (Op::GroupWindowUpdate, group_window_update),
        (Op::GroupMemberUpdate, group_member_update),
        (Op::MerchantWindow, merchant_window),
        (Op::MarketExplorerWindow, market_explorer_window),
    ],
    opcodes: &[],
};

const OVERVIEW_SLOTS: u8 = 10;
const MAX_LOCATION_LEN: usize = 23;
const LOCATION_KEEP: usize = 20;
const SERVER_ID: u8 = 0x05;
/// Longest name, class or race text kept in an overview slot
const MAX_OVERVIEW_TEXT: usize = 24;

fn version_and_crypt_key(ctx: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::VersionAndCryptKey = msg else {
        return Err(mismatch(Op::VersionAndCryptKey));
    };
    let mut version = ctx.version().to_string();
    if let Some(suffix) = ctx.hello.revision_suffix() {
        version.push(suffix);
    }
    let mut w = PacketWriter::new();
    w.write_pascal_u32_le(&version);
    w.write_u8(ctx.hello.build[0]);
    w.write_u8(ctx.hello.build[1]);
    out.tcp(ServerPacket::CryptKey, w);
    Ok(())
}

fn login_granted(ctx: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::LoginGranted { color } = msg else {
        return Err(mismatch(Op::LoginGranted));
    };
    let mut w = PacketWriter::new();
    w.write_pascal(ctx.account_name);
    w.write_pascal(ctx.server_name_short);
    w.write_u8(SERVER_ID);
    w.write_u8(*color);
    w.write_u8(0x00); // subscribed account
    out.tcp(ServerPacket::LoginGranted, w);
    Ok(())
}

fn realm(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Realm { realm } = msg else {
        return Err(mismatch(Op::Realm));
    };
    let mut w = PacketWriter::new();
    w.write_u8(*realm);
    w.fill(0, 12);
    out.tcp(ServerPacket::Realm, w);
    Ok(())
}

/// Location text shortened with an ellipsis when the client would clip it
fn short_location(location: &str) -> String {
    if location.chars().count() > MAX_LOCATION_LEN {
        let mut s: String = location.chars().take(LOCATION_KEEP).collect();
        s.push_str("...");
        s
    } else {
        location.to_owned()
    }
}

fn write_overview_slot(w: &mut PacketWriter, c: &CharacterSummary) {
    w.write_u8(c.level);
    w.write_pascal_u32_le(truncated(&c.name, MAX_OVERVIEW_TEXT));
    w.write_u8(0x18);
    w.write_u32(1);
    w.write_u8(c.face.eye_size);
    w.write_u8(c.face.lip_size);
    w.write_u8(c.face.eye_color);
    w.write_u8(c.face.hair_color);
    w.write_u8(c.face.face_type);
    w.write_u8(c.face.hair_style);
    w.write_u8((c.boots_extension << 4) | (c.gloves_extension & 0x0F));
    w.write_u8((c.torso_extension << 4) | u8::from(c.hood_up));
    w.write_u8(c.customisation_step);
    w.write_u8(c.face.mood);
    w.fill(0, 13);

    w.write_pascal_u32_le(&short_location(&c.location));
    w.write_pascal_u32_le(truncated(&c.class_name, MAX_OVERVIEW_TEXT));
    w.write_pascal_u32_le(truncated(&c.race_name, MAX_OVERVIEW_TEXT));
    w.write_u16_le(c.model);
    w.write_u8(c.region);
    w.write_u8(c.region_expansion);

    // the slot after the boots carries the right hand color here
    let models = &c.armor_models;
    for model in [models[0], models[1], models[2], c.right_hand_color] {
        w.write_u16_le(model);
    }
    for model in &models[4..] {
        w.write_u16_le(*model);
    }
    for color in c.armor_colors {
        w.write_u16_le(color);
    }
    for model in c.weapon_models {
        w.write_u16_le(model);
    }

    w.write_bytes(&c.stats);
    w.write_u8(c.class_id);
    w.write_u8(c.realm);
    w.write_u8(race_gender_byte(c.race, c.gender, 0x10));
    w.write_bytes(&c.hands);
    w.write_bool(c.in_si_zone);
    w.write_u8(c.stats[2]);
}

fn character_overview(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::CharacterOverview(overview) = msg else {
        return Err(mismatch(Op::CharacterOverview));
    };

    let mut w = PacketWriter::new();
    w.fill(0, 8);
    match &overview.characters {
        None => w.fill(0, usize::from(OVERVIEW_SLOTS)),
        Some(characters) => {
            for slot in 0..OVERVIEW_SLOTS {
                match characters.iter().find(|c| c.slot == slot) {
                    Some(c) => write_overview_slot(&mut w, c),
                    None => w.write_u8(0),
                }
            }
        }
    }
    out.tcp(ServerPacket::CharacterOverview, w);
    Ok(())
}

fn udp_init_reply(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::UdpInitReply(reply) = msg else {
        return Err(mismatch(Op::UdpInitReply));
    };
    let mut w = PacketWriter::new();
    w.write_u64_le(reply.ticks);
    out.udp(ServerPacket::UdpInitReply, w, true);
    Ok(())
}

fn group_window_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::GroupWindowUpdate(group) = msg else {
        return Err(mismatch(Op::GroupWindowUpdate));
    };
    let layout = ListLayout::counted(&[GROUP_WINDOW_SUBCODE, 0], 1);
    let payloads = pack_list(&layout, group.iter().flatten(), |w, m| {
        w.write_pascal(&m.name);
        w.write_pascal(&m.class_name);
        w.write_u16(m.object_id);
        w.write_u8(m.level);
    })?;
    for payload in payloads {
        out.tcp_bytes(ServerPacket::VariousUpdate, payload);
    }
    Ok(())
}

fn write_group_member(w: &mut PacketWriter, m: &GroupMemberStatus) {
    w.write_u8(0x20 | m.group_index);
    if !m.same_region {
        w.fill(0, 3);
        w.write_u8(0x20);
        if m.icons.is_some() {
            w.write_u8(0x80 | m.group_index);
            w.write_u8(0);
        }
        return;
    }

    w.write_u8(m.health_percent);
    w.write_u8(m.mana_percent);
    w.write_u8(m.endurance_percent);
    w.write_u8(m.status);
    write_group_member_map(w, m);
    if let Some(icons) = &m.icons {
        w.write_u8(0x80 | m.group_index);
        write_member_icons(w, icons, true);
    }
}

fn group_member_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::GroupMemberUpdate(members) = msg else {
        return Err(mismatch(Op::GroupMemberUpdate));
    };
    push_group_members(out, members, write_group_member)
}

/// Merchant entry with little-endian numbers; the usable byte is set for
/// items the viewer can use
fn write_merchant_item(w: &mut PacketWriter, entry: &MerchantItem) {
    let item = &entry.item;
    w.write_u8(entry.index);
    w.write_u8(item.level);
    w.write_u8(item.value1);
    w.write_u8(item.value2);
    w.write_u8(hand_byte(item));
    w.write_u8(damage_and_type(item));
    w.write_u8(u8::from(entry.usable));
    w.write_u16_le(entry.stack_value);
    w.write_u32_le(entry.price);
    w.write_u16_le(item.model);
    w.write_pascal_u32_le(&item.name);
}

fn merchant_window(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::MerchantWindow(window) = msg else {
        return Err(mismatch(Op::MerchantWindow));
    };
    push_merchant_pages(
        out,
        window,
        |window_type, page| vec![0, window_type, page],
        write_merchant_item,
    )
}

fn write_market_item(w: &mut PacketWriter, index: u8, entry: &MarketItem) {
    let item = &entry.item;
    w.write_u8(index);
    w.write_u8(item.level);
    w.write_u8(item.value1);
    w.write_u8(item.value2);
    w.write_u8(hand_byte(item));
    w.write_u8(damage_and_type(item));
    w.write_u8(u8::from(!entry.usable));
    w.write_u16_le(item.weight);
    w.write_u8(item.condition);
    w.write_u8(item.durability);
    w.write_u8(item.quality);
    w.write_u8(item.bonus);
    w.write_u16_le(item.model);
    w.write_u16_le(if item.emblem != 0 {
        item.emblem as u16
    } else {
        item.color
    });
    w.write_u16_le(item.effect & 0xFF);
    w.write_u16_le(entry.lot);
    w.write_u32_le(entry.price);
    w.write_pascal_u32_le(&item.display_name());
}

/// One page of search hits; hits that do not fit the packet are dropped
fn write_market_page(page: &MarketPage) -> Result<PacketWriter> {
    let mut w = PacketWriter::new();
    w.write_u8(0);
    w.write_u8(page.page);
    w.write_u8(page.max_page);
    w.write_u8(0);

    let mut written = 0usize;
    for entry in &page.items {
        let mut e = PacketWriter::new();
        write_market_item(&mut e, written as u8, entry);
        if written == u8::MAX as usize || w.len() + e.len() > MAX_PAYLOAD_SIZE {
            warn!(
                kept = written,
                total = page.items.len(),
                "Market page clipped to one packet"
            );
            break;
        }
        w.write_bytes(e.as_slice());
        written += 1;
    }
    w.patch_u8(0, written as u8)?;
    Ok(w)
}

fn market_explorer_window(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::MarketExplorerWindow(page) = msg else {
        return Err(mismatch(Op::MarketExplorerWindow));
    };
    let w = match page {
        Some(page) => write_market_page(page)?,
        None => {
            let mut w = PacketWriter::new();
            w.write_bytes(&[0xFF, 0, 0, 0]);
            w
        }
    };
    out.tcp(ServerPacket::MarketExplorerWindow, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::{ItemData, MerchantPage, MerchantWindow};

    #[test]
    fn test_long_location_is_clipped() {
        assert_eq!(short_location("Camelot"), "Camelot");
        assert_eq!(
            short_location("The Great Pyramid of Stygia"),
            "The Great Pyramid of..."
        );
    }

    #[test]
    fn test_member_in_other_region() {
        let m = GroupMemberStatus {
            group_index: 2,
            same_region: false,
            health_percent: 90,
            icons: Some(vec![1]),
            ..Default::default()
        };
        let mut w = PacketWriter::new();
        write_group_member(&mut w, &m);
        assert_eq!(w.finish(), vec![0x22, 0, 0, 0, 0x20, 0x82, 0]);
    }

    #[test]
    fn test_overview_slot_ends_with_constitution() {
        let c = CharacterSummary {
            name: "Arthur".into(),
            stats: [1, 2, 77, 4, 5, 6, 7, 8],
            ..Default::default()
        };
        let mut w = PacketWriter::new();
        write_overview_slot(&mut w, &c);
        let bytes = w.finish();
        assert_eq!(bytes.last(), Some(&77));
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..5], &[6, 0, 0, 0]);
    }

    #[test]
    fn test_merchant_page_little_endian() {
        let window = MerchantWindow {
            window_type: 2,
            pages: Some(vec![MerchantPage {
                page: 1,
                items: vec![MerchantItem {
                    index: 4,
                    item: ItemData {
                        level: 10,
                        model: 0x0102,
                        name: "Bow".into(),
                        ..Default::default()
                    },
                    stack_value: 0x0300,
                    price: 500,
                    usable: true,
                }],
            }]),
        };
        let msg = Msg::MerchantWindow(window);
        let packets = encode_at(ProtocolVersion::V1125, &msg);
        let p = &packets[0].payload;
        assert_eq!(&p[..3], &[1, 2, 1]);
        assert_eq!(&p[3..10], &[4, 10, 0, 0, 0, 0, 1]);
        assert_eq!(&p[10..18], &[0x00, 0x03, 0xF4, 0x01, 0, 0, 0x02, 0x01]);
        assert_eq!(&p[18..], b"\x03\x00\x00\x00Bow");

        let older = encode_at(ProtocolVersion::new(1124), &msg);
        assert_eq!(older[0].payload[3], 0);
    }

    #[test]
    fn test_empty_merchant_window() {
        let msg = Msg::MerchantWindow(MerchantWindow {
            window_type: 3,
            pages: None,
        });
        let packets = encode_at(ProtocolVersion::V1125, &msg);
        assert_eq!(packets[0].payload, vec![0, 3, 0, 0]);
    }

    #[test]
    fn test_market_results() {
        let page = MarketPage {
            page: 1,
            max_page: 3,
            items: vec![
                MarketItem {
                    item: ItemData {
                        name: "Ring".into(),
                        ..Default::default()
                    },
                    usable: false,
                    lot: 0x0A0B,
                    price: 1,
                },
                MarketItem::default(),
            ],
        };
        let packets = encode_at(ProtocolVersion::V1125, &Msg::MarketExplorerWindow(Some(page)));
        let p = &packets[0].payload;
        assert_eq!(&p[..4], &[2, 1, 3, 0]);
        assert_eq!(p[4 + 6], 1);
        assert_eq!(&p[4 + 19..4 + 25], &[0x0B, 0x0A, 1, 0, 0, 0]);
        assert_eq!(&p[4 + 25..4 + 33], b"\x04\x00\x00\x00Ring");
        assert_eq!(p[4 + 33], 1);

        let none = encode_at(ProtocolVersion::V1125, &Msg::MarketExplorerWindow(None));
        assert_eq!(none[0].payload, vec![0xFF, 0, 0, 0]);
    }

    #[test]
    fn test_market_page_clipped_to_one_packet() {
        let hit = MarketItem {
            item: ItemData {
                name: "x".repeat(200),
                ..Default::default()
            },
            ..Default::default()
        };
        let page = MarketPage {
            items: vec![hit; 20],
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V1125, &Msg::MarketExplorerWindow(Some(page)));
        let p = &packets[0].payload;
        assert!(p.len() <= MAX_PAYLOAD_SIZE);
        // 25 fixed bytes, a 4 byte length and the name per hit
        assert_eq!(p[0] as usize, (MAX_PAYLOAD_SIZE - 4) / (25 + 4 + 200));
    }
}
