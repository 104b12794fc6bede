//! Merchant, trade and consignment windows.

use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::codec::base::damage_and_type;
use crate::protocol::codec::split::{pack_list, ListLayout};
use crate::protocol::codec::{mismatch, EncodeContext, Outbox};
use crate::protocol::message::{
    ItemData, MerchantItem, MerchantWindow, Money, OperationId as Op, OutboundMessage as Msg,
};
use crate::protocol::opcodes::ServerPacket;

/// Item slots on each side of a trade
pub(crate) const TRADE_SLOTS: usize = 10;
const CLOSE_TRADE_LEN: usize = 40;

/// Write the merchant pages, or the empty window when there are none.
///
/// `header` builds the per-page header; its first byte is the item count.
pub(crate) fn push_merchant_pages(
    out: &mut Outbox<'_>,
    window: &MerchantWindow,
    header: fn(u8, u8) -> Vec<u8>,
    write_item: fn(&mut PacketWriter, &MerchantItem),
) -> Result<()> {
    let pages = window.pages.iter().flatten().filter(|p| !p.items.is_empty());

    let mut sent = false;
    for page in pages {
        let header = header(window.window_type, page.page);
        let layout = ListLayout::counted(&header, 0);
        for payload in pack_list(&layout, &page.items, write_item)? {
            out.tcp_bytes(ServerPacket::MerchantWindow, payload);
        }
        sent = true;
    }

    if !sent {
        let mut w = PacketWriter::new();
        w.write_bytes(&[0, window.window_type, 0, 0]);
        out.tcp(ServerPacket::MerchantWindow, w);
    }
    Ok(())
}

/// Weapon hand bits, or the dps of a garden object
#[inline]
pub(crate) fn hand_byte(item: &ItemData) -> u8 {
    if item.is_garden_object {
        item.dps_af
    } else {
        item.hand << 6
    }
}

fn write_merchant_item(w: &mut PacketWriter, entry: &MerchantItem) {
    let item = &entry.item;
    w.write_u8(entry.index);
    w.write_u8(item.level);
    w.write_u8(item.value1);
    w.write_u8(item.value2);
    w.write_u8(hand_byte(item));
    w.write_u8(damage_and_type(item));
    w.write_u8(u8::from(!entry.usable));
    w.write_u16(entry.stack_value);
    w.write_u32(entry.price);
    w.write_u16(item.model);
    w.write_pascal(&item.name);
}

pub(crate) fn merchant_window(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::MerchantWindow(window) = msg else {
        return Err(mismatch(Op::MerchantWindow));
    };
    push_merchant_pages(
        out,
        window,
        |window_type, page| vec![0, window_type, page, 0],
        write_merchant_item,
    )
}

fn write_money(w: &mut PacketWriter, money: &Money) {
    w.write_u16(money.mithril);
    w.write_u16(money.platinum);
    w.write_u16(money.gold);
    w.write_u16(u16::from(money.silver));
    w.write_u16(u16::from(money.copper));
}

fn write_trade_item(w: &mut PacketWriter, slot: u8, item: &ItemData) {
    w.write_u8(slot);
    w.write_u8(item.level);
    w.write_u8(item.value1);
    w.write_u8(item.value2);
    w.write_u8(item.hand << 6);
    w.write_u8(damage_and_type(item));
    w.write_u16(item.weight);
    w.write_u8(item.condition);
    w.write_u8(item.durability);
    w.write_u8(item.quality);
    w.write_u8(item.bonus);
    w.write_u16(item.model);
    w.write_u16(item.color);
    w.write_u16(item.effect);
    w.write_pascal(&item.display_name());
}

pub(crate) fn trade_window(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::TradeWindow(trade) = msg else {
        return Err(mismatch(Op::TradeWindow));
    };

    let mut w = PacketWriter::new();
    let own = &trade.own_slots[..trade.own_slots.len().min(TRADE_SLOTS)];
    w.write_bytes(own);
    w.fill(0x00, TRADE_SLOTS - own.len());

    w.write_u16(0);
    write_money(&mut w, &trade.own_money);
    w.write_u16(0);
    write_money(&mut w, &trade.partner_money);
    w.write_u16(0);

    let partner = trade
        .partner_items
        .as_deref()
        .map(|items| &items[..items.len().min(TRADE_SLOTS)]);
    match partner {
        Some(items) => {
            w.write_u8(items.len() as u8);
            w.write_u8(0x01);
        }
        None => w.write_u16(0),
    }
    w.write_bool(trade.repairing);
    w.write_bool(trade.combine);

    for (slot, item) in partner.into_iter().flatten() {
        write_trade_item(&mut w, *slot, item);
    }

    if trade.combine {
        w.write_pascal(&format!("Combining for {}", trade.partner));
    } else {
        w.write_pascal(&format!("Trading with {}", trade.partner));
    }
    out.tcp_checked(ServerPacket::TradeWindow, w)
}

pub(crate) fn close_trade_window(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::CloseTradeWindow = msg else {
        return Err(mismatch(Op::CloseTradeWindow));
    };
    let mut w = PacketWriter::new();
    w.fill(0x00, CLOSE_TRADE_LEN);
    out.tcp(ServerPacket::TradeWindow, w);
    Ok(())
}

/// Before 1.125 the explorer only ever reports "no results"
pub(crate) fn market_explorer_window(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::MarketExplorerWindow(_) = msg else {
        return Err(mismatch(Op::MarketExplorerWindow));
    };
    let mut w = PacketWriter::new();
    w.write_bytes(&[0xFF, 0, 0, 0]);
    out.tcp(ServerPacket::MarketExplorerWindow, w);
    Ok(())
}

pub(crate) fn consignment_merchant_money(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::ConsignmentMerchantMoney(money) = msg else {
        return Err(mismatch(Op::ConsignmentMerchantMoney));
    };
    let mut w = PacketWriter::new();
    w.write_u8(money.copper);
    w.write_u8(money.silver);
    w.write_u16(money.gold);
    w.write_u16(money.mithril);
    w.write_u16(money.platinum);
    out.tcp(ServerPacket::ConsignmentMerchantMoney, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::version::ProtocolVersion;
    use crate::protocol::message::{MerchantPage, TradeWindow};

    fn merchant_item(index: u8) -> MerchantItem {
        MerchantItem {
            index,
            item: ItemData {
                level: 10,
                model: 0x0102,
                name: "Dagger".into(),
                ..Default::default()
            },
            stack_value: 0,
            price: 500,
            usable: true,
        }
    }

    #[test]
    fn test_merchant_sends_one_packet_per_filled_page() {
        let window = MerchantWindow {
            window_type: 0,
            pages: Some(vec![
                MerchantPage {
                    page: 0,
                    items: vec![merchant_item(0), merchant_item(1)],
                },
                MerchantPage {
                    page: 1,
                    items: Vec::new(),
                },
                MerchantPage {
                    page: 2,
                    items: vec![merchant_item(0)],
                },
            ]),
        };
        let packets = encode_at(ProtocolVersion::V168, &Msg::MerchantWindow(window));
        assert_eq!(packets.len(), 2);
        assert_eq!(&packets[0].payload[..4], &[2, 0, 0, 0]);
        assert_eq!(&packets[1].payload[..4], &[1, 0, 2, 0]);
        // usable items carry a zero "red" byte
        assert_eq!(packets[1].payload[10], 0);
    }

    #[test]
    fn test_empty_merchant_window() {
        let window = MerchantWindow {
            window_type: 3,
            pages: None,
        };
        let packets = encode_at(ProtocolVersion::V168, &Msg::MerchantWindow(window));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload, vec![0, 3, 0, 0]);
    }

    #[test]
    fn test_trade_window_layout() {
        let trade = TradeWindow {
            own_slots: vec![40, 41],
            own_money: Money {
                copper: 5,
                ..Default::default()
            },
            partner_items: Some(vec![(0, ItemData::default())]),
            partner: "Bob".into(),
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V168, &Msg::TradeWindow(trade));
        let p = &packets[0].payload;
        assert_eq!(&p[..3], &[40, 41, 0]);
        // own copper is the last word of the first money block
        assert_eq!(&p[20..22], &[0, 5]);
        assert_eq!(&p[36..38], &[1, 1]);
        assert!(p.ends_with(b"\x10Trading with Bob"));
    }

    #[test]
    fn test_close_trade_is_blank() {
        let packets = encode_at(ProtocolVersion::V168, &Msg::CloseTradeWindow);
        assert_eq!(packets[0].payload, vec![0; CLOSE_TRADE_LEN]);
    }
}
