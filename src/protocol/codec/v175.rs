//! 1.75: a trailing zero on the login reply and on player creation, a
//! title shown over the player, and the full stat and resist sheets.

use super::base::{
    write_login_granted, write_player_sheet, write_text_window, write_visual_effect,
    STATISTICS_CAPTION,
};
use super::v172::{push_player_create, write_player_create};
use super::v174::EXTRAS_174;
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::message::{OperationId as Op, OutboundMessage as Msg};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::version::ProtocolVersion;

use tracing::warn;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::V175,
    parent: Some(ProtocolVersion::V174),
    encoders: &[
        (Op::LoginGranted, login_granted),
        (Op::PlayerCreate, player_create),
        (Op::CustomTextWindow, custom_text_window),
        (Op::PlayerTitles, player_titles),
        (Op::PlayerTitleUpdate, player_title_update),
        (Op::UpdatePlayer, update_player),
        (Op::CharStatsUpdate, char_stats_update),
        (Op::CharResistsUpdate, char_resists_update),
    ],
    opcodes: &[],
};

const WINDOW_TEXT: u8 = 0;
const WINDOW_STATISTICS: u8 = 1;
/// Line number that opens the titles block of the statistics window
const TITLES_MARK: u8 = 200;
const EFFECT_TITLE: u8 = 0x0B;
/// Marks a stats packet as the resist sheet
const RESISTS_MARK: u8 = 0xFF;

fn login_granted(ctx: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::LoginGranted { color } = msg else {
        return Err(mismatch(Op::LoginGranted));
    };
    let mut w = write_login_granted(ctx, *color);
    w.write_u8(0x00);
    out.tcp(ServerPacket::LoginGranted, w);
    Ok(())
}

fn player_create(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerCreate(p) = msg else {
        return Err(mismatch(Op::PlayerCreate));
    };
    let mut w = write_player_create(p, EXTRAS_174);
    w.write_u8(0x00);
    push_player_create(out, p, w);
    Ok(())
}

fn custom_text_window(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::CustomTextWindow { caption, lines } = msg else {
        return Err(mismatch(Op::CustomTextWindow));
    };
    let mut w = PacketWriter::new();
    w.write_u8(WINDOW_TEXT);
    write_text_window(&mut w, caption, lines);
    out.tcp_checked(ServerPacket::DetailWindow, w)
}

/// Statistics lines, then the selectable titles in a length-prefixed block
fn player_titles(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerTitles { stats, titles } = msg else {
        return Err(mismatch(Op::PlayerTitles));
    };
    let titles = &titles[..titles.len().min(u8::MAX as usize)];

    let mut w = PacketWriter::new();
    w.write_u8(WINDOW_STATISTICS);
    w.write_pascal(STATISTICS_CAPTION);
    for (i, line) in stats.iter().enumerate() {
        w.write_u8((i + 1) as u8);
        w.write_pascal(line);
    }
    w.write_u8(TITLES_MARK);
    let block_at = w.position();
    w.write_u8(0);
    w.write_u8(titles.len() as u8);
    for (i, title) in titles.iter().enumerate() {
        w.write_u8(i as u8);
        w.write_pascal(title);
    }
    let block_len = w.position() - block_at - 1;
    if block_len > u8::MAX as usize {
        warn!(block_len, titles = titles.len(), "Titles block too long");
    }
    w.write_u8(0);
    w.patch_u8(block_at, block_len.min(u8::MAX as usize) as u8)?;
    out.tcp_checked(ServerPacket::DetailWindow, w)
}

fn player_title_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerTitleUpdate { object_id, title } = msg else {
        return Err(mismatch(Op::PlayerTitleUpdate));
    };
    let mut w = write_visual_effect(*object_id, EFFECT_TITLE);
    match title {
        None => {
            w.write_u8(0);
            w.write_u32(0);
        }
        Some(title) => {
            let len = title.chars().count().min(u16::MAX as usize);
            w.write_u8(1);
            w.write_u16(len as u16);
            w.write_u16(0);
            w.write_string_max(title, len);
        }
    }
    out.tcp_checked(ServerPacket::VisualEffect, w)
}

fn update_player(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::UpdatePlayer(sheet) = msg else {
        return Err(mismatch(Op::UpdatePlayer));
    };
    out.tcp_checked(ServerPacket::VariousUpdate, write_player_sheet(sheet, true))
}

fn char_stats_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::CharStatsUpdate(stats) = msg else {
        return Err(mismatch(Op::CharStatsUpdate));
    };
    let mut w = PacketWriter::new();
    for row in [&stats.base, &stats.bonus, &stats.item_bonus] {
        for v in row {
            w.write_u16(*v);
        }
        w.write_u16(0);
    }
    w.write_bytes(&stats.item_caps);
    w.write_u8(0);
    w.write_bytes(&stats.ability_bonus);
    w.write_u8(0);
    w.write_u8(0x00);
    w.write_u8(stats.con_lost);
    w.write_u16(stats.max_health);
    w.write_u16(0);
    out.tcp(ServerPacket::StatsUpdate, w);
    Ok(())
}

fn char_resists_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::CharResistsUpdate(resists) = msg else {
        return Err(mismatch(Op::CharResistsUpdate));
    };
    let mut w = PacketWriter::new();
    for row in [&resists.racial, &resists.buffs, &resists.items] {
        for v in row {
            w.write_u16(*v);
        }
    }
    w.write_bytes(&resists.caps);
    w.write_bytes(&resists.abilities);
    w.write_u8(RESISTS_MARK);
    w.write_u8(0);
    w.write_u16(0);
    w.write_u16(0);
    out.tcp(ServerPacket::StatsUpdate, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::{CharStats, PlayerSheet, Resists};

    #[test]
    fn test_text_window_gains_a_kind_byte() {
        let msg = Msg::CustomTextWindow {
            caption: "Hi".into(),
            lines: vec!["a".into()],
        };
        let packets = encode_at(ProtocolVersion::V175, &msg);
        assert_eq!(packets[0].payload, b"\x00\x02Hi\x01\x01a\x00".to_vec());
    }

    #[test]
    fn test_titles_block_length() {
        let msg = Msg::PlayerTitles {
            stats: vec!["s".into()],
            titles: vec!["ab".into(), "c".into()],
        };
        let packets = encode_at(ProtocolVersion::V175, &msg);
        let p = &packets[0].payload;
        let head = 1 + 1 + STATISTICS_CAPTION.len() + 3;
        assert_eq!(p[head], TITLES_MARK);
        // count, then [0]"ab" and [1]"c"
        assert_eq!(&p[head + 1..], &[8, 2, 0, 2, b'a', b'b', 1, 1, b'c', 0]);
    }

    #[test]
    fn test_title_update() {
        let cleared = encode_at(
            ProtocolVersion::V175,
            &Msg::PlayerTitleUpdate {
                object_id: 3,
                title: None,
            },
        );
        assert_eq!(cleared[0].payload, vec![0, 3, EFFECT_TITLE, 0, 0, 0, 0, 0]);

        let set = encode_at(
            ProtocolVersion::V175,
            &Msg::PlayerTitleUpdate {
                object_id: 3,
                title: Some("Sir".into()),
            },
        );
        assert_eq!(set[0].payload, b"\x00\x03\x0b\x01\x00\x03\x00\x00Sir".to_vec());
        assert!(encode_at(
            ProtocolVersion::V174,
            &Msg::PlayerTitleUpdate {
                object_id: 3,
                title: None
            }
        )
        .is_empty());
    }

    #[test]
    fn test_sheet_ends_with_title() {
        let sheet = PlayerSheet {
            title: Some("Hero".into()),
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V175, &Msg::UpdatePlayer(sheet));
        let p = &packets[0].payload;
        assert_eq!(p[1], 0x0E);
        assert!(p.ends_with(b"\x04None\x00\x04Hero"));
    }

    #[test]
    fn test_stats_and_resists_sheets() {
        let stats = CharStats {
            max_health: 0x0102,
            con_lost: 4,
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V175, &Msg::CharStatsUpdate(stats));
        let p = &packets[0].payload;
        assert_eq!(p.len(), 3 * 18 + 2 * 9 + 6);
        assert!(p.ends_with(&[0, 4, 1, 2, 0, 0]));

        let packets = encode_at(
            ProtocolVersion::V175,
            &Msg::CharResistsUpdate(Resists::default()),
        );
        let p = &packets[0].payload;
        assert_eq!(p.len(), 3 * 18 + 2 * 9 + 6);
        assert_eq!(p[72], RESISTS_MARK);
    }
}
