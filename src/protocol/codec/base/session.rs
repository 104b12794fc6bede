//! Login, character select and session bookkeeping packets.

use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::codec::{mismatch, EncodeContext, Outbox};
use crate::protocol::message::{
    CharacterSummary, ChatLocation, OperationId as Op, OutboundMessage as Msg,
    CHAT_SCREEN_CENTER, CHAT_SCREEN_CENTER_SMALLER,
};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::preprocess::ClientPhase;

/// Slots shown per realm on the 1.68 select screen
const OVERVIEW_SLOTS: u8 = 8;
const OVERVIEW_SLOT_LEN: usize = 184;
const OVERVIEW_TRAILER_LEN: usize = 0x68;
const OVERVIEW_EMPTY_LEN: usize = 1848;

pub(crate) fn version_and_crypt_key(
    ctx: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::VersionAndCryptKey = msg else {
        return Err(mismatch(Op::VersionAndCryptKey));
    };
    let (major, minor) = ctx.version().header_bytes();
    let mut w = PacketWriter::new();
    w.write_u8(0x00); // encryption off
    w.write_u8(0x32);
    w.write_u8(major);
    w.write_u8(minor);
    w.write_u8(0x00);
    out.tcp(ServerPacket::CryptKey, w);
    Ok(())
}

pub(crate) fn login_denied(ctx: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::LoginDenied { reason } = msg else {
        return Err(mismatch(Op::LoginDenied));
    };
    let (major, minor) = ctx.version().header_bytes();
    let mut w = PacketWriter::new();
    w.write_u8(*reason);
    w.write_u8(0x01);
    w.write_u8(major);
    w.write_u8(minor);
    w.write_u8(0x00);
    out.tcp(ServerPacket::LoginDenied, w);
    Ok(())
}

/// The 1.68 login reply body, shared with the 1.75 layout
pub(crate) fn write_login_granted(ctx: &EncodeContext<'_>, color: u8) -> PacketWriter {
    let (major, minor) = ctx.version().header_bytes();
    let mut w = PacketWriter::new();
    w.write_u8(0x01);
    w.write_u8(major);
    w.write_u8(minor);
    w.write_u8(0x00);
    w.write_pascal(ctx.account_name);
    w.write_pascal(ctx.server_name_short);
    w.write_u8(ctx.server_id);
    w.write_u8(color);
    w.write_u8(0x00);
    w
}

pub(crate) fn login_granted(ctx: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::LoginGranted { color } = msg else {
        return Err(mismatch(Op::LoginGranted));
    };
    out.tcp(ServerPacket::LoginGranted, write_login_granted(ctx, *color));
    Ok(())
}

pub(crate) fn session_id(ctx: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::SessionId = msg else {
        return Err(mismatch(Op::SessionId));
    };
    let mut w = PacketWriter::new();
    w.write_u16_le(ctx.session_id);
    out.tcp(ServerPacket::SessionId, w);
    Ok(())
}

pub(crate) fn ping_reply(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PingReply {
        timestamp,
        sequence,
    } = msg
    else {
        return Err(mismatch(Op::PingReply));
    };
    let mut w = PacketWriter::new();
    w.write_u32(*timestamp);
    w.fill(0, 4);
    w.write_u16(sequence.wrapping_add(1));
    w.fill(0, 6);
    out.tcp(ServerPacket::PingReply, w);
    Ok(())
}

pub(crate) fn realm(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Realm { realm } = msg else {
        return Err(mismatch(Op::Realm));
    };
    let mut w = PacketWriter::new();
    w.write_u8(*realm);
    out.tcp(ServerPacket::Realm, w);
    Ok(())
}

pub(crate) fn character_overview(
    ctx: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::CharacterOverview(overview) = msg else {
        return Err(mismatch(Op::CharacterOverview));
    };

    let mut w = PacketWriter::new();
    w.write_fixed_string(ctx.account_name, 24);

    match &overview.characters {
        None => w.fill(0, OVERVIEW_EMPTY_LEN),
        Some(characters) => {
            for slot in 0..OVERVIEW_SLOTS {
                match characters.iter().find(|c| c.slot == slot) {
                    Some(c) => write_overview_slot(&mut w, c),
                    None => w.fill(0, OVERVIEW_SLOT_LEN),
                }
            }
        }
    }
    w.fill(0, OVERVIEW_TRAILER_LEN);

    out.tcp(ServerPacket::CharacterOverview, w);
    Ok(())
}

/// Race byte: high race bits shifted over the gender nibble
#[inline]
pub(crate) fn race_gender_byte(race: u8, gender: u8, high_mask: u8) -> u8 {
    (((race & high_mask) << 2).wrapping_add(race & 0x0F)) | (gender << 4)
}

fn write_overview_slot(w: &mut PacketWriter, c: &CharacterSummary) {
    w.write_fixed_string(&c.name, 24);
    w.fill(0, 24);
    w.write_fixed_string(&c.location, 24);
    w.write_fixed_string("", 24);
    w.write_fixed_string(&c.race_name, 24);
    w.write_u8(c.level);
    w.write_u8(c.class_id);
    w.write_u8(c.realm);
    w.write_u8(race_gender_byte(c.race, c.gender, 0xF0));
    w.write_u16_le(c.model);
    w.write_u8(c.region);
    w.write_u8(c.region_expansion);
    w.write_u32(0);
    w.write_bytes(&c.stats);
    for model in c.armor_models {
        w.write_u16_le(model);
    }
    for color in c.armor_colors {
        w.write_u16_le(color);
    }
    for model in c.weapon_models {
        w.write_u16_le(model);
    }
    w.write_bytes(&c.hands);
    w.write_bool(c.in_si_zone);
    w.write_u8(0x00);
}

pub(crate) fn dup_name_check_reply(
    ctx: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::DupNameCheckReply { name, exists } = msg else {
        return Err(mismatch(Op::DupNameCheckReply));
    };
    let mut w = PacketWriter::new();
    w.write_fixed_string(name, 30);
    w.write_fixed_string(ctx.account_name, 20);
    w.write_bool(*exists);
    w.fill(0, 3);
    out.tcp(ServerPacket::DupNameCheckReply, w);
    Ok(())
}

pub(crate) fn bad_name_check_reply(
    ctx: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::BadNameCheckReply { name, bad } = msg else {
        return Err(mismatch(Op::BadNameCheckReply));
    };
    let mut w = PacketWriter::new();
    w.write_fixed_string(name, 30);
    w.write_fixed_string(ctx.account_name, 20);
    // inverted on the wire: 1 means the name is acceptable
    w.write_bool(!*bad);
    w.fill(0, 3);
    out.tcp(ServerPacket::BadNameCheckReply, w);
    Ok(())
}

pub(crate) fn character_create_reply(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::CharacterCreateReply { name } = msg else {
        return Err(mismatch(Op::CharacterCreateReply));
    };
    let mut w = PacketWriter::new();
    w.write_fixed_string(name, 24);
    out.tcp(ServerPacket::CharacterCreateReply, w);
    Ok(())
}

pub(crate) fn game_open_reply(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::GameOpenReply = msg else {
        return Err(mismatch(Op::GameOpenReply));
    };
    let mut w = PacketWriter::new();
    w.write_u8(0x00);
    out.tcp(ServerPacket::GameOpenReply, w);
    Ok(())
}

pub(crate) fn udp_init_reply(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::UdpInitReply(reply) = msg else {
        return Err(mismatch(Op::UdpInitReply));
    };
    let mut w = PacketWriter::new();
    match &reply.endpoint {
        Some((ip, port)) => {
            w.write_fixed_string(ip, 22);
            w.write_u16(*port);
        }
        None => w.fill(0, 0x18),
    }
    out.udp(ServerPacket::UdpInitReply, w, true);
    Ok(())
}

pub(crate) fn attack_mode(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::AttackMode { attacking } = msg else {
        return Err(mismatch(Op::AttackMode));
    };
    let mut w = PacketWriter::new();
    w.write_bool(*attacking);
    w.fill(0, 3);
    out.tcp(ServerPacket::AttackMode, w);
    Ok(())
}

pub(crate) fn char_stats_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::CharStatsUpdate(stats) = msg else {
        return Err(mismatch(Op::CharStatsUpdate));
    };
    let mut w = PacketWriter::new();
    for v in stats.base.iter().chain(stats.bonus.iter()) {
        w.write_u16(*v);
    }
    w.write_u16(stats.max_health);
    w.write_u8(0x24);
    w.write_u8(0x25);
    out.tcp(ServerPacket::StatsUpdate, w);
    Ok(())
}

pub(crate) fn regions(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Regions(entries) = msg else {
        return Err(mismatch(Op::Regions));
    };

    let mut num: u8 = 0;
    for chunk in entries.chunks(4) {
        let mut w = PacketWriter::new();
        for i in 0..4 {
            match chunk.get(i) {
                Some(entry) => {
                    num = num.wrapping_add(1);
                    w.write_u8(num);
                    w.write_u8(entry.id);
                    w.write_fixed_string(&entry.name, 20);
                    w.write_fixed_string(&entry.from_port, 5);
                    w.write_fixed_string(&entry.to_port, 5);
                    w.write_fixed_string(&entry.ip, 20);
                }
                None => w.fill(0, 52),
            }
        }
        out.tcp(ServerPacket::ClientRegions, w);
    }
    Ok(())
}

pub(crate) fn player_init_finished(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::PlayerInitFinished { mobs } = msg else {
        return Err(mismatch(Op::PlayerInitFinished));
    };
    let mut w = PacketWriter::new();
    w.write_u8(*mobs);
    out.tcp(ServerPacket::CharacterInitFinished, w);
    Ok(())
}

pub(crate) fn time(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Time { daytime, increment } = msg else {
        return Err(mismatch(Op::Time));
    };
    let mut w = PacketWriter::new();
    w.write_u32(*daytime);
    w.write_u32(*increment);
    out.tcp(ServerPacket::Time, w);
    Ok(())
}

/// Chat text with its window prefix
pub(crate) fn chat_text(location: ChatLocation, text: &str) -> String {
    let mut s = String::with_capacity(text.len() + 2);
    s.push_str(location.prefix());
    s.push_str(text);
    s
}

pub(crate) fn message(ctx: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Message(chat) = msg else {
        return Err(mismatch(Op::Message));
    };
    if ctx.phase == ClientPhase::CharacterSelect {
        return Ok(());
    }
    if matches!(chat.chat_type, CHAT_SCREEN_CENTER | CHAT_SCREEN_CENTER_SMALLER) {
        return Ok(());
    }

    let mut w = PacketWriter::new();
    w.write_u16(ctx.session_id);
    w.write_u16(0);
    w.write_u8(chat.chat_type);
    w.fill(0, 3);
    w.write_cstring(&chat_text(chat.location, &chat.text));
    out.tcp(ServerPacket::Message, w);
    Ok(())
}
