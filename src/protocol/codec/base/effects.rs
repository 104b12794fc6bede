//! Doors, weather, sounds and visual effects.

use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::codec::{mismatch, EncodeContext, Outbox};
use crate::protocol::message::{OperationId as Op, OutboundMessage as Msg};
use crate::protocol::opcodes::{ServerPacket, CRASH_OPCODE};

const REGION_SOUND_LEVEL_UP: u8 = 1;
const REGION_SOUND_ENTER: u8 = 2;

pub(crate) fn door_state(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::DoorState {
        door_id,
        open,
        flag,
    } = msg
    else {
        return Err(mismatch(Op::DoorState));
    };
    let mut w = PacketWriter::new();
    w.write_u32(*door_id);
    w.write_bool(*open);
    w.write_u8(*flag);
    w.fill(0x00, 2);
    out.tcp(ServerPacket::DoorState, w);
    Ok(())
}

pub(crate) fn weather(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Weather(weather) = msg else {
        return Err(mismatch(Op::Weather));
    };
    let mut w = PacketWriter::new();
    w.write_u32(weather.x);
    w.write_u32(weather.width);
    w.write_u16(weather.fog_diffusion);
    w.write_u16(weather.speed);
    w.write_u16(weather.intensity);
    w.write_u16(0);
    out.tcp(ServerPacket::Weather, w);
    Ok(())
}

fn region_sound(out: &mut Outbox<'_>, object_id: u16, kind: u8, value: u8) {
    let mut w = PacketWriter::new();
    w.write_u16(object_id);
    w.write_u8(kind);
    w.write_u8(value);
    out.tcp(ServerPacket::RegionSound, w);
}

pub(crate) fn level_up_sound(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::LevelUpSound { object_id, realm } = msg else {
        return Err(mismatch(Op::LevelUpSound));
    };
    region_sound(out, *object_id, REGION_SOUND_LEVEL_UP, *realm);
    Ok(())
}

pub(crate) fn region_enter_sound(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::RegionEnterSound { object_id, sound } = msg else {
        return Err(mismatch(Op::RegionEnterSound));
    };
    region_sound(out, *object_id, REGION_SOUND_ENTER, *sound);
    Ok(())
}

pub(crate) fn play_sound(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlaySound {
        sound_type,
        sound_id,
    } = msg
    else {
        return Err(mismatch(Op::PlaySound));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*sound_type);
    w.write_u16(*sound_id);
    w.fill(0x00, 8);
    out.tcp(ServerPacket::PlaySound, w);
    Ok(())
}

pub(crate) fn sound_effect(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::SoundEffect(sound) = msg else {
        return Err(mismatch(Op::SoundEffect));
    };
    let mut w = PacketWriter::new();
    for value in [sound.sound, sound.zone, sound.x, sound.y, sound.z, sound.radius] {
        w.write_u16(value);
    }
    out.tcp(ServerPacket::SoundEffect, w);
    Ok(())
}

pub(crate) fn object_delete(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::ObjectDelete { object_id } = msg else {
        return Err(mismatch(Op::ObjectDelete));
    };
    let mut w = PacketWriter::new();
    w.write_u16(*object_id);
    w.write_u16(1);
    out.tcp(ServerPacket::ObjectDelete, w);
    Ok(())
}

// Visual effects arrive with 1.73 (hex, quest marker) and 1.74 (vampire wings).

pub(crate) fn hex_effect(_: &EncodeContext<'_>, msg: &Msg, _: &mut Outbox<'_>) -> Result<()> {
    let Msg::HexEffect { .. } = msg else {
        return Err(mismatch(Op::HexEffect));
    };
    Ok(())
}

pub(crate) fn npcs_quest_effect(_: &EncodeContext<'_>, msg: &Msg, _: &mut Outbox<'_>) -> Result<()> {
    let Msg::NpcsQuestEffect { .. } = msg else {
        return Err(mismatch(Op::NpcsQuestEffect));
    };
    Ok(())
}

pub(crate) fn vampire_effect(_: &EncodeContext<'_>, msg: &Msg, _: &mut Outbox<'_>) -> Result<()> {
    let Msg::VampireEffect { .. } = msg else {
        return Err(mismatch(Op::VampireEffect));
    };
    Ok(())
}

/// Visual effect header: object, then the effect kind
pub(crate) fn write_visual_effect(object_id: u16, kind: u8) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u16(object_id);
    w.write_u8(kind);
    w
}

pub(crate) fn crash(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::Crash { text } = msg else {
        return Err(mismatch(Op::Crash));
    };
    let mut w = PacketWriter::new();
    w.write_u8(0xFF);
    w.write_pascal(text);
    out.tcp_raw(CRASH_OPCODE, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::Weather;
    use crate::protocol::version::ProtocolVersion;

    #[test]
    fn test_door_state() {
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::DoorState {
                door_id: 0x01020304,
                open: true,
                flag: 7,
            },
        );
        assert_eq!(packets[0].payload, vec![1, 2, 3, 4, 1, 7, 0, 0]);
    }

    #[test]
    fn test_weather_trails_a_zero_word() {
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::Weather(Weather {
                intensity: 0x0203,
                ..Default::default()
            }),
        );
        let p = &packets[0].payload;
        assert_eq!(p.len(), 16);
        assert_eq!(&p[12..], &[2, 3, 0, 0]);
    }

    #[test]
    fn test_crash_uses_raw_opcode() {
        let packets = encode_at(ProtocolVersion::V168, &Msg::Crash { text: "bye".into() });
        assert_eq!(packets[0].opcode, CRASH_OPCODE);
        assert_eq!(packets[0].payload, b"\xFF\x03bye".to_vec());
    }

    #[test]
    fn test_visual_effects_need_newer_clients() {
        let msg = Msg::HexEffect {
            object_id: 1,
            effects: [1; 5],
        };
        assert!(encode_at(ProtocolVersion::V168, &msg).is_empty());
    }
}
