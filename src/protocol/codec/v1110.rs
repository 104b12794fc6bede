//! 1.110: effect icons carry a tooltip id and a target window, delve text
//! is rendered by the server, and the trainer lists every trainable skill.

use super::base::{ability_label, push_offered_abilities, text_room, truncated};
use super::v173::{push_icons, IconsLayout};
use super::{mismatch, CodecRevision, EncodeContext, Outbox};
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::message::{
    OperationId as Op, OutboundMessage as Msg, TrainerSkills, TrainerWindow,
};
use crate::protocol::opcodes::ServerPacket;
use crate::protocol::version::ProtocolVersion;

use tracing::warn;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::V1110,
    parent: Some(ProtocolVersion::new(1109)),
    encoders: &[
        (Op::UpdateIcons, update_icons),
        (Op::DelveInfo, delve_info),
        (Op::TrainerWindow, trainer_window),
    ],
    opcodes: &[],
};

const ICONS_1110: IconsLayout = IconsLayout {
    tooltip: true,
    clear_len: 10,
};

const TRAINER_SPECS: u8 = 0;
const TRAINER_SUMMARY: u8 = 3;
const TRAINER_SKILL_NAMES: u8 = 4;
const TRAINER_REALM_ABILITIES: u8 = 5;
/// Highest level the trainer window shows
const MAX_TRAINER_LEVEL: u8 = 50;
/// One spec point byte per level from 2 to 50; `0xFF` disables the minimum level column
const LEVEL_POINTS: usize = 49;

const PAGE_SPELLS: u8 = 0x03;
const PAGE_SONGS: u8 = 0x04;

fn update_icons(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::UpdateIcons(icons) = msg else {
        return Err(mismatch(Op::UpdateIcons));
    };
    push_icons(out, icons, ICONS_1110)
}

fn delve_info(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::DelveInfo { info } = msg else {
        return Err(mismatch(Op::DelveInfo));
    };
    let room = text_room(1);
    let text = truncated(info, room);
    if text.len() < info.len() {
        warn!(len = info.chars().count(), max = room, "Delve text clipped");
    }
    let mut w = PacketWriter::new();
    w.write_string_max(text, room);
    w.write_u8(0);
    out.tcp(ServerPacket::DetailWindow, w);
    Ok(())
}

fn trainer_header(count: usize, points: u8, kind: u8) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u8(count.min(u8::MAX as usize) as u8);
    w.write_u8(points);
    w.write_u8(kind);
    w.write_u8(0);
    w
}

/// Specs, offered realm abilities, one name packet per spec, the skill
/// summary, then every realm ability of the class.
fn trainer_window(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::TrainerWindow(trainer) = msg else {
        return Err(mismatch(Op::TrainerWindow));
    };
    let specs = &trainer.specs[..trainer.specs.len().min(u8::MAX as usize)];

    let mut w = trainer_header(specs.len(), trainer.spec_points, TRAINER_SPECS);
    for (i, spec) in specs.iter().enumerate() {
        let level = spec.level.min(MAX_TRAINER_LEVEL);
        w.write_u8(i as u8);
        w.write_u8(level);
        w.write_u8(level + 1);
        w.write_pascal(&spec.name);
    }
    out.tcp_checked(ServerPacket::TrainerWindow, w)?;

    push_offered_abilities(out, trainer)?;
    push_trainer_skills(out, trainer)?;
    push_realm_abilities(out, trainer)
}

fn push_trainer_skills(out: &mut Outbox<'_>, trainer: &TrainerWindow) -> Result<()> {
    let specs = &trainer.specs[..trainer.specs.len().min(u8::MAX as usize)];

    let mut summary = trainer_header(specs.len(), trainer.spec_points, TRAINER_SUMMARY);
    summary.write_u8(0);
    summary.fill(0xFF, LEVEL_POINTS);

    let mut first = 0u8;
    for (index, spec) in specs.iter().enumerate() {
        let count = spec.skills.len().min(u8::MAX as usize);
        let mut names = trainer_header(count, trainer.spec_points, TRAINER_SKILL_NAMES);
        names.write_u8(first);
        first = first.wrapping_add(count as u8);

        summary.write_u8(index as u8);
        summary.write_u8(count as u8);
        summary.write_u8(spec.autotrain_level);
        match &spec.skills {
            TrainerSkills::Nothing => {}
            TrainerSkills::Spells(spells) => {
                for spell in spells.iter().take(count) {
                    names.write_pascal(&spell.name);
                    summary.write_u8(spell.level.min(MAX_TRAINER_LEVEL));
                    summary.write_u16(spell.icon);
                    summary.write_u8(if spell.song { PAGE_SONGS } else { PAGE_SPELLS });
                    summary.write_u8(0);
                    summary.write_u8(if spell.skill_type == 3 { 0xFE } else { 0xFF });
                    summary.write_u16(spell.tooltip);
                }
            }
            TrainerSkills::Styles(styles) => {
                for style in styles.iter().take(count) {
                    names.write_pascal(&style.name);
                    summary.write_u8(style.level.min(MAX_TRAINER_LEVEL));
                    summary.write_u16(style.icon);
                    summary.write_u8(style.skill_type);
                    summary.write_u8(style.opening_type);
                    summary.write_u8(style.opening_value);
                    summary.write_u16(style.id);
                }
            }
        }
        out.tcp_checked(ServerPacket::TrainerWindow, names)?;
    }
    out.tcp_checked(ServerPacket::TrainerWindow, summary)
}

/// Owned rank, every rank's cost, and the key, or the bracketed name when
/// requirements are not met
fn push_realm_abilities(out: &mut Outbox<'_>, trainer: &TrainerWindow) -> Result<()> {
    let abilities =
        &trainer.realm_abilities[..trainer.realm_abilities.len().min(u8::MAX as usize)];
    let mut w = trainer_header(
        abilities.len(),
        trainer.realm_points,
        TRAINER_REALM_ABILITIES,
    );
    for ability in abilities {
        let costs = &ability.costs[..ability.costs.len().min(u8::MAX as usize)];
        w.write_u8(ability.owned_level);
        w.write_u8(0);
        w.write_u8(costs.len() as u8);
        w.write_bytes(costs);
        if ability.usable {
            w.write_pascal(&ability.key);
        } else {
            w.write_pascal(&ability_label(&ability.name, false));
        }
    }
    out.tcp_checked(ServerPacket::TrainerWindow, w)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::MAX_PAYLOAD_SIZE;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::{RealmAbilityRank, TrainerSpec, TrainerSpell};

    #[test]
    fn test_delve_text_is_terminated() {
        let msg = Msg::DelveInfo {
            info: "(Spell Hndl:0 ...)".into(),
        };
        assert!(encode_at(ProtocolVersion::new(1109), &msg).is_empty());
        let packets = encode_at(ProtocolVersion::V1110, &msg);
        assert_eq!(packets[0].opcode, 0xC4);
        assert!(packets[0].payload.ends_with(b"...)\x00"));
    }

    #[test]
    fn test_long_delve_text_clipped() {
        let msg = Msg::DelveInfo {
            info: "x".repeat(4000),
        };
        let packets = encode_at(ProtocolVersion::V1110, &msg);
        assert_eq!(packets[0].payload.len(), MAX_PAYLOAD_SIZE);
    }

    fn trainer() -> TrainerWindow {
        TrainerWindow {
            spec_points: 7,
            realm_points: 2,
            specs: vec![
                TrainerSpec {
                    level: 60,
                    name: "Fire".into(),
                    autotrain_level: 3,
                    skills: TrainerSkills::Spells(vec![
                        TrainerSpell {
                            name: "Bolt".into(),
                            level: 5,
                            icon: 0x0102,
                            skill_type: 3,
                            tooltip: 9,
                            ..Default::default()
                        },
                        TrainerSpell {
                            name: "Song".into(),
                            level: 8,
                            song: true,
                            ..Default::default()
                        },
                    ]),
                },
                TrainerSpec {
                    level: 1,
                    name: "Parry".into(),
                    ..Default::default()
                },
            ],
            realm_abilities: vec![RealmAbilityRank {
                owned_level: 1,
                costs: vec![1, 3, 6],
                key: "AoM".into(),
                name: "Avoidance".into(),
                usable: false,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_trainer_packet_order() {
        let packets = encode_at(ProtocolVersion::V1110, &Msg::TrainerWindow(trainer()));
        let kinds: Vec<u8> = packets.iter().map(|p| p.payload[2]).collect();
        assert_eq!(
            kinds,
            vec![
                TRAINER_SPECS,
                TRAINER_SKILL_NAMES,
                TRAINER_SKILL_NAMES,
                TRAINER_SUMMARY,
                TRAINER_REALM_ABILITIES
            ]
        );
        // spec level capped at 50
        assert_eq!(&packets[0].payload[4..7], &[0, 50, 51]);
        assert_eq!(packets[1].payload, b"\x02\x07\x04\x00\x00\x04Bolt\x04Song".to_vec());
        assert_eq!(packets[2].payload, vec![0, 7, 4, 0, 2]);
    }

    #[test]
    fn test_trainer_summary_entries() {
        let packets = encode_at(ProtocolVersion::V1110, &Msg::TrainerWindow(trainer()));
        let summary = &packets[3].payload;
        assert_eq!(&summary[..5], &[2, 7, TRAINER_SUMMARY, 0, 0]);
        let body = &summary[5 + LEVEL_POINTS..];
        assert_eq!(
            body,
            &[
                0, 2, 3, //
                5, 1, 2, PAGE_SPELLS, 0, 0xFE, 0, 9, //
                8, 0, 0, PAGE_SONGS, 0, 0xFF, 0, 0, //
                1, 0, 0,
            ]
        );
    }

    #[test]
    fn test_realm_abilities_list_costs() {
        let packets = encode_at(ProtocolVersion::V1110, &Msg::TrainerWindow(trainer()));
        assert_eq!(
            packets[4].payload,
            b"\x01\x02\x05\x00\x01\x00\x03\x01\x03\x06\x0b[Avoidance]".to_vec()
        );
    }
}
