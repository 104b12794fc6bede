//! Text, trainer, pet and journal windows.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::codec::split::{pack_list, ListLayout};
use crate::protocol::codec::{mismatch, EncodeContext, Outbox};
use crate::protocol::message::{
    ConcentrationEntry, OperationId as Op, OutboundMessage as Msg, PetAggression, PetWalk,
    PetWindowAction, QuestText, TrainerWindow,
};
use crate::protocol::opcodes::ServerPacket;

use super::world::truncated;

use tracing::warn;

/// Caption of the statistics window
pub(crate) const STATISTICS_CAPTION: &str = "Player Statistics";
const MAX_PET_ICONS: usize = 8;
const MASTER_LEVEL_STEPS: usize = 10;
const HELP_RENT_REMINDER: u16 = 106;
const HELP_STARTER: u16 = 1;

/// `[caption]` then numbered lines, closed by a zero
pub(crate) fn write_text_window(w: &mut PacketWriter, caption: &str, lines: &[String]) {
    w.write_pascal(caption);
    for (i, line) in lines.iter().enumerate() {
        w.write_u8((i + 1) as u8);
        w.write_pascal(line);
    }
    w.write_u8(0);
}

pub(crate) fn custom_text_window(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::CustomTextWindow { caption, lines } = msg else {
        return Err(mismatch(Op::CustomTextWindow));
    };
    let mut w = PacketWriter::new();
    write_text_window(&mut w, caption, lines);
    out.tcp_checked(ServerPacket::DetailWindow, w)
}

pub(crate) fn player_titles(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PlayerTitles { stats, titles } = msg else {
        return Err(mismatch(Op::PlayerTitles));
    };
    let mut lines = stats.clone();
    lines.push(" ".into());
    lines.push("Titles:".into());
    lines.extend(titles.iter().map(|t| format!("- {t}")));

    let mut w = PacketWriter::new();
    write_text_window(&mut w, STATISTICS_CAPTION, &lines);
    out.tcp_checked(ServerPacket::DetailWindow, w)
}

/// Titles over heads appear with 1.75
pub(crate) fn player_title_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    _: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::PlayerTitleUpdate { .. } = msg else {
        return Err(mismatch(Op::PlayerTitleUpdate));
    };
    Ok(())
}

fn write_names(names: &[String]) -> PacketWriter {
    let mut w = PacketWriter::new();
    for name in names {
        w.write_pascal(name);
    }
    w.write_u8(0);
    w
}

pub(crate) fn add_friends(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::AddFriends(names) = msg else {
        return Err(mismatch(Op::AddFriends));
    };
    out.tcp_checked(ServerPacket::AddFriend, write_names(names))
}

pub(crate) fn remove_friends(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::RemoveFriends(names) = msg else {
        return Err(mismatch(Op::RemoveFriends));
    };
    out.tcp_checked(ServerPacket::RemoveFriend, write_names(names))
}

pub(crate) fn timer_window(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::TimerWindow { title, seconds } = msg else {
        return Err(mismatch(Op::TimerWindow));
    };
    let title = truncated(title, u8::MAX as usize);
    let mut w = PacketWriter::new();
    w.write_u16(*seconds);
    w.write_u8(title.chars().count() as u8);
    w.write_u8(1);
    w.write_cstring(title);
    out.tcp(ServerPacket::TimerWindow, w);
    Ok(())
}

pub(crate) fn close_timer_window(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::CloseTimerWindow = msg else {
        return Err(mismatch(Op::CloseTimerWindow));
    };
    let mut w = PacketWriter::new();
    w.fill(0x00, 4);
    out.tcp(ServerPacket::TimerWindow, w);
    Ok(())
}

pub(crate) fn champion_trainer_window(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::ChampionTrainerWindow(trainer) = msg else {
        return Err(mismatch(Op::ChampionTrainerWindow));
    };
    let mut w = PacketWriter::new();
    w.write_u8(trainer.line);
    w.write_u8(trainer.points);
    w.write_u8(2);
    w.write_u8(0);
    w.write_u8(trainer.columns.len() as u8);

    for (column, specs) in trainer.columns.iter().enumerate() {
        w.write_u8((column + 1) as u8);
        w.write_u8(specs.len().min(u8::MAX as usize) as u8);
        for spec in specs.iter().take(u8::MAX as usize) {
            w.write_u8(spec.index);
            w.write_u8(if spec.is_style { 1 } else { 3 });
            w.write_u16_le(spec.icon);
            w.write_pascal(&spec.name);
            w.write_u8(if spec.owned {
                1
            } else if spec.available {
                2
            } else {
                0
            });
            w.write_u8(0);
        }
    }
    out.tcp_checked(ServerPacket::TrainerWindow, w)
}

/// Name shown for a realm ability; bracketed when it cannot be bought yet
pub(crate) fn ability_label(name: &str, usable: bool) -> String {
    if usable {
        name.to_owned()
    } else {
        format!("[{name}]")
    }
}

pub(crate) fn trainer_window(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::TrainerWindow(trainer) = msg else {
        return Err(mismatch(Op::TrainerWindow));
    };

    let mut w = PacketWriter::new();
    w.write_u8(trainer.specs.len().min(u8::MAX as usize) as u8);
    w.write_u8(trainer.spec_points);
    w.write_u8(0);
    w.write_u8(0);
    for (i, spec) in trainer.specs.iter().take(u8::MAX as usize).enumerate() {
        w.write_u8(i as u8);
        w.write_u8(spec.level);
        w.write_u8(spec.level.saturating_add(1));
        w.write_pascal(&spec.name);
    }
    out.tcp_checked(ServerPacket::TrainerWindow, w)?;
    push_offered_abilities(out, trainer)
}

/// Realm ability ranks for sale, sent only when there is something to buy
pub(crate) fn push_offered_abilities(out: &mut Outbox<'_>, trainer: &TrainerWindow) -> Result<()> {
    if trainer.offered_abilities.is_empty() {
        return Ok(());
    }
    let mut w = PacketWriter::new();
    w.write_u8(trainer.offered_abilities.len().min(u8::MAX as usize) as u8);
    w.write_u8(trainer.realm_points);
    w.write_u8(1);
    w.write_u8(0);
    for (i, ability) in trainer.offered_abilities.iter().take(u8::MAX as usize).enumerate() {
        w.write_u8(i as u8);
        w.write_u8(ability.level);
        w.write_u8(ability.cost);
        w.write_pascal(&ability_label(&ability.name, ability.usable));
    }
    out.tcp_checked(ServerPacket::TrainerWindow, w)
}

fn write_concentration(w: &mut PacketWriter, (index, entry): (usize, &ConcentrationEntry)) {
    w.write_u8(index as u8);
    w.write_u8(0);
    w.write_u8(entry.concentration);
    w.write_u16(entry.icon);
    w.write_pascal(&entry.name);
    w.write_pascal(&entry.owner);
}

pub(crate) fn concentration_list(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::ConcentrationList(entries) = msg else {
        return Err(mismatch(Op::ConcentrationList));
    };
    let layout = ListLayout::counted(&[0, 0, 0, 0], 0);
    for payload in pack_list(&layout, entries.iter().enumerate(), write_concentration)? {
        out.tcp_bytes(ServerPacket::ConcentrationList, payload);
    }
    Ok(())
}

pub(crate) fn pet_window(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::PetWindow(window) = msg else {
        return Err(mismatch(Op::PetWindow));
    };
    let mut w = PacketWriter::new();
    w.write_u16(window.pet.as_ref().map_or(0, |(id, _)| *id));
    w.write_u8(0);
    w.write_u8(0);
    w.write_u8(match window.action {
        PetWindowAction::Open => 2,
        PetWindowAction::Update => 1,
        PetWindowAction::Close => 0,
    });
    w.write_u8(match window.aggression {
        PetAggression::Aggressive => 1,
        PetAggression::Defensive => 2,
        PetAggression::Passive => 3,
    });
    w.write_u8(match window.walk {
        PetWalk::Follow => 1,
        PetWalk::Stay => 2,
        PetWalk::GoTarget => 3,
        PetWalk::Here => 4,
    });
    w.write_u8(0);

    if let Some((_, icons)) = &window.pet {
        let shown = &icons[..icons.len().min(MAX_PET_ICONS)];
        w.write_u8(shown.len() as u8);
        for icon in shown {
            w.write_u16(*icon);
        }
    }
    w.write_u8(0);
    out.tcp(ServerPacket::PetWindow, w);
    Ok(())
}

pub(crate) fn master_level_window(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::MasterLevelWindow(window) = msg else {
        return Err(mismatch(Op::MasterLevelWindow));
    };
    let mut w = PacketWriter::new();
    w.write_u8(window.xp_percent);
    w.write_u8(0x64);
    w.write_u8(window.master_level.wrapping_add(1));
    w.write_u8(0);
    w.write_u8(window.shown_level);
    if window.shown_level < MASTER_LEVEL_STEPS as u8 {
        for i in 0..MASTER_LEVEL_STEPS {
            w.write_pascal(window.steps.get(i).map_or("", String::as_str));
        }
    } else {
        w.write_u8(0);
    }
    w.write_u8(0);
    out.tcp_checked(ServerPacket::MasterLevelWindow, w)
}

pub(crate) fn emblem_dialogue(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::EmblemDialogue = msg else {
        return Err(mismatch(Op::EmblemDialogue));
    };
    let mut w = PacketWriter::new();
    w.fill(0x00, 4);
    out.tcp(ServerPacket::EmblemDialogue, w);
    Ok(())
}

/// How one journal entry is laid out after its index byte
pub(crate) type QuestWriter = fn(&mut PacketWriter, &QuestText);

/// `[index]` then the entry, or three zeros for a quest without a step yet
pub(crate) fn write_quest(index: u8, quest: Option<&QuestText>, write: QuestWriter) -> PacketWriter {
    let mut w = PacketWriter::new();
    w.write_u8(index);
    match quest {
        Some(quest) => write(&mut w, quest),
        None => w.fill(0x00, 3),
    }
    w
}

/// Clip `text` to `max` characters, warning when that drops anything
pub(crate) fn clip_quest_text<'a>(field: &'static str, text: &'a str, max: usize) -> &'a str {
    let clipped = truncated(text, max);
    if clipped.len() < text.len() {
        warn!(field, len = text.chars().count(), max, "Quest text clipped");
    }
    clipped
}

fn write_quest_168(w: &mut PacketWriter, quest: &QuestText) {
    let name = clip_quest_text("name", &quest.name, u8::MAX as usize);
    let desc = clip_quest_text("description", &quest.description, u8::MAX as usize);
    w.write_u8(name.chars().count() as u8);
    w.write_u8(desc.chars().count() as u8);
    w.write_u8(0);
    w.write_string_max(name, u8::MAX as usize);
    w.write_string_max(desc, u8::MAX as usize);
}

pub(crate) fn quest_update(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::QuestUpdate { position, quest } = msg else {
        return Err(mismatch(Op::QuestUpdate));
    };
    out.tcp(
        ServerPacket::QuestEntry,
        write_quest(*position, quest.as_ref(), write_quest_168),
    );
    Ok(())
}

/// One entry per quest, indexed from `first`
pub(crate) fn push_quest_list(
    out: &mut Outbox<'_>,
    quests: &[Option<QuestText>],
    first: u8,
    write: QuestWriter,
) -> Result<()> {
    for (i, quest) in quests.iter().enumerate() {
        let index = first.wrapping_add(i as u8);
        out.tcp_checked(ServerPacket::QuestEntry, write_quest(index, quest.as_ref(), write))?;
    }
    Ok(())
}

pub(crate) fn quest_list_update(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::QuestListUpdate { quests, .. } = msg else {
        return Err(mismatch(Op::QuestListUpdate));
    };
    push_quest_list(out, quests, 0, write_quest_168)
}

fn help_window(out: &mut Outbox<'_>, topic: u16, lot: u16) {
    let mut w = PacketWriter::new();
    w.write_u16(topic);
    w.write_u16(lot);
    out.tcp(ServerPacket::HelpWindow, w);
}

pub(crate) fn starter_help(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::StarterHelp = msg else {
        return Err(mismatch(Op::StarterHelp));
    };
    help_window(out, HELP_STARTER, 0);
    Ok(())
}

pub(crate) fn rent_reminder(_: &EncodeContext<'_>, msg: &Msg, out: &mut Outbox<'_>) -> Result<()> {
    let Msg::RentReminder { house } = msg else {
        return Err(mismatch(Op::RentReminder));
    };
    help_window(out, HELP_RENT_REMINDER, *house);
    Ok(())
}

/// Longest text a single quest or delve payload can carry after `header` bytes
#[inline]
pub(crate) const fn text_room(header: usize) -> usize {
    MAX_PAYLOAD_SIZE - header
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::PetWindow;
    use crate::protocol::version::ProtocolVersion;

    #[test]
    fn test_custom_text_window_numbers_lines() {
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::CustomTextWindow {
                caption: "Hi".into(),
                lines: vec!["a".into(), "bc".into()],
            },
        );
        assert_eq!(
            packets[0].payload,
            vec![2, b'H', b'i', 1, 1, b'a', 2, 2, b'b', b'c', 0]
        );
    }

    #[test]
    fn test_titles_fold_into_statistics() {
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::PlayerTitles {
                stats: vec!["Kills: 3".into()],
                titles: vec!["Hero".into()],
            },
        );
        let p = &packets[0].payload;
        assert!(p.starts_with(b"\x11Player Statistics\x01\x08Kills: 3"));
        assert!(p.ends_with(b"\x04\x06- Hero\x00"));
    }

    #[test]
    fn test_pet_icons_capped() {
        let window = PetWindow {
            pet: Some((7, (1..=12).collect())),
            action: PetWindowAction::Open,
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V168, &Msg::PetWindow(window));
        let p = &packets[0].payload;
        assert_eq!(&p[..9], &[0, 7, 0, 0, 2, 2, 1, 0, 8]);
        assert_eq!(p.len(), 9 + 16 + 1);
    }

    #[test]
    fn test_concentration_index_runs_across_packets() {
        let entries: Vec<_> = (0..30)
            .map(|_| ConcentrationEntry {
                concentration: 5,
                icon: 1,
                name: "n".repeat(100),
                owner: "o".into(),
            })
            .collect();
        let packets = encode_at(ProtocolVersion::V168, &Msg::ConcentrationList(entries));
        assert_eq!(packets.len(), 2);
        let held = packets[0].payload[0] as usize;
        // second packet starts with the next running index
        assert_eq!(packets[1].payload[4] as usize, held);
        assert_eq!(held + packets[1].payload[0] as usize, 30);
    }

    #[test]
    fn test_quest_entry_168_clips_to_a_byte() {
        let quest = QuestText {
            name: "Q".into(),
            description: "d".repeat(300),
        };
        let packets = encode_at(
            ProtocolVersion::V168,
            &Msg::QuestUpdate {
                position: 2,
                quest: Some(quest),
            },
        );
        let p = &packets[0].payload;
        assert_eq!(&p[..4], &[2, 1, 255, 0]);
        assert_eq!(p.len(), 4 + 1 + 255);

        let empty = encode_at(
            ProtocolVersion::V168,
            &Msg::QuestUpdate {
                position: 0,
                quest: None,
            },
        );
        assert_eq!(empty[0].payload, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_help_topics() {
        let packets = encode_at(ProtocolVersion::V168, &Msg::RentReminder { house: 4281 });
        assert_eq!(packets[0].payload, vec![0, 106, 0x10, 0xB9]);
    }
}
