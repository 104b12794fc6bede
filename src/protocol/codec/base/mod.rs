//! The 1.68 layouts. Every operation is defined here; later revisions only
//! override what changed.

mod character;
mod effects;
mod group;
mod housing;
mod realm_war;
mod session;
mod trade;
mod windows;
mod world;

pub(crate) use character::*;
pub(crate) use effects::*;
pub(crate) use group::*;
pub(crate) use housing::*;
pub(crate) use realm_war::*;
pub(crate) use session::*;
pub(crate) use trade::*;
pub(crate) use windows::*;
pub(crate) use world::*;

use super::CodecRevision;
use crate::protocol::message::OperationId as Op;
use crate::protocol::version::ProtocolVersion;

pub(super) const REVISION: CodecRevision = CodecRevision {
    version: ProtocolVersion::V168,
    parent: None,
    encoders: &[
        (Op::VersionAndCryptKey, version_and_crypt_key),
        (Op::LoginDenied, login_denied),
        (Op::LoginGranted, login_granted),
        (Op::SessionId, session_id),
        (Op::PingReply, ping_reply),
        (Op::Realm, realm),
        (Op::CharacterOverview, character_overview),
        (Op::DupNameCheckReply, dup_name_check_reply),
        (Op::BadNameCheckReply, bad_name_check_reply),
        (Op::CharacterCreateReply, character_create_reply),
        (Op::GameOpenReply, game_open_reply),
        (Op::UdpInitReply, udp_init_reply),
        (Op::AttackMode, attack_mode),
        (Op::CharStatsUpdate, char_stats_update),
        (Op::Regions, regions),
        (Op::PlayerPositionAndObjectId, player_position_and_object_id),
        (Op::PlayerJump, player_jump),
        (Op::PlayerInitFinished, player_init_finished),
        (Op::Time, time),
        (Op::Message, message),
        (Op::PlayerCreate, player_create),
        (Op::ObjectGuildId, object_guild_id),
        (Op::ObjectUpdate, object_update),
        (Op::PlayerQuit, player_quit),
        (Op::ObjectRemove, object_remove),
        (Op::ObjectCreate, object_create),
        (Op::NpcCreate, npc_create),
        (Op::LivingEquipmentUpdate, living_equipment_update),
        (Op::DebugMode, debug_mode),
        (Op::ModelChange, model_change),
        (Op::EmoteAnimation, emote_animation),
        (Op::RegionChanged, region_changed),
        (Op::UpdatePoints, update_points),
        (Op::UpdateMoney, update_money),
        (Op::UpdateMaxSpeed, update_max_speed),
        (Op::CombatAnimation, combat_animation),
        (Op::StatusUpdate, status_update),
        (Op::SpellCastAnimation, spell_cast_animation),
        (Op::SpellEffectAnimation, spell_effect_animation),
        (Op::Riding, riding),
        (Op::FindGroupWindowUpdate, find_group_window_update),
        (Op::GroupInvite, group_invite),
        (Op::GuildInvite, guild_invite),
        (Op::GuildLeave, guild_leave),
        (Op::QuestSubscribe, quest_subscribe),
        (Op::QuestAbort, quest_abort),
        (Op::DialogBox, dialog_box),
        (Op::CustomDialog, custom_dialog),
        (Op::CheckLos, check_los),
        (Op::GroupWindowUpdate, group_window_update),
        (Op::GroupMemberUpdate, group_member_update),
        (Op::UpdateIcons, update_icons),
        (Op::HybridSkills, hybrid_skills),
        (Op::InventorySlotsUpdate, inventory_slots_update),
        (Op::MerchantWindow, merchant_window),
        (Op::TradeWindow, trade_window),
        (Op::CloseTradeWindow, close_trade_window),
        (Op::MarketExplorerWindow, market_explorer_window),
        (Op::ConsignmentMerchantMoney, consignment_merchant_money),
        (Op::UpdatePlayer, update_player),
        (Op::SpellList, spell_list),
        (Op::CraftingSkills, crafting_skills),
        (Op::WeaponArmorStats, weapon_armor_stats),
        (Op::Encumberance, encumberance),
        (Op::DisableSkill, disable_skill),
        (Op::PlayerDied, player_died),
        (Op::PlayerRevive, player_revive),
        (Op::ChangeTarget, change_target),
        (Op::ChangeGroundTarget, change_ground_target),
        (Op::InterruptAnimation, interrupt_animation),
        (Op::PlayerModelTypeChange, player_model_type_change),
        (Op::DelveInfo, delve_info),
        (Op::CharResistsUpdate, char_resists_update),
        (Op::PlayerForgedPosition, player_forged_position),
        (Op::CustomTextWindow, custom_text_window),
        (Op::PlayerTitles, player_titles),
        (Op::PlayerTitleUpdate, player_title_update),
        (Op::AddFriends, add_friends),
        (Op::RemoveFriends, remove_friends),
        (Op::TimerWindow, timer_window),
        (Op::CloseTimerWindow, close_timer_window),
        (Op::ChampionTrainerWindow, champion_trainer_window),
        (Op::TrainerWindow, trainer_window),
        (Op::ConcentrationList, concentration_list),
        (Op::PetWindow, pet_window),
        (Op::MasterLevelWindow, master_level_window),
        (Op::EmblemDialogue, emblem_dialogue),
        (Op::QuestUpdate, quest_update),
        (Op::QuestListUpdate, quest_list_update),
        (Op::StarterHelp, starter_help),
        (Op::RentReminder, rent_reminder),
        (Op::House, house),
        (Op::RemoveHouse, remove_house),
        (Op::Garden, garden),
        (Op::RemoveGarden, remove_garden),
        (Op::EnterHouse, enter_house),
        (Op::Furniture, furniture),
        (Op::FurnitureItem, furniture_item),
        (Op::HousePermissions, house_permissions),
        (Op::HousePayRentDialog, house_pay_rent_dialog),
        (Op::ToggleHousePoints, toggle_house_points),
        (Op::KeepInfo, keep_info),
        (Op::KeepRealmUpdate, keep_realm_update),
        (Op::KeepRemove, keep_remove),
        (Op::KeepComponentInfo, keep_component_info),
        (Op::KeepComponentDetailUpdate, keep_component_detail_update),
        (Op::KeepClaim, keep_claim),
        (Op::KeepComponentUpdate, keep_component_update),
        (Op::KeepComponentInteract, keep_component_interact),
        (Op::KeepComponentHookPoint, keep_component_hook_point),
        (Op::ClearKeepComponentHookPoint, clear_keep_component_hook_point),
        (Op::HookPointStore, hook_point_store),
        (Op::WarmapUpdate, warmap_update),
        (Op::WarmapDetailUpdate, warmap_detail_update),
        (Op::WarmapBonuses, warmap_bonuses),
        (Op::MovingObjectCreate, moving_object_create),
        (Op::SiegeWeaponInterface, siege_weapon_interface),
        (Op::SiegeWeaponCloseInterface, siege_weapon_close_interface),
        (Op::SiegeWeaponAnimation, siege_weapon_animation),
        (Op::SiegeWeaponFireAnimation, siege_weapon_fire_animation),
        (Op::SetControlledHorse, set_controlled_horse),
        (Op::ControlledHorse, controlled_horse),
        (Op::RvRGuildBanner, rvr_guild_banner),
        (Op::DoorState, door_state),
        (Op::Weather, weather),
        (Op::LevelUpSound, level_up_sound),
        (Op::RegionEnterSound, region_enter_sound),
        (Op::PlaySound, play_sound),
        (Op::SoundEffect, sound_effect),
        (Op::ObjectDelete, object_delete),
        (Op::HexEffect, hex_effect),
        (Op::NpcsQuestEffect, npcs_quest_effect),
        (Op::VampireEffect, vampire_effect),
        (Op::Crash, crash),
    ],
    opcodes: &[],
};
