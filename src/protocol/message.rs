//! # Outbound Messages
//!
//! Logical, version-independent descriptions of everything the server can
//! tell a client. The game layer builds an [`OutboundMessage`]; the codec
//! resolved for the session's version turns it into one or more packets.
//!
//! Every variant maps to exactly one [`OperationId`], which is the index into
//! the flat per-version encoder table.

macro_rules! operations {
    ($($name:ident),+ $(,)?) => {
        /// Dense identifier of a logical outbound message kind
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum OperationId {
            $($name),+
        }

        impl OperationId {
            pub const ALL: &'static [OperationId] = &[$(OperationId::$name),+];
            pub const COUNT: usize = Self::ALL.len();

            #[inline]
            pub const fn index(self) -> usize {
                self as usize
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(OperationId::$name => stringify!($name)),+
                }
            }
        }

        impl OutboundMessage {
            /// Operation this message encodes through
            pub fn operation(&self) -> OperationId {
                match self {
                    $(OutboundMessage::$name { .. } => OperationId::$name),+
                }
            }
        }
    };
}

operations! {
    VersionAndCryptKey,
    LoginDenied,
    LoginGranted,
    SessionId,
    PingReply,
    Realm,
    CharacterOverview,
    DupNameCheckReply,
    BadNameCheckReply,
    CharacterCreateReply,
    GameOpenReply,
    UdpInitReply,
    AttackMode,
    CharStatsUpdate,
    Regions,
    PlayerPositionAndObjectId,
    PlayerJump,
    PlayerInitFinished,
    Time,
    Message,
    PlayerCreate,
    ObjectGuildId,
    ObjectUpdate,
    PlayerQuit,
    ObjectRemove,
    ObjectCreate,
    NpcCreate,
    LivingEquipmentUpdate,
    DebugMode,
    ModelChange,
    EmoteAnimation,
    RegionChanged,
    UpdatePoints,
    UpdateMoney,
    UpdateMaxSpeed,
    CombatAnimation,
    StatusUpdate,
    SpellCastAnimation,
    SpellEffectAnimation,
    Riding,
    FindGroupWindowUpdate,
    GroupInvite,
    GuildInvite,
    GuildLeave,
    QuestSubscribe,
    QuestAbort,
    DialogBox,
    CustomDialog,
    CheckLos,
    GroupWindowUpdate,
    GroupMemberUpdate,
    UpdateIcons,
    HybridSkills,
    InventorySlotsUpdate,
    MerchantWindow,
    TradeWindow,
    CloseTradeWindow,
    MarketExplorerWindow,
    ConsignmentMerchantMoney,
    UpdatePlayer,
    SpellList,
    CraftingSkills,
    WeaponArmorStats,
    Encumberance,
    DisableSkill,
    PlayerDied,
    PlayerRevive,
    ChangeTarget,
    ChangeGroundTarget,
    InterruptAnimation,
    PlayerModelTypeChange,
    DelveInfo,
    CharResistsUpdate,
    PlayerForgedPosition,
    CustomTextWindow,
    PlayerTitles,
    PlayerTitleUpdate,
    AddFriends,
    RemoveFriends,
    TimerWindow,
    CloseTimerWindow,
    ChampionTrainerWindow,
    TrainerWindow,
    ConcentrationList,
    PetWindow,
    MasterLevelWindow,
    EmblemDialogue,
    QuestUpdate,
    QuestListUpdate,
    StarterHelp,
    RentReminder,
    House,
    RemoveHouse,
    Garden,
    RemoveGarden,
    EnterHouse,
    Furniture,
    FurnitureItem,
    HousePermissions,
    HousePayRentDialog,
    ToggleHousePoints,
    KeepInfo,
    KeepRealmUpdate,
    KeepRemove,
    KeepComponentInfo,
    KeepComponentDetailUpdate,
    KeepClaim,
    KeepComponentUpdate,
    KeepComponentInteract,
    KeepComponentHookPoint,
    ClearKeepComponentHookPoint,
    HookPointStore,
    WarmapUpdate,
    WarmapDetailUpdate,
    WarmapBonuses,
    MovingObjectCreate,
    SiegeWeaponInterface,
    SiegeWeaponCloseInterface,
    SiegeWeaponAnimation,
    SiegeWeaponFireAnimation,
    SetControlledHorse,
    ControlledHorse,
    RvRGuildBanner,
    DoorState,
    Weather,
    LevelUpSound,
    RegionEnterSound,
    PlaySound,
    SoundEffect,
    ObjectDelete,
    HexEffect,
    NpcsQuestEffect,
    VampireEffect,
    Crash,
}

/// A logical outbound message
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    VersionAndCryptKey,
    LoginDenied { reason: u8 },
    LoginGranted { color: u8 },
    SessionId,
    PingReply { timestamp: u32, sequence: u16 },
    Realm { realm: u8 },
    CharacterOverview(CharacterOverview),
    DupNameCheckReply { name: String, exists: bool },
    BadNameCheckReply { name: String, bad: bool },
    CharacterCreateReply { name: String },
    GameOpenReply,
    UdpInitReply(UdpInitReply),
    AttackMode { attacking: bool },
    CharStatsUpdate(CharStats),
    Regions(Vec<RegionEntry>),
    PlayerPositionAndObjectId(PlayerPosition),
    PlayerJump(PlayerJump),
    PlayerInitFinished { mobs: u8 },
    Time { daytime: u32, increment: u32 },
    Message(ChatMessage),
    PlayerCreate(Box<PlayerCreate>),
    ObjectGuildId { object_id: u16, guild_id: Option<u16> },
    ObjectUpdate(ObjectUpdate),
    PlayerQuit { total_out: bool, level: u8 },
    ObjectRemove { object_id: u16, object_type: ObjectKind },
    ObjectCreate(ObjectCreate),
    NpcCreate(NpcCreate),
    LivingEquipmentUpdate(EquipmentUpdate),
    DebugMode { enabled: bool },
    ModelChange { object_id: u16, model: u16 },
    EmoteAnimation { object_id: u16, emote: u8 },
    RegionChanged { region: u16, zone_skin: u16 },
    UpdatePoints(Points),
    UpdateMoney(Money),
    UpdateMaxSpeed { percent: u16, turning_disabled: bool, water_speed: u8 },
    CombatAnimation(CombatAnimation),
    StatusUpdate(StatusUpdate),
    SpellCastAnimation { caster: u16, spell: u16, cast_time: u16 },
    SpellEffectAnimation(SpellEffect),
    Riding { rider: u16, steed: u16, dismount: bool, slot: u8 },
    FindGroupWindowUpdate(Option<Vec<GroupSeeker>>),
    GroupInvite { inviter_session: u16, text: String },
    GuildInvite { inviter: u16, text: String },
    GuildLeave { leaver: u16, text: String },
    QuestSubscribe { quest_id: u16, npc: u16, text: String },
    QuestAbort { quest_id: u16, npc: u16, text: String },
    DialogBox(DialogBox),
    CustomDialog { text: String, yes_no: bool },
    CheckLos { checker: u16, target: Option<u16> },
    GroupWindowUpdate(Option<Vec<GroupWindowMember>>),
    GroupMemberUpdate(Vec<GroupMemberStatus>),
    UpdateIcons(IconsUpdate),
    HybridSkills(Vec<SkillEntry>),
    InventorySlotsUpdate(InventorySlots),
    MerchantWindow(MerchantWindow),
    TradeWindow(TradeWindow),
    CloseTradeWindow,
    /// `None` sends the empty search result
    MarketExplorerWindow(Option<MarketPage>),
    ConsignmentMerchantMoney(Money),
    UpdatePlayer(PlayerSheet),
    SpellList(Vec<SpellLine>),
    CraftingSkills(Vec<CraftSkill>),
    WeaponArmorStats { damage_x100: u16, skill: u16, effective_af: u16 },
    Encumberance { max: u16, used: u16 },
    DisableSkill { skill: DisabledSkill, duration: u16 },
    PlayerDied { killed: u16, killer: Option<u16> },
    PlayerRevive { object_id: u16 },
    ChangeTarget { target: Option<u16> },
    ChangeGroundTarget { target: Option<(u32, u32, u32)> },
    InterruptAnimation { object_id: u16 },
    PlayerModelTypeChange { object_id: u16, model_type: u8 },
    /// Pre-rendered delve text, shown by 1.110+ clients
    DelveInfo { info: String },
    CharResistsUpdate(Resists),
    PlayerForgedPosition(ForgedPosition),
    CustomTextWindow { caption: String, lines: Vec<String> },
    PlayerTitles { stats: Vec<String>, titles: Vec<String> },
    /// `None` clears the title shown over the player
    PlayerTitleUpdate { object_id: u16, title: Option<String> },
    AddFriends(Vec<String>),
    RemoveFriends(Vec<String>),
    TimerWindow { title: String, seconds: u16 },
    CloseTimerWindow,
    ChampionTrainerWindow(ChampionTrainer),
    TrainerWindow(TrainerWindow),
    ConcentrationList(Vec<ConcentrationEntry>),
    PetWindow(PetWindow),
    MasterLevelWindow(MasterLevelWindow),
    EmblemDialogue,
    /// `position` counts the active quests before this one
    QuestUpdate { position: u8, quest: Option<QuestText> },
    QuestListUpdate { task: String, quests: Vec<Option<QuestText>> },
    StarterHelp,
    RentReminder { house: u16 },
    House(HouseInfo),
    RemoveHouse(HouseInfo),
    Garden { house: u16, items: Vec<GardenItem> },
    RemoveGarden { house: u16 },
    EnterHouse(HouseInfo),
    Furniture { house: u16, items: Vec<FurnitureItem> },
    FurnitureItem { house: u16, item: FurnitureItem },
    HousePermissions(HousePermissions),
    HousePayRentDialog { title: String },
    ToggleHousePoints { house: u16 },
    KeepInfo(KeepInfo),
    KeepRealmUpdate { keep: u16, realm: u8, level: u8 },
    KeepRemove { keep: u16 },
    KeepComponentInfo(KeepComponent),
    KeepComponentDetailUpdate(KeepComponent),
    KeepClaim { keep: u16, flag: u8, max_level: u8, level: u8 },
    KeepComponentUpdate(KeepComponentUpdate),
    KeepComponentInteract(KeepInteract),
    KeepComponentHookPoint { keep: u16, component: u16, selected: u8, free: Vec<u8> },
    ClearKeepComponentHookPoint { keep: u16, component: u16, selected: u8 },
    HookPointStore(HookPointStore),
    WarmapUpdate(WarmapUpdate),
    WarmapDetailUpdate { fights: Vec<MapFight>, groups: Vec<MapGroup> },
    WarmapBonuses(WarmapBonuses),
    MovingObjectCreate(MovingObject),
    SiegeWeaponInterface(SiegeWeaponInterface),
    SiegeWeaponCloseInterface,
    SiegeWeaponAnimation(SiegeAnimation),
    SiegeWeaponFireAnimation(SiegeAnimation),
    /// `None` releases the controlled horse
    SetControlledHorse(Option<ControlledHorse>),
    /// Horse shown under another player; `None` dismounts
    ControlledHorse { object_id: u16, horse: Option<Horse>, guild_emblem: Option<u32> },
    RvRGuildBanner { object_id: u16, show: bool, emblem: Option<u32> },
    DoorState { door_id: u32, open: bool, flag: u8 },
    Weather(Weather),
    LevelUpSound { object_id: u16, realm: u8 },
    RegionEnterSound { object_id: u16, sound: u8 },
    PlaySound { sound_type: u16, sound_id: u16 },
    SoundEffect(SoundEffect),
    ObjectDelete { object_id: u16 },
    HexEffect { object_id: u16, effects: [u8; 5] },
    NpcsQuestEffect { object_id: u16, flag: u8 },
    VampireEffect { object_id: u16, show: bool },
    /// Makes the client exit with `text`
    Crash { text: String },
}

/// Face customisation bytes shared by player creation and the overview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Face {
    pub eye_size: u8,
    pub lip_size: u8,
    pub mood: u8,
    pub eye_color: u8,
    pub hair_color: u8,
    pub face_type: u8,
    pub hair_style: u8,
}

/// Character list for one realm of an account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterOverview {
    /// Realm number; account slots start at `realm * 100`
    pub realm: u8,
    /// `None` when the account has no characters at all
    pub characters: Option<Vec<CharacterSummary>>,
}

/// One character-select slot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterSummary {
    /// Position inside the realm, `0..10`
    pub slot: u8,
    pub name: String,
    pub level: u8,
    pub class_id: u8,
    pub class_name: String,
    pub race: u8,
    pub race_name: String,
    pub gender: u8,
    pub realm: u8,
    pub location: String,
    pub model: u16,
    pub region: u8,
    /// Already-resolved expansion marker of the region, `0` when none
    pub region_expansion: u8,
    /// STR DEX CON QUI INT PIE EMP CHA
    pub stats: [u8; 8],
    /// Models of the eight armor slots starting at the helmet
    pub armor_models: [u16; 8],
    /// Colors (or emblems) of the same slots; index 3 carries the left hand
    pub armor_colors: [u16; 8],
    /// Right hand, left hand, two-handed, ranged
    pub weapon_models: [u16; 4],
    pub right_hand_color: u16,
    /// Active hand bytes as shown on the select screen
    pub hands: [u8; 2],
    pub in_si_zone: bool,
    pub face: Face,
    pub torso_extension: u8,
    pub gloves_extension: u8,
    pub boots_extension: u8,
    pub hood_up: bool,
    pub customisation_step: u8,
}

/// Reply to the UDP init request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UdpInitReply {
    /// Address and port the client should use, if UDP is enabled
    pub endpoint: Option<(String, u16)>,
    /// Server tick count, echoed by 1.125+ clients
    pub ticks: u64,
}

/// Base and bonus stats shown in the character sheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharStats {
    pub base: [u16; 8],
    /// Buff bonuses
    pub bonus: [u16; 8],
    pub max_health: u16,
    /// Item bonuses and their caps, shown by 1.75+ clients
    pub item_bonus: [u16; 8],
    pub item_caps: [u8; 8],
    /// Realm ability bonuses (1.75+)
    pub ability_bonus: [u8; 8],
    pub con_lost: u8,
}

/// One region server entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionEntry {
    pub id: u8,
    pub name: String,
    pub from_port: String,
    pub to_port: String,
    pub ip: String,
}

/// The player's own position and object id, sent on world entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerPosition {
    pub object_id: u16,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub heading: u16,
    pub diving_enabled: bool,
    pub underwater: bool,
    /// Zone offsets divided by `0x2000`, only for dungeon zones
    pub dungeon_offset: Option<(u16, u16)>,
    pub region_skin: u16,
}

/// Teleport of an object, or a heading-only correction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerJump {
    pub object_id: u16,
    /// `None` changes only the heading
    pub position: Option<(u32, u32)>,
    pub z: u16,
    pub heading: u16,
    pub house: u16,
}

/// Where a chat line is shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatLocation {
    #[default]
    ChatWindow,
    Popup,
    System,
}

impl ChatLocation {
    /// Prefix the client interprets as the target window
    pub fn prefix(self) -> &'static str {
        match self {
            ChatLocation::ChatWindow => "@@",
            ChatLocation::Popup => "##",
            ChatLocation::System => "",
        }
    }
}

/// Chat types the 1.68+ client cannot display
pub const CHAT_SCREEN_CENTER: u8 = 0xC8;
pub const CHAT_SCREEN_CENTER_SMALLER: u8 = 0xC9;

/// A system or chat line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatMessage {
    pub text: String,
    pub chat_type: u8,
    pub location: ChatLocation,
}

/// Mounted horse shown with a player (1.80+)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Horse {
    pub id: u8,
    pub barding: u8,
    pub barding_color: u16,
    pub saddle: u8,
    pub saddle_color: u8,
}

/// Guild data shown with a player or used for banners
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildTag {
    pub id: u16,
    pub name: String,
    pub emblem: u32,
}

/// Another player entering visibility
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerCreate {
    pub session_id: u16,
    pub object_id: u16,
    pub model: u16,
    pub x_offset: u16,
    pub y_offset: u16,
    pub z: u16,
    pub zone: u16,
    pub heading: u16,
    pub level: u8,
    pub realm: u8,
    pub alive: bool,
    pub underwater: bool,
    pub stealthed: bool,
    pub wireframe: bool,
    pub vampiir: bool,
    pub face: Face,
    pub name: String,
    pub last_name: String,
    pub prefix: String,
    pub title: String,
    pub guild: Option<GuildTag>,
    pub horse: Option<Horse>,
}

/// Movement update of a visible living
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectUpdate {
    pub object_id: u16,
    pub is_npc: bool,
    pub speed: u16,
    pub heading: u16,
    pub x_offset: u16,
    pub y_offset: u16,
    pub z: u16,
    pub zone: u16,
    pub target_x_offset: u16,
    pub target_y_offset: u16,
    pub target_z: u16,
    pub target_zone: u16,
    pub target_object: u16,
    pub health_percent: u8,
    pub flags: u8,
}

/// Type sent with an object removal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObjectKind {
    #[default]
    Static,
    LivingNpc,
    Player,
    DeadNpc,
}

impl ObjectKind {
    pub fn code(self) -> u16 {
        match self {
            ObjectKind::Static | ObjectKind::DeadNpc => 0,
            ObjectKind::LivingNpc => 1,
            ObjectKind::Player => 2,
        }
    }
}

/// A static world object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectCreate {
    pub object_id: u16,
    pub emblem: u32,
    pub heading: u16,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub model: u16,
    pub realm: u8,
    pub underwater: bool,
    pub is_banner: bool,
    pub owned_by_viewer: bool,
    pub name: String,
    /// Door id when the object is a door
    pub door_id: Option<u32>,
}

/// A non-player living
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NpcCreate {
    pub object_id: u16,
    pub speed: u16,
    pub speed_z: u16,
    pub heading: u16,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub model: u16,
    pub size: u8,
    pub level: u8,
    pub realm: u8,
    pub underwater: bool,
    pub transparent: bool,
    pub has_inventory: bool,
    pub peace: bool,
    pub flying: bool,
    pub name: String,
    pub guild_name: String,
    /// Guild of the owner when the npc is a player's pet
    pub owner_guild: Option<Option<u16>>,
}

/// One visible item on a living
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibleItem {
    pub slot: u8,
    pub model: u16,
    pub color: u16,
    pub emblem: u32,
    pub effect: u16,
    pub extension: u8,
}

impl VisibleItem {
    /// Emblem when set, otherwise the dye color
    pub fn texture(&self) -> u32 {
        if self.emblem != 0 {
            self.emblem
        } else {
            u32::from(self.color)
        }
    }
}

/// Equipment visible on a living
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquipmentUpdate {
    pub object_id: u16,
    pub hood_up: bool,
    pub active_quiver: u8,
    pub visible_weapons: u8,
    /// `None` when the living has no inventory
    pub items: Option<Vec<VisibleItem>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Points {
    pub realm_points: u32,
    pub level_permill: u16,
    pub skill_spec_points: u16,
    pub bounty_points: u32,
    pub realm_spec_points: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Money {
    pub copper: u8,
    pub silver: u8,
    pub gold: u16,
    pub mithril: u16,
    pub platinum: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombatAnimation {
    pub attacker: Option<u16>,
    pub defender: Option<u16>,
    pub weapon: u16,
    pub shield: u16,
    pub style: u16,
    pub stance: u8,
    pub result: u8,
    pub target_health_percent: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    pub health_percent: u8,
    pub mana_percent: u8,
    pub endurance_percent: u8,
    pub concentration_percent: u8,
    pub alive: bool,
    pub sitting: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpellEffect {
    pub caster: u16,
    pub spell: u16,
    pub target: Option<u16>,
    pub bolt_time: u16,
    pub no_sound: bool,
    pub success: u8,
}

/// One entry of the find-group window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSeeker {
    pub in_group: bool,
    pub level: u8,
    pub name: String,
    pub class_name: String,
    pub zone: Option<u16>,
}

/// Dialog window code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DialogCode {
    GuildInvite = 0x03,
    GroupInvite = 0x05,
    CustomDialog = 0x06,
    GuildLeave = 0x08,
    HousePayRent = 0x14,
    QuestSubscribe = 0x64,
}

/// Dialog button layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum DialogType {
    #[default]
    Ok = 0x00,
    YesNo = 0x01,
}

/// Generic dialog window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogBox {
    pub code: DialogCode,
    pub data: [u16; 4],
    pub dialog_type: DialogType,
    pub auto_wrap: bool,
    pub text: String,
}

/// A member line of the group window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupWindowMember {
    pub object_id: u16,
    pub level: u8,
    pub name: String,
    pub class_name: String,
    pub same_region: bool,
    pub health_percent: u8,
    pub mana_percent: u8,
    pub status: u8,
}

/// Position of a moving group member on the map (1.74+)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapPosition {
    pub zone_skin: u16,
    pub x_offset: u16,
    pub y_offset: u16,
}

/// Health bars of one group member
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMemberStatus {
    pub group_index: u8,
    pub same_region: bool,
    pub health_percent: u8,
    pub mana_percent: u8,
    pub endurance_percent: u8,
    pub status: u8,
    /// Effect icons, only when they changed
    pub icons: Option<Vec<u16>>,
    /// Present while the member is moving in the viewer's region
    pub map: Option<MapPosition>,
}

/// An active effect icon
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectIcon {
    pub icon: u16,
    pub is_spell: bool,
    pub remaining_secs: u16,
    pub internal_id: u16,
    pub tooltip_id: u16,
    pub immune: bool,
    pub negative: bool,
    pub name: String,
    /// Changed since the last update; incremental layouts only send these
    pub changed: bool,
}

/// Effect bar update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconsUpdate {
    /// Every effect carrying an icon, in display order
    pub effects: Vec<EffectIcon>,
    /// Icon count sent in the previous update, to clear vanished slots
    pub previous_count: u8,
    /// Target window byte of the 1.110+ layout
    pub window: u8,
}

/// One line of the hybrid skill list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillEntry {
    /// Internal skill id, sent by 1.112+ clients
    pub id: u16,
    pub level: u8,
    pub page: u8,
    pub requirement: u16,
    pub bonus: u8,
    pub icon: u16,
    pub name: String,
}

/// Full description of an inventory item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemData {
    pub level: u8,
    pub value1: u8,
    pub value2: u8,
    pub hand: u8,
    pub damage_type: u8,
    pub object_type: u8,
    pub is_garden_object: bool,
    pub dps_af: u8,
    pub weight: u16,
    pub condition: u8,
    pub durability: u8,
    pub quality: u8,
    pub bonus: u8,
    pub model: u16,
    pub extension: u8,
    pub color: u16,
    pub emblem: u32,
    pub effect: u16,
    pub count: u16,
    pub name: String,
    /// Bonus level line of the 1.112 delve
    pub bonus_level: u8,
    pub spell: Option<ItemSpell>,
    pub spell2: Option<ItemSpell>,
    pub craftable: bool,
    /// Price suffix shown after the name by 1.112+ clients
    pub price_tag: Option<String>,
}

/// Proc or charge spell shown on an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSpell {
    pub icon: u16,
    pub name: String,
}

impl ItemData {
    /// Name with the stack count in front, as the bag shows it
    pub fn display_name(&self) -> String {
        if self.count > 1 {
            format!("{} {}", self.count, self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Changed inventory slots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySlots {
    pub slots: Vec<(u8, Option<ItemData>)>,
    pub hood_up: bool,
    pub active_quiver: u8,
    pub visible_weapons: u8,
    pub pre_action: u8,
}

/// One item offered by a merchant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerchantItem {
    /// Position on the page
    pub index: u8,
    pub item: ItemData,
    /// Units bought per click, `0` for single items
    pub stack_value: u16,
    pub price: u32,
    /// Whether the viewer can use the item
    pub usable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerchantPage {
    pub page: u8,
    pub items: Vec<MerchantItem>,
}

/// Merchant buy window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerchantWindow {
    /// Currency the merchant takes
    pub window_type: u8,
    /// `None` opens an empty window
    pub pages: Option<Vec<MerchantPage>>,
}

/// Trade or combine window state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeWindow {
    /// Inventory slots the viewer put up
    pub own_slots: Vec<u8>,
    pub own_money: Money,
    pub partner_money: Money,
    /// Items offered by the partner, `None` while there are none to show
    pub partner_items: Option<Vec<(u8, ItemData)>>,
    pub repairing: bool,
    pub combine: bool,
    /// Name of the partner, or of the item being combined
    pub partner: String,
}

/// One consignment search hit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketItem {
    pub item: ItemData,
    pub usable: bool,
    /// Stall lot the item sits in
    pub lot: u16,
    pub price: u32,
}

/// One page of market explorer results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketPage {
    pub page: u8,
    pub max_page: u8,
    pub items: Vec<MarketItem>,
}

/// Character sheet lines of the various-update packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerSheet {
    pub level: u8,
    pub name: String,
    pub max_health: u16,
    pub class_name: String,
    pub profession: String,
    pub class_title: String,
    pub realm_level: u8,
    pub realm_title: String,
    pub realm_spec_points: u8,
    pub base_class: String,
    /// House lot number, `0` without a house
    pub house: u16,
    pub guild: String,
    pub last_name: String,
    pub master_level: u8,
    pub race: String,
    pub guild_rank: String,
    /// Primary crafting skill, `None` when the player has not picked one
    pub craft_skill: Option<String>,
    pub craft_title: String,
    pub master_level_title: String,
    /// Selected title (1.75+), `None` shows "None"
    pub title: Option<String>,
}

/// One spell of a spell line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpellEntry {
    pub level: u8,
    pub icon: u16,
    pub tooltip: u16,
    pub name: String,
}

/// A spell line with the spells usable at the current level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpellLine {
    pub name: String,
    pub spells: Vec<SpellEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CraftSkill {
    pub points: u16,
    pub icon: u8,
    pub name: String,
}

/// What a disable-skill packet greys out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledSkill {
    /// Ability by its position in the skill list
    Ability { index: u8 },
    /// Spell of a list caster
    CasterSpell { line: u8, spell: u8 },
    /// Spell of a hybrid, by its position in the skill list
    HybridSpell { index: u16 },
}

impl Default for DisabledSkill {
    fn default() -> Self {
        DisabledSkill::Ability { index: 0 }
    }
}

/// Resist sheet in wire order: crush slash thrust heat cold matter body spirit energy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resists {
    pub racial: [u16; 9],
    pub buffs: [u16; 9],
    pub items: [u16; 9],
    pub caps: [u8; 9],
    pub abilities: [u8; 9],
}

/// Movement state carried in the forged position speed word
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MoveState {
    #[default]
    Standing,
    Swimming,
    Sitting,
    Dead,
    Climbing,
}

impl MoveState {
    pub fn code(self) -> u16 {
        match self {
            MoveState::Standing => 0,
            MoveState::Swimming => 1,
            MoveState::Sitting => 4,
            MoveState::Dead => 5,
            MoveState::Climbing => 7,
        }
    }
}

/// Server-authored position update for the player's own client (1.112+)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForgedPosition {
    pub session_id: u16,
    pub z: u16,
    pub x_offset: u16,
    pub y_offset: u16,
    pub zone_skin: u16,
    pub heading: u16,
    /// Signed speed; backwards movement is negative
    pub speed: i16,
    pub state: MoveState,
    pub strafing: bool,
    pub incapacitated: bool,
    /// Steed object id and seat when mounted
    pub steed: Option<(u16, u16)>,
    pub diving: bool,
    pub wireframe: bool,
    pub stealthed: bool,
    pub torch: bool,
    pub health_percent: u8,
    pub attacking: bool,
    pub mana_percent: u8,
    pub endurance_percent: u8,
    pub realm_points_flag: u8,
}

/// A champion ability offered in one slot of the champion window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChampionSpec {
    pub index: u8,
    pub is_style: bool,
    pub icon: u16,
    pub name: String,
    pub owned: bool,
    pub available: bool,
}

/// Champion trainer for one champion line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChampionTrainer {
    pub line: u8,
    pub points: u8,
    /// Abilities of skill indexes 1 to 6
    pub columns: [Vec<ChampionSpec>; 6],
}

/// A trainable spell in the 1.110 trainer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainerSpell {
    pub name: String,
    pub level: u8,
    pub icon: u16,
    pub song: bool,
    pub skill_type: u8,
    pub tooltip: u16,
}

/// A trainable style in the 1.110 trainer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainerStyle {
    pub name: String,
    pub level: u8,
    pub icon: u16,
    pub skill_type: u8,
    pub opening_type: u8,
    pub opening_value: u8,
    pub id: u16,
}

/// What a specialization unlocks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrainerSkills {
    #[default]
    Nothing,
    Spells(Vec<TrainerSpell>),
    Styles(Vec<TrainerStyle>),
}

impl TrainerSkills {
    pub fn len(&self) -> usize {
        match self {
            TrainerSkills::Nothing => 0,
            TrainerSkills::Spells(s) => s.len(),
            TrainerSkills::Styles(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainerSpec {
    pub level: u8,
    pub name: String,
    /// Level the class auto-trains this spec to, `0` when it does not
    pub autotrain_level: u8,
    pub skills: TrainerSkills,
}

/// Next rank of a realm ability the player may buy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferedAbility {
    pub level: u8,
    pub cost: u8,
    pub name: String,
    /// Requirements met; unusable abilities are shown in brackets
    pub usable: bool,
}

/// A realm ability of the class, as the 1.110 trainer lists it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealmAbilityRank {
    pub owned_level: u8,
    /// Cost of every rank; its length is the maximum level
    pub costs: Vec<u8>,
    pub key: String,
    pub name: String,
    pub usable: bool,
}

/// Trainer window contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainerWindow {
    pub spec_points: u8,
    pub realm_points: u8,
    pub specs: Vec<TrainerSpec>,
    pub offered_abilities: Vec<OfferedAbility>,
    pub realm_abilities: Vec<RealmAbilityRank>,
}

/// A concentration effect the player maintains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConcentrationEntry {
    pub concentration: u8,
    pub icon: u16,
    pub name: String,
    /// Who the effect sits on
    pub owner: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PetWindowAction {
    #[default]
    Close,
    Update,
    Open,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PetAggression {
    Aggressive,
    #[default]
    Defensive,
    Passive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PetWalk {
    #[default]
    Follow,
    Stay,
    GoTarget,
    Here,
}

/// Pet command window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PetWindow {
    /// Pet object id and its effect icons
    pub pet: Option<(u16, Vec<u16>)>,
    pub action: PetWindowAction,
    pub aggression: PetAggression,
    pub walk: PetWalk,
}

/// Master level progress window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterLevelWindow {
    pub xp_percent: u8,
    pub master_level: u8,
    /// Level the window describes
    pub shown_level: u8,
    /// Step descriptions of the shown level, only below level 10
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestText {
    pub name: String,
    pub description: String,
}

/// Placement and look of a house
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HouseInfo {
    pub number: u16,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub heading: u16,
    pub porch_roof_color: u16,
    pub porch: bool,
    /// Guild banner and shield hung outside and inside
    pub outdoor_banner: bool,
    pub outdoor_shield: bool,
    pub indoor_banner: bool,
    pub indoor_shield: bool,
    pub emblem: u32,
    pub model: u8,
    pub roof_material: u8,
    pub wall_material: u8,
    pub door_material: u8,
    pub truss_material: u8,
    pub porch_material: u8,
    pub window_material: u8,
    pub rug_colors: [u8; 4],
    pub name: String,
}

/// Outdoor decoration at a garden spot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GardenItem {
    pub key: u8,
    pub model: u16,
    pub position: u8,
    pub rotation: u8,
}

/// Interior decoration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FurnitureItem {
    pub key: u8,
    pub model: u16,
    pub color: u32,
    pub emblem: u32,
    pub x: u16,
    pub y: u16,
    pub rotation: u16,
    pub size: u8,
    pub position: u8,
    pub place_mode: u8,
}

/// Rights of one permission level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousePermission {
    pub enter: bool,
    pub vaults: [u8; 4],
    pub change_appearance: bool,
    pub change_interior: bool,
    pub change_garden: bool,
    pub banish: bool,
    pub use_merchants: bool,
    pub use_tools: bool,
    pub bind: bool,
    pub consignment: u8,
    pub pay_rent: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousePermissions {
    pub house: u16,
    pub levels: [HousePermission; 10],
}

/// Keep placement on the map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepInfo {
    pub keep: u16,
    pub x: u32,
    pub y: u32,
    pub heading: u16,
    pub realm: u8,
    pub level: u8,
}

/// One wall or tower piece of a keep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepComponent {
    pub keep: u16,
    pub id: u16,
    pub object_id: u32,
    pub skin: u8,
    /// Offsets relative to the keep
    pub x: u8,
    pub y: u8,
    pub heading: u8,
    pub height: u8,
    pub health_percent: u8,
    pub status: u8,
    pub raised: bool,
    pub climbing: bool,
    pub alive: bool,
}

impl KeepComponent {
    /// Status byte with the raised and climbable marks
    pub fn flag(&self) -> u8 {
        let mut flag = self.status;
        if self.raised {
            flag |= 0x04;
        }
        if flag == 0 && self.climbing {
            flag = 0x02;
        }
        flag
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepComponentUpdate {
    pub keep: u16,
    pub realm: u8,
    pub level: u8,
    pub components: Vec<KeepComponent>,
    pub level_up: bool,
}

/// Answer to interacting with a keep door or wall
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepInteract {
    pub keep: u16,
    pub realm: u8,
    pub health_percent: u8,
    pub level: u8,
    pub max_level: u8,
    pub guild: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookPointItem {
    pub flag: u16,
    pub gold: u32,
    pub icon: u16,
    pub name: String,
}

/// Things that can be bought for a hook point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookPointStore {
    pub keep: u16,
    pub component: u16,
    pub hook_point: u16,
    pub items: Vec<HookPointItem>,
}

/// One keep or tower on the war map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmapKeep {
    /// Keep id; towers carry their index in the high byte
    pub keep: u16,
    pub realm: u8,
    pub claimed: bool,
    pub under_siege: bool,
    pub teleportable: bool,
    pub guild: String,
}

/// Relic ownership per realm: albion, midgard, hibernia
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmapUpdate {
    pub strength_relics: [u8; 3],
    pub magic_relics: [u8; 3],
    pub keeps: Vec<WarmapKeep>,
}

/// A fight marker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapFight {
    pub zone: u8,
    pub x: u8,
    pub y: u8,
    pub color: u8,
    pub size: u8,
}

/// A roaming group marker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapGroup {
    pub zone: u8,
    pub x: u8,
    pub y: u8,
    pub realm: u8,
    pub group_type: u8,
}

/// Realm bonuses shown under the war map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmapBonuses {
    pub realm_keeps: u8,
    pub realm_towers: u8,
    pub magic: u8,
    pub strength: u8,
    /// Realm owning Darkness Falls
    pub df_owner: u8,
    pub df_owner_towers: u8,
}

/// Boats and siege engines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovingObject {
    pub object_id: u16,
    pub heading: u16,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub model: u16,
    pub object_type: u8,
    pub realm: u8,
    pub level: u8,
    pub emblem: u16,
    pub name: String,
}

/// Control panel of a siege weapon
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiegeWeaponInterface {
    pub object_id: u16,
    pub movable: bool,
    pub ammo_type: u8,
    /// Action timer in tenths of a second
    pub time: u16,
    pub action: u8,
    pub ammo_slot: u8,
    pub effect: u16,
    pub name: String,
    /// State shown after the name ("aiming", "loading", ...)
    pub state: String,
    pub ammo: Vec<(u8, ItemData)>,
}

/// Siege weapon aiming or firing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiegeAnimation {
    pub object_id: u16,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub target: u16,
    pub effect: u16,
    /// Milliseconds left on the timer
    pub timer: u32,
    pub action: u8,
}

/// Horse the player controls from its saddlebags (1.80+)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlledHorse {
    pub horse: Horse,
    pub saddlebag_slots: u8,
    pub armor: u8,
    pub name: String,
    pub guild_emblem: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Weather {
    pub x: u32,
    pub width: u32,
    pub fog_diffusion: u16,
    pub speed: u16,
    pub intensity: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoundEffect {
    pub sound: u16,
    pub zone: u16,
    pub x: u16,
    pub y: u16,
    pub z: u16,
    pub radius: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_ids_are_dense() {
        for (i, op) in OperationId::ALL.iter().enumerate() {
            assert_eq!(op.index(), i);
        }
        assert_eq!(OperationId::COUNT, 134);
    }

    #[test]
    fn test_message_maps_to_operation() {
        assert_eq!(
            OutboundMessage::SessionId.operation(),
            OperationId::SessionId
        );
        assert_eq!(
            OutboundMessage::HybridSkills(Vec::new()).operation(),
            OperationId::HybridSkills
        );
        assert_eq!(OperationId::CheckLos.name(), "CheckLos");
    }

    #[test]
    fn test_item_display_name() {
        let mut item = ItemData {
            name: "Arrow".into(),
            count: 1,
            ..Default::default()
        };
        assert_eq!(item.display_name(), "Arrow");
        item.count = 20;
        assert_eq!(item.display_name(), "20 Arrow");
    }
}
