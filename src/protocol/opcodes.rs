//! Opcode identities.
//!
//! [`ServerPacket`] names an outbound opcode slot; the byte it maps to is
//! per-version registry data resolved through the codec revision chain. The
//! base values below are the 1.68 assignments.
//!
//! [`ClientPacket`] holds the inbound opcodes the server decodes.

macro_rules! server_packets {
    ($($name:ident = $code:expr),+ $(,)?) => {
        /// Logical outbound opcode slot
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum ServerPacket {
            $($name),+
        }

        impl ServerPacket {
            pub const ALL: &'static [ServerPacket] = &[$(ServerPacket::$name),+];
            pub const COUNT: usize = Self::ALL.len();

            #[inline]
            pub const fn index(self) -> usize {
                self as usize
            }

            /// Opcode byte in the base revision
            pub const fn base_code(self) -> u8 {
                match self {
                    $(ServerPacket::$name => $code),+
                }
            }
        }
    };
}

server_packets! {
    InventoryUpdate = 0x02,
    CharacterJump = 0x04,
    HousingPermissions = 0x05,
    HouseEnter = 0x08,
    HousingItem = 0x09,
    HouseTogglePoints = 0x0F,
    MovingObjectCreate = 0x12,
    MasterLevelWindow = 0x13,
    EquipmentUpdate = 0x15,
    VariousUpdate = 0x16,
    MerchantWindow = 0x17,
    SpellEffectAnimation = 0x1B,
    ConsignmentMerchantMoney = 0x1E,
    MarketExplorerWindow = 0x1F,
    PositionAndObjectId = 0x20,
    DebugMode = 0x21,
    CryptKey = 0x22,
    SessionId = 0x28,
    PingReply = 0x29,
    LoginGranted = 0x2A,
    CharacterInitFinished = 0x2B,
    LoginDenied = 0x2C,
    GameOpenReply = 0x2D,
    UdpInitReply = 0x2F,
    WarMapClaimedKeeps = 0x49,
    WarMapDetailUpdate = 0x4A,
    VisualEffect = 0x4C,
    ControlledHorse = 0x4E,
    KeepComponentInteractResponse = 0x61,
    KeepClaim = 0x62,
    KeepComponentHookpointStore = 0x63,
    KeepComponentHookpointUpdate = 0x65,
    WarmapBonuses = 0x66,
    KeepComponentUpdate = 0x67,
    KeepInfo = 0x69,
    KeepRealmUpdate = 0x6A,
    KeepRemove = 0x6B,
    KeepComponentInfo = 0x6C,
    KeepComponentDetailUpdate = 0x6D,
    GroupMemberUpdate = 0x70,
    SpellCastAnimation = 0x72,
    InterruptSpellCast = 0x73,
    AttackMode = 0x74,
    ConcentrationList = 0x75,
    TrainerWindow = 0x7B,
    Time = 0x7E,
    UpdateIcons = 0x7F,
    Dialog = 0x81,
    QuestEntry = 0x83,
    FindGroupUpdate = 0x86,
    PetWindow = 0x88,
    PlayerRevive = 0x89,
    PlayerModelTypeChange = 0x8D,
    CharacterPointsUpdate = 0x91,
    Weather = 0x92,
    DoorState = 0x99,
    ClientRegions = 0x9E,
    ObjectUpdate = 0xA1,
    RemoveObject = 0xA2,
    Quit = 0xA4,
    PlayerPosition = 0xA9,
    CharacterStatusUpdate = 0xAD,
    PlayerDeath = 0xAE,
    Message = 0xAF,
    MaxSpeed = 0xB6,
    RegionChanged = 0xB7,
    CombatAnimation = 0xBC,
    Encumberance = 0xBD,
    BadNameCheckReply = 0xC3,
    DetailWindow = 0xC4,
    AddFriend = 0xC5,
    RemoveFriend = 0xC6,
    Riding = 0xC8,
    SoundEffect = 0xC9,
    DupNameCheckReply = 0xCC,
    CheckLos = 0xD0,
    HouseCreate = 0xD1,
    HouseChangeGarden = 0xD2,
    PlaySound = 0xD3,
    PlayerCreate = 0xD4,
    DisableSkills = 0xD6,
    ObjectCreate = 0xD9,
    NpcCreate = 0xDA,
    ModelChange = 0xDB,
    ObjectGuildId = 0xDE,
    ChangeGroundTarget = 0xDF,
    ObjectDelete = 0xE1,
    EmblemDialogue = 0xE2,
    SiegeWeaponAnimation = 0xE3,
    TradeWindow = 0xEA,
    RegionSound = 0xEF,
    CharacterCreateReply = 0xF0,
    TimerWindow = 0xF3,
    SiegeWeaponInterface = 0xF5,
    ChangeTarget = 0xF6,
    HelpWindow = 0xF7,
    EmoteAnimation = 0xF9,
    MoneyUpdate = 0xFA,
    StatsUpdate = 0xFB,
    CharacterOverview = 0xFD,
    Realm = 0xFE,
}

/// Opcode used by 1.72+ clients for player creation
pub const PLAYER_CREATE_172: u8 = 0x4B;

/// Raw opcode that makes the client exit with a message
pub const CRASH_OPCODE: u8 = 0x86;

/// Inbound opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientPacket {
    HousingPlaceItem = 0x0C,
    CharacterSelectRequest = 0x10,
    UdpInitRequest = 0x14,
    RegionListRequest = 0x9D,
    PingRequest = 0xA3,
    LoginRequest = 0xA7,
    PlayerPositionUpdate = 0xA9,
    GameOpenRequest = 0xBF,
    WorldInitRequest = 0xD4,
    DetailRequest = 0xD8,
    PlayerMoveItem = 0xDC,
    UdpPing = 0xF2,
    CryptKeyRequest = 0xF4,
    CharacterOverviewRequest = 0xFC,
    CharacterCreateRequest = 0xFF,
}

impl ClientPacket {
    pub const ALL: &'static [ClientPacket] = &[
        ClientPacket::HousingPlaceItem,
        ClientPacket::CharacterSelectRequest,
        ClientPacket::UdpInitRequest,
        ClientPacket::RegionListRequest,
        ClientPacket::PingRequest,
        ClientPacket::LoginRequest,
        ClientPacket::PlayerPositionUpdate,
        ClientPacket::GameOpenRequest,
        ClientPacket::WorldInitRequest,
        ClientPacket::DetailRequest,
        ClientPacket::PlayerMoveItem,
        ClientPacket::UdpPing,
        ClientPacket::CryptKeyRequest,
        ClientPacket::CharacterOverviewRequest,
        ClientPacket::CharacterCreateRequest,
    ];

    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.code() == code)
    }
}
