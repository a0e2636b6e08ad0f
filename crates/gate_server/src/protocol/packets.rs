//! # Versioned packet table
//!
//! Maps `(protocol version, phase, direction, name)` to the numeric packet
//! identifier and back. Handshake, Status and Login identifiers are the same
//! for every supported version and are stored once; Play identifiers are
//! stored per version group. Each version row also carries the
//! [`VersionLayout`] selectors for the few packets whose field layout
//! differs between versions.
//!
//! Adding a protocol version means adding a row to [`VERSION_ROWS`] (and, if
//! its numbering is new, an id list); no code path branches on version.

use crate::error::ProtocolError;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Stage of the login handshake a connection is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    Handshake,
    Status,
    Login,
    Play,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Handshake => "handshake",
            ConnectionPhase::Status => "status",
            ConnectionPhase::Login => "login",
            ConnectionPhase::Play => "play",
        };
        f.write_str(name)
    }
}

/// Inbound is client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

/// Symbolic packet names, shared by both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketName {
    // Handshake
    Handshake,
    // Status
    StatusRequest,
    StatusPing,
    StatusResponse,
    StatusPong,
    // Login
    LoginStart,
    EncryptionResponse,
    LoginDisconnect,
    EncryptionRequest,
    LoginSuccess,
    SetCompression,
    // Play, both directions
    KeepAlive,
    ChatMessage,
    PlayerPositionAndLook,
    HeldItemChange,
    PluginMessage,
    // Play, inbound
    TeleportConfirm,
    TabComplete,
    ClientStatus,
    ClientSettings,
    ConfirmTransaction,
    EnchantItem,
    ClickWindow,
    CloseWindow,
    UseEntity,
    Player,
    PlayerPosition,
    PlayerLook,
    VehicleMove,
    SteerBoat,
    PlayerAbilities,
    PlayerDigging,
    EntityAction,
    SteerVehicle,
    ResourcePackStatus,
    CreativeInventoryAction,
    UpdateSign,
    Animation,
    Spectate,
    PlayerBlockPlacement,
    UseItem,
    PrepareCraftingGrid,
    CraftRecipeRequest,
    CraftingBookData,
    AdvancementTab,
    // Play, outbound
    JoinGame,
    SpawnPosition,
    UpdateHealth,
    SetExperience,
    ChunkData,
    SetSlot,
    Disconnect,
    Title,
    PlayerListHeaderFooter,
}

impl PacketName {
    pub fn as_str(&self) -> &'static str {
        use PacketName::*;
        match self {
            Handshake => "handshake",
            StatusRequest => "status_request",
            StatusPing => "status_ping",
            StatusResponse => "status_response",
            StatusPong => "status_pong",
            LoginStart => "login_start",
            EncryptionResponse => "encryption_response",
            LoginDisconnect => "login_disconnect",
            EncryptionRequest => "encryption_request",
            LoginSuccess => "login_success",
            SetCompression => "set_compression",
            KeepAlive => "keep_alive",
            ChatMessage => "chat_message",
            PlayerPositionAndLook => "player_position_and_look",
            HeldItemChange => "held_item_change",
            PluginMessage => "plugin_message",
            TeleportConfirm => "teleport_confirm",
            TabComplete => "tab_complete",
            ClientStatus => "client_status",
            ClientSettings => "client_settings",
            ConfirmTransaction => "confirm_transaction",
            EnchantItem => "enchant_item",
            ClickWindow => "click_window",
            CloseWindow => "close_window",
            UseEntity => "use_entity",
            Player => "player",
            PlayerPosition => "player_position",
            PlayerLook => "player_look",
            VehicleMove => "vehicle_move",
            SteerBoat => "steer_boat",
            PlayerAbilities => "player_abilities",
            PlayerDigging => "player_digging",
            EntityAction => "entity_action",
            SteerVehicle => "steer_vehicle",
            ResourcePackStatus => "resource_pack_status",
            CreativeInventoryAction => "creative_inventory_action",
            UpdateSign => "update_sign",
            Animation => "animation",
            Spectate => "spectate",
            PlayerBlockPlacement => "player_block_placement",
            UseItem => "use_item",
            PrepareCraftingGrid => "prepare_crafting_grid",
            CraftRecipeRequest => "craft_recipe_request",
            CraftingBookData => "crafting_book_data",
            AdvancementTab => "advancement_tab",
            JoinGame => "join_game",
            SpawnPosition => "spawn_position",
            UpdateHealth => "update_health",
            SetExperience => "set_experience",
            ChunkData => "chunk_data",
            SetSlot => "set_slot",
            Disconnect => "disconnect",
            Title => "title",
            PlayerListHeaderFooter => "player_list_header_footer",
        }
    }
}

impl fmt::Display for PacketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Layout selectors
// ============================================================================

/// Shape of `join_game` and `player_position_and_look`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinLayout {
    /// 1.8: byte dimension, no teleport id
    Classic,
    /// 1.9: byte dimension, teleport id
    TeleportId,
    /// 1.9.1 and later: int dimension, teleport id
    IntDimension,
}

impl JoinLayout {
    pub fn has_teleport_id(self) -> bool {
        !matches!(self, JoinLayout::Classic)
    }

    pub fn int_dimension(self) -> bool {
        matches!(self, JoinLayout::IntDimension)
    }
}

/// Shape of `chunk_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLayout {
    /// 1.8: unsigned short bitmask
    ShortMask,
    /// 1.9 - 1.9.2: varint bitmask
    VarIntMask,
    /// 1.9.4 and later: varint bitmask plus block entity count
    BlockEntities,
}

/// Width of the keep-alive identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveLayout {
    VarInt,
    Long,
}

/// Per-version field-layout selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionLayout {
    pub join: JoinLayout,
    pub chunk: ChunkLayout,
    /// Title action that carries the fade timings
    pub title_times_action: i32,
    pub keep_alive: KeepAliveLayout,
}

// ============================================================================
// Table data
// ============================================================================

type IdList = &'static [(i32, PacketName)];

/// One group of protocol versions that share Play numbering and layouts.
pub struct VersionRow {
    pub versions: &'static [i32],
    pub play_inbound: IdList,
    pub play_outbound: IdList,
    pub layout: VersionLayout,
}

use PacketName::*;

const HANDSHAKE_INBOUND: IdList = &[(0x00, Handshake)];
const STATUS_INBOUND: IdList = &[(0x00, StatusRequest), (0x01, StatusPing)];
const STATUS_OUTBOUND: IdList = &[(0x00, StatusResponse), (0x01, StatusPong)];
const LOGIN_INBOUND: IdList = &[(0x00, LoginStart), (0x01, EncryptionResponse)];
const LOGIN_OUTBOUND: IdList = &[
    (0x00, LoginDisconnect),
    (0x01, EncryptionRequest),
    (0x02, LoginSuccess),
    (0x03, SetCompression),
];

const PLAY_INBOUND_47: IdList = &[
    (0x00, KeepAlive),
    (0x01, ChatMessage),
    (0x02, UseEntity),
    (0x03, Player),
    (0x04, PlayerPosition),
    (0x05, PlayerLook),
    (0x06, PlayerPositionAndLook),
    (0x07, PlayerDigging),
    (0x08, PlayerBlockPlacement),
    (0x09, HeldItemChange),
    (0x0A, Animation),
    (0x0B, EntityAction),
    (0x0C, SteerVehicle),
    (0x0D, CloseWindow),
    (0x0E, ClickWindow),
    (0x0F, ConfirmTransaction),
    (0x10, CreativeInventoryAction),
    (0x11, EnchantItem),
    (0x12, UpdateSign),
    (0x13, PlayerAbilities),
    (0x14, TabComplete),
    (0x15, ClientSettings),
    (0x16, ClientStatus),
    (0x17, PluginMessage),
    (0x18, Spectate),
    (0x19, ResourcePackStatus),
];

const PLAY_INBOUND_107: IdList = &[
    (0x00, TeleportConfirm),
    (0x01, TabComplete),
    (0x02, ChatMessage),
    (0x03, ClientStatus),
    (0x04, ClientSettings),
    (0x05, ConfirmTransaction),
    (0x06, EnchantItem),
    (0x07, ClickWindow),
    (0x08, CloseWindow),
    (0x09, PluginMessage),
    (0x0A, UseEntity),
    (0x0B, KeepAlive),
    (0x0C, PlayerPosition),
    (0x0D, PlayerPositionAndLook),
    (0x0E, PlayerLook),
    (0x0F, Player),
    (0x10, VehicleMove),
    (0x11, SteerBoat),
    (0x12, PlayerAbilities),
    (0x13, PlayerDigging),
    (0x14, EntityAction),
    (0x15, SteerVehicle),
    (0x16, ResourcePackStatus),
    (0x17, HeldItemChange),
    (0x18, CreativeInventoryAction),
    (0x19, UpdateSign),
    (0x1A, Animation),
    (0x1B, Spectate),
    (0x1C, PlayerBlockPlacement),
    (0x1D, UseItem),
];

const PLAY_INBOUND_335: IdList = &[
    (0x00, TeleportConfirm),
    (0x01, PrepareCraftingGrid),
    (0x02, TabComplete),
    (0x03, ChatMessage),
    (0x04, ClientStatus),
    (0x05, ClientSettings),
    (0x06, ConfirmTransaction),
    (0x07, EnchantItem),
    (0x08, ClickWindow),
    (0x09, CloseWindow),
    (0x0A, PluginMessage),
    (0x0B, UseEntity),
    (0x0C, KeepAlive),
    (0x0D, Player),
    (0x0E, PlayerPosition),
    (0x0F, PlayerPositionAndLook),
    (0x10, PlayerLook),
    (0x11, VehicleMove),
    (0x12, SteerBoat),
    (0x13, PlayerAbilities),
    (0x14, PlayerDigging),
    (0x15, EntityAction),
    (0x16, SteerVehicle),
    (0x17, CraftingBookData),
    (0x18, ResourcePackStatus),
    (0x19, AdvancementTab),
    (0x1A, HeldItemChange),
    (0x1B, CreativeInventoryAction),
    (0x1C, UpdateSign),
    (0x1D, Animation),
    (0x1E, Spectate),
    (0x1F, PlayerBlockPlacement),
    (0x20, UseItem),
];

const PLAY_INBOUND_338: IdList = &[
    (0x00, TeleportConfirm),
    (0x01, TabComplete),
    (0x02, ChatMessage),
    (0x03, ClientStatus),
    (0x04, ClientSettings),
    (0x05, ConfirmTransaction),
    (0x06, EnchantItem),
    (0x07, ClickWindow),
    (0x08, CloseWindow),
    (0x09, PluginMessage),
    (0x0A, UseEntity),
    (0x0B, KeepAlive),
    (0x0C, Player),
    (0x0D, PlayerPosition),
    (0x0E, PlayerPositionAndLook),
    (0x0F, PlayerLook),
    (0x10, VehicleMove),
    (0x11, SteerBoat),
    (0x12, CraftRecipeRequest),
    (0x13, PlayerAbilities),
    (0x14, PlayerDigging),
    (0x15, EntityAction),
    (0x16, SteerVehicle),
    (0x17, CraftingBookData),
    (0x18, ResourcePackStatus),
    (0x19, AdvancementTab),
    (0x1A, HeldItemChange),
    (0x1B, CreativeInventoryAction),
    (0x1C, UpdateSign),
    (0x1D, Animation),
    (0x1E, Spectate),
    (0x1F, PlayerBlockPlacement),
    (0x20, UseItem),
];

const PLAY_OUTBOUND_47: IdList = &[
    (0x00, KeepAlive),
    (0x01, JoinGame),
    (0x02, ChatMessage),
    (0x05, SpawnPosition),
    (0x06, UpdateHealth),
    (0x08, PlayerPositionAndLook),
    (0x09, HeldItemChange),
    (0x1F, SetExperience),
    (0x21, ChunkData),
    (0x2F, SetSlot),
    (0x3F, PluginMessage),
    (0x40, Disconnect),
    (0x45, Title),
    (0x47, PlayerListHeaderFooter),
];

const PLAY_OUTBOUND_107: IdList = &[
    (0x1F, KeepAlive),
    (0x23, JoinGame),
    (0x0F, ChatMessage),
    (0x43, SpawnPosition),
    (0x3E, UpdateHealth),
    (0x2E, PlayerPositionAndLook),
    (0x37, HeldItemChange),
    (0x3D, SetExperience),
    (0x20, ChunkData),
    (0x16, SetSlot),
    (0x18, PluginMessage),
    (0x1A, Disconnect),
    (0x45, Title),
    (0x48, PlayerListHeaderFooter),
];

const PLAY_OUTBOUND_110: IdList = &[
    (0x1F, KeepAlive),
    (0x23, JoinGame),
    (0x0F, ChatMessage),
    (0x43, SpawnPosition),
    (0x3E, UpdateHealth),
    (0x2E, PlayerPositionAndLook),
    (0x37, HeldItemChange),
    (0x3D, SetExperience),
    (0x20, ChunkData),
    (0x16, SetSlot),
    (0x18, PluginMessage),
    (0x1A, Disconnect),
    (0x45, Title),
    (0x47, PlayerListHeaderFooter),
];

const PLAY_OUTBOUND_335: IdList = &[
    (0x1F, KeepAlive),
    (0x23, JoinGame),
    (0x0F, ChatMessage),
    (0x45, SpawnPosition),
    (0x40, UpdateHealth),
    (0x2E, PlayerPositionAndLook),
    (0x39, HeldItemChange),
    (0x3F, SetExperience),
    (0x20, ChunkData),
    (0x16, SetSlot),
    (0x18, PluginMessage),
    (0x1A, Disconnect),
    (0x47, Title),
    (0x49, PlayerListHeaderFooter),
];

const PLAY_OUTBOUND_338: IdList = &[
    (0x1F, KeepAlive),
    (0x23, JoinGame),
    (0x0F, ChatMessage),
    (0x46, SpawnPosition),
    (0x41, UpdateHealth),
    (0x2F, PlayerPositionAndLook),
    (0x3A, HeldItemChange),
    (0x40, SetExperience),
    (0x20, ChunkData),
    (0x16, SetSlot),
    (0x18, PluginMessage),
    (0x1A, Disconnect),
    (0x48, Title),
    (0x4A, PlayerListHeaderFooter),
];

const fn layout(
    join: JoinLayout,
    chunk: ChunkLayout,
    title_times_action: i32,
    keep_alive: KeepAliveLayout,
) -> VersionLayout {
    VersionLayout {
        join,
        chunk,
        title_times_action,
        keep_alive,
    }
}

/// Every supported protocol version.
pub const VERSION_ROWS: &[VersionRow] = &[
    VersionRow {
        versions: &[47],
        play_inbound: PLAY_INBOUND_47,
        play_outbound: PLAY_OUTBOUND_47,
        layout: layout(JoinLayout::Classic, ChunkLayout::ShortMask, 2, KeepAliveLayout::VarInt),
    },
    VersionRow {
        versions: &[107],
        play_inbound: PLAY_INBOUND_107,
        play_outbound: PLAY_OUTBOUND_107,
        layout: layout(JoinLayout::TeleportId, ChunkLayout::VarIntMask, 2, KeepAliveLayout::VarInt),
    },
    VersionRow {
        versions: &[108, 109],
        play_inbound: PLAY_INBOUND_107,
        play_outbound: PLAY_OUTBOUND_107,
        layout: layout(JoinLayout::IntDimension, ChunkLayout::VarIntMask, 2, KeepAliveLayout::VarInt),
    },
    VersionRow {
        versions: &[110, 210],
        play_inbound: PLAY_INBOUND_107,
        play_outbound: PLAY_OUTBOUND_110,
        layout: layout(JoinLayout::IntDimension, ChunkLayout::BlockEntities, 2, KeepAliveLayout::VarInt),
    },
    VersionRow {
        versions: &[315, 316],
        play_inbound: PLAY_INBOUND_107,
        play_outbound: PLAY_OUTBOUND_110,
        layout: layout(JoinLayout::IntDimension, ChunkLayout::BlockEntities, 3, KeepAliveLayout::VarInt),
    },
    VersionRow {
        versions: &[335],
        play_inbound: PLAY_INBOUND_335,
        play_outbound: PLAY_OUTBOUND_335,
        layout: layout(JoinLayout::IntDimension, ChunkLayout::BlockEntities, 3, KeepAliveLayout::VarInt),
    },
    VersionRow {
        versions: &[338],
        play_inbound: PLAY_INBOUND_338,
        play_outbound: PLAY_OUTBOUND_338,
        layout: layout(JoinLayout::IntDimension, ChunkLayout::BlockEntities, 3, KeepAliveLayout::VarInt),
    },
    VersionRow {
        versions: &[340],
        play_inbound: PLAY_INBOUND_338,
        play_outbound: PLAY_OUTBOUND_338,
        layout: layout(JoinLayout::IntDimension, ChunkLayout::BlockEntities, 3, KeepAliveLayout::Long),
    },
];

// ============================================================================
// Lookup
// ============================================================================

/// Raised when table data is not a bijection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("packet id {id:#04x} listed twice for {scope}")]
    DuplicateId { scope: String, id: i32 },
    #[error("packet {name} listed twice for {scope}")]
    DuplicateName { scope: String, name: PacketName },
    #[error("protocol version {0} listed in more than one row")]
    DuplicateVersion(i32),
}

/// Both directions of one (phase, direction) id list.
#[derive(Debug, Default)]
struct IdMap {
    by_id: HashMap<i32, PacketName>,
    by_name: HashMap<PacketName, i32>,
}

impl IdMap {
    fn build(list: IdList, scope: &str) -> Result<Self, TableError> {
        let mut map = IdMap::default();
        for &(id, name) in list {
            if map.by_id.insert(id, name).is_some() {
                return Err(TableError::DuplicateId {
                    scope: scope.to_string(),
                    id,
                });
            }
            if map.by_name.insert(name, id).is_some() {
                return Err(TableError::DuplicateName {
                    scope: scope.to_string(),
                    name,
                });
            }
        }
        Ok(map)
    }
}

#[derive(Debug)]
struct PlayMaps {
    inbound: IdMap,
    outbound: IdMap,
    layout: VersionLayout,
}

/// Immutable packet identifier table, shared by every connection.
#[derive(Debug)]
pub struct PacketTable {
    common: HashMap<(ConnectionPhase, Direction), IdMap>,
    play: HashMap<i32, PlayMaps>,
}

impl PacketTable {
    /// Builds the table for every version in [`VERSION_ROWS`].
    pub fn standard() -> Result<Self, TableError> {
        Self::from_rows(VERSION_ROWS)
    }

    /// Builds a table from version rows, checking every list is a bijection.
    pub fn from_rows(rows: &[VersionRow]) -> Result<Self, TableError> {
        let common_lists: [(ConnectionPhase, Direction, IdList); 5] = [
            (ConnectionPhase::Handshake, Direction::Inbound, HANDSHAKE_INBOUND),
            (ConnectionPhase::Status, Direction::Inbound, STATUS_INBOUND),
            (ConnectionPhase::Status, Direction::Outbound, STATUS_OUTBOUND),
            (ConnectionPhase::Login, Direction::Inbound, LOGIN_INBOUND),
            (ConnectionPhase::Login, Direction::Outbound, LOGIN_OUTBOUND),
        ];

        let mut common = HashMap::new();
        for (phase, direction, list) in common_lists {
            let scope = format!("{}/{}", phase, direction);
            common.insert((phase, direction), IdMap::build(list, &scope)?);
        }

        let mut play = HashMap::new();
        for row in rows {
            for &version in row.versions {
                let maps = PlayMaps {
                    inbound: IdMap::build(row.play_inbound, &format!("{}/play/inbound", version))?,
                    outbound: IdMap::build(row.play_outbound, &format!("{}/play/outbound", version))?,
                    layout: row.layout,
                };
                if play.insert(version, maps).is_some() {
                    return Err(TableError::DuplicateVersion(version));
                }
            }
        }

        Ok(Self { common, play })
    }

    fn id_map(&self, version: i32, phase: ConnectionPhase, direction: Direction) -> Option<&IdMap> {
        match phase {
            ConnectionPhase::Play => self.play.get(&version).map(|maps| match direction {
                Direction::Inbound => &maps.inbound,
                Direction::Outbound => &maps.outbound,
            }),
            _ => self.common.get(&(phase, direction)),
        }
    }

    /// Identifier → name.
    pub fn resolve_name(
        &self,
        version: i32,
        phase: ConnectionPhase,
        direction: Direction,
        id: i32,
    ) -> Result<PacketName, ProtocolError> {
        self.id_map(version, phase, direction)
            .and_then(|map| map.by_id.get(&id).copied())
            .ok_or_else(|| ProtocolError::UnresolvedPacket {
                version,
                phase,
                direction,
                packet: format!("{:#04x}", id),
            })
    }

    /// Name → identifier.
    pub fn resolve_id(
        &self,
        version: i32,
        phase: ConnectionPhase,
        direction: Direction,
        name: PacketName,
    ) -> Result<i32, ProtocolError> {
        self.id_map(version, phase, direction)
            .and_then(|map| map.by_name.get(&name).copied())
            .ok_or_else(|| ProtocolError::UnresolvedPacket {
                version,
                phase,
                direction,
                packet: name.as_str().to_string(),
            })
    }

    /// Layout selectors, or `None` for a version the table does not carry.
    pub fn layout(&self, version: i32) -> Option<VersionLayout> {
        self.play.get(&version).map(|maps| maps.layout)
    }

    pub fn supports(&self, version: i32) -> bool {
        self.play.contains_key(&version)
    }

    /// Supported versions in ascending order.
    pub fn versions(&self) -> Vec<i32> {
        let mut versions: Vec<i32> = self.play.keys().copied().collect();
        versions.sort_unstable();
        versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PacketTable {
        PacketTable::standard().unwrap()
    }

    #[test]
    fn test_carries_known_versions() {
        assert_eq!(
            table().versions(),
            vec![47, 107, 108, 109, 110, 210, 315, 316, 335, 338, 340]
        );
    }

    #[test]
    fn test_play_tables_round_trip() {
        let table = table();
        for version in table.versions() {
            for direction in [Direction::Inbound, Direction::Outbound] {
                let map = table.id_map(version, ConnectionPhase::Play, direction).unwrap();
                for (&id, &name) in &map.by_id {
                    assert_eq!(
                        table.resolve_id(version, ConnectionPhase::Play, direction, name).unwrap(),
                        id
                    );
                    assert_eq!(
                        table.resolve_name(version, ConnectionPhase::Play, direction, id).unwrap(),
                        name
                    );
                }
            }
        }
    }

    #[test]
    fn test_same_name_differs_across_versions() {
        let table = table();
        let chat = |v| table.resolve_id(v, ConnectionPhase::Play, Direction::Outbound, ChatMessage).unwrap();
        assert_eq!(chat(47), 0x02);
        assert_eq!(chat(340), 0x0F);

        let held = |v| {
            table
                .resolve_name(v, ConnectionPhase::Play, Direction::Inbound, 0x1A)
                .unwrap()
        };
        assert_eq!(held(335), HeldItemChange);
        assert_eq!(held(107), Animation);
    }

    #[test]
    fn test_common_phases_answer_for_unknown_versions() {
        let table = table();
        assert_eq!(
            table.resolve_name(9999, ConnectionPhase::Status, Direction::Inbound, 0x00).unwrap(),
            StatusRequest
        );
        assert!(!table.supports(9999));
        assert!(table.layout(9999).is_none());
        assert!(matches!(
            table.resolve_name(9999, ConnectionPhase::Play, Direction::Inbound, 0x00),
            Err(ProtocolError::UnresolvedPacket { .. })
        ));
    }

    #[test]
    fn test_inbound_name_has_no_outbound_id() {
        let table = table();
        assert!(table
            .resolve_id(340, ConnectionPhase::Play, Direction::Outbound, TeleportConfirm)
            .is_err());
    }

    #[test]
    fn test_layout_selectors() {
        let table = table();
        assert_eq!(table.layout(47).unwrap().join, JoinLayout::Classic);
        assert_eq!(table.layout(107).unwrap().join, JoinLayout::TeleportId);
        assert!(table.layout(108).unwrap().join.int_dimension());
        assert_eq!(table.layout(109).unwrap().chunk, ChunkLayout::VarIntMask);
        assert_eq!(table.layout(110).unwrap().chunk, ChunkLayout::BlockEntities);
        assert_eq!(table.layout(210).unwrap().title_times_action, 2);
        assert_eq!(table.layout(315).unwrap().title_times_action, 3);
        assert_eq!(table.layout(338).unwrap().keep_alive, KeepAliveLayout::VarInt);
        assert_eq!(table.layout(340).unwrap().keep_alive, KeepAliveLayout::Long);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        const BAD: IdList = &[(0x00, KeepAlive), (0x00, ChatMessage)];
        let rows = [VersionRow {
            versions: &[1],
            play_inbound: BAD,
            play_outbound: PLAY_OUTBOUND_47,
            layout: VERSION_ROWS[0].layout,
        }];
        assert!(matches!(
            PacketTable::from_rows(&rows),
            Err(TableError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_duplicate_versions_are_rejected() {
        let rows = [
            VersionRow {
                versions: &[47],
                play_inbound: PLAY_INBOUND_47,
                play_outbound: PLAY_OUTBOUND_47,
                layout: VERSION_ROWS[0].layout,
            },
            VersionRow {
                versions: &[47],
                play_inbound: PLAY_INBOUND_47,
                play_outbound: PLAY_OUTBOUND_47,
                layout: VERSION_ROWS[0].layout,
            },
        ];
        assert_eq!(
            PacketTable::from_rows(&rows).unwrap_err(),
            TableError::DuplicateVersion(47)
        );
    }
}
