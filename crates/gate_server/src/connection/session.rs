//! # Client session
//!
//! [`ClientSession`] is the protocol state machine for one connection. It is
//! sans-IO: the driver feeds it received bytes, timer events and commands
//! posted by event handlers, and collects the bytes it wants written with
//! [`ClientSession::take_outbound`]. Everything it owns (cursor, codec,
//! snapshot, guard counters, timers) belongs to this connection alone.
//!
//! Phases advance Handshake → Status | Login → Play and never go back.
//! Every fatal [`ProtocolError`] funnels into one kick path: a disconnect
//! notice in the phase's native format, then close.

use crate::config::{translate_colors, ServerConfig, PLACEHOLDER_UUID};
use crate::connection::roster::{CommandSender, Roster};
use crate::error::ProtocolError;
use crate::guard::{CosmeticFrame, GuardVerifier};
use crate::protocol::codec::{ByteCursor, PacketBuilder};
use crate::protocol::frame::{Frame, FrameCodec};
use crate::protocol::packets::{
    ChunkLayout, ConnectionPhase, Direction, KeepAliveLayout, PacketName, PacketTable, VersionLayout,
};
use crate::timers::{TimerFired, TimerId, TimerRegistry};
use gate_event_system::{
    current_timestamp, names, ChatMessageEvent, ClientConnectionRef, ClientResponseSender,
    ConnectionId, Event, EventBus, GuardPassedEvent, PacketReceivedEvent, PlayerAction,
    PlayerCommandEvent, PlayerJoinEvent, PlayerLeaveEvent, PlayerMoveEvent,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Where every player appears.
pub const SPAWN_POSITION: (f64, f64, f64) = (0.0, 400.0, 0.0);
const SPAWN_YAW: f32 = -90.0;
const SPAWN_PITCH: f32 = 0.0;

const PLAYER_ENTITY_ID: i32 = 1;
const GAMEMODE_SURVIVAL: u8 = 0;
const DIMENSION_OVERWORLD: i32 = 0;
const DIFFICULTY_PEACEFUL: u8 = 0;
const LEVEL_TYPE: &str = "flat";

const TITLE_FADE_IN: i32 = 10;
const TITLE_STAY: i32 = 70;
const TITLE_FADE_OUT: i32 = 20;

const MAX_USERNAME_CHARS: usize = 16;
const HOTBAR_SLOTS: std::ops::Range<i16> = 0..9;

/// Timers a session arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTimer {
    LoginTimeout,
    KeepAlive,
    GuardTick,
    VerificationTimeout,
}

/// What the client last told us about itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub on_ground: bool,
    pub slot: i16,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        let (x, y, z) = SPAWN_POSITION;
        Self {
            x,
            y,
            z,
            on_ground: false,
            slot: 0,
        }
    }
}

/// Process-wide state every session reads.
pub struct SessionContext {
    pub config: ServerConfig,
    pub table: PacketTable,
    pub events: EventBus,
    pub roster: Arc<Roster>,
    pub responder: Arc<dyn ClientResponseSender + Send + Sync>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("config", &self.config)
            .field("events", &self.events)
            .field("online", &self.roster.len())
            .finish()
    }
}

impl SessionContext {
    pub fn new(
        config: ServerConfig,
        table: PacketTable,
        events: EventBus,
        roster: Arc<Roster>,
        responder: Arc<dyn ClientResponseSender + Send + Sync>,
    ) -> Self {
        Self {
            config,
            table,
            events,
            roster,
            responder,
        }
    }
}

/// Protocol state machine for one connection.
pub struct ClientSession {
    ctx: Arc<SessionContext>,
    connection_id: ConnectionId,
    remote_addr: SocketAddr,
    phase: ConnectionPhase,
    protocol_version: i32,
    layout: Option<VersionLayout>,
    username: Option<String>,
    joined: bool,
    cursor: ByteCursor,
    codec: FrameCodec,
    outbox: Vec<u8>,
    closing: bool,
    torn_down: bool,
    snapshot: PlayerSnapshot,
    guard: GuardVerifier,
    timers: TimerRegistry<SessionTimer>,
    login_timeout: Option<TimerId>,
    verification_timeout: Option<TimerId>,
    next_teleport_id: i32,
    next_keep_alive_id: i32,
    commands: CommandSender,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("connection_id", &self.connection_id)
            .field("remote_addr", &self.remote_addr)
            .field("phase", &self.phase)
            .field("protocol_version", &self.protocol_version)
            .field("username", &self.username)
            .field("closing", &self.closing)
            .finish()
    }
}

impl ClientSession {
    /// Creates a session in the Handshake phase and arms its login timeout.
    ///
    /// `commands` must be the sending half of the channel the driver reads
    /// [`PlayerAction`]s from; it is what the roster hands to other sessions
    /// and to event handlers. Must be called inside a tokio runtime.
    pub fn new(
        ctx: Arc<SessionContext>,
        connection_id: ConnectionId,
        remote_addr: SocketAddr,
        commands: CommandSender,
    ) -> (Self, UnboundedReceiver<TimerFired<SessionTimer>>) {
        let (mut timers, timer_events) = TimerRegistry::new();
        let login_timeout = timers.add_delay(ctx.config.login_timeout, SessionTimer::LoginTimeout);
        let guard = GuardVerifier::new(ctx.config.guard.clone(), SPAWN_POSITION.1);

        let session = Self {
            ctx,
            connection_id,
            remote_addr,
            phase: ConnectionPhase::Handshake,
            protocol_version: 0,
            layout: None,
            username: None,
            joined: false,
            cursor: ByteCursor::new(),
            codec: FrameCodec::new(),
            outbox: Vec::new(),
            closing: false,
            torn_down: false,
            snapshot: PlayerSnapshot::default(),
            guard,
            timers,
            login_timeout: Some(login_timeout),
            verification_timeout: None,
            next_teleport_id: 1,
            next_keep_alive_id: 1,
            commands,
        };
        (session, timer_events)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn snapshot(&self) -> &PlayerSnapshot {
        &self.snapshot
    }

    pub fn guard(&self) -> &GuardVerifier {
        &self.guard
    }

    /// True once the session has decided to close; the driver flushes and stops.
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn verification_pending(&self) -> bool {
        self.verification_timeout
            .is_some_and(|id| self.timers.is_active(id))
    }

    /// Drains the bytes queued for the transport, in send order.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbox)
    }

    fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("<unknown>")
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Feeds received bytes; every complete frame is handled in order.
    pub fn receive(&mut self, data: &[u8]) {
        if self.closing {
            return;
        }
        self.cursor.add(data);

        while !self.closing {
            match self.codec.extract_frame(&mut self.cursor) {
                Ok(frame) => {
                    if let Err(e) = self.handle_frame(frame) {
                        self.fail(e);
                    }
                }
                Err(e) if e.is_underrun() => break,
                Err(e) => self.fail(e),
            }
        }
    }

    /// Handles an event from this session's timer channel.
    pub fn handle_timer(&mut self, fired: TimerFired<SessionTimer>) {
        if self.closing || !self.timers.accept(&fired) {
            return;
        }
        let ctx = self.ctx.clone();
        let messages = &ctx.config.messages;

        let result = match fired.payload {
            SessionTimer::LoginTimeout => {
                self.login_timeout = None;
                if self.phase != ConnectionPhase::Play {
                    self.kick(&messages.login_timeout);
                }
                Ok(())
            }
            SessionTimer::KeepAlive => self.send_keep_alive(),
            SessionTimer::GuardTick => self.guard_tick(),
            SessionTimer::VerificationTimeout => {
                self.verification_timeout = None;
                if !self.guard.is_passed() {
                    info!(
                        "⏰ {} did not pass verification in time ({} packets, {} slot changes)",
                        self.display_name(),
                        self.guard.packets_observed(),
                        self.guard.slot_changes()
                    );
                    self.kick(&messages.guard_timeout);
                }
                Ok(())
            }
        };

        if let Err(e) = result {
            self.fail(e);
        }
    }

    /// Applies an action posted by an event handler or a broadcast.
    pub fn handle_command(&mut self, action: PlayerAction) {
        if self.closing {
            return;
        }
        if self.phase != ConnectionPhase::Play && !matches!(action, PlayerAction::Kick(_)) {
            debug!(
                "Dropping action for connection {} in {} phase",
                self.connection_id, self.phase
            );
            return;
        }

        let result = match action {
            PlayerAction::Kick(message) => {
                self.kick(&message);
                Ok(())
            }
            PlayerAction::Chat(text) => self.send_chat(&text),
            PlayerAction::Teleport { x, y, z } => self.send_position(x, y, z),
            PlayerAction::Title { title, subtitle } => self.send_title(&title, &subtitle),
            PlayerAction::TabList { header, footer } => self.send_tab_list(&header, &footer),
            PlayerAction::HeldItem(slot) => self.send_held_item(slot),
            PlayerAction::SetSlot {
                slot,
                item_id,
                count,
            } => self.send_set_slot(slot, item_id, count),
        };

        // The client did nothing wrong; a bad plugin action is dropped.
        if let Err(e) = result {
            warn!(
                "⚠️ Rejected plugin action for {}: {}",
                self.display_name(),
                e
            );
        }
    }

    // ========================================================================
    // Inbound dispatch
    // ========================================================================

    fn handle_frame(&mut self, frame: Frame) -> Result<(), ProtocolError> {
        if self.ctx.config.debug {
            debug!(
                "⬅️ [{}] {} packet {:#04x} ({} bytes)",
                self.connection_id,
                self.phase,
                frame.id,
                frame.body.len()
            );
        }

        let result = match self.phase {
            ConnectionPhase::Handshake => self.handle_handshake(&frame),
            ConnectionPhase::Status => self.handle_status(&frame),
            ConnectionPhase::Login => self.handle_login(&frame),
            ConnectionPhase::Play => self.handle_play(&frame),
        };

        // Inside a complete frame a short read is a structural error.
        result.map_err(|e| match e {
            ProtocolError::Underrun => {
                ProtocolError::MalformedField(format!("truncated packet {:#04x}", frame.id))
            }
            other => other,
        })
    }

    /// Resolves an inbound id; outside Play an unknown id is a phase violation.
    fn resolve_inbound(&self, id: i32) -> Result<PacketName, ProtocolError> {
        let resolved =
            self.ctx
                .table
                .resolve_name(self.protocol_version, self.phase, Direction::Inbound, id);
        match self.phase {
            ConnectionPhase::Play => resolved,
            phase => resolved.map_err(|_| ProtocolError::ModeMismatch { id, phase }),
        }
    }

    fn mode_mismatch(&self, id: i32) -> ProtocolError {
        ProtocolError::ModeMismatch {
            id,
            phase: self.phase,
        }
    }

    fn handle_handshake(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        if self.resolve_inbound(frame.id)? != PacketName::Handshake {
            return Err(self.mode_mismatch(frame.id));
        }

        let mut body = frame.reader();
        let version = body.read_varint()?;
        let server_address = body.read_string()?;
        let server_port = body.read_u16()?;
        let next_phase = match body.read_varint()? {
            1 => ConnectionPhase::Status,
            2 => ConnectionPhase::Login,
            other => {
                return Err(ProtocolError::MalformedField(format!(
                    "invalid next state {}",
                    other
                )))
            }
        };

        self.protocol_version = version;
        self.layout = self.ctx.table.layout(version);
        self.phase = next_phase;
        debug!(
            "🤝 {} handshake: protocol {}, target {}:{}, next {}",
            self.remote_addr, version, server_address, server_port, next_phase
        );
        Ok(())
    }

    fn handle_status(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        match self.resolve_inbound(frame.id)? {
            PacketName::StatusRequest => {
                let response = self.status_json();
                self.send(PacketName::StatusResponse, PacketBuilder::new().string(&response))
            }
            PacketName::StatusPing => {
                let payload = frame.reader().read_i64()?;
                self.send(PacketName::StatusPong, PacketBuilder::new().i64(payload))?;
                info!("📶 {} pinged", self.remote_addr);
                self.closing = true;
                Ok(())
            }
            _ => Err(self.mode_mismatch(frame.id)),
        }
    }

    fn status_json(&self) -> String {
        let config = &self.ctx.config;
        json!({
            "description": translate_colors(&config.motd),
            "players": {
                "max": config.max_players,
                "online": self.ctx.roster.len(),
            },
            "version": {
                "name": config.version_name,
                "protocol": self.protocol_version,
            },
        })
        .to_string()
    }

    fn handle_login(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        match self.resolve_inbound(frame.id)? {
            PacketName::LoginStart => {
                let username = frame.reader().read_string()?;
                self.complete_login(username)
            }
            PacketName::EncryptionResponse => {
                // Encryption is never requested; the hook is a pass-through.
                debug!("Ignoring encryption response from {}", self.remote_addr);
                Ok(())
            }
            _ => Err(self.mode_mismatch(frame.id)),
        }
    }

    fn complete_login(&mut self, username: String) -> Result<(), ProtocolError> {
        let layout = self.require_layout()?;
        let name_chars = username.chars().count();
        if name_chars == 0 || name_chars > MAX_USERNAME_CHARS {
            return Err(ProtocolError::MalformedField(format!(
                "username must be 1-{} characters",
                MAX_USERNAME_CHARS
            )));
        }

        let ctx = self.ctx.clone();
        if let Some(threshold) = ctx.config.compression_threshold {
            self.send(
                PacketName::SetCompression,
                PacketBuilder::new().varint(threshold as i32),
            )?;
            self.codec.enable_compression(threshold);
        }
        self.send(
            PacketName::LoginSuccess,
            PacketBuilder::new()
                .string(&PLACEHOLDER_UUID.hyphenated().to_string())
                .string(&username),
        )?;

        self.phase = ConnectionPhase::Play;
        self.joined = true;
        self.username = Some(username.clone());
        if let Some(id) = self.login_timeout.take() {
            self.timers.stop(id);
        }

        debug!(
            "Connection {} logged in as {}",
            self.connection_id, username
        );
        ctx.roster
            .insert(self.connection_id, username.clone(), self.commands.clone());
        ctx.roster
            .broadcast(&PlayerAction::Chat(ctx.config.messages.join_line(&username)));

        self.send_join_sequence(layout)?;

        self.publish(
            names::PLAYER_JOIN,
            &PlayerJoinEvent {
                username,
                protocol_version: self.protocol_version,
                remote_addr: self.remote_addr.to_string(),
                timestamp: current_timestamp(),
            },
        );

        self.timers
            .add_periodic(ctx.config.keep_alive_interval, SessionTimer::KeepAlive);
        self.timers
            .add_periodic(ctx.config.guard.tick_interval(), SessionTimer::GuardTick);
        self.verification_timeout = Some(
            self.timers
                .add_delay(ctx.config.guard.timeout(), SessionTimer::VerificationTimeout),
        );
        Ok(())
    }

    fn handle_play(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        let name = self.resolve_inbound(frame.id)?;
        self.guard.record_packet();
        self.publish(
            names::PACKET_RECEIVED,
            &PacketReceivedEvent {
                packet_id: frame.id,
                packet_name: name.to_string(),
            },
        );

        let mut body = frame.reader();
        match name {
            PacketName::PlayerPosition => {
                let (x, y, z) = (body.read_f64()?, body.read_f64()?, body.read_f64()?);
                let on_ground = body.read_bool()?;
                self.update_position(x, y, z, on_ground);
            }
            PacketName::PlayerPositionAndLook => {
                let (x, y, z) = (body.read_f64()?, body.read_f64()?, body.read_f64()?);
                let _yaw = body.read_f32()?;
                let _pitch = body.read_f32()?;
                let on_ground = body.read_bool()?;
                self.update_position(x, y, z, on_ground);
            }
            PacketName::HeldItemChange => {
                let slot = body.read_i16()?;
                if !HOTBAR_SLOTS.contains(&slot) {
                    return Err(ProtocolError::MalformedField(format!(
                        "hotbar slot {} out of range",
                        slot
                    )));
                }
                if slot != self.snapshot.slot {
                    self.guard.record_slot_change();
                }
                self.snapshot.slot = slot;
            }
            PacketName::ChatMessage => {
                let message = body.read_string()?;
                self.handle_chat(message);
            }
            _ => {}
        }
        Ok(())
    }

    fn update_position(&mut self, x: f64, y: f64, z: f64, on_ground: bool) {
        self.snapshot.x = x;
        self.snapshot.y = y;
        self.snapshot.z = z;
        self.snapshot.on_ground = on_ground;
        self.guard.record_height(y);
        self.publish(names::PLAYER_MOVE, &PlayerMoveEvent { x, y, z, on_ground });
    }

    fn handle_chat(&mut self, message: String) {
        self.publish(
            names::CHAT_MESSAGE,
            &ChatMessageEvent {
                message: message.clone(),
            },
        );

        let username = self.display_name().to_string();
        if let Some(command_line) = message.strip_prefix('/') {
            debug!("Command from {}: {}", username, command_line);
            self.publish(names::PLAYER_COMMAND, &PlayerCommandEvent::parse(command_line));
        } else {
            info!("💬 <{}> {}", username, message);
            self.ctx
                .roster
                .broadcast(&PlayerAction::Chat(format!("<{}> {}", username, message)));
        }
    }

    // ========================================================================
    // Guard
    // ========================================================================

    fn guard_tick(&mut self) -> Result<(), ProtocolError> {
        let tick = self.guard.tick();
        self.send_update_health(tick.cosmetic)?;
        self.send_set_experience(tick.cosmetic)?;
        if tick.passed_now {
            self.on_guard_passed()?;
        }
        Ok(())
    }

    fn on_guard_passed(&mut self) -> Result<(), ProtocolError> {
        if let Some(id) = self.verification_timeout.take() {
            self.timers.stop(id);
        }
        info!(
            "✅ {} passed verification after {} ms ({} packets, {} slot changes)",
            self.display_name(),
            self.guard.elapsed_ms(),
            self.guard.packets_observed(),
            self.guard.slot_changes()
        );

        let ctx = self.ctx.clone();
        self.send_chat(&ctx.config.messages.guard_passed)?;
        self.publish(
            names::GUARD_PASSED,
            &GuardPassedEvent {
                username: self.display_name().to_string(),
                packets_observed: self.guard.packets_observed(),
                slot_changes: self.guard.slot_changes(),
                elapsed_ms: self.guard.elapsed_ms(),
            },
        );
        Ok(())
    }

    // ========================================================================
    // Outbound messages
    // ========================================================================

    /// Resolves `name` for this connection's version and phase, then frames it.
    fn send(&mut self, name: PacketName, body: PacketBuilder) -> Result<(), ProtocolError> {
        let id = self.ctx.table.resolve_id(
            self.protocol_version,
            self.phase,
            Direction::Outbound,
            name,
        )?;
        let frame = self.codec.build_frame(id, body.as_bytes())?;
        self.outbox.extend_from_slice(&frame);
        Ok(())
    }

    fn require_layout(&self) -> Result<VersionLayout, ProtocolError> {
        self.layout
            .ok_or(ProtocolError::UnsupportedVersion(self.protocol_version))
    }

    fn send_join_sequence(&mut self, layout: VersionLayout) -> Result<(), ProtocolError> {
        let max_players = self.ctx.config.max_players.min(u8::MAX as u32) as u8;
        let join = PacketBuilder::new()
            .i32(PLAYER_ENTITY_ID)
            .u8(GAMEMODE_SURVIVAL);
        let join = if layout.join.int_dimension() {
            join.i32(DIMENSION_OVERWORLD)
        } else {
            join.i8(DIMENSION_OVERWORLD as i8)
        };
        let join = join
            .u8(DIFFICULTY_PEACEFUL)
            .u8(max_players)
            .string(LEVEL_TYPE)
            .bool(false);
        self.send(PacketName::JoinGame, join)?;

        let (x, y, z) = SPAWN_POSITION;
        self.send_position(x, y, z)?;
        self.send_empty_chunk(layout)?;

        let ctx = self.ctx.clone();
        let messages = &ctx.config.messages;
        self.send_chat(&messages.welcome)?;
        self.send_title(&messages.title, &messages.subtitle)
    }

    /// Column (0, 0), full, no sections, plains biomes.
    fn send_empty_chunk(&mut self, layout: VersionLayout) -> Result<(), ProtocolError> {
        let biomes = [0u8; 256];
        let chunk = PacketBuilder::new().i32(0).i32(0).bool(true);
        let chunk = match layout.chunk {
            ChunkLayout::ShortMask => chunk.u16(0).varint(biomes.len() as i32).raw(&biomes),
            ChunkLayout::VarIntMask => chunk.varint(0).varint(biomes.len() as i32).raw(&biomes),
            ChunkLayout::BlockEntities => chunk
                .varint(0)
                .varint(biomes.len() as i32)
                .raw(&biomes)
                .varint(0),
        };
        self.send(PacketName::ChunkData, chunk)
    }

    pub fn send_chat(&mut self, text: &str) -> Result<(), ProtocolError> {
        let packet = PacketBuilder::new().chat(&translate_colors(text)).i8(0);
        self.send(PacketName::ChatMessage, packet)
    }

    pub fn send_position(&mut self, x: f64, y: f64, z: f64) -> Result<(), ProtocolError> {
        let layout = self.require_layout()?;
        let mut packet = PacketBuilder::new()
            .f64(x)
            .f64(y)
            .f64(z)
            .f32(SPAWN_YAW)
            .f32(SPAWN_PITCH)
            .i8(0);
        if layout.join.has_teleport_id() {
            packet = packet.varint(self.next_teleport_id);
            self.next_teleport_id = self.next_teleport_id.wrapping_add(1);
        }
        self.send(PacketName::PlayerPositionAndLook, packet)
    }

    pub fn send_title(&mut self, title: &str, subtitle: &str) -> Result<(), ProtocolError> {
        let layout = self.require_layout()?;
        self.send(
            PacketName::Title,
            PacketBuilder::new()
                .varint(layout.title_times_action)
                .i32(TITLE_FADE_IN)
                .i32(TITLE_STAY)
                .i32(TITLE_FADE_OUT),
        )?;
        self.send(
            PacketName::Title,
            PacketBuilder::new().varint(1).chat(&translate_colors(subtitle)),
        )?;
        self.send(
            PacketName::Title,
            PacketBuilder::new().varint(0).chat(&translate_colors(title)),
        )
    }

    pub fn send_tab_list(&mut self, header: &str, footer: &str) -> Result<(), ProtocolError> {
        let packet = PacketBuilder::new()
            .chat(&translate_colors(header))
            .chat(&translate_colors(footer));
        self.send(PacketName::PlayerListHeaderFooter, packet)
    }

    pub fn send_held_item(&mut self, slot: i8) -> Result<(), ProtocolError> {
        if !HOTBAR_SLOTS.contains(&(slot as i16)) {
            return Err(ProtocolError::MalformedField(format!(
                "hotbar slot {} out of range",
                slot
            )));
        }
        self.snapshot.slot = slot as i16;
        self.send(PacketName::HeldItemChange, PacketBuilder::new().i8(slot))
    }

    /// Sets one slot of the player inventory window; `item_id` -1 empties it.
    pub fn send_set_slot(&mut self, slot: i16, item_id: i16, count: i8) -> Result<(), ProtocolError> {
        let mut packet = PacketBuilder::new().i8(0).i16(slot).i16(item_id);
        if item_id != -1 {
            // count, damage, then an empty NBT tag
            packet = packet.i8(count).i16(0).u8(0);
        }
        self.send(PacketName::SetSlot, packet)
    }

    fn send_update_health(&mut self, frame: CosmeticFrame) -> Result<(), ProtocolError> {
        let packet = PacketBuilder::new()
            .f32(frame.health)
            .varint(frame.food)
            .f32(0.0);
        self.send(PacketName::UpdateHealth, packet)
    }

    fn send_set_experience(&mut self, frame: CosmeticFrame) -> Result<(), ProtocolError> {
        let packet = PacketBuilder::new()
            .f32(frame.experience_bar)
            .varint(frame.level)
            .varint(0);
        self.send(PacketName::SetExperience, packet)
    }

    fn send_keep_alive(&mut self) -> Result<(), ProtocolError> {
        let layout = self.require_layout()?;
        let id = self.next_keep_alive_id;
        self.next_keep_alive_id = self.next_keep_alive_id.wrapping_add(1);
        let packet = match layout.keep_alive {
            KeepAliveLayout::VarInt => PacketBuilder::new().varint(id),
            KeepAliveLayout::Long => PacketBuilder::new().i64(id as i64),
        };
        self.send(PacketName::KeepAlive, packet)
    }

    // ========================================================================
    // Kick path and teardown
    // ========================================================================

    /// Sends a disconnect notice, when the phase has one, and marks the session closing.
    pub fn kick(&mut self, message: &str) {
        if self.closing {
            return;
        }
        let notice = PacketBuilder::new().chat(&translate_colors(message));
        let sent = match self.phase {
            ConnectionPhase::Login => self.send(PacketName::LoginDisconnect, notice),
            ConnectionPhase::Play => self.send(PacketName::Disconnect, notice),
            ConnectionPhase::Handshake | ConnectionPhase::Status => Ok(()),
        };
        if let Err(e) = sent {
            debug!("Could not send disconnect notice to {}: {}", self.remote_addr, e);
        }

        info!(
            "🚪 Kicked {} ({}): {}",
            self.display_name(),
            self.remote_addr,
            message.replace('\n', " ")
        );
        self.closing = true;
    }

    fn fail(&mut self, error: ProtocolError) {
        warn!(
            "⚠️ Protocol error from {} ({}): {}",
            self.display_name(),
            self.remote_addr,
            error
        );
        self.kick(&error.disconnect_message());
    }

    /// Releases everything the connection holds outside its transport.
    ///
    /// Cancels the login timeout, stops every timer, leaves the roster, then
    /// publishes `player_leave` and the leave broadcast for logged-in
    /// players. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.closing = true;

        if let Some(id) = self.login_timeout.take() {
            self.timers.stop(id);
        }
        self.verification_timeout = None;
        let stopped = self.timers.stop_all();

        if self.joined {
            let ctx = self.ctx.clone();
            ctx.roster.remove(self.connection_id);
            if let Some(username) = self.username.clone() {
                self.publish(
                    names::PLAYER_LEAVE,
                    &PlayerLeaveEvent {
                        username: username.clone(),
                        timestamp: current_timestamp(),
                    },
                );
                ctx.roster
                    .broadcast(&PlayerAction::Chat(ctx.config.messages.leave_line(&username)));
            }
        }

        debug!(
            "Connection {} ({}) torn down in {} phase, {} timer(s) stopped",
            self.connection_id, self.remote_addr, self.phase, stopped
        );
    }

    // ========================================================================
    // Events
    // ========================================================================

    fn client_ref(&self) -> ClientConnectionRef {
        ClientConnectionRef::new(
            self.connection_id,
            self.username.clone(),
            self.remote_addr,
            self.protocol_version,
            self.ctx.responder.clone(),
        )
    }

    fn publish<T: Event>(&self, event_name: &str, event: &T) {
        let client = self.client_ref();
        self.ctx.events.publish(event_name, &client, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::roster::RosterResponseSender;
    use crate::protocol::codec::write_varint;
    use gate_event_system::EventBusBuilder;
    use tokio::sync::{broadcast, mpsc};

    fn context() -> Arc<SessionContext> {
        let roster = Arc::new(Roster::new());
        let (shutdown, _) = broadcast::channel(1);
        let responder = Arc::new(RosterResponseSender::new(roster.clone(), shutdown));
        Arc::new(SessionContext::new(
            ServerConfig {
                compression_threshold: None,
                ..ServerConfig::default()
            },
            PacketTable::standard().unwrap(),
            EventBusBuilder::new().build(),
            roster,
            responder,
        ))
    }

    fn session(ctx: Arc<SessionContext>) -> ClientSession {
        let (tx, _rx) = mpsc::unbounded_channel();
        ClientSession::new(ctx, 1, "127.0.0.1:50000".parse().unwrap(), tx).0
    }

    fn frame(id: i32, body: PacketBuilder) -> Vec<u8> {
        FrameCodec::new().build_frame(id, body.as_bytes()).unwrap()
    }

    fn handshake(version: i32, next: i32) -> Vec<u8> {
        frame(
            0x00,
            PacketBuilder::new()
                .varint(version)
                .string("localhost")
                .u16(25565)
                .varint(next),
        )
    }

    fn frame_ids(bytes: Vec<u8>) -> Vec<i32> {
        let codec = FrameCodec::new();
        let mut cursor = ByteCursor::from_bytes(bytes);
        let mut ids = Vec::new();
        while let Ok(frame) = codec.extract_frame(&mut cursor) {
            ids.push(frame.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_handshake_selects_status() {
        let mut session = session(context());
        session.receive(&handshake(340, 1));
        assert_eq!(session.phase(), ConnectionPhase::Status);
        assert_eq!(session.protocol_version(), 340);
        assert!(session.take_outbound().is_empty());
    }

    #[tokio::test]
    async fn test_bad_next_state_closes_silently() {
        let mut session = session(context());
        session.receive(&handshake(340, 3));
        assert!(session.is_closing());
        assert!(session.take_outbound().is_empty());
    }

    #[tokio::test]
    async fn test_status_ping_echoes_and_closes() {
        let mut session = session(context());
        session.receive(&handshake(47, 1));
        session.receive(&frame(0x01, PacketBuilder::new().i64(0x0102_0304)));

        let out = session.take_outbound();
        let mut cursor = ByteCursor::from_bytes(out);
        let pong = FrameCodec::new().extract_frame(&mut cursor).unwrap();
        assert_eq!(pong.id, 0x01);
        assert_eq!(pong.reader().read_i64().unwrap(), 0x0102_0304);
        assert!(session.is_closing());
    }

    #[tokio::test]
    async fn test_login_sends_join_sequence() {
        let ctx = context();
        let mut session = session(ctx.clone());
        session.receive(&handshake(47, 2));
        session.receive(&frame(0x00, PacketBuilder::new().string("alice")));

        assert_eq!(session.phase(), ConnectionPhase::Play);
        assert_eq!(session.username(), Some("alice"));
        assert!(ctx.roster.contains(1));
        // login_success, join_game, position, chunk, chat, three title parts
        assert_eq!(
            frame_ids(session.take_outbound()),
            vec![0x02, 0x01, 0x08, 0x21, 0x02, 0x45, 0x45, 0x45]
        );
        assert!(session.verification_pending());
    }

    #[tokio::test]
    async fn test_unsupported_version_is_kicked_in_login() {
        let mut session = session(context());
        session.receive(&handshake(4, 2));
        session.receive(&frame(0x00, PacketBuilder::new().string("old")));

        assert!(session.is_closing());
        assert_ne!(session.phase(), ConnectionPhase::Play);
        let ids = frame_ids(session.take_outbound());
        assert_eq!(ids, vec![0x00]);
    }

    #[tokio::test]
    async fn test_wrong_id_in_handshake_is_mode_mismatch() {
        let mut session = session(context());
        let mut raw = Vec::new();
        write_varint(&mut raw, 2);
        raw.extend([0x05, 0x00]);
        session.receive(&raw);
        assert!(session.is_closing());
        assert_eq!(session.phase(), ConnectionPhase::Handshake);
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let ctx = context();
        let mut session = session(ctx.clone());
        session.receive(&handshake(340, 2));
        session.receive(&frame(0x00, PacketBuilder::new().string("bob")));
        assert!(session.active_timers() >= 3);

        session.teardown();
        assert_eq!(session.active_timers(), 0);
        assert!(!ctx.roster.contains(1));
        session.teardown();
    }
}
