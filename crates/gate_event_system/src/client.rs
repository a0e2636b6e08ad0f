/// Client connection handles given to event handlers
use crate::EventError;
use std::net::SocketAddr;
use std::sync::Arc;

/// Identifier of one accepted connection, unique for the lifetime of the process.
pub type ConnectionId = u64;

/// A request a handler makes against a connection.
///
/// Actions are delivered to the owning session, which stays the only code
/// that mutates its own state or writes to its transport.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    /// Send a chat line (`&` colour markers allowed).
    Chat(String),
    /// Move the player to an absolute position.
    Teleport { x: f64, y: f64, z: f64 },
    /// Disconnect the player with a message.
    Kick(String),
    /// Show a title and subtitle.
    Title { title: String, subtitle: String },
    /// Set the player-list header and footer.
    TabList { header: String, footer: String },
    /// Select a hotbar slot (0-8).
    HeldItem(i8),
    /// Put `count` of item `item_id` into an inventory slot; `item_id` -1 clears it.
    SetSlot { slot: i16, item_id: i16, count: i8 },
}

/// Trait for delivering actions to connections - implemented by the server.
pub trait ClientResponseSender: std::fmt::Debug {
    /// Deliver an action to one connection.
    fn send_to_client(&self, connection_id: ConnectionId, action: PlayerAction) -> Result<(), String>;

    /// Deliver an action to every connection on the roster; returns how many accepted it.
    fn broadcast(&self, action: PlayerAction) -> usize;

    /// Check if a connection is still on the roster.
    fn is_connection_active(&self, connection_id: ConnectionId) -> bool;

    /// Ask the server to stop accepting connections and shut down.
    fn request_shutdown(&self);
}

/// Connection-aware client reference that provides handlers with access to the
/// connection that raised an event and methods to act on it.
#[derive(Clone)]
pub struct ClientConnectionRef {
    /// The connection this reference points at
    pub connection_id: ConnectionId,
    /// Username, once the login exchange has supplied one
    pub username: Option<String>,
    /// The remote address of the client
    pub remote_addr: SocketAddr,
    /// The protocol version negotiated during the handshake
    pub protocol_version: i32,
    response_sender: Arc<dyn ClientResponseSender + Send + Sync>,
}

impl std::fmt::Debug for ClientConnectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnectionRef")
            .field("connection_id", &self.connection_id)
            .field("username", &self.username)
            .field("remote_addr", &self.remote_addr)
            .field("protocol_version", &self.protocol_version)
            .field("response_sender", &"[response_sender]")
            .finish()
    }
}

impl ClientConnectionRef {
    /// Creates a new client connection reference
    pub fn new(
        connection_id: ConnectionId,
        username: Option<String>,
        remote_addr: SocketAddr,
        protocol_version: i32,
        response_sender: Arc<dyn ClientResponseSender + Send + Sync>,
    ) -> Self {
        Self {
            connection_id,
            username,
            remote_addr,
            protocol_version,
            response_sender,
        }
    }

    /// Username or a placeholder for connections that have not logged in.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("<unknown>")
    }

    /// Send a chat line to this client.
    pub fn send_chat(&self, message: &str) -> Result<(), EventError> {
        self.send(PlayerAction::Chat(message.to_string()))
    }

    /// Teleport this client to an absolute position.
    pub fn teleport(&self, x: f64, y: f64, z: f64) -> Result<(), EventError> {
        self.send(PlayerAction::Teleport { x, y, z })
    }

    /// Disconnect this client with a message.
    pub fn kick(&self, message: &str) -> Result<(), EventError> {
        self.send(PlayerAction::Kick(message.to_string()))
    }

    /// Show a title and subtitle to this client.
    pub fn send_title(&self, title: &str, subtitle: &str) -> Result<(), EventError> {
        self.send(PlayerAction::Title {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
        })
    }

    /// Set the player-list header and footer for this client.
    pub fn set_tab_list(&self, header: &str, footer: &str) -> Result<(), EventError> {
        self.send(PlayerAction::TabList {
            header: header.to_string(),
            footer: footer.to_string(),
        })
    }

    pub fn set_held_item(&self, slot: i8) -> Result<(), EventError> {
        self.send(PlayerAction::HeldItem(slot))
    }

    pub fn set_slot(&self, slot: i16, item_id: i16, count: i8) -> Result<(), EventError> {
        self.send(PlayerAction::SetSlot { slot, item_id, count })
    }

    /// Send a chat line to every connected player, this one included.
    pub fn broadcast_chat(&self, message: &str) -> usize {
        self.response_sender
            .broadcast(PlayerAction::Chat(message.to_string()))
    }

    /// Disconnect every connected player.
    pub fn kick_all(&self, message: &str) -> usize {
        self.response_sender
            .broadcast(PlayerAction::Kick(message.to_string()))
    }

    /// Ask the server to shut down.
    pub fn request_shutdown(&self) {
        self.response_sender.request_shutdown();
    }

    /// Check if this connection is still active
    pub fn is_active(&self) -> bool {
        self.response_sender.is_connection_active(self.connection_id)
    }

    fn send(&self, action: PlayerAction) -> Result<(), EventError> {
        self.response_sender
            .send_to_client(self.connection_id, action)
            .map_err(|e| EventError::HandlerExecution(format!("Failed to reach client: {}", e)))
    }
}
