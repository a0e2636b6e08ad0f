//! # Lifecycle Events
//!
//! Payload types for every event the server publishes, together with the
//! names they are published under. Plugins bind to the names in [`names`] and
//! receive the matching payload type.

use serde::{Deserialize, Serialize};

/// Event names published by the server.
pub mod names {
    /// Every inbound Play packet, after identifier resolution.
    pub const PACKET_RECEIVED: &str = "packet_received";
    /// A position update from the client.
    pub const PLAYER_MOVE: &str = "player_move";
    /// A chat line from the client, commands included.
    pub const CHAT_MESSAGE: &str = "chat_message";
    /// The login exchange completed and the player entered Play.
    pub const PLAYER_JOIN: &str = "player_join";
    /// A logged-in player's connection closed.
    pub const PLAYER_LEAVE: &str = "player_leave";
    /// A chat line starting with `/`.
    pub const PLAYER_COMMAND: &str = "player_command";
    /// The anti-automation check passed for this connection.
    pub const GUARD_PASSED: &str = "guard_passed";
}

/// Published for every inbound Play packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketReceivedEvent {
    pub packet_id: i32,
    pub packet_name: String,
}

/// Published when the client reports a new position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMoveEvent {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub on_ground: bool,
}

/// Published for every chat line, before command dispatch or broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageEvent {
    pub message: String,
}

/// Published once per connection when the player enters Play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoinEvent {
    pub username: String,
    pub protocol_version: i32,
    pub remote_addr: String,
    pub timestamp: u64,
}

/// Published when a logged-in player's connection closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeaveEvent {
    pub username: String,
    pub timestamp: u64,
}

/// Published for chat lines that start with `/`.
///
/// `command` is the first word without the slash; `args` are the remaining
/// space-separated words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCommandEvent {
    pub command: String,
    pub args: Vec<String>,
}

impl PlayerCommandEvent {
    /// Splits a command line (without the leading `/`) into word and arguments.
    pub fn parse(line: &str) -> Self {
        let mut words = line.split(' ');
        let command = words.next().unwrap_or_default().to_string();
        Self {
            command,
            args: words.map(str::to_string).collect(),
        }
    }
}

/// Published once when the guard accepts a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardPassedEvent {
    pub username: String,
    pub packets_observed: u64,
    pub slot_changes: u64,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse_splits_on_spaces() {
        let event = PlayerCommandEvent::parse("tp 1 64 -3");
        assert_eq!(event.command, "tp");
        assert_eq!(event.args, vec!["1", "64", "-3"]);
    }

    #[test]
    fn test_command_parse_without_arguments() {
        let event = PlayerCommandEvent::parse("help");
        assert_eq!(event.command, "help");
        assert!(event.args.is_empty());
    }
}
