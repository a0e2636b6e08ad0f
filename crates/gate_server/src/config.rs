//! Server configuration types.
//!
//! [`ServerConfig`] is the immutable snapshot a [`crate::GateServer`] is
//! built from. The guard and message sections are serde-capable so the
//! binary can embed them directly in its TOML file.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// Identity handed to every player in `login_success`.
pub const PLACEHOLDER_UUID: Uuid = Uuid::from_u128(0x19e34a23_53d5_4bc2_a649_c9575ef08bb6);

/// Configuration for a gate server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_address: SocketAddr,
    /// Status-screen description; `&` colour markers are translated
    pub motd: String,
    /// Version name shown on the status screen
    pub version_name: String,
    /// Player cap shown on the status screen
    pub max_players: u32,
    /// Connections beyond this are closed on accept
    pub max_connections: usize,
    /// Time a client has to reach Play
    pub login_timeout: Duration,
    /// Period of the keep-alive timer in Play
    pub keep_alive_interval: Duration,
    /// Frames at or above this size are compressed; `None` never negotiates compression
    pub compression_threshold: Option<usize>,
    /// Emit per-packet traces
    pub debug: bool,
    pub guard: GuardSettings,
    pub messages: MessageSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 25565)),
            motd: "&dGatekeeper\n&71.8-1.12.2".to_string(),
            version_name: "1.8-1.12.2".to_string(),
            max_players: 100,
            max_connections: 1000,
            login_timeout: Duration::from_secs(30),
            keep_alive_interval: Duration::from_secs(5),
            compression_threshold: Some(256),
            debug: false,
            guard: GuardSettings::default(),
            messages: MessageSettings::default(),
        }
    }
}

/// Thresholds of the anti-automation guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    /// Period of the guard tick
    pub tick_interval_ms: u64,
    /// Packets that must be observed since entering Play
    pub min_packets: u64,
    /// The player must be at or below this height
    pub max_height: f64,
    /// Hotbar slot changes that must be observed
    pub min_slot_changes: u64,
    /// Deadline for passing, counted from Play entry
    pub timeout_secs: u64,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            min_packets: 50,
            max_height: 390.0,
            min_slot_changes: 40,
            timeout_secs: 15,
        }
    }
}

impl GuardSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Player-facing texts. `&` colour markers are allowed everywhere; the join
/// and leave templates substitute `{username}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSettings {
    pub welcome: String,
    pub title: String,
    pub subtitle: String,
    pub guard_passed: String,
    pub guard_timeout: String,
    pub login_timeout: String,
    pub server_stopped: String,
    pub join_broadcast: String,
    pub leave_broadcast: String,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            welcome: "&eWelcome! Look around while we check your connection.".to_string(),
            title: "&dVerification".to_string(),
            subtitle: "&7Switch hotbar slots and land on the ground".to_string(),
            guard_passed: "&aVerification passed!".to_string(),
            guard_timeout: "&cVerification timed out!".to_string(),
            login_timeout: "Took too long to log in!".to_string(),
            server_stopped: "Server stopped".to_string(),
            join_broadcast: "&e{username} joined on server!".to_string(),
            leave_broadcast: "&e{username} left the server!".to_string(),
        }
    }
}

impl MessageSettings {
    pub fn join_line(&self, username: &str) -> String {
        self.join_broadcast.replace("{username}", username)
    }

    pub fn leave_line(&self, username: &str) -> String {
        self.leave_broadcast.replace("{username}", username)
    }
}

/// Translates legacy `&` colour markers into the protocol's `§` escape.
pub fn translate_colors(text: &str) -> String {
    text.replace('&', "\u{00A7}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_colors() {
        assert_eq!(translate_colors("&eHi &aall"), "§eHi §aall");
        assert_eq!(translate_colors("plain"), "plain");
    }

    #[test]
    fn test_default_guard_thresholds() {
        let guard = GuardSettings::default();
        assert_eq!(guard.tick_interval(), Duration::from_millis(50));
        assert_eq!(guard.timeout(), Duration::from_secs(15));
        assert_eq!(guard.min_packets, 50);
        assert_eq!(guard.min_slot_changes, 40);
    }

    #[test]
    fn test_broadcast_templates() {
        let messages = MessageSettings::default();
        assert_eq!(messages.join_line("alice"), "&ealice joined on server!");
        assert_eq!(messages.leave_line("bob"), "&ebob left the server!");
    }

    #[test]
    fn test_placeholder_uuid_format() {
        assert_eq!(
            PLACEHOLDER_UUID.hyphenated().to_string(),
            "19e34a23-53d5-4bc2-a649-c9575ef08bb6"
        );
    }

    #[test]
    fn test_partial_guard_section_uses_defaults() {
        let guard: GuardSettings = serde_json::from_str(r#"{"min_packets": 10}"#).unwrap();
        assert_eq!(guard.min_packets, 10);
        assert_eq!(guard.timeout_secs, 15);
    }
}
