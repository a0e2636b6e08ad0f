//! Shared roster of logged-in players.
//!
//! The roster is the only state shared between connections. Each entry holds
//! the channel into the owning session; broadcasts snapshot the entries
//! before sending so a concurrent join or leave cannot disturb the walk.

use dashmap::DashMap;
use gate_event_system::{ClientResponseSender, ConnectionId, PlayerAction};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Channel into one session.
pub type CommandSender = mpsc::UnboundedSender<PlayerAction>;

#[derive(Debug, Clone)]
struct RosterEntry {
    username: String,
    sender: CommandSender,
}

/// Logged-in players, keyed by connection.
#[derive(Debug, Default)]
pub struct Roster {
    entries: DashMap<ConnectionId, RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, connection_id: ConnectionId, username: String, sender: CommandSender) {
        self.entries
            .insert(connection_id, RosterEntry { username, sender });
    }

    /// Removes a connection; returns its username if it was present.
    pub fn remove(&self, connection_id: ConnectionId) -> Option<String> {
        self.entries
            .remove(&connection_id)
            .map(|(_, entry)| entry.username)
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries.contains_key(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn usernames(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.value().username.clone())
            .collect()
    }

    /// Queues an action for one connection.
    pub fn send_to(&self, connection_id: ConnectionId, action: PlayerAction) -> Result<(), String> {
        let sender = self
            .entries
            .get(&connection_id)
            .map(|entry| entry.sender.clone())
            .ok_or_else(|| format!("connection {} is not on the roster", connection_id))?;
        sender
            .send(action)
            .map_err(|_| format!("connection {} is closing", connection_id))
    }

    /// Queues an action for every connection; returns how many accepted it.
    pub fn broadcast(&self, action: &PlayerAction) -> usize {
        let snapshot: Vec<(ConnectionId, CommandSender)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().sender.clone()))
            .collect();

        snapshot
            .into_iter()
            .filter(|(connection_id, sender)| {
                let delivered = sender.send(action.clone()).is_ok();
                if !delivered {
                    debug!("Skipping broadcast to closing connection {}", connection_id);
                }
                delivered
            })
            .count()
    }
}

/// The server side of [`ClientConnectionRef`](gate_event_system::ClientConnectionRef).
///
/// Handlers never touch a session directly; every action is posted to the
/// owning session's channel and applied on that session's task.
#[derive(Debug, Clone)]
pub struct RosterResponseSender {
    roster: Arc<Roster>,
    shutdown: broadcast::Sender<()>,
}

impl RosterResponseSender {
    pub fn new(roster: Arc<Roster>, shutdown: broadcast::Sender<()>) -> Self {
        Self { roster, shutdown }
    }
}

impl ClientResponseSender for RosterResponseSender {
    fn send_to_client(&self, connection_id: ConnectionId, action: PlayerAction) -> Result<(), String> {
        self.roster.send_to(connection_id, action)
    }

    fn broadcast(&self, action: PlayerAction) -> usize {
        self.roster.broadcast(&action)
    }

    fn is_connection_active(&self, connection_id: ConnectionId) -> bool {
        self.roster.contains(connection_id)
    }

    fn request_shutdown(&self) {
        debug!("Shutdown requested through the event bus");
        let _ = self.shutdown.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_skips_closed_sessions() {
        let roster = Roster::new();
        let (alive_tx, mut alive_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        roster.insert(1, "alive".to_string(), alive_tx);
        roster.insert(2, "closed".to_string(), closed_tx);
        drop(closed_rx);

        let delivered = roster.broadcast(&PlayerAction::Chat("hi".to_string()));
        assert_eq!(delivered, 1);
        assert_eq!(alive_rx.try_recv().unwrap(), PlayerAction::Chat("hi".to_string()));
    }

    #[test]
    fn test_removed_session_receives_nothing() {
        let roster = Roster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        roster.insert(1, "gone".to_string(), tx);
        assert_eq!(roster.remove(1), Some("gone".to_string()));
        assert_eq!(roster.remove(1), None);

        assert_eq!(roster.broadcast(&PlayerAction::Kick("bye".to_string())), 0);
        assert!(rx.try_recv().is_err());
        assert!(roster.send_to(1, PlayerAction::Chat("x".to_string())).is_err());
    }

    #[test]
    fn test_response_sender_routes_through_roster() {
        let roster = Arc::new(Roster::new());
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let sender = RosterResponseSender::new(roster.clone(), shutdown_tx);
        let (tx, mut rx) = mpsc::unbounded_channel();
        roster.insert(9, "alice".to_string(), tx);

        assert!(sender.is_connection_active(9));
        sender
            .send_to_client(9, PlayerAction::Teleport { x: 1.0, y: 2.0, z: 3.0 })
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerAction::Teleport { x: 1.0, y: 2.0, z: 3.0 }
        );

        sender.request_shutdown();
        assert!(shutdown_rx.try_recv().is_ok());
    }
}
