//! Core infrastructure event handlers.

use crate::error::ServerError;
use gate_event_system::{
    names, ClientConnectionRef, EventBusBuilder, PlayerCommandEvent, PlayerJoinEvent,
    PlayerLeaveEvent,
};
use tracing::info;

/// Registers the logging handlers for connection events.
///
/// These provide infrastructure logging only; anything a player sees comes
/// from plugins.
pub fn register_core_handlers(events: &mut EventBusBuilder) -> Result<(), ServerError> {
    events
        .on(names::PLAYER_JOIN, |event: PlayerJoinEvent, _client: &ClientConnectionRef| {
            info!(
                "👋 {} joined on server with protocol {} from {}",
                event.username, event.protocol_version, event.remote_addr
            );
            Ok(())
        })
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    events
        .on(names::PLAYER_LEAVE, |event: PlayerLeaveEvent, _client: &ClientConnectionRef| {
            info!("👋 {} left the server", event.username);
            Ok(())
        })
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    events
        .on(names::PLAYER_COMMAND, |event: PlayerCommandEvent, client: &ClientConnectionRef| {
            info!(
                "⌨️ {} issued server command: /{} {}",
                client.display_name(),
                event.command,
                event.args.join(" ")
            );
            Ok(())
        })
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_handlers_bind_connection_events() {
        let mut events = EventBusBuilder::new();
        register_core_handlers(&mut events).unwrap();
        let bus = events.build();

        assert_eq!(bus.handler_count(names::PLAYER_JOIN), 1);
        assert_eq!(bus.handler_count(names::PLAYER_LEAVE), 1);
        assert_eq!(bus.handler_count(names::PLAYER_COMMAND), 1);
        assert_eq!(bus.handler_count(names::PACKET_RECEIVED), 0);
    }
}
