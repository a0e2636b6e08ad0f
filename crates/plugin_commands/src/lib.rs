//! Stock commands plugin.
//!
//! Greets players when they join and answers a handful of chat commands:
//!
//! * `/help` - lists the commands
//! * `/tp x y z` - teleports the caller
//! * `/broadcast <message>` - sends a line to everyone online
//! * `/stop` - kicks everyone and shuts the server down

use gate_event_system::{
    names, ClientConnectionRef, EventBusBuilder, EventError, GatePlugin, PlayerCommandEvent,
    PlayerJoinEvent, PluginError,
};
use tracing::info;

const GREETING: &str = "Hello this message from plugin";
const TAB_HEADER: &str = "&dGatekeeper";
const TAB_FOOTER: &str = "&7Type /help for commands";
const HELP_LINES: &[&str] = &[
    "&e/tp x y z &7- teleport",
    "&e/broadcast <message> &7- message everyone",
    "&e/stop &7- stop the server",
];
const STOP_MESSAGE: &str = "Server stopped";

// ============================================================================
// Plugin
// ============================================================================

/// Join greeting plus the `help`, `tp`, `broadcast` and `stop` commands.
#[derive(Debug, Default)]
pub struct CommandsPlugin;

impl CommandsPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl GatePlugin for CommandsPlugin {
    fn name(&self) -> &str {
        "commands"
    }

    fn description(&self) -> &str {
        "join greeting and basic chat commands"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn register_handlers(&self, events: &mut EventBusBuilder) -> Result<(), PluginError> {
        events.on(names::PLAYER_JOIN, greet)?;
        events.on(names::PLAYER_COMMAND, dispatch)?;
        Ok(())
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn greet(_event: PlayerJoinEvent, client: &ClientConnectionRef) -> Result<(), EventError> {
    client.send_chat(GREETING)?;
    client.set_tab_list(TAB_HEADER, TAB_FOOTER)
}

fn dispatch(event: PlayerCommandEvent, client: &ClientConnectionRef) -> Result<(), EventError> {
    match event.command.as_str() {
        "help" => help(client),
        "tp" => teleport(&event.args, client),
        "broadcast" => broadcast(&event.args, client),
        "stop" => stop(client),
        _ => Ok(()),
    }
}

fn help(client: &ClientConnectionRef) -> Result<(), EventError> {
    for line in HELP_LINES {
        client.send_chat(line)?;
    }
    Ok(())
}

fn teleport(args: &[String], client: &ClientConnectionRef) -> Result<(), EventError> {
    let Some((x, y, z)) = parse_coordinates(args) else {
        return client.send_chat("Need 3 args: x,y,z");
    };
    client.teleport(x, y, z)?;
    client.send_chat(&format!("Teleported to X:{} Y:{} Z:{}", x, y, z))
}

/// Three finite numbers, nothing more.
fn parse_coordinates(args: &[String]) -> Option<(f64, f64, f64)> {
    let [x, y, z] = args else {
        return None;
    };
    let parse = |value: &String| value.parse::<f64>().ok().filter(|v| v.is_finite());
    Some((parse(x)?, parse(y)?, parse(z)?))
}

fn broadcast(args: &[String], client: &ClientConnectionRef) -> Result<(), EventError> {
    let message = args.join(" ");
    if message.trim().is_empty() {
        return client.send_chat("Enter your message");
    }
    client.broadcast_chat(&message);
    Ok(())
}

fn stop(client: &ClientConnectionRef) -> Result<(), EventError> {
    info!("🛑 {} has stopped the server", client.display_name());
    client.kick_all(STOP_MESSAGE);
    client.request_shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_event_system::{ClientResponseSender, ConnectionId, PlayerAction};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct RecordingSender {
        direct: Mutex<Vec<PlayerAction>>,
        broadcasts: Mutex<Vec<PlayerAction>>,
        shutdown: AtomicBool,
    }

    impl ClientResponseSender for RecordingSender {
        fn send_to_client(&self, _id: ConnectionId, action: PlayerAction) -> Result<(), String> {
            self.direct.lock().unwrap().push(action);
            Ok(())
        }

        fn broadcast(&self, action: PlayerAction) -> usize {
            self.broadcasts.lock().unwrap().push(action);
            2
        }

        fn is_connection_active(&self, _id: ConnectionId) -> bool {
            true
        }

        fn request_shutdown(&self) {
            self.shutdown.store(true, Ordering::SeqCst);
        }
    }

    fn client(sender: &Arc<RecordingSender>) -> ClientConnectionRef {
        ClientConnectionRef::new(
            1,
            Some("alice".to_string()),
            "127.0.0.1:50000".parse().unwrap(),
            47,
            sender.clone(),
        )
    }

    fn command(line: &str) -> PlayerCommandEvent {
        PlayerCommandEvent::parse(line)
    }

    fn chat(text: &str) -> PlayerAction {
        PlayerAction::Chat(text.to_string())
    }

    #[test]
    fn test_registers_join_and_command_handlers() {
        let mut events = EventBusBuilder::new();
        CommandsPlugin::new().register_handlers(&mut events).unwrap();
        let bus = events.build();
        assert_eq!(bus.handler_count(names::PLAYER_JOIN), 1);
        assert_eq!(bus.handler_count(names::PLAYER_COMMAND), 1);
    }

    #[test]
    fn test_join_greets_and_sets_tab_list() {
        let sender = Arc::new(RecordingSender::default());
        let event = PlayerJoinEvent {
            username: "alice".to_string(),
            protocol_version: 47,
            remote_addr: "127.0.0.1:50000".to_string(),
            timestamp: 0,
        };
        greet(event, &client(&sender)).unwrap();

        let direct = sender.direct.lock().unwrap();
        assert_eq!(direct[0], chat(GREETING));
        assert!(matches!(direct[1], PlayerAction::TabList { .. }));
    }

    #[test]
    fn test_tp_moves_and_confirms() {
        let sender = Arc::new(RecordingSender::default());
        dispatch(command("tp 1 64.5 -3"), &client(&sender)).unwrap();

        let direct = sender.direct.lock().unwrap();
        assert_eq!(
            direct[0],
            PlayerAction::Teleport {
                x: 1.0,
                y: 64.5,
                z: -3.0
            }
        );
        assert_eq!(direct[1], chat("Teleported to X:1 Y:64.5 Z:-3"));
    }

    #[test]
    fn test_tp_rejects_bad_arguments() {
        let sender = Arc::new(RecordingSender::default());
        for line in ["tp", "tp 1 2", "tp 1 2 3 4", "tp a b c", "tp 1 NaN 2"] {
            dispatch(command(line), &client(&sender)).unwrap();
        }

        let direct = sender.direct.lock().unwrap();
        assert_eq!(direct.len(), 5);
        assert!(direct.iter().all(|action| *action == chat("Need 3 args: x,y,z")));
    }

    #[test]
    fn test_broadcast_requires_a_message() {
        let sender = Arc::new(RecordingSender::default());
        dispatch(command("broadcast"), &client(&sender)).unwrap();
        dispatch(command("broadcast hello  world"), &client(&sender)).unwrap();

        assert_eq!(*sender.direct.lock().unwrap(), vec![chat("Enter your message")]);
        assert_eq!(
            *sender.broadcasts.lock().unwrap(),
            vec![chat("hello  world")]
        );
    }

    #[test]
    fn test_stop_kicks_everyone_then_shuts_down() {
        let sender = Arc::new(RecordingSender::default());
        dispatch(command("stop"), &client(&sender)).unwrap();

        assert_eq!(
            *sender.broadcasts.lock().unwrap(),
            vec![PlayerAction::Kick(STOP_MESSAGE.to_string())]
        );
        assert!(sender.shutdown.load(Ordering::SeqCst));
    }

    #[test]
    fn test_help_and_unknown_commands() {
        let sender = Arc::new(RecordingSender::default());
        dispatch(command("help"), &client(&sender)).unwrap();
        assert_eq!(sender.direct.lock().unwrap().len(), HELP_LINES.len());

        dispatch(command("fly"), &client(&sender)).unwrap();
        assert_eq!(sender.direct.lock().unwrap().len(), HELP_LINES.len());
    }
}
