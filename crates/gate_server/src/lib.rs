//! # Gate Server
//!
//! A gatekeeper for the Minecraft Java protocol (1.8 through 1.12.2). It
//! accepts real clients, walks them through the handshake and login
//! exchange, parks them in an empty placeholder world and watches their
//! traffic until the anti-automation guard either passes them or the
//! verification deadline kicks them.
//!
//! ## Architecture Overview
//!
//! * [`protocol::codec`] - primitive wire types over a checkpointed [`ByteCursor`]
//! * [`protocol::frame`] - length-delimited frames with optional zlib compression
//! * [`protocol::packets`] - the data-driven, versioned packet identifier table
//! * [`connection::session`] - the per-connection phase state machine (sans-IO)
//! * [`connection::driver`] - the async task that feeds a session from a TCP stream
//! * [`connection::roster`] - logged-in players, used for broadcasts
//! * [`guard`] - the verification heuristic
//! * [`timers`] - per-connection periodic and one-shot timers
//! * [`server`] - the listener and accept loop
//!
//! All behaviour beyond the gatekeeping itself lives in plugins, which bind
//! handlers on the [`gate_event_system::EventBus`] handed to [`GateServer::new`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use gate_event_system::EventBusBuilder;
//! use gate_server::{GateServer, ServerConfig};
//!
//! # async fn run() -> Result<(), gate_server::ServerError> {
//! let mut events = EventBusBuilder::new();
//! gate_server::register_core_handlers(&mut events)?;
//! let server = GateServer::new(ServerConfig::default(), events.build())?;
//! server.start().await
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod guard;
pub mod protocol;
pub mod server;
pub mod timers;

pub use config::{translate_colors, GuardSettings, MessageSettings, ServerConfig};
pub use connection::{ClientSession, Roster, RosterResponseSender, SessionContext};
pub use error::{ProtocolError, ServerError};
pub use guard::GuardVerifier;
pub use protocol::{ByteCursor, ConnectionPhase, Direction, FrameCodec, PacketName, PacketTable};
pub use server::{register_core_handlers, GateServer};
pub use timers::{TimerFired, TimerRegistry};
