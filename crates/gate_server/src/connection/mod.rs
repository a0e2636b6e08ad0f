//! Connection handling: the per-connection state machine, its async driver
//! and the shared roster of logged-in players.

pub mod driver;
pub mod roster;
pub mod session;

pub use driver::handle_connection;
pub use roster::{CommandSender, Roster, RosterResponseSender};
pub use session::{ClientSession, PlayerSnapshot, SessionContext, SessionTimer, SPAWN_POSITION};
