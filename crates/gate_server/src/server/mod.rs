//! Listener, accept loop and core event handlers.

mod core;
mod handlers;

pub use self::core::GateServer;
pub use self::handlers::register_core_handlers;
