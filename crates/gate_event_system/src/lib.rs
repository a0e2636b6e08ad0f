//! # Gate Event System
//!
//! The publish/subscribe registry that lets plugins hook into the connection
//! lifecycle of the gatekeeper server without the core depending on them.
//!
//! ## Architecture Overview
//!
//! * **Registration** happens once, at startup, through an [`EventBusBuilder`].
//!   Every plugin implements [`GatePlugin`] and binds handlers to event names.
//! * **Freezing** turns the builder into an immutable [`EventBus`] which is
//!   shared (behind an `Arc`) by every connection. There is no runtime
//!   registration and no locking on the publish path.
//! * **Publishing** invokes every handler bound to a name, in registration
//!   order, on the calling task. A handler that returns an error or panics is
//!   logged and skipped; the remaining handlers still run and the caller never
//!   sees the failure.
//!
//! ## Quick Start Example
//!
//! ```rust
//! use gate_event_system::*;
//!
//! let mut builder = EventBusBuilder::new();
//! builder
//!     .on(names::PLAYER_JOIN, |event: PlayerJoinEvent, client: &ClientConnectionRef| {
//!         client.send_chat(&format!("Hello {}!", event.username))
//!     })
//!     .expect("valid event name");
//! let bus = builder.build();
//! assert_eq!(bus.handler_count(names::PLAYER_JOIN), 1);
//! ```
//!
//! Handlers receive a [`ClientConnectionRef`] for the connection that raised
//! the event; it is the only way plugin code can act on a player.

use serde::{de::DeserializeOwned, Serialize};
use std::any::{Any, TypeId};

pub mod bus;
pub mod client;
pub mod events;
pub mod utils;

pub use bus::{EventBus, EventBusBuilder, EventBusStats, PublishReport};
pub use client::{ClientConnectionRef, ClientResponseSender, ConnectionId, PlayerAction};
pub use events::*;
pub use utils::current_timestamp;

// ============================================================================
// Event Traits
// ============================================================================

/// Core trait that all events must implement.
///
/// Events cross the publish boundary in serialized form so that every handler
/// receives its own copy and a misbehaving handler cannot observe or corrupt
/// what another handler sees.
pub trait Event: Send + Sync + Any + std::fmt::Debug {
    /// Returns the type name of this event for debugging and routing.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Serializes the event to bytes.
    fn serialize(&self) -> Result<Vec<u8>, EventError>;

    /// Deserializes an event from bytes.
    fn deserialize(data: &[u8]) -> Result<Self, EventError>
    where
        Self: Sized;

    /// Returns a reference to this event as `&dyn Any` for dynamic typing.
    fn as_any(&self) -> &dyn Any;
}

/// Any serde-capable type is an event, carried as JSON.
///
/// ```rust
/// #[derive(Debug, serde::Serialize, serde::Deserialize)]
/// struct MyEvent {
///     data: String,
/// }
/// // MyEvent now implements Event automatically!
/// ```
impl<T> Event for T
where
    T: Serialize + DeserializeOwned + Send + Sync + Any + std::fmt::Debug + 'static,
{
    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }

    fn serialize(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(EventError::Serialization)
    }

    fn deserialize(data: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(data).map_err(EventError::Deserialization)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handler trait for processing published events.
///
/// Most users will not implement this trait directly, but instead register
/// closures through [`EventBusBuilder::on`], which wraps them in a
/// [`TypedEventHandler`].
pub trait EventHandler: Send + Sync {
    /// Handles an event from serialized data on behalf of `client`.
    fn handle(&self, data: &[u8], client: &ClientConnectionRef) -> Result<(), EventError>;

    /// Returns the TypeId of the event type this handler expects.
    fn expected_type_id(&self) -> TypeId;

    /// Returns a human-readable name for this handler for debugging.
    fn handler_name(&self) -> &str;
}

/// Type-safe wrapper for event handlers.
///
/// Bridges the object-safe [`EventHandler`] trait and a concrete event type,
/// decoding the serialized payload before calling the user closure.
pub struct TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T, &ClientConnectionRef) -> Result<(), EventError> + Send + Sync,
{
    handler: F,
    name: String,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T, F> TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T, &ClientConnectionRef) -> Result<(), EventError> + Send + Sync,
{
    /// Creates a new typed event handler.
    ///
    /// # Arguments
    ///
    /// * `name` - Human-readable name for debugging
    /// * `handler` - Function to handle events of type T
    pub fn new(name: String, handler: F) -> Self {
        Self {
            handler,
            name,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> EventHandler for TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T, &ClientConnectionRef) -> Result<(), EventError> + Send + Sync,
{
    fn handle(&self, data: &[u8], client: &ClientConnectionRef) -> Result<(), EventError> {
        let event = T::deserialize(data)?;
        (self.handler)(event, client)
    }

    fn expected_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Plugin Contract
// ============================================================================

/// The registration contract every plugin unit implements.
///
/// A plugin is a named, versioned bundle of event bindings. The server calls
/// [`GatePlugin::register_handlers`] exactly once, during startup, before it
/// accepts any connection; nothing a plugin does afterwards can add or
/// remove handlers.
///
/// # Examples
///
/// ```rust
/// use gate_event_system::*;
///
/// struct Motd;
///
/// impl GatePlugin for Motd {
///     fn name(&self) -> &str { "motd" }
///     fn version(&self) -> &str { "1.0.0" }
///
///     fn register_handlers(&self, events: &mut EventBusBuilder) -> Result<(), PluginError> {
///         events
///             .on(names::PLAYER_JOIN, |_: PlayerJoinEvent, client: &ClientConnectionRef| {
///                 client.send_chat("&aWelcome!")
///             })
///             .map_err(|e| PluginError::InitializationFailed(e.to_string()))
///     }
/// }
/// ```
pub trait GatePlugin: Send + Sync + 'static {
    /// Returns the unique name of this plugin.
    fn name(&self) -> &str;

    /// Returns a short description shown in startup logs.
    fn description(&self) -> &str {
        ""
    }

    /// Returns the version string of this plugin.
    fn version(&self) -> &str;

    /// Binds this plugin's handlers to event names.
    fn register_handlers(&self, events: &mut EventBusBuilder) -> Result<(), PluginError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while registering, publishing or handling events.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Serialization failed when converting event to bytes
    #[error("Serialization error: {0}")]
    Serialization(serde_json::Error),
    /// Deserialization failed when converting bytes to event
    #[error("Deserialization error: {0}")]
    Deserialization(serde_json::Error),
    /// Handlers must be bound to a non-empty event name
    #[error("Invalid event name: {0:?}")]
    InvalidEventName(String),
    /// Handler execution failed during event processing
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
    /// Handler panicked while processing an event
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),
}

/// Errors raised while loading plugins.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Plugin initialization failed during startup
    #[error("Plugin initialization failed: {0}")]
    InitializationFailed(String),
    /// Requested plugin was not found
    #[error("Plugin not found: {0}")]
    NotFound(String),
    /// Runtime error such as panic or system failure
    #[error("Plugin runtime error: {0}")]
    Runtime(String),
}

impl From<EventError> for PluginError {
    fn from(err: EventError) -> Self {
        PluginError::InitializationFailed(err.to_string())
    }
}
