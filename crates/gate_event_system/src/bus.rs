/// Event bus registration and publishing
use crate::client::ClientConnectionRef;
use crate::{Event, EventError, EventHandler, TypedEventHandler};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

type HandlerList = Vec<Arc<dyn EventHandler>>;

/// Mutable registry used during startup.
///
/// Handlers bound to the same name keep their registration order; that order
/// is the order [`EventBus::publish`] invokes them in.
#[derive(Default)]
pub struct EventBusBuilder {
    handlers: HashMap<String, HandlerList>,
    total_handlers: usize,
}

impl std::fmt::Debug for EventBusBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBusBuilder")
            .field("event_names", &self.handlers.keys().collect::<Vec<_>>())
            .field("total_handlers", &self.total_handlers)
            .finish()
    }
}

impl EventBusBuilder {
    /// Creates a builder with no registered handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a handler to an event name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gate_event_system::*;
    ///
    /// let mut events = EventBusBuilder::new();
    /// events.on(names::PLAYER_COMMAND, |event: PlayerCommandEvent, client: &ClientConnectionRef| {
    ///     if event.command == "ping" {
    ///         client.send_chat("pong")?;
    ///     }
    ///     Ok(())
    /// }).unwrap();
    /// ```
    pub fn on<T, F>(&mut self, event_name: &str, handler: F) -> Result<(), EventError>
    where
        T: Event + 'static,
        F: Fn(T, &ClientConnectionRef) -> Result<(), EventError> + Send + Sync + 'static,
    {
        if event_name.trim().is_empty() {
            return Err(EventError::InvalidEventName(event_name.to_string()));
        }

        let handler_name = format!("{}::{}", event_name, T::type_name());
        let typed_handler: Arc<dyn EventHandler> =
            Arc::new(TypedEventHandler::new(handler_name, handler));

        self.handlers
            .entry(event_name.to_string())
            .or_default()
            .push(typed_handler);
        self.total_handlers += 1;

        debug!("📝 Registered handler for {}", event_name);
        Ok(())
    }

    /// Appends every binding from `other`, keeping its order after ours.
    pub fn merge(&mut self, other: EventBusBuilder) {
        for (name, handlers) in other.handlers {
            self.handlers.entry(name).or_default().extend(handlers);
        }
        self.total_handlers += other.total_handlers;
    }

    /// Number of handlers registered so far.
    pub fn handler_total(&self) -> usize {
        self.total_handlers
    }

    /// Freezes the registry.
    pub fn build(self) -> EventBus {
        info!(
            "🧊 Event bus frozen with {} handler(s) across {} event(s)",
            self.total_handlers,
            self.handlers.len()
        );
        EventBus {
            handlers: self.handlers,
            total_handlers: self.total_handlers,
            events_published: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
        }
    }
}

/// Outcome of one [`EventBus::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that were invoked
    pub handlers_invoked: usize,
    /// Handlers that returned an error or panicked
    pub failures: usize,
}

/// Snapshot of bus counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventBusStats {
    pub total_handlers: usize,
    pub events_published: u64,
    pub handler_failures: u64,
}

/// Immutable, process-wide name → handlers mapping.
pub struct EventBus {
    handlers: HashMap<String, HandlerList>,
    total_handlers: usize,
    events_published: AtomicU64,
    handler_failures: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &"[handlers]")
            .field("total_handlers", &self.total_handlers)
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBusBuilder::new().build()
    }
}

impl EventBus {
    /// Invokes every handler bound to `event_name`, in registration order.
    ///
    /// Failures are contained here: an `Err` or a panic from one handler is
    /// logged and counted, and the next handler still runs.
    pub fn publish<T>(&self, event_name: &str, client: &ClientConnectionRef, event: &T) -> PublishReport
    where
        T: Event,
    {
        let mut report = PublishReport::default();
        let Some(handlers) = self.handlers.get(event_name) else {
            return report;
        };

        let data = match event.serialize() {
            Ok(data) => data,
            Err(e) => {
                error!("❌ Could not serialize {} for publishing: {}", event_name, e);
                return report;
            }
        };

        self.events_published.fetch_add(1, Ordering::Relaxed);

        for handler in handlers {
            report.handlers_invoked += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(&data, client)));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(panic_info) => Some(panic_to_error(panic_info)),
            };

            if let Some(e) = failure {
                report.failures += 1;
                self.handler_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    "❌ Handler {} failed for connection {}: {}",
                    handler.handler_name(),
                    client.connection_id,
                    e
                );
            }
        }

        report
    }

    /// Number of handlers bound to `event_name`.
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.handlers.get(event_name).map_or(0, Vec::len)
    }

    /// Current counters.
    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            total_handlers: self.total_handlers,
            events_published: self.events_published.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}

/// Extracts a readable message from a panic payload.
fn panic_to_error(panic_info: Box<dyn std::any::Any + Send>) -> EventError {
    let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    EventError::HandlerPanicked(message)
}
