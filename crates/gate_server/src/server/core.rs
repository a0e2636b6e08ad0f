//! Core gate server implementation.
//!
//! This module contains the `GateServer` struct: it owns the shared session
//! context, binds the listener and runs the accept loop until shutdown.

use crate::{
    config::ServerConfig,
    connection::{handle_connection, Roster, RosterResponseSender, SessionContext},
    error::ServerError,
    protocol::PacketTable,
};
use gate_event_system::{ConnectionId, EventBus};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

const LISTEN_BACKLOG: i32 = 1024;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// The gatekeeper server.
///
/// `GateServer` owns the immutable packet table, the frozen event bus and
/// the roster, and hands them to every connection task through one shared
/// [`SessionContext`]. Gameplay-facing behaviour is left to event handlers.
pub struct GateServer {
    context: Arc<SessionContext>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,

    /// Connection tasks currently running
    active_connections: Arc<AtomicUsize>,

    next_connection_id: AtomicU64,
}

impl GateServer {
    /// Creates a server ready to be started.
    ///
    /// # Arguments
    ///
    /// * `config` - Listener, guard and message settings
    /// * `events` - The frozen event bus every connection publishes to
    pub fn new(config: ServerConfig, events: EventBus) -> Result<Self, ServerError> {
        let table = PacketTable::standard()
            .map_err(|e| ServerError::Internal(format!("Packet table is inconsistent: {e}")))?;
        let roster = Arc::new(Roster::new());
        let (shutdown_sender, _) = broadcast::channel(16);
        let responder = Arc::new(RosterResponseSender::new(
            roster.clone(),
            shutdown_sender.clone(),
        ));

        info!(
            "📚 Packet table loaded for protocol versions {:?}",
            table.versions()
        );

        Ok(Self {
            context: Arc::new(SessionContext::new(config, table, events, roster, responder)),
            shutdown_sender,
            active_connections: Arc::new(AtomicUsize::new(0)),
            next_connection_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    pub fn roster(&self) -> Arc<Roster> {
        self.context.roster.clone()
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Sender that stops the server when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_sender.clone()
    }

    /// Kicks every connection and stops the accept loop.
    pub fn shutdown(&self) {
        info!("🛑 Shutdown requested");
        let _ = self.shutdown_sender.send(());
    }

    /// Binds the configured address with `SO_REUSEADDR`.
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = self.context.config.bind_address;
        let domain = match address {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
        if let Err(e) = socket.set_reuse_address(true) {
            warn!("Failed to set SO_REUSEADDR: {}", e);
        }
        socket
            .bind(&address.into())
            .map_err(|e| ServerError::Network(format!("Bind to {address} failed: {e}")))?;
        socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::Network(format!("Non-blocking mode failed: {e}")))?;

        let std_listener: StdTcpListener = socket.into();
        TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
    }

    /// Binds and serves until shutdown.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Runs the accept loop on an already bound listener.
    ///
    /// Returns once shutdown was signalled and the running connections have
    /// drained, or the drain deadline passed.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Listener has no local address: {e}")))?;

        info!("🚀 Gatekeeper listening on {}", local_addr);
        info!(
            "🛡️ Guard: {} packets, {} slot changes, height <= {} within {}s",
            self.context.config.guard.min_packets,
            self.context.config.guard.min_slot_changes,
            self.context.config.guard.max_height,
            self.context.config.guard.timeout_secs
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.admit(stream, addr),
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = shutdown_receiver.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        drop(listener);
        self.drain().await;
        info!("Server stopped");
        Ok(())
    }

    fn admit(&self, stream: TcpStream, addr: SocketAddr) {
        let limit = self.context.config.max_connections;
        if self.active_connections() >= limit {
            warn!("🚫 Connection limit of {} reached, refusing {}", limit, addr);
            return;
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let slot = ConnectionSlot::acquire(self.active_connections.clone());
        let connection_id: ConnectionId = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let context = self.context.clone();
        let shutdown = self.shutdown_sender.subscribe();

        tokio::spawn(async move {
            let _slot = slot;
            if let Err(e) = handle_connection(stream, addr, context, connection_id, shutdown).await
            {
                debug!("Connection {} ended with error: {}", connection_id, e);
            }
        });
    }

    async fn drain(&self) {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while self.active_connections() > 0 && Instant::now() < deadline {
            sleep(DRAIN_POLL).await;
        }

        let remaining = self.active_connections();
        if remaining > 0 {
            warn!("{} connection(s) still open after shutdown", remaining);
        }
    }
}

/// Counts a running connection task until dropped.
struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    fn acquire(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self { active }
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}
