//! Async driver that connects a [`ClientSession`] to a TCP stream.
//!
//! One task per connection. The select loop multiplexes socket reads, the
//! session's timer events, actions posted by handlers and other sessions,
//! and the server shutdown signal. After each input the session's outbox is
//! written in order; once the session is closing the loop exits, the
//! session is torn down and the write half is shut down.

use crate::connection::session::{ClientSession, SessionContext};
use crate::error::ServerError;
use gate_event_system::ConnectionId;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Runs one connection to completion.
///
/// # Arguments
///
/// * `stream` - The accepted TCP stream
/// * `remote_addr` - Peer address, used for logging and events
/// * `context` - Shared configuration, packet table, event bus and roster
/// * `connection_id` - Identifier unique for the lifetime of the process
/// * `shutdown` - Server shutdown signal; connected players are kicked on it
pub async fn handle_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    context: Arc<SessionContext>,
    connection_id: ConnectionId,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let (mut session, mut timer_rx) =
        ClientSession::new(context.clone(), connection_id, remote_addr, command_tx);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    debug!("🔗 Connection {} opened from {}", connection_id, remote_addr);

    let result = loop {
        tokio::select! {
            read = reader.read(&mut buffer) => match read {
                Ok(0) => break Ok(()),
                Ok(n) => session.receive(&buffer[..n]),
                Err(e) => break Err(ServerError::Network(format!("read from {remote_addr} failed: {e}"))),
            },
            Some(fired) = timer_rx.recv() => session.handle_timer(fired),
            Some(action) = command_rx.recv() => session.handle_command(action),
            _ = shutdown.recv() => session.kick(&context.config.messages.server_stopped),
        }

        let outbound = session.take_outbound();
        if !outbound.is_empty() {
            if let Err(e) = writer.write_all(&outbound).await {
                break Err(ServerError::Network(format!(
                    "write to {remote_addr} failed: {e}"
                )));
            }
        }

        if session.is_closing() {
            break Ok(());
        }
    };

    session.teardown();
    if let Err(e) = writer.shutdown().await {
        debug!("Shutting down write half for {} failed: {}", remote_addr, e);
    }
    debug!("🔌 Connection {} from {} closed", connection_id, remote_addr);
    result
}
