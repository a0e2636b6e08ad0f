//! Error types for the gate server.
//!
//! [`ProtocolError`] classifies everything that can go wrong while decoding
//! or dispatching client traffic. Apart from [`ProtocolError::Underrun`],
//! which only means "wait for more bytes", every variant ends the connection
//! through the kick path. [`ServerError`] covers listener and startup
//! failures and is never raised per packet.

use crate::protocol::packets::{ConnectionPhase, Direction};
use thiserror::Error;

/// Failures raised while decoding or handling client traffic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Not enough bytes are buffered yet; retry after the next read.
    #[error("Buffer underrun")]
    Underrun,

    /// The packet identifier is not legal in the current phase.
    #[error("Unexpected packet; ID: {id}; Mode: {phase}")]
    ModeMismatch { id: i32, phase: ConnectionPhase },

    /// No table entry maps this identifier (or name) for the negotiated version.
    #[error("No name known for packet: ({version}, {phase}, {direction}, {packet})")]
    UnresolvedPacket {
        version: i32,
        phase: ConnectionPhase,
        direction: Direction,
        packet: String,
    },

    /// A field could not be decoded structurally.
    #[error("Malformed field: {0}")]
    MalformedField(String),

    /// A varint ran past five bytes without terminating.
    #[error("VarInt is too long")]
    VarIntTooLong,

    /// The client announced a protocol version the packet table does not carry.
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(i32),
}

impl ProtocolError {
    /// True for the one variant that is not a failure.
    pub fn is_underrun(&self) -> bool {
        matches!(self, ProtocolError::Underrun)
    }

    /// Human-readable text sent to the client before the connection closes.
    pub fn disconnect_message(&self) -> String {
        format!("Protocol Error!\n\n{}", self)
    }
}

/// Errors raised by the listener and server bootstrap.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Network-related error (bind, accept, socket options, transport I/O)
    #[error("Network error: {0}")]
    Network(String),
    /// Internal server error (startup validation, table construction)
    #[error("Internal error: {0}")]
    Internal(String),
}
