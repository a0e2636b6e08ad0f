//! Wire protocol: primitive codec, framing and the packet identifier table.

pub mod codec;
pub mod frame;
pub mod packets;

pub use codec::{write_varint, ByteCursor, PacketBuilder};
pub use frame::{Frame, FrameCodec};
pub use packets::{
    ChunkLayout, ConnectionPhase, Direction, JoinLayout, KeepAliveLayout, PacketName, PacketTable,
    TableError, VersionLayout,
};
