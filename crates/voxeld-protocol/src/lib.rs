pub mod bitpack;
pub mod buffer;
pub mod codec;
pub mod connection;
pub mod framing;
pub mod metadata;
pub mod packets;
pub mod wire_ids;

pub use buffer::Buffer;
pub use codec::{CodecError, CodecResult, Cursor};
pub use connection::{Connection, ConnectionReader, ConnectionWriter};
pub use framing::{PacketReader, ReaderEvent, MAX_PAYLOAD};
