mod packer;
mod protocol;
mod stats;
mod transport;
mod varint;

pub use packer::{MsgHeader, MsgPacker, PACKER_BUFFER_SIZE, Unpacker};
pub use protocol::{
    ClientId, ClientSupport, DDNET_MAX_CLIENTS, EXTENDED_MAX_CLIENTS, GameMsg, MAX_CLAN_LENGTH,
    MAX_CLIENTS, MAX_INPUT_SIZE, MAX_NAME_LENGTH, MAX_SNAPSHOT_CHUNK, MAX_SNAPSHOT_PACKSIZE,
    MsgFlags,
    SERVER_TICK_SPEED, SendFlags, Slot, SlotRange, SystemMsg, Tick, VANILLA_MAX_CLIENTS,
};
pub use stats::NetworkStats;
pub use transport::{QueueTransport, SentChunk, Transport};
pub use varint::{MAX_BYTES_PACKED, PackError, compress, decompress, pack, unpack};
