pub mod config;
pub mod hooks;
pub mod id_pool;
pub mod idmap;
pub mod net;
pub mod participant;
pub mod recorder;
pub mod server;
pub mod snapshot;
pub mod world;

pub use config::{ConfigError, CoreConfig};
pub use hooks::{HookKind, HookOutcome, Hooks};
pub use id_pool::{IdPool, IdPoolError};
pub use idmap::{ChatMsg, ClientIdMap, EmoticonMsg, IdMapError, KillMsg, Presence};
pub use net::{
    ClientId, ClientSupport, GameMsg, MAX_CLIENTS, MAX_SNAPSHOT_CHUNK, MsgFlags, MsgPacker, NetworkStats, PackError,
    QueueTransport, SendFlags, SentChunk, Slot, SlotRange, SystemMsg, Tick, Transport, Unpacker,
};
pub use participant::{AuthLevel, ClientState, Participant, Participants, SnapRate};
pub use recorder::{MemoryRecorder, SnapshotRecorder};
pub use server::{ClientInfo, ServerCore, ServerError, TickReport};
pub use snapshot::{
    DeltaError, ReceiveError, ReceiveOutcome, Snapshot, SnapshotBuilder, SnapshotDelta,
    SnapshotError, SnapshotItem, SnapshotReceiver, SnapshotStorage,
};
pub use world::{Character, GameWorld, SnapContext};
