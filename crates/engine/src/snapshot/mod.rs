mod builder;
mod delta;
mod item;
mod receiver;
mod storage;

pub use builder::SnapshotBuilder;
pub use delta::{DeltaError, SnapshotDelta};
pub use item::{
    MAX_ID, MAX_ITEMS, MAX_SIZE, MAX_TYPE, Snapshot, SnapshotError, SnapshotItem, item_key,
};
pub use receiver::{ReceiveError, ReceiveOutcome, SnapshotReceiver};
pub use storage::{HistoryEntry, SnapshotStorage};
