use crate::net::Tick;
use crate::snapshot::Snapshot;

/// Sink for a viewer-independent copy of the game stream.
pub trait SnapshotRecorder {
    fn is_recording(&self) -> bool;

    fn record_snapshot(&mut self, tick: Tick, snapshot: &Snapshot);

    fn record_message(&mut self, data: &[u8]);
}

#[derive(Debug, Default)]
pub struct MemoryRecorder {
    pub recording: bool,
    pub snapshots: Vec<(Tick, Snapshot)>,
    pub messages: Vec<Vec<u8>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self {
            recording: true,
            ..Self::default()
        }
    }
}

impl SnapshotRecorder for MemoryRecorder {
    fn is_recording(&self) -> bool {
        self.recording
    }

    fn record_snapshot(&mut self, tick: Tick, snapshot: &Snapshot) {
        self.snapshots.push((tick, snapshot.clone()));
    }

    fn record_message(&mut self, data: &[u8]) {
        self.messages.push(data.to_vec());
    }
}
