use std::time::Instant;

use crate::net::{self, PackError, SystemMsg, Tick, Unpacker};

use super::delta::{DeltaError, SnapshotDelta};
use super::item::{MAX_SIZE, Snapshot};
use super::storage::SnapshotStorage;

const MAX_PARTS: i32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceiveError {
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error(transparent)]
    Delta(#[from] DeltaError),
    #[error("baseline snapshot for tick {0} not stored")]
    MissingBaseline(Tick),
    #[error("crc mismatch: expected {expected}, computed {actual}")]
    CrcMismatch { expected: i32, actual: i32 },
    #[error("invalid chunk {part} of {num_parts}")]
    InvalidChunk { part: i32, num_parts: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Complete(Tick),
    Partial,
    Ignored,
}

#[derive(Debug)]
struct PendingSnap {
    tick: Tick,
    offset: i32,
    crc: i32,
    parts: Vec<Option<Vec<u8>>>,
}

/// Client side of the snapshot stream: reassembles chunks, applies deltas
/// against the stored baseline and keeps a short history to delta against.
#[derive(Debug, Default)]
pub struct SnapshotReceiver {
    storage: SnapshotStorage,
    delta: SnapshotDelta,
    pending: Option<PendingSnap>,
    latest_tick: Option<Tick>,
}

impl SnapshotReceiver {
    pub fn new(delta: SnapshotDelta) -> Self {
        Self {
            delta,
            ..Self::default()
        }
    }

    pub fn latest_tick(&self) -> Option<Tick> {
        self.latest_tick
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.storage.latest().map(|entry| &entry.snapshot)
    }

    pub fn get(&self, tick: Tick) -> Option<&Snapshot> {
        self.storage.get(tick).map(|entry| &entry.snapshot)
    }

    pub fn storage(&self) -> &SnapshotStorage {
        &self.storage
    }

    pub fn reset(&mut self) {
        self.storage.purge_all();
        self.pending = None;
        self.latest_tick = None;
    }

    pub fn receive(&mut self, data: &[u8]) -> Result<ReceiveOutcome, ReceiveError> {
        let mut unpacker = Unpacker::new(data);
        let header = unpacker.header()?;
        if !header.system {
            return Ok(ReceiveOutcome::Ignored);
        }

        match SystemMsg::from_id(header.msg_id) {
            Some(SystemMsg::Snap) => self.on_snap(&mut unpacker),
            Some(SystemMsg::SnapSingle) => {
                let tick = unpacker.get_int()?;
                let offset = unpacker.get_int()?;
                let crc = unpacker.get_int()?;
                let size = read_size(&mut unpacker)?;
                let raw = unpacker.get_raw(size)?;
                self.finish(tick, offset, Some(crc), raw)
            }
            Some(SystemMsg::SnapEmpty) => {
                let tick = unpacker.get_int()?;
                let offset = unpacker.get_int()?;
                self.finish(tick, offset, None, &[])
            }
            _ => Ok(ReceiveOutcome::Ignored),
        }
    }

    fn on_snap(&mut self, unpacker: &mut Unpacker<'_>) -> Result<ReceiveOutcome, ReceiveError> {
        let tick = unpacker.get_int()?;
        let offset = unpacker.get_int()?;
        let num_parts = unpacker.get_int()?;
        let part = unpacker.get_int()?;
        let crc = unpacker.get_int()?;
        let size = read_size(unpacker)?;
        let raw = unpacker.get_raw(size)?;

        if !(1..=MAX_PARTS).contains(&num_parts) || !(0..num_parts).contains(&part) {
            return Err(ReceiveError::InvalidChunk { part, num_parts });
        }

        let restart = self.pending.as_ref().is_none_or(|pending| {
            pending.tick != tick || pending.parts.len() != num_parts as usize
        });
        if restart {
            self.pending = Some(PendingSnap {
                tick,
                offset,
                crc,
                parts: vec![None; num_parts as usize],
            });
        }

        let Some(pending) = self.pending.as_mut() else {
            return Ok(ReceiveOutcome::Partial);
        };
        pending.parts[part as usize] = Some(raw.to_vec());
        if pending.parts.iter().any(Option::is_none) {
            return Ok(ReceiveOutcome::Partial);
        }

        let Some(pending) = self.pending.take() else {
            return Ok(ReceiveOutcome::Partial);
        };
        let joined: Vec<u8> = pending.parts.into_iter().flatten().flatten().collect();
        self.finish(pending.tick, pending.offset, Some(pending.crc), &joined)
    }

    fn finish(
        &mut self,
        tick: Tick,
        offset: i32,
        crc: Option<i32>,
        raw: &[u8],
    ) -> Result<ReceiveOutcome, ReceiveError> {
        if self.latest_tick.is_some_and(|latest| tick <= latest) {
            log::debug!("dropping stale snapshot for tick {tick}");
            return Ok(ReceiveOutcome::Ignored);
        }

        let base_tick = tick.wrapping_sub(offset);
        let empty = Snapshot::empty();
        let base = if base_tick < 0 {
            &empty
        } else {
            match self.storage.get(base_tick) {
                Some(entry) => &entry.snapshot,
                None => {
                    log::warn!("snapshot {tick} references missing baseline {base_tick}");
                    return Err(ReceiveError::MissingBaseline(base_tick));
                }
            }
        };

        let delta = net::decompress(raw)?;
        let snapshot = self.delta.apply_delta(base, &delta)?;

        if let Some(expected) = crc {
            let actual = snapshot.crc();
            if actual != expected {
                return Err(ReceiveError::CrcMismatch { expected, actual });
            }
        }

        if base_tick >= 0 {
            self.storage.purge_until(base_tick);
        }
        self.storage.add(tick, Instant::now(), snapshot, None);
        self.latest_tick = Some(tick);
        Ok(ReceiveOutcome::Complete(tick))
    }
}

fn read_size(unpacker: &mut Unpacker<'_>) -> Result<usize, PackError> {
    let size = unpacker.get_int()?;
    usize::try_from(size)
        .ok()
        .filter(|&size| size <= MAX_SIZE)
        .ok_or(PackError::InvalidValue {
            field: "size",
            value: size,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::MsgPacker;
    use crate::snapshot::SnapshotBuilder;

    fn snap(value: i32) -> Snapshot {
        let mut builder = SnapshotBuilder::new();
        builder.add_item(1, 0, &[value, 7]).unwrap();
        builder.finish()
    }

    fn single(tick: Tick, offset: i32, from: &Snapshot, to: &Snapshot) -> Vec<u8> {
        let delta = SnapshotDelta::new().create_delta(from, to).unwrap();
        let raw = net::compress(&delta, usize::MAX).unwrap();
        let mut msg = MsgPacker::new(SystemMsg::SnapSingle as i32, true);
        msg.add_int(tick)
            .add_int(offset)
            .add_int(to.crc())
            .add_int(raw.len() as i32)
            .add_raw(&raw);
        msg.data().to_vec()
    }

    #[test]
    fn test_single_then_delta() {
        let mut receiver = SnapshotReceiver::default();
        let first = snap(1);
        let out = receiver.receive(&single(10, 11, &Snapshot::empty(), &first));
        assert_eq!(out, Ok(ReceiveOutcome::Complete(10)));

        let second = snap(5);
        let out = receiver.receive(&single(12, 2, &first, &second));
        assert_eq!(out, Ok(ReceiveOutcome::Complete(12)));
        assert_eq!(receiver.latest(), Some(&second));
        assert!(receiver.get(10).is_some());
    }

    #[test]
    fn test_empty_snapshot_reuses_baseline() {
        let mut receiver = SnapshotReceiver::default();
        let first = snap(3);
        receiver.receive(&single(4, 5, &Snapshot::empty(), &first)).unwrap();

        let mut msg = MsgPacker::new(SystemMsg::SnapEmpty as i32, true);
        msg.add_int(6).add_int(2);
        assert_eq!(receiver.receive(msg.data()), Ok(ReceiveOutcome::Complete(6)));
        assert_eq!(receiver.get(6), Some(&first));
    }

    #[test]
    fn test_missing_baseline_reported() {
        let mut receiver = SnapshotReceiver::default();
        let msg = single(20, 5, &snap(1), &snap(2));
        assert_eq!(receiver.receive(&msg), Err(ReceiveError::MissingBaseline(15)));
    }

    #[test]
    fn test_bad_crc_rejected() {
        let mut receiver = SnapshotReceiver::default();
        let delta = SnapshotDelta::new()
            .create_delta(&Snapshot::empty(), &snap(9))
            .unwrap();
        let raw = net::compress(&delta, usize::MAX).unwrap();
        let mut msg = MsgPacker::new(SystemMsg::SnapSingle as i32, true);
        msg.add_int(1).add_int(2).add_int(0).add_int(raw.len() as i32).add_raw(&raw);
        assert_eq!(
            receiver.receive(msg.data()),
            Err(ReceiveError::CrcMismatch {
                expected: 0,
                actual: 16
            })
        );
    }

    #[test]
    fn test_non_snapshot_messages_ignored() {
        let mut receiver = SnapshotReceiver::default();
        let msg = MsgPacker::new(SystemMsg::PingReply as i32, true);
        assert_eq!(receiver.receive(msg.data()), Ok(ReceiveOutcome::Ignored));
        let msg = MsgPacker::new(3, false);
        assert_eq!(receiver.receive(msg.data()), Ok(ReceiveOutcome::Ignored));
    }

    #[test]
    fn test_out_of_range_part_rejected() {
        let mut receiver = SnapshotReceiver::default();
        let mut msg = MsgPacker::new(SystemMsg::Snap as i32, true);
        msg.add_int(1).add_int(2).add_int(2).add_int(2).add_int(0).add_int(0);
        assert_eq!(
            receiver.receive(msg.data()),
            Err(ReceiveError::InvalidChunk {
                part: 2,
                num_parts: 2
            })
        );
    }
}
