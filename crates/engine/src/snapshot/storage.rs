use std::collections::VecDeque;
use std::time::Instant;

use crate::net::Tick;

use super::item::Snapshot;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub tick: Tick,
    pub tagtime: Instant,
    pub snapshot: Snapshot,
    pub alt_snapshot: Option<Snapshot>,
}

impl HistoryEntry {
    pub fn size(&self) -> usize {
        self.snapshot.data_size()
    }
}

#[derive(Debug, Default)]
pub struct SnapshotStorage {
    entries: VecDeque<HistoryEntry>,
}

impl SnapshotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn add(
        &mut self,
        tick: Tick,
        tagtime: Instant,
        snapshot: Snapshot,
        alt_snapshot: Option<Snapshot>,
    ) {
        debug_assert!(
            self.entries.back().is_none_or(|last| last.tick < tick),
            "snapshot history must grow by tick"
        );
        self.entries.push_back(HistoryEntry {
            tick,
            tagtime,
            snapshot,
            alt_snapshot,
        });
    }

    pub fn get(&self, tick: Tick) -> Option<&HistoryEntry> {
        self.entries
            .binary_search_by_key(&tick, |entry| entry.tick)
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn purge_until(&mut self, tick: Tick) {
        while self.entries.front().is_some_and(|entry| entry.tick < tick) {
            self.entries.pop_front();
        }
    }

    pub fn purge_all(&mut self) {
        self.entries.clear();
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn oldest_tick(&self) -> Option<Tick> {
        self.entries.front().map(|entry| entry.tick)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
