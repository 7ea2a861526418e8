//! Delta encoding between two snapshots.
//!
//! A delta is a flat list of integers:
//!
//! ```text
//! num_deleted, num_updates, num_temp,
//! deleted_key * num_deleted,
//! (type, id, [size], data...) * num_updates
//! ```
//!
//! `size` (in integers) is omitted for item types registered with a static
//! size. Items present in the baseline with the same size are sent as the
//! wrapping difference to it, everything else is sent in full. A delta with
//! nothing to report is the empty list.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::item::{
    MAX_ITEMS, MAX_SIZE, Snapshot, SnapshotError, SnapshotItem, check_item, item_key,
};

const HEADER_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    #[error("delta truncated at integer {0}")]
    Truncated(usize),
    #[error("invalid delta header ({deleted} deleted, {updates} updates)")]
    InvalidHeader { deleted: i32, updates: i32 },
    #[error("item type {type_id} has static size {expected} but carries {actual} bytes")]
    StaticSizeMismatch {
        type_id: i32,
        expected: usize,
        actual: usize,
    },
    #[error("invalid item size {0}")]
    InvalidSize(i32),
    #[error(transparent)]
    Item(#[from] SnapshotError),
}

#[derive(Debug, Default, Clone)]
pub struct SnapshotDelta {
    static_sizes: HashMap<i32, usize>,
}

impl SnapshotDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fixed payload size in bytes for `type_id`, letting the
    /// encoder drop the size field for it.
    pub fn set_static_size(&mut self, type_id: i32, size: usize) {
        self.static_sizes.insert(type_id, size);
    }

    pub fn static_size(&self, type_id: i32) -> Option<usize> {
        self.static_sizes.get(&type_id).copied()
    }

    pub fn create_delta(&self, from: &Snapshot, to: &Snapshot) -> Result<Vec<i32>, DeltaError> {
        let mut deleted = Vec::new();
        for item in from.items() {
            let past_matches = to
                .find(item.key())
                .is_some_and(|cur| cur.size() == item.size());
            if !past_matches {
                deleted.push(item.key());
            }
        }

        let mut updates = Vec::new();
        let mut num_updates = 0;
        for cur in to.items() {
            let static_size = self.static_size(cur.type_id());
            if let Some(expected) = static_size
                && expected != cur.size()
            {
                return Err(DeltaError::StaticSizeMismatch {
                    type_id: cur.type_id(),
                    expected,
                    actual: cur.size(),
                });
            }

            let past = from.find(cur.key()).filter(|past| past.size() == cur.size());
            if past.is_some_and(|past| past.data() == cur.data()) {
                continue;
            }

            updates.push(cur.type_id());
            updates.push(cur.id());
            if static_size.is_none() {
                updates.push(cur.data().len() as i32);
            }
            match past {
                Some(past) => updates.extend(
                    cur.data()
                        .iter()
                        .zip(past.data())
                        .map(|(&now, &then)| now.wrapping_sub(then)),
                ),
                None => updates.extend_from_slice(cur.data()),
            }
            num_updates += 1;
        }

        if deleted.is_empty() && num_updates == 0 {
            return Ok(Vec::new());
        }

        let mut delta = Vec::with_capacity(HEADER_LEN + deleted.len() + updates.len());
        delta.push(deleted.len() as i32);
        delta.push(num_updates);
        delta.push(0);
        delta.extend(deleted);
        delta.extend(updates);
        Ok(delta)
    }

    pub fn apply_delta(&self, from: &Snapshot, delta: &[i32]) -> Result<Snapshot, DeltaError> {
        if delta.is_empty() {
            return Ok(from.clone());
        }
        let mut reader = DeltaReader { data: delta, pos: 0 };

        let num_deleted = reader.next()?;
        let num_updates = reader.next()?;
        let _num_temp = reader.next()?;
        if num_deleted < 0 || num_updates < 0 {
            return Err(DeltaError::InvalidHeader {
                deleted: num_deleted,
                updates: num_updates,
            });
        }

        let deleted: HashSet<i32> = reader.take(num_deleted as usize)?.iter().copied().collect();

        let mut items: BTreeMap<i32, Vec<i32>> = from
            .items()
            .iter()
            .filter(|item| !deleted.contains(&item.key()))
            .map(|item| (item.key(), item.data().to_vec()))
            .collect();

        for _ in 0..num_updates {
            let type_id = reader.next()?;
            let id = reader.next()?;
            let len = match self.static_size(type_id) {
                Some(size) => size / 4,
                None => {
                    let len = reader.next()?;
                    usize::try_from(len).map_err(|_| DeltaError::InvalidSize(len))?
                }
            };
            check_item(type_id, id, len * 4)?;

            let key = item_key(type_id, id);
            let payload = reader.take(len)?;
            let past = from.find(key).filter(|past| past.data().len() == len);
            let data = match past {
                Some(past) => past
                    .data()
                    .iter()
                    .zip(payload)
                    .map(|(&then, &diff)| then.wrapping_add(diff))
                    .collect(),
                None => payload.to_vec(),
            };
            items.insert(key, data);
        }

        if items.len() > MAX_ITEMS {
            return Err(SnapshotError::TooManyItems.into());
        }
        let data_size: usize = items.values().map(|data| 4 + data.len() * 4).sum();
        if data_size > MAX_SIZE {
            return Err(SnapshotError::TooLarge.into());
        }

        Ok(Snapshot::from_items(
            items
                .into_iter()
                .map(|(key, data)| SnapshotItem::new(key, data))
                .collect(),
        ))
    }
}

struct DeltaReader<'a> {
    data: &'a [i32],
    pos: usize,
}

impl<'a> DeltaReader<'a> {
    fn next(&mut self) -> Result<i32, DeltaError> {
        let value = *self.data.get(self.pos).ok_or(DeltaError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(value)
    }

    fn take(&mut self, len: usize) -> Result<&'a [i32], DeltaError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(DeltaError::Truncated(self.data.len()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}
