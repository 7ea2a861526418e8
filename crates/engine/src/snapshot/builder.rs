use std::collections::HashSet;

use super::item::{MAX_ITEMS, MAX_SIZE, Snapshot, SnapshotError, SnapshotItem, check_item, item_key};

#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    items: Vec<SnapshotItem>,
    keys: HashSet<i32>,
    data_size: usize,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self) {
        self.items.clear();
        self.keys.clear();
        self.data_size = 0;
    }

    /// Allocates a zeroed item of `size` bytes and returns its payload for writing.
    pub fn new_item(
        &mut self,
        type_id: i32,
        id: i32,
        size: usize,
    ) -> Result<&mut [i32], SnapshotError> {
        check_item(type_id, id, size)?;

        if self.items.len() >= MAX_ITEMS {
            return Err(SnapshotError::TooManyItems);
        }
        if self.data_size + 4 + size > MAX_SIZE {
            return Err(SnapshotError::TooLarge);
        }

        let key = item_key(type_id, id);
        if !self.keys.insert(key) {
            return Err(SnapshotError::DuplicateItem { type_id, id });
        }

        self.data_size += 4 + size;
        let idx = self.items.len();
        self.items.push(SnapshotItem::new(key, vec![0; size / 4]));
        Ok(self.items[idx].data_mut())
    }

    pub fn add_item(&mut self, type_id: i32, id: i32, data: &[i32]) -> Result<(), SnapshotError> {
        let payload = self.new_item(type_id, id, data.len() * 4)?;
        payload.copy_from_slice(data);
        Ok(())
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn finish(&mut self) -> Snapshot {
        self.keys.clear();
        self.data_size = 0;
        Snapshot::from_items(std::mem::take(&mut self.items))
    }
}
