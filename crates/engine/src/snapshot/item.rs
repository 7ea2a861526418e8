pub const MAX_SIZE: usize = 64 * 1024;
pub const MAX_ITEMS: usize = 1024;
pub const MAX_TYPE: i32 = 0x7fff;
pub const MAX_ID: i32 = 0xffff;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("item type {0} out of range")]
    InvalidType(i32),
    #[error("item id {0} out of range")]
    InvalidId(i32),
    #[error("item size {0} is not a multiple of 4")]
    UnalignedSize(usize),
    #[error("item ({type_id}, {id}) added twice")]
    DuplicateItem { type_id: i32, id: i32 },
    #[error("snapshot already holds {MAX_ITEMS} items")]
    TooManyItems,
    #[error("snapshot data would exceed {MAX_SIZE} bytes")]
    TooLarge,
}

#[inline]
pub fn item_key(type_id: i32, id: i32) -> i32 {
    (type_id << 16) | (id & 0xffff)
}

pub(crate) fn check_item(type_id: i32, id: i32, size: usize) -> Result<(), SnapshotError> {
    if !(0..=MAX_TYPE).contains(&type_id) {
        return Err(SnapshotError::InvalidType(type_id));
    }
    if !(0..=MAX_ID).contains(&id) {
        return Err(SnapshotError::InvalidId(id));
    }
    if size % 4 != 0 {
        return Err(SnapshotError::UnalignedSize(size));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotItem {
    key: i32,
    data: Vec<i32>,
}

impl SnapshotItem {
    pub(crate) fn new(key: i32, data: Vec<i32>) -> Self {
        Self { key, data }
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn type_id(&self) -> i32 {
        self.key >> 16
    }

    pub fn id(&self) -> i32 {
        self.key & 0xffff
    }

    pub fn data(&self) -> &[i32] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [i32] {
        &mut self.data
    }

    pub fn size(&self) -> usize {
        self.data.len() * 4
    }
}

/// A finished, immutable set of typed items. Items are kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    items: Vec<SnapshotItem>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_items(mut items: Vec<SnapshotItem>) -> Self {
        items.sort_unstable_by_key(|item| item.key);
        Self { items }
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[SnapshotItem] {
        &self.items
    }

    pub fn find(&self, key: i32) -> Option<&SnapshotItem> {
        self.items
            .binary_search_by_key(&key, |item| item.key)
            .ok()
            .map(|idx| &self.items[idx])
    }

    pub fn get(&self, type_id: i32, id: i32) -> Option<&SnapshotItem> {
        self.find(item_key(type_id, id))
    }

    pub fn data_size(&self) -> usize {
        self.items.iter().map(|item| 4 + item.size()).sum()
    }

    /// Wrapping sum of every payload integer.
    pub fn crc(&self) -> i32 {
        self.items
            .iter()
            .flat_map(|item| item.data.iter())
            .fold(0i32, |acc, &value| acc.wrapping_add(value))
    }
}
