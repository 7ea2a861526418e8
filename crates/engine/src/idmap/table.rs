use crate::net::{ClientId, MAX_CLIENTS, Slot, SlotRange};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdMapError {
    #[error("slot {slot} outside of range 0..{count}")]
    SlotOutOfRange { slot: Slot, count: usize },
    #[error("slot {slot} already shows client {occupant}")]
    SlotOccupied { slot: Slot, occupant: ClientId },
    #[error("client {client_id} already shown at slot {slot}")]
    AlreadyMapped { client_id: ClientId, slot: Slot },
    #[error("client id {0} out of range")]
    ClientOutOfRange(ClientId),
}

/// One viewer's bijection between internal client ids and the display slots
/// its protocol can address.
#[derive(Debug, Clone)]
pub struct ClientIdMap {
    range: SlotRange,
    slots: Vec<Option<ClientId>>,
    reverse: Vec<Option<Slot>>,
}

impl ClientIdMap {
    pub fn new(range: SlotRange) -> Self {
        Self {
            range,
            slots: vec![None; range.slot_count()],
            reverse: vec![None; MAX_CLIENTS],
        }
    }

    pub fn range(&self) -> SlotRange {
        self.range
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Shows `client_id` at `slot`. The slot must be empty and the client must
    /// not be shown anywhere else.
    pub fn write_slot(&mut self, client_id: ClientId, slot: Slot) -> Result<(), IdMapError> {
        if client_id >= MAX_CLIENTS {
            return Err(IdMapError::ClientOutOfRange(client_id));
        }
        let count = self.slots.len();
        let Some(entry) = self.slots.get(slot) else {
            return Err(IdMapError::SlotOutOfRange { slot, count });
        };
        match (*entry, self.reverse[client_id]) {
            (Some(occupant), _) if occupant == client_id => Ok(()),
            (Some(occupant), _) => Err(IdMapError::SlotOccupied { slot, occupant }),
            (None, Some(current)) => Err(IdMapError::AlreadyMapped {
                client_id,
                slot: current,
            }),
            (None, None) => {
                self.slots[slot] = Some(client_id);
                self.reverse[client_id] = Some(slot);
                Ok(())
            }
        }
    }

    pub fn clear_slot(&mut self, slot: Slot) -> Option<ClientId> {
        let client_id = self.slots.get_mut(slot)?.take()?;
        self.reverse[client_id] = None;
        Some(client_id)
    }

    /// Removes `client_id` from the table, returning the slot that became free.
    pub fn reset_slot_of(&mut self, client_id: ClientId) -> Option<Slot> {
        let slot = self.reverse.get_mut(client_id)?.take()?;
        debug_assert_eq!(self.slots[slot], Some(client_id));
        self.slots[slot] = None;
        Some(slot)
    }

    pub fn reset_all(&mut self) {
        self.slots.fill(None);
        self.reverse.fill(None);
    }

    pub fn slot_of(&self, client_id: ClientId) -> Option<Slot> {
        self.reverse.get(client_id).copied().flatten()
    }

    pub fn id_of(&self, slot: Slot) -> Option<ClientId> {
        self.slots.get(slot).copied().flatten()
    }

    /// Slot `client_id` is shown at, or `None` if this viewer can't see it.
    /// Identity for viewers that address the full id range.
    pub fn translate(&self, client_id: ClientId) -> Option<Slot> {
        if client_id >= MAX_CLIENTS {
            return None;
        }
        if self.range.needs_translation() {
            self.slot_of(client_id)
        } else {
            Some(client_id)
        }
    }

    pub fn translate_reverse(&self, slot: Slot) -> Option<ClientId> {
        if slot >= self.slots.len() {
            return None;
        }
        if self.range.needs_translation() {
            self.id_of(slot)
        } else {
            Some(slot)
        }
    }

    pub fn first_free_slot(&self, slots: std::ops::RangeInclusive<Slot>) -> Option<Slot> {
        slots
            .into_iter()
            .find(|&slot| self.slots.get(slot).is_some_and(Option::is_none))
    }

    pub fn assigned(&self) -> impl Iterator<Item = (Slot, ClientId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, client_id)| client_id.map(|id| (slot, id)))
    }

    pub fn num_assigned(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Operator dump, two columns of `client -> slot` rows.
    pub fn dump(&self, viewer: ClientId) -> Vec<String> {
        let half = self.slots.len().div_ceil(2);
        let cell = |slot: Slot| self.id_of(slot).map_or(-1, |id| id as i64);

        let mut lines = Vec::with_capacity(half + 2);
        lines.push(format!(
            "------------------[ ID MAP OF {viewer} ]-----------------------"
        ));
        for row in 0..half {
            let right = row + half;
            if right < self.slots.len() {
                lines.push(format!(
                    "  {:3} -> {:2}        {:3} -> {:2}",
                    cell(row),
                    row,
                    cell(right),
                    right
                ));
            } else {
                lines.push(format!("  {:3} -> {:2}", cell(row), row));
            }
        }
        lines.push("end ID map".to_string());
        lines
    }

    #[cfg(test)]
    pub(crate) fn is_bijective(&self) -> bool {
        let forward = self
            .slots
            .iter()
            .enumerate()
            .all(|(slot, id)| id.is_none_or(|id| self.reverse[id] == Some(slot)));
        let backward = self
            .reverse
            .iter()
            .enumerate()
            .all(|(id, slot)| slot.is_none_or(|slot| self.slots[slot] == Some(id)));
        forward && backward
    }
}
