use std::cmp::Ordering;

use glam::Vec2;

use crate::net::{ClientId, MAX_CLIENTS, Slot};

use super::table::{ClientIdMap, IdMapError};

/// What the mapper knows about a participant when placing it for a viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presence {
    Absent,
    Bodiless,
    At(Vec2),
}

impl Presence {
    fn distance_to(self, view_pos: Vec2) -> f32 {
        match self {
            Presence::At(pos) => pos.distance(view_pos),
            Presence::Absent | Presence::Bodiless => f32::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Priority {
    distance: f32,
    client_id: ClientId,
}

impl Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.client_id.cmp(&other.client_id))
    }
}

/// Recomputes `viewer`'s slot table.
///
/// The viewer is pinned to slot 0. Everyone else first tries the slot their id
/// hashes to, then the lowest free slot. When the table is full the occupant
/// farthest from `view_pos` (ties: higher id) gives up its slot to a nearer
/// candidate. Candidates without a character never evict anyone.
pub fn recompute(
    map: &mut ClientIdMap,
    viewer: ClientId,
    view_pos: Vec2,
    presence: &[Presence],
) -> Result<(), IdMapError> {
    if !map.range().needs_translation() {
        map.reset_all();
        return Ok(());
    }

    let largest = map.range().largest_assignable();
    let presence_of = |id: ClientId| presence.get(id).copied().unwrap_or(Presence::Absent);
    let priority_of = |id: ClientId| Priority {
        distance: if id == viewer {
            0.0
        } else {
            presence_of(id).distance_to(view_pos)
        },
        client_id: id,
    };

    for client_id in 0..MAX_CLIENTS {
        map.reset_slot_of(client_id);

        if client_id == viewer {
            map.write_slot(client_id, 0)?;
            continue;
        }

        let own = presence_of(client_id);
        if own == Presence::Absent {
            continue;
        }

        let mapped = client_id % largest + 1;
        if map.id_of(mapped).is_none() {
            map.write_slot(client_id, mapped)?;
            continue;
        }

        if let Some(slot) = map.first_free_slot(1..=largest) {
            map.write_slot(client_id, slot)?;
            continue;
        }

        if own == Presence::Bodiless {
            continue;
        }

        let candidate = priority_of(client_id);
        let farthest = map
            .assigned()
            .filter(|&(slot, occupant)| slot >= 1 && slot <= largest && occupant != viewer)
            .map(|(slot, occupant)| (slot, priority_of(occupant)))
            .max_by(|a, b| a.1.cmp(&b.1));

        if let Some((slot, occupant)) = farthest
            && candidate.cmp(&occupant) == Ordering::Less
        {
            evict(map, occupant.client_id, client_id, slot)?;
        }
    }

    Ok(())
}

fn evict(
    map: &mut ClientIdMap,
    occupant: ClientId,
    client_id: ClientId,
    expected: Slot,
) -> Result<(), IdMapError> {
    log::trace!("client {client_id} takes slot {expected} from client {occupant}");
    let freed = map.reset_slot_of(occupant).unwrap_or(expected);
    debug_assert_eq!(freed, expected);
    map.write_slot(client_id, freed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::SlotRange;

    fn line(count: usize) -> Vec<Presence> {
        let mut presence = vec![Presence::Absent; MAX_CLIENTS];
        for (id, entry) in presence.iter_mut().enumerate().take(count) {
            *entry = Presence::At(Vec2::new(id as f32 * 10.0, 0.0));
        }
        presence
    }

    #[test]
    fn test_viewer_pinned_to_slot_zero() {
        let mut map = ClientIdMap::new(SlotRange::Vanilla);
        let presence = line(5);
        recompute(&mut map, 3, Vec2::new(30.0, 0.0), &presence).unwrap();
        assert_eq!(map.slot_of(3), Some(0));
        assert_eq!(map.slot_of(0), Some(1));
        assert_eq!(map.slot_of(4), Some(5));
        assert!(map.is_bijective());
    }

    #[test]
    fn test_hashed_slot_collision_uses_free_slot() {
        let mut map = ClientIdMap::new(SlotRange::Vanilla);
        let mut presence = vec![Presence::Absent; MAX_CLIENTS];
        presence[1] = Presence::At(Vec2::ZERO);
        presence[15] = Presence::At(Vec2::ZERO);
        recompute(&mut map, 0, Vec2::ZERO, &presence).unwrap();
        assert_eq!(map.slot_of(1), Some(2));
        assert_eq!(map.slot_of(15), Some(1));
    }

    #[test]
    fn test_full_table_keeps_nearest() {
        let mut map = ClientIdMap::new(SlotRange::Vanilla);
        let mut presence = line(20);
        presence.swap(2, 19);
        recompute(&mut map, 0, Vec2::ZERO, &presence).unwrap();

        assert_eq!(map.num_assigned(), 15);
        assert_eq!(map.id_of(SlotRange::Vanilla.fallback_slot()), None);
        assert_eq!(map.translate(2), None);
        assert!(map.translate(19).is_some());
        for id in 15..19 {
            assert_eq!(map.translate(id), None);
        }
    }

    #[test]
    fn test_bodiless_never_evicts() {
        let mut map = ClientIdMap::new(SlotRange::Vanilla);
        let mut presence = line(15);
        presence[20] = Presence::Bodiless;
        recompute(&mut map, 0, Vec2::ZERO, &presence).unwrap();
        assert_eq!(map.translate(20), None);
        assert_eq!(map.num_assigned(), 15);
    }

    #[test]
    fn test_bodiless_occupant_evicted_first() {
        let mut map = ClientIdMap::new(SlotRange::Vanilla);
        let mut presence = line(15);
        presence[4] = Presence::Bodiless;
        presence[30] = Presence::At(Vec2::new(1000.0, 0.0));
        recompute(&mut map, 0, Vec2::ZERO, &presence).unwrap();
        assert_eq!(map.translate(4), None);
        assert_eq!(map.translate(30), Some(5));
    }

    #[test]
    fn test_extended_viewer_needs_no_table() {
        let mut map = ClientIdMap::new(SlotRange::Extended);
        recompute(&mut map, 7, Vec2::ZERO, &line(100)).unwrap();
        assert_eq!(map.num_assigned(), 0);
        assert_eq!(map.translate(99), Some(99));
    }
}
