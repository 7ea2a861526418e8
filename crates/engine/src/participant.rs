use crate::idmap::ClientIdMap;
use crate::net::{ClientId, ClientSupport, MAX_CLIENTS, SlotRange, Tick};
use crate::snapshot::SnapshotStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Empty,
    Auth,
    Connecting,
    Ready,
    InGame,
    Dummy,
}

/// Snapshot send cadence for one viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapRate {
    Init,
    Full,
    Recover,
}

impl SnapRate {
    pub fn should_send(self, tick: Tick, high_bandwidth: bool) -> bool {
        match self {
            SnapRate::Recover => tick % 50 == 0,
            SnapRate::Init => tick % 10 == 0,
            SnapRate::Full => high_bandwidth || tick % 2 == 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum AuthLevel {
    #[default]
    None,
    Helper,
    Moderator,
    Admin,
}

#[derive(Debug)]
pub struct Participant {
    pub state: ClientState,
    pub support: ClientSupport,
    pub name: String,
    pub clan: String,
    pub country: i32,
    pub score: i32,
    pub auth_level: AuthLevel,
    pub last_acked: Option<Tick>,
    pub last_input_tick: Option<Tick>,
    pub latency_ms: i32,
    pub snap_rate: SnapRate,
    pub history: SnapshotStorage,
    pub id_map: ClientIdMap,
    pub latest_input: Vec<i32>,
}

impl Default for Participant {
    fn default() -> Self {
        Self {
            state: ClientState::Empty,
            support: ClientSupport::empty(),
            name: String::new(),
            clan: String::new(),
            country: -1,
            score: 0,
            auth_level: AuthLevel::None,
            last_acked: None,
            last_input_tick: None,
            latency_ms: 0,
            snap_rate: SnapRate::Init,
            history: SnapshotStorage::new(),
            id_map: ClientIdMap::new(SlotRange::Vanilla),
            latest_input: Vec::new(),
        }
    }
}

impl Participant {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_ingame(&self) -> bool {
        matches!(self.state, ClientState::InGame | ClientState::Dummy)
    }

    pub fn is_dummy(&self) -> bool {
        self.state == ClientState::Dummy
    }

    pub fn is_viewer(&self) -> bool {
        self.state == ClientState::InGame
    }

    pub fn slot_range(&self) -> SlotRange {
        self.id_map.range()
    }

    pub fn set_support(&mut self, support: ClientSupport) {
        self.support = support;
        self.id_map = ClientIdMap::new(SlotRange::from_support(support));
    }
}

#[derive(Debug)]
pub struct Participants {
    slots: Vec<Participant>,
}

impl Default for Participants {
    fn default() -> Self {
        Self::new()
    }
}

impl Participants {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_CLIENTS).map(|_| Participant::default()).collect(),
        }
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Participant> {
        self.slots.get(client_id)
    }

    pub fn get_mut(&mut self, client_id: ClientId) -> Option<&mut Participant> {
        self.slots.get_mut(client_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClientId, &Participant)> {
        self.slots.iter().enumerate()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ClientId, &mut Participant)> {
        self.slots.iter_mut().enumerate()
    }

    pub fn ingame_ids(&self) -> Vec<ClientId> {
        self.iter()
            .filter(|(_, participant)| participant.is_ingame())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn viewer_ids(&self) -> Vec<ClientId> {
        self.iter()
            .filter(|(_, participant)| participant.is_viewer())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn count(&self, state: ClientState) -> usize {
        self.slots.iter().filter(|p| p.state == state).count()
    }

    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|p| p.state != ClientState::Empty)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_rate_cadence() {
        assert!(SnapRate::Init.should_send(20, false));
        assert!(!SnapRate::Init.should_send(21, true));
        assert!(SnapRate::Full.should_send(21, true));
        assert!(!SnapRate::Full.should_send(21, false));
        assert!(SnapRate::Full.should_send(22, false));
        assert!(SnapRate::Recover.should_send(100, true));
        assert!(!SnapRate::Recover.should_send(110, true));
    }

    #[test]
    fn test_support_resizes_slot_table() {
        let mut participant = Participant::default();
        participant.id_map.write_slot(3, 1).unwrap();
        participant.set_support(ClientSupport::SUPPORTS_64P);
        assert_eq!(participant.slot_range(), SlotRange::DDNet);
        assert_eq!(participant.id_map.slot_count(), 64);
        assert_eq!(participant.id_map.slot_of(3), None);
    }

    #[test]
    fn test_table_counts_states() {
        let mut participants = Participants::new();
        participants.get_mut(2).unwrap().state = ClientState::InGame;
        participants.get_mut(5).unwrap().state = ClientState::Dummy;
        participants.get_mut(9).unwrap().state = ClientState::Connecting;
        assert_eq!(participants.len(), 3);
        assert_eq!(participants.ingame_ids(), vec![2, 5]);
        assert_eq!(participants.viewer_ids(), vec![2]);
        assert!(participants.get(MAX_CLIENTS).is_none());
    }
}
