use glam::Vec2;

use crate::idmap::ClientIdMap;
use crate::net::{ClientId, MAX_CLIENTS, Slot, Tick};
use crate::snapshot::{SnapshotBuilder, SnapshotError};

pub trait Character {
    fn position(&self) -> Vec2;
}

/// Per-viewer state handed to the game layer while it emits snapshot items.
#[derive(Debug, Clone, Copy)]
pub struct SnapContext<'a> {
    tick: Tick,
    viewer: Option<ClientId>,
    id_map: Option<&'a ClientIdMap>,
}

impl<'a> SnapContext<'a> {
    pub fn for_viewer(tick: Tick, viewer: ClientId, id_map: &'a ClientIdMap) -> Self {
        Self {
            tick,
            viewer: Some(viewer),
            id_map: Some(id_map),
        }
    }

    pub fn recording(tick: Tick) -> Self {
        Self {
            tick,
            viewer: None,
            id_map: None,
        }
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn viewer(&self) -> Option<ClientId> {
        self.viewer
    }

    /// Slot `client_id` appears at for this viewer; `None` means leave it out.
    pub fn translate(&self, client_id: ClientId) -> Option<Slot> {
        match self.id_map {
            Some(map) => map.translate(client_id),
            None => (client_id < MAX_CLIENTS).then_some(client_id),
        }
    }
}

/// The game layer as seen from the snapshot driver.
pub trait GameWorld {
    fn on_pre_snap(&mut self) {}

    fn snap(&self, ctx: &SnapContext<'_>, builder: &mut SnapshotBuilder)
    -> Result<(), SnapshotError>;

    fn on_post_snap(&mut self) {}

    fn character(&self, client_id: ClientId) -> Option<&dyn Character>;

    /// Where the participant is looking from. Defaults to its character.
    fn view_pos(&self, client_id: ClientId) -> Option<Vec2> {
        self.character(client_id).map(Character::position)
    }
}
