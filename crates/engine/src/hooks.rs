use crate::net::ClientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    ClientConnected,
    ClientEnter,
    ClientDrop,
    IdMapUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Handled,
    Continue,
}

pub type HookFn = Box<dyn FnMut(ClientId) -> HookOutcome>;

/// Optional overrides the embedding game layer can register per event.
#[derive(Default)]
pub struct Hooks {
    client_connected: Option<HookFn>,
    client_enter: Option<HookFn>,
    client_drop: Option<HookFn>,
    id_map_update: Option<HookFn>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: HookKind, hook: impl FnMut(ClientId) -> HookOutcome + 'static) {
        *self.slot_mut(kind) = Some(Box::new(hook));
    }

    pub fn unregister(&mut self, kind: HookKind) {
        *self.slot_mut(kind) = None;
    }

    pub fn is_registered(&self, kind: HookKind) -> bool {
        match kind {
            HookKind::ClientConnected => self.client_connected.is_some(),
            HookKind::ClientEnter => self.client_enter.is_some(),
            HookKind::ClientDrop => self.client_drop.is_some(),
            HookKind::IdMapUpdate => self.id_map_update.is_some(),
        }
    }

    pub fn fire(&mut self, kind: HookKind, client_id: ClientId) -> HookOutcome {
        match self.slot_mut(kind) {
            Some(hook) => hook(client_id),
            None => HookOutcome::Continue,
        }
    }

    fn slot_mut(&mut self, kind: HookKind) -> &mut Option<HookFn> {
        match kind {
            HookKind::ClientConnected => &mut self.client_connected,
            HookKind::ClientEnter => &mut self.client_enter,
            HookKind::ClientDrop => &mut self.client_drop,
            HookKind::IdMapUpdate => &mut self.id_map_update,
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("client_connected", &self.client_connected.is_some())
            .field("client_enter", &self.client_enter.is_some())
            .field("client_drop", &self.client_drop.is_some())
            .field("id_map_update", &self.id_map_update.is_some())
            .finish()
    }
}
