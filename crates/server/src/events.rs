use tickview::{ClientId, SlotRange, Tick};

#[derive(Debug, Clone)]
pub enum ServerEvent {
    ClientJoined {
        client_id: ClientId,
        range: SlotRange,
    },
    DummyJoined {
        client_id: ClientId,
    },
    ClientLeft {
        client_id: ClientId,
        reason: DisconnectReason,
    },
    ClientStalled {
        client_id: ClientId,
        until: Tick,
    },
    SnapshotRejected {
        client_id: ClientId,
        message: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum DisconnectReason {
    Graceful,
    Kicked,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Kicked => "kicked",
        }
    }
}
