use bitflags::bitflags;

use super::packer::PACKER_BUFFER_SIZE;

pub const SERVER_TICK_SPEED: u32 = 50;

pub const VANILLA_MAX_CLIENTS: usize = 16;
pub const DDNET_MAX_CLIENTS: usize = 64;
pub const EXTENDED_MAX_CLIENTS: usize = 128;
pub const MAX_CLIENTS: usize = EXTENDED_MAX_CLIENTS;

pub const MAX_INPUT_SIZE: usize = 128;
pub const MAX_SNAPSHOT_PACKSIZE: usize = 900;
// msg id, tick, offset, num parts, part, crc, chunk size
const SNAP_HEADER_MAX: usize = 1 + 6 * 5;
/// Largest chunk payload that still fits a packer next to its SNAP header.
pub const MAX_SNAPSHOT_CHUNK: usize = PACKER_BUFFER_SIZE - SNAP_HEADER_MAX;

pub const MAX_NAME_LENGTH: usize = 16;
pub const MAX_CLAN_LENGTH: usize = 12;

pub type ClientId = usize;
pub type Slot = usize;
pub type Tick = i32;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MsgFlags: u8 {
        const VITAL = 1 << 0;
        const FLUSH = 1 << 1;
        const NO_RECORD = 1 << 2;
        const NO_SEND = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SendFlags: u8 {
        const VITAL = 1 << 0;
        const CONNLESS = 1 << 1;
        const FLUSH = 1 << 2;
    }
}

impl From<MsgFlags> for SendFlags {
    fn from(flags: MsgFlags) -> Self {
        let mut out = SendFlags::empty();
        if flags.contains(MsgFlags::VITAL) {
            out |= SendFlags::VITAL;
        }
        if flags.contains(MsgFlags::FLUSH) {
            out |= SendFlags::FLUSH;
        }
        out
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClientSupport: u32 {
        const SUPPORTS_64P = 1 << 0;
        const SUPPORTS_128P = 1 << 1;
        const SUPPORTS_NETGUI = 1 << 2;
        const SUPPORTS_TW07 = 1 << 3;
    }
}

/// Number of player slots a client's protocol can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRange {
    Vanilla,
    DDNet,
    Extended,
}

impl SlotRange {
    pub fn from_support(support: ClientSupport) -> Self {
        if support.contains(ClientSupport::SUPPORTS_128P) {
            SlotRange::Extended
        } else if support.contains(ClientSupport::SUPPORTS_64P) {
            SlotRange::DDNet
        } else {
            SlotRange::Vanilla
        }
    }

    pub fn slot_count(self) -> usize {
        match self {
            SlotRange::Vanilla => VANILLA_MAX_CLIENTS,
            SlotRange::DDNet => DDNET_MAX_CLIENTS,
            SlotRange::Extended => EXTENDED_MAX_CLIENTS,
        }
    }

    pub fn needs_translation(self) -> bool {
        self != SlotRange::Extended
    }

    /// Highest slot the mapper may hand out; the slot above it is the fallback identity.
    pub fn largest_assignable(self) -> Slot {
        self.slot_count() - 2
    }

    pub fn fallback_slot(self) -> Slot {
        self.slot_count() - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SystemMsg {
    Info = 1,
    MapChange = 2,
    MapData = 3,
    ConReady = 4,
    Snap = 5,
    SnapEmpty = 6,
    SnapSingle = 7,
    SnapSmall = 8,
    InputTiming = 9,
    RconAuthStatus = 10,
    RconLine = 11,
    Ready = 14,
    EnterGame = 15,
    Input = 16,
    RconCmd = 17,
    RconAuth = 18,
    Ping = 22,
    PingReply = 23,
}

impl SystemMsg {
    pub fn from_id(id: i32) -> Option<Self> {
        let msg = match id {
            1 => SystemMsg::Info,
            2 => SystemMsg::MapChange,
            3 => SystemMsg::MapData,
            4 => SystemMsg::ConReady,
            5 => SystemMsg::Snap,
            6 => SystemMsg::SnapEmpty,
            7 => SystemMsg::SnapSingle,
            8 => SystemMsg::SnapSmall,
            9 => SystemMsg::InputTiming,
            10 => SystemMsg::RconAuthStatus,
            11 => SystemMsg::RconLine,
            14 => SystemMsg::Ready,
            15 => SystemMsg::EnterGame,
            16 => SystemMsg::Input,
            17 => SystemMsg::RconCmd,
            18 => SystemMsg::RconAuth,
            22 => SystemMsg::Ping,
            23 => SystemMsg::PingReply,
            _ => return None,
        };
        Some(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum GameMsg {
    SvChat = 3,
    SvKillMsg = 4,
    SvEmoticon = 10,
}
