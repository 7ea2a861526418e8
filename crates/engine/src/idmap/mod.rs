mod mapping;
mod table;
mod translate;

pub use mapping::{Presence, recompute};
pub use table::{ClientIdMap, IdMapError};
pub use translate::{ChatMsg, EmoticonMsg, KillMsg};
