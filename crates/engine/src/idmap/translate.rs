use crate::net::{ClientId, GameMsg, MsgPacker};

use super::table::ClientIdMap;

/// Chat line as authored on the server. `author == None` is a server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMsg {
    pub team: i32,
    pub author: Option<ClientId>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillMsg {
    pub killer: ClientId,
    pub victim: ClientId,
    pub weapon: i32,
    pub mode_special: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmoticonMsg {
    pub author: ClientId,
    pub emoticon: i32,
}

impl ChatMsg {
    /// Packs the line for one viewer. An author the viewer can't see is shown
    /// at the viewer's fallback slot with their name prefixed to the text.
    pub fn pack_for(&self, map: &ClientIdMap, author_name: &str) -> MsgPacker {
        let mut msg = MsgPacker::new(GameMsg::SvChat as i32, false);
        msg.add_int(self.team);

        match self.author.map(|author| map.translate(author)) {
            None => {
                msg.add_int(-1).add_string(&self.message, 0);
            }
            Some(Some(slot)) => {
                msg.add_int(slot as i32).add_string(&self.message, 0);
            }
            Some(None) => {
                let text = format!("{author_name}: {}", self.message);
                msg.add_int(map.range().fallback_slot() as i32)
                    .add_string(&text, 0);
            }
        }
        msg
    }
}

impl KillMsg {
    /// `None` when the viewer can't see the victim. An unseen killer is
    /// replaced by the victim.
    pub fn pack_for(&self, map: &ClientIdMap) -> Option<MsgPacker> {
        let victim = map.translate(self.victim)?;
        let killer = map.translate(self.killer).unwrap_or(victim);

        let mut msg = MsgPacker::new(GameMsg::SvKillMsg as i32, false);
        msg.add_int(killer as i32)
            .add_int(victim as i32)
            .add_int(self.weapon)
            .add_int(self.mode_special);
        Some(msg)
    }
}

impl EmoticonMsg {
    pub fn pack_for(&self, map: &ClientIdMap) -> Option<MsgPacker> {
        let author = map.translate(self.author)?;
        let mut msg = MsgPacker::new(GameMsg::SvEmoticon as i32, false);
        msg.add_int(author as i32).add_int(self.emoticon);
        Some(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{SlotRange, Unpacker};

    fn vanilla_map() -> ClientIdMap {
        let mut map = ClientIdMap::new(SlotRange::Vanilla);
        map.write_slot(0, 0).unwrap();
        map.write_slot(70, 4).unwrap();
        map
    }

    #[test]
    fn test_chat_from_visible_author() {
        let chat = ChatMsg {
            team: 0,
            author: Some(70),
            message: "gg".into(),
        };
        let msg = chat.pack_for(&vanilla_map(), "brick");
        let mut unpacker = Unpacker::new(msg.data());
        assert_eq!(unpacker.header().unwrap().msg_id, GameMsg::SvChat as i32);
        assert_eq!(unpacker.get_int().unwrap(), 0);
        assert_eq!(unpacker.get_int().unwrap(), 4);
        assert_eq!(unpacker.get_string().unwrap(), "gg");
    }

    #[test]
    fn test_chat_from_hidden_author_uses_fallback() {
        let chat = ChatMsg {
            team: 0,
            author: Some(90),
            message: "hello".into(),
        };
        let msg = chat.pack_for(&vanilla_map(), "brick");
        let mut unpacker = Unpacker::new(msg.data());
        unpacker.header().unwrap();
        unpacker.get_int().unwrap();
        assert_eq!(unpacker.get_int().unwrap(), 15);
        assert_eq!(unpacker.get_string().unwrap(), "brick: hello");
    }

    #[test]
    fn test_server_chat_has_no_author() {
        let chat = ChatMsg {
            team: 0,
            author: None,
            message: "map change".into(),
        };
        let msg = chat.pack_for(&vanilla_map(), "");
        let mut unpacker = Unpacker::new(msg.data());
        unpacker.header().unwrap();
        unpacker.get_int().unwrap();
        assert_eq!(unpacker.get_int().unwrap(), -1);
    }

    #[test]
    fn test_kill_translation() {
        let map = vanilla_map();
        let hidden_victim = KillMsg {
            killer: 70,
            victim: 90,
            weapon: 1,
            mode_special: 0,
        };
        assert!(hidden_victim.pack_for(&map).is_none());

        let hidden_killer = KillMsg {
            killer: 90,
            victim: 70,
            weapon: 1,
            mode_special: 0,
        };
        let msg = hidden_killer.pack_for(&map).unwrap();
        let mut unpacker = Unpacker::new(msg.data());
        unpacker.header().unwrap();
        assert_eq!(unpacker.get_int().unwrap(), 4);
        assert_eq!(unpacker.get_int().unwrap(), 4);
    }

    #[test]
    fn test_emoticon_needs_visible_author() {
        let map = vanilla_map();
        let seen = EmoticonMsg {
            author: 70,
            emoticon: 2,
        };
        assert!(seen.pack_for(&map).is_some());
        let unseen = EmoticonMsg {
            author: 3,
            emoticon: 2,
        };
        assert!(unseen.pack_for(&map).is_none());
    }
}
