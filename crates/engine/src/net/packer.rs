use super::varint::{self, PackError};

pub const PACKER_BUFFER_SIZE: usize = 1024 * 2;

/// Builds a single message: a header integer `(msg_id << 1) | system`
/// followed by the packed fields.
#[derive(Debug, Clone)]
pub struct MsgPacker {
    buffer: Vec<u8>,
    msg_id: i32,
    system: bool,
    overflowed: bool,
}

impl MsgPacker {
    pub fn new(msg_id: i32, system: bool) -> Self {
        let mut packer = Self {
            buffer: Vec::with_capacity(64),
            msg_id,
            system,
            overflowed: false,
        };
        packer.add_int((msg_id << 1) | system as i32);
        packer
    }

    pub fn msg_id(&self) -> i32 {
        self.msg_id
    }

    pub fn is_system(&self) -> bool {
        self.system
    }

    pub fn add_int(&mut self, value: i32) -> &mut Self {
        if !self.overflowed {
            varint::pack(&mut self.buffer, value);
            self.check_size();
        }
        self
    }

    pub fn add_raw(&mut self, data: &[u8]) -> &mut Self {
        if !self.overflowed {
            self.buffer.extend_from_slice(data);
            self.check_size();
        }
        self
    }

    pub fn add_string(&mut self, value: &str, limit: usize) -> &mut Self {
        if self.overflowed {
            return self;
        }
        let end = if limit > 0 {
            value
                .char_indices()
                .nth(limit)
                .map_or(value.len(), |(idx, _)| idx)
        } else {
            value.len()
        };
        self.buffer
            .extend(value[..end].bytes().filter(|&b| b != 0));
        self.buffer.push(0);
        self.check_size();
        self
    }

    pub fn error(&self) -> bool {
        self.overflowed
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn check_size(&mut self) {
        if self.buffer.len() > PACKER_BUFFER_SIZE {
            self.overflowed = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub msg_id: i32,
    pub system: bool,
}

#[derive(Debug, Clone)]
pub struct Unpacker<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Unpacker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn header(&mut self) -> Result<MsgHeader, PackError> {
        let raw = self.get_int()?;
        Ok(MsgHeader {
            msg_id: raw >> 1,
            system: raw & 1 != 0,
        })
    }

    pub fn get_int(&mut self) -> Result<i32, PackError> {
        let (value, used) = varint::unpack(&self.data[self.pos..])
            .map_err(|_| PackError::Truncated(self.pos))?;
        self.pos += used;
        Ok(value)
    }

    pub fn get_raw(&mut self, size: usize) -> Result<&'a [u8], PackError> {
        let end = self.pos.checked_add(size).ok_or(PackError::Truncated(self.pos))?;
        if end > self.data.len() {
            return Err(PackError::Truncated(self.data.len()));
        }
        let raw = &self.data[self.pos..end];
        self.pos = end;
        Ok(raw)
    }

    pub fn get_string(&mut self) -> Result<&'a str, PackError> {
        let rest = &self.data[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(PackError::Truncated(self.data.len()))?;
        let text = std::str::from_utf8(&rest[..nul]).map_err(|_| PackError::InvalidString)?;
        self.pos += nul + 1;
        Ok(text)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}
