use std::collections::VecDeque;

use super::protocol::{ClientId, MAX_SNAPSHOT_PACKSIZE, SendFlags};
use super::stats::NetworkStats;

/// The non-blocking chunk transport the server core hands its messages to.
///
/// Delivery, resends of vital chunks and connection handling live behind this
/// trait. `send` never blocks; a transport with a full send buffer applies its
/// own backpressure policy.
pub trait Transport {
    fn send(&mut self, client_id: ClientId, data: &[u8], flags: SendFlags);

    fn max_chunk_size(&self) -> usize {
        MAX_SNAPSHOT_PACKSIZE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentChunk {
    pub client_id: ClientId,
    pub data: Vec<u8>,
    pub flags: SendFlags,
}

#[derive(Debug, Default)]
pub struct QueueTransport {
    queue: VecDeque<SentChunk>,
    stats: NetworkStats,
    max_chunk_size: Option<usize>,
}

impl QueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_chunk_size(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size: Some(max_chunk_size),
            ..Self::default()
        }
    }

    pub fn drain(&mut self) -> impl Iterator<Item = SentChunk> + '_ {
        self.queue.drain(..)
    }

    pub fn drain_for(&mut self, client_id: ClientId) -> Vec<SentChunk> {
        let (matching, rest): (VecDeque<_>, VecDeque<_>) = self
            .queue
            .drain(..)
            .partition(|chunk| chunk.client_id == client_id);
        self.queue = rest;
        matching.into()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }
}

impl Transport for QueueTransport {
    fn send(&mut self, client_id: ClientId, data: &[u8], flags: SendFlags) {
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += data.len() as u64;
        self.queue.push_back(SentChunk {
            client_id,
            data: data.to_vec(),
            flags,
        });
    }

    fn max_chunk_size(&self) -> usize {
        self.max_chunk_size.unwrap_or(MAX_SNAPSHOT_PACKSIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_for_keeps_other_clients() {
        let mut transport = QueueTransport::new();
        transport.send(1, &[1], SendFlags::VITAL);
        transport.send(2, &[2], SendFlags::empty());
        transport.send(1, &[3], SendFlags::FLUSH);

        let chunks = transport.drain_for(1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].data, vec![3]);
        assert_eq!(transport.len(), 1);
        assert_eq!(transport.stats().bytes_sent, 3);
    }
}
