use std::collections::VecDeque;

use rand::Rng;

use tickview::{
    ClientId, ClientSupport, MsgPacker, ReceiveError, ReceiveOutcome, SlotRange, SnapshotDelta,
    SnapshotReceiver, SystemMsg, Tick,
};

use crate::simulation::PacketLossSimulation;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientStats {
    pub chunks_received: u64,
    pub chunks_dropped: u64,
    pub snapshots_completed: u64,
    pub rejected: u64,
}

/// An in-process stand-in for a remote client: reassembles its snapshot
/// stream and acknowledges what it managed to decode.
#[derive(Debug)]
pub struct SimClient {
    client_id: ClientId,
    support: ClientSupport,
    receiver: SnapshotReceiver,
    in_flight: VecDeque<(Tick, Vec<u8>)>,
    packet_loss_sim: PacketLossSimulation,
    stalled_until: Option<Tick>,
    pending_ack: Option<Tick>,
    stats: ClientStats,
}

impl SimClient {
    pub fn new(client_id: ClientId, support: ClientSupport, delta: SnapshotDelta) -> Self {
        Self {
            client_id,
            support,
            receiver: SnapshotReceiver::new(delta),
            in_flight: VecDeque::new(),
            packet_loss_sim: PacketLossSimulation::default(),
            stalled_until: None,
            pending_ack: None,
            stats: ClientStats::default(),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn support(&self) -> ClientSupport {
        self.support
    }

    pub fn slot_range(&self) -> SlotRange {
        SlotRange::from_support(self.support)
    }

    pub fn stats(&self) -> ClientStats {
        self.stats
    }

    pub fn latest_tick(&self) -> Option<Tick> {
        self.receiver.latest_tick()
    }

    pub fn set_packet_loss_sim(&mut self, sim: PacketLossSimulation) {
        self.packet_loss_sim = sim;
    }

    pub fn is_stalled(&self, tick: Tick) -> bool {
        self.stalled_until.is_some_and(|until| tick < until)
    }

    pub fn stall(&mut self, until: Tick) {
        self.stalled_until = Some(until);
    }

    pub fn push_chunk(&mut self, now: Tick, data: Vec<u8>, rng: &mut impl Rng) {
        if self.packet_loss_sim.should_drop(rng) {
            self.stats.chunks_dropped += 1;
            return;
        }
        let delay = self.packet_loss_sim.delay_ticks(rng) as Tick;
        self.in_flight.push_back((now + delay, data));
    }

    pub fn process(&mut self, now: Tick) -> Vec<ReceiveError> {
        let mut errors = Vec::new();
        while let Some((arrival, _)) = self.in_flight.front() {
            if *arrival > now {
                break;
            }
            let Some((_, data)) = self.in_flight.pop_front() else {
                break;
            };
            self.stats.chunks_received += 1;
            match self.receiver.receive(&data) {
                Ok(ReceiveOutcome::Complete(tick)) => {
                    self.stats.snapshots_completed += 1;
                    self.pending_ack = Some(tick);
                }
                Ok(_) => {}
                Err(err) => {
                    self.stats.rejected += 1;
                    errors.push(err);
                }
            }
        }
        errors
    }

    /// The INPUT message acknowledging the newest decoded snapshot, if any.
    pub fn take_input(&mut self, now: Tick) -> Option<MsgPacker> {
        if self.is_stalled(now) {
            return None;
        }
        let ack = self.pending_ack.take()?;
        let mut msg = MsgPacker::new(SystemMsg::Input as i32, true);
        // ack, intended tick, input size
        msg.add_int(ack).add_int(now + 1).add_int(0);
        Some(msg)
    }

    pub fn reset(&mut self) {
        self.receiver.reset();
        self.in_flight.clear();
        self.pending_ack = None;
        self.stalled_until = None;
    }
}
