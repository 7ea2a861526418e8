use std::time::Instant;

use glam::Vec2;

use crate::config::{ConfigError, CoreConfig};
use crate::hooks::{HookKind, HookOutcome, Hooks};
use crate::id_pool::{IdPool, IdPoolError};
use crate::idmap::{self, ChatMsg, ClientIdMap, EmoticonMsg, IdMapError, KillMsg, Presence};
use crate::net::{
    self, ClientId, ClientSupport, MAX_CLIENTS, MAX_INPUT_SIZE, MsgFlags, MsgPacker,
    PACKER_BUFFER_SIZE, PackError, SendFlags, Slot, SlotRange, SystemMsg, Tick, Transport,
    Unpacker,
};
use crate::participant::{AuthLevel, ClientState, Participant, Participants, SnapRate};
use crate::recorder::SnapshotRecorder;
use crate::snapshot::{self, DeltaError, Snapshot, SnapshotBuilder, SnapshotDelta, SnapshotError};
use crate::world::{GameWorld, SnapContext};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid client id {0}")]
    InvalidClient(ClientId),
    #[error("client {client_id} is {state:?}")]
    InvalidState {
        client_id: ClientId,
        state: ClientState,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    IdMap(#[from] IdMapError),
    #[error(transparent)]
    IdPool(#[from] IdPoolError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Delta(#[from] DeltaError),
    #[error(transparent)]
    Pack(#[from] PackError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: String,
    pub latency_ms: i32,
    pub slot_range: SlotRange,
    pub support: ClientSupport,
}

/// What one call to [`ServerCore::tick`] put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Tick,
    pub snapshots: usize,
    pub empty_snapshots: usize,
    pub chunks: usize,
    pub bytes: usize,
    pub mappings_updated: usize,
    /// Viewers whose snapshot could not be built or sent this tick.
    pub failed_snapshots: usize,
}

/// Per-tick driver: participant table, slot tables and the snapshot pipeline.
pub struct ServerCore {
    config: CoreConfig,
    participants: Participants,
    id_pool: IdPool,
    delta: SnapshotDelta,
    builder: SnapshotBuilder,
    hooks: Hooks,
    recorder: Option<Box<dyn SnapshotRecorder>>,
    tick: Tick,
    game_start: Instant,
}

impl ServerCore {
    pub fn new(config: CoreConfig) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self {
            id_pool: IdPool::new(crate::id_pool::MAX_IDS, config.id_quarantine()),
            participants: Participants::new(),
            delta: SnapshotDelta::new(),
            builder: SnapshotBuilder::new(),
            hooks: Hooks::new(),
            recorder: None,
            tick: 0,
            game_start: Instant::now(),
            config,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    pub fn participant(&self, client_id: ClientId) -> Option<&Participant> {
        self.participants.get(client_id)
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn set_recorder(&mut self, recorder: Option<Box<dyn SnapshotRecorder>>) {
        self.recorder = recorder;
    }

    pub fn recorder(&self) -> Option<&dyn SnapshotRecorder> {
        self.recorder.as_deref()
    }

    pub fn id_pool(&self) -> &IdPool {
        &self.id_pool
    }

    pub fn snapshot_delta(&self) -> &SnapshotDelta {
        &self.delta
    }

    pub fn set_static_size(&mut self, type_id: i32, size: usize) {
        self.delta.set_static_size(type_id, size);
    }

    pub fn snap_new_id(&mut self) -> Result<usize, ServerError> {
        Ok(self.id_pool.new_id()?)
    }

    pub fn snap_free_id(&mut self, id: usize) -> Result<(), ServerError> {
        Ok(self.id_pool.free_id(id)?)
    }

    // lifecycle

    pub fn new_client(&mut self, client_id: ClientId) -> Result<(), ServerError> {
        let participant = self
            .participants
            .get_mut(client_id)
            .ok_or(ServerError::InvalidClient(client_id))?;
        if participant.state != ClientState::Empty {
            return Err(ServerError::InvalidState {
                client_id,
                state: participant.state,
            });
        }
        participant.reset();
        participant.state = ClientState::Auth;
        log::debug!("client {client_id} accepted");
        Ok(())
    }

    pub fn set_client_ready(&mut self, client_id: ClientId) -> Result<(), ServerError> {
        let participant = self.live_mut(client_id)?;
        if !matches!(participant.state, ClientState::Auth | ClientState::Connecting) {
            return Err(ServerError::InvalidState {
                client_id,
                state: participant.state,
            });
        }
        participant.state = ClientState::Ready;
        if self.hooks.fire(HookKind::ClientConnected, client_id) == HookOutcome::Continue {
            log::info!("player is ready. client_id={client_id}");
        }
        Ok(())
    }

    pub fn enter_game(&mut self, client_id: ClientId) -> Result<(), ServerError> {
        let participant = self.live_mut(client_id)?;
        if participant.state != ClientState::Ready {
            return Err(ServerError::InvalidState {
                client_id,
                state: participant.state,
            });
        }
        participant.state = ClientState::InGame;
        participant.snap_rate = SnapRate::Init;
        participant.last_acked = None;
        participant.history.purge_all();
        participant.id_map.reset_all();
        if self.hooks.fire(HookKind::ClientEnter, client_id) == HookOutcome::Continue {
            log::info!("player has entered the game. client_id={client_id}");
        }
        Ok(())
    }

    pub fn drop_client(&mut self, client_id: ClientId, reason: &str) -> Result<(), ServerError> {
        self.live_mut(client_id)?;
        if self.hooks.fire(HookKind::ClientDrop, client_id) == HookOutcome::Continue {
            log::info!("client dropped. client_id={client_id} reason='{reason}'");
        }
        self.release(client_id);
        Ok(())
    }

    pub fn init_dummy(&mut self, client_id: ClientId) -> Result<(), ServerError> {
        let participant = self
            .participants
            .get_mut(client_id)
            .ok_or(ServerError::InvalidClient(client_id))?;
        if participant.state != ClientState::Empty {
            return Err(ServerError::InvalidState {
                client_id,
                state: participant.state,
            });
        }
        participant.reset();
        participant.state = ClientState::Dummy;
        log::info!("dummy joined. client_id={client_id}");
        Ok(())
    }

    pub fn purge_dummy(&mut self, client_id: ClientId) -> Result<(), ServerError> {
        let participant = self.live_mut(client_id)?;
        if !participant.is_dummy() {
            return Err(ServerError::InvalidState {
                client_id,
                state: participant.state,
            });
        }
        log::info!("dummy left. client_id={client_id}");
        self.release(client_id);
        Ok(())
    }

    fn release(&mut self, client_id: ClientId) {
        for (_, other) in self.participants.iter_mut() {
            other.id_map.reset_slot_of(client_id);
        }
        if let Some(participant) = self.participants.get_mut(client_id) {
            participant.reset();
        }
    }

    pub fn set_support_flags(
        &mut self,
        client_id: ClientId,
        support: ClientSupport,
    ) -> Result<(), ServerError> {
        let participant = self.live_mut(client_id)?;
        participant.set_support(support);
        log::debug!(
            "client {client_id} slot range {:?}",
            participant.slot_range()
        );
        Ok(())
    }

    pub fn set_client_name(&mut self, client_id: ClientId, name: &str) -> Result<(), ServerError> {
        self.live_mut(client_id)?.name = truncate(name, net::MAX_NAME_LENGTH);
        Ok(())
    }

    pub fn set_client_clan(&mut self, client_id: ClientId, clan: &str) -> Result<(), ServerError> {
        self.live_mut(client_id)?.clan = truncate(clan, net::MAX_CLAN_LENGTH);
        Ok(())
    }

    pub fn set_client_country(&mut self, client_id: ClientId, country: i32) -> Result<(), ServerError> {
        self.live_mut(client_id)?.country = country;
        Ok(())
    }

    pub fn set_client_score(&mut self, client_id: ClientId, score: i32) -> Result<(), ServerError> {
        self.live_mut(client_id)?.score = score;
        Ok(())
    }

    pub fn set_auth_level(&mut self, client_id: ClientId, level: AuthLevel) -> Result<(), ServerError> {
        self.live_mut(client_id)?.auth_level = level;
        Ok(())
    }

    pub fn client_name(&self, client_id: ClientId) -> String {
        let Some(participant) = self.participants.get(client_id) else {
            return "(invalid)".to_string();
        };
        match participant.state {
            ClientState::Empty => "(invalid)".to_string(),
            ClientState::Auth | ClientState::Connecting => "(connecting)".to_string(),
            ClientState::Dummy if participant.name.is_empty() => format!("Dummy {client_id}"),
            _ => participant.name.clone(),
        }
    }

    pub fn client_ingame(&self, client_id: ClientId) -> bool {
        self.participants
            .get(client_id)
            .is_some_and(Participant::is_ingame)
    }

    pub fn client_info(&self, client_id: ClientId) -> Option<ClientInfo> {
        let participant = self.participants.get(client_id)?;
        if participant.state == ClientState::Empty {
            return None;
        }
        Some(ClientInfo {
            name: self.client_name(client_id),
            latency_ms: participant.latency_ms,
            slot_range: participant.slot_range(),
            support: participant.support,
        })
    }

    fn live_mut(&mut self, client_id: ClientId) -> Result<&mut Participant, ServerError> {
        self.participants
            .get_mut(client_id)
            .filter(|participant| participant.state != ClientState::Empty)
            .ok_or(ServerError::InvalidClient(client_id))
    }

    // translation

    pub fn id_map(&self, viewer: ClientId) -> Option<&ClientIdMap> {
        self.participants.get(viewer).map(|p| &p.id_map)
    }

    pub fn translate(&self, client_id: ClientId, viewer: ClientId) -> Option<Slot> {
        self.id_map(viewer)?.translate(client_id)
    }

    pub fn translate_reverse(&self, slot: Slot, viewer: ClientId) -> Option<ClientId> {
        self.id_map(viewer)?.translate_reverse(slot)
    }

    pub fn dump_id_map(&self, viewer: ClientId) -> Result<Vec<String>, ServerError> {
        let map = self.id_map(viewer).ok_or(ServerError::InvalidClient(viewer))?;
        let lines = map.dump(viewer);
        for line in &lines {
            log::info!("{line}");
        }
        Ok(lines)
    }

    // messages

    pub fn handle_message(
        &mut self,
        client_id: ClientId,
        data: &[u8],
        transport: &mut dyn Transport,
    ) -> Result<(), ServerError> {
        self.live_mut(client_id)?;
        let mut unpacker = Unpacker::new(data);
        let header = unpacker.header()?;
        if !header.system {
            log::trace!("game message {} from client {client_id}", header.msg_id);
            return Ok(());
        }

        let state = self.live_mut(client_id)?.state;
        match SystemMsg::from_id(header.msg_id) {
            Some(SystemMsg::Info) if state == ClientState::Auth => {
                self.live_mut(client_id)?.state = ClientState::Connecting;
            }
            Some(SystemMsg::Ready) if state == ClientState::Connecting => {
                self.set_client_ready(client_id)?;
            }
            Some(SystemMsg::EnterGame) if state == ClientState::Ready => {
                self.enter_game(client_id)?;
            }
            Some(SystemMsg::Input) => self.on_input(client_id, &mut unpacker, transport)?,
            Some(SystemMsg::Ping) => {
                let reply = MsgPacker::new(SystemMsg::PingReply as i32, true);
                self.send_msg(&reply, MsgFlags::empty(), Some(client_id), transport)?;
            }
            _ => {
                log::debug!(
                    "ignored system message {} from client {client_id} in state {state:?}",
                    header.msg_id
                );
            }
        }
        Ok(())
    }

    fn on_input(
        &mut self,
        client_id: ClientId,
        unpacker: &mut Unpacker<'_>,
        transport: &mut dyn Transport,
    ) -> Result<(), ServerError> {
        let ack = unpacker.get_int()?;
        let intended_tick = unpacker.get_int()?;
        let size = unpacker.get_int()?;
        let len = usize::try_from(size / 4)
            .ok()
            .filter(|&len| len <= MAX_INPUT_SIZE)
            .ok_or(PackError::InvalidValue {
                field: "input size",
                value: size,
            })?;
        let input = (0..len)
            .map(|_| unpacker.get_int())
            .collect::<Result<Vec<_>, _>>()?;

        let now = Instant::now();
        let time_left = self.time_left_ms(intended_tick, now);
        let participant = self.live_mut(client_id)?;

        participant.last_acked = Some(ack);
        if ack > 0 && participant.snap_rate != SnapRate::Full {
            log::debug!(
                "client {client_id} snap rate {:?} -> Full",
                participant.snap_rate
            );
            participant.snap_rate = SnapRate::Full;
        }
        if let Some(entry) = participant.history.get(ack) {
            participant.latency_ms = now.duration_since(entry.tagtime).as_millis() as i32;
        }

        let newer = participant
            .last_input_tick
            .is_none_or(|last| intended_tick > last);
        participant.last_input_tick = Some(intended_tick);
        participant.latest_input = input;

        if newer {
            let mut timing = MsgPacker::new(SystemMsg::InputTiming as i32, true);
            timing.add_int(intended_tick).add_int(time_left);
            self.send_msg(&timing, MsgFlags::NO_RECORD, Some(client_id), transport)?;
        }
        Ok(())
    }

    fn time_left_ms(&self, tick: Tick, now: Instant) -> i32 {
        let tick_start = tick as f64 / self.config.tick_speed as f64;
        let elapsed = now.duration_since(self.game_start).as_secs_f64();
        ((tick_start - elapsed) * 1000.0) as i32
    }

    pub fn send_msg(
        &mut self,
        msg: &MsgPacker,
        flags: MsgFlags,
        target: Option<ClientId>,
        transport: &mut dyn Transport,
    ) -> Result<(), ServerError> {
        if msg.error() {
            return Err(PackError::Overflow {
                max: PACKER_BUFFER_SIZE,
            }
            .into());
        }
        let send_flags = SendFlags::from(flags);

        if !flags.contains(MsgFlags::NO_RECORD)
            && let Some(recorder) = self.recorder.as_mut()
            && recorder.is_recording()
        {
            recorder.record_message(msg.data());
        }

        if flags.contains(MsgFlags::NO_SEND) {
            return Ok(());
        }

        match target {
            None => {
                for client_id in self.participants.viewer_ids() {
                    transport.send(client_id, msg.data(), send_flags);
                }
            }
            Some(client_id) => {
                let participant = self
                    .participants
                    .get(client_id)
                    .ok_or(ServerError::InvalidClient(client_id))?;
                if !matches!(participant.state, ClientState::Empty | ClientState::Dummy) {
                    transport.send(client_id, msg.data(), send_flags);
                }
            }
        }
        Ok(())
    }

    fn targets(&self, target: Option<ClientId>) -> Vec<ClientId> {
        match target {
            Some(client_id) => vec![client_id],
            None => self.participants.viewer_ids(),
        }
    }

    fn record_untranslated(&mut self, msg: &MsgPacker) {
        if let Some(recorder) = self.recorder.as_mut()
            && recorder.is_recording()
            && !msg.error()
        {
            recorder.record_message(msg.data());
        }
    }

    /// Sends a chat line, translated separately for every receiver.
    pub fn send_chat(
        &mut self,
        chat: &ChatMsg,
        target: Option<ClientId>,
        transport: &mut dyn Transport,
    ) -> Result<(), ServerError> {
        let author_name = chat
            .author
            .map(|author| self.client_name(author))
            .unwrap_or_default();
        let identity = ClientIdMap::new(SlotRange::Extended);
        self.record_untranslated(&chat.pack_for(&identity, &author_name));

        for viewer in self.targets(target) {
            let Some(map) = self.id_map(viewer) else {
                continue;
            };
            let msg = chat.pack_for(map, &author_name);
            self.send_msg(&msg, MsgFlags::VITAL | MsgFlags::NO_RECORD, Some(viewer), transport)?;
        }
        Ok(())
    }

    pub fn send_kill_msg(
        &mut self,
        kill: &KillMsg,
        transport: &mut dyn Transport,
    ) -> Result<(), ServerError> {
        let identity = ClientIdMap::new(SlotRange::Extended);
        if let Some(msg) = kill.pack_for(&identity) {
            self.record_untranslated(&msg);
        }
        for viewer in self.targets(None) {
            let Some(msg) = self.id_map(viewer).and_then(|map| kill.pack_for(map)) else {
                continue;
            };
            self.send_msg(&msg, MsgFlags::VITAL | MsgFlags::NO_RECORD, Some(viewer), transport)?;
        }
        Ok(())
    }

    pub fn send_emoticon(
        &mut self,
        emoticon: &EmoticonMsg,
        transport: &mut dyn Transport,
    ) -> Result<(), ServerError> {
        for viewer in self.targets(None) {
            let Some(msg) = self.id_map(viewer).and_then(|map| emoticon.pack_for(map)) else {
                continue;
            };
            self.send_msg(&msg, MsgFlags::VITAL | MsgFlags::NO_RECORD, Some(viewer), transport)?;
        }
        Ok(())
    }

    // tick

    pub fn on_map_reload(&mut self) {
        self.id_pool.timeout_ids();
        for (_, participant) in self.participants.iter_mut() {
            participant.history.purge_all();
            participant.snap_rate = SnapRate::Init;
            participant.last_acked = None;
        }
        log::info!("map reloaded, snapshot state reset");
    }

    /// Advances one tick: refreshes slot tables when due, then builds and
    /// sends every viewer's snapshot.
    pub fn tick(
        &mut self,
        world: &mut dyn GameWorld,
        transport: &mut dyn Transport,
    ) -> Result<TickReport, ServerError> {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        if self.tick % self.config.id_map_update_rate as Tick == 0 {
            report.mappings_updated = self.update_mappings(world);
        }
        self.do_snapshot(world, transport, &mut report);
        Ok(report)
    }

    pub fn update_mappings(&mut self, world: &dyn GameWorld) -> usize {
        let presence: Vec<Presence> = (0..MAX_CLIENTS)
            .map(|client_id| {
                if !self.client_ingame(client_id) {
                    Presence::Absent
                } else {
                    world
                        .character(client_id)
                        .map_or(Presence::Bodiless, |chr| Presence::At(chr.position()))
                }
            })
            .collect();

        let mut updated = 0;
        for viewer in self.participants.viewer_ids() {
            if self.hooks.fire(HookKind::IdMapUpdate, viewer) == HookOutcome::Handled {
                continue;
            }
            let view_pos = world.view_pos(viewer).unwrap_or(Vec2::ZERO);
            let Some(participant) = self.participants.get_mut(viewer) else {
                continue;
            };
            match idmap::recompute(&mut participant.id_map, viewer, view_pos, &presence) {
                Ok(()) => updated += 1,
                Err(e) => log::error!("id map of client {viewer} left inconsistent: {e}"),
            }
        }
        updated
    }

    fn do_snapshot(
        &mut self,
        world: &mut dyn GameWorld,
        transport: &mut dyn Transport,
        report: &mut TickReport,
    ) {
        let tick = self.tick;
        if !self.config.high_bandwidth && tick % 2 != 0 {
            return;
        }
        world.on_pre_snap();

        if let Some(recorder) = self.recorder.as_mut()
            && recorder.is_recording()
        {
            self.builder.init();
            match world.snap(&SnapContext::recording(tick), &mut self.builder) {
                Ok(()) => recorder.record_snapshot(tick, &self.builder.finish()),
                Err(e) => log::error!("recording snapshot failed: {e}"),
            }
        }

        let max_chunk = self
            .config
            .max_snapshot_packsize
            .min(transport.max_chunk_size())
            .max(1);
        let purge_tick = tick - self.config.history_ticks();

        for client_id in self.participants.viewer_ids() {
            let Some(participant) = self.participants.get_mut(client_id) else {
                continue;
            };
            if !participant
                .snap_rate
                .should_send(tick, self.config.high_bandwidth)
            {
                continue;
            }

            self.builder.init();
            let ctx = SnapContext::for_viewer(tick, client_id, &participant.id_map);
            if let Err(e) = world.snap(&ctx, &mut self.builder) {
                log::error!("snapshot for client {client_id} failed: {e}");
                report.failed_snapshots += 1;
                continue;
            }
            let current = self.builder.finish();
            let crc = current.crc();

            participant.history.purge_until(purge_tick);
            participant.history.add(tick, Instant::now(), current, None);

            let baseline = participant
                .last_acked
                .and_then(|acked| participant.history.get(acked))
                .filter(|entry| entry.tick != tick)
                .map(|entry| entry.tick);
            if baseline.is_none() && participant.snap_rate == SnapRate::Full {
                log::debug!("client {client_id} lost its baseline, snap rate Full -> Recover");
                participant.snap_rate = SnapRate::Recover;
            }

            let empty = Snapshot::empty();
            let (Some(current), base) = (
                participant.history.get(tick).map(|entry| &entry.snapshot),
                baseline
                    .and_then(|acked| participant.history.get(acked))
                    .map_or(&empty, |entry| &entry.snapshot),
            ) else {
                continue;
            };
            let delta_tick = baseline.unwrap_or(-1);
            let offset = tick - delta_tick;

            let messages = match self.delta.create_delta(base, current) {
                Ok(delta) if delta.is_empty() => {
                    report.empty_snapshots += 1;
                    let mut msg = MsgPacker::new(SystemMsg::SnapEmpty as i32, true);
                    msg.add_int(tick).add_int(offset);
                    vec![msg]
                }
                Ok(delta) => match net::compress(&delta, snapshot::MAX_SIZE) {
                    Ok(data) => chunk_snapshot(tick, offset, crc, &data, max_chunk),
                    Err(e) => {
                        log::error!("compressing snapshot for client {client_id} failed: {e}");
                        report.failed_snapshots += 1;
                        continue;
                    }
                },
                Err(e) => {
                    log::error!("delta for client {client_id} failed: {e}");
                    report.failed_snapshots += 1;
                    continue;
                }
            };

            let mut sent = true;
            for msg in &messages {
                if let Err(e) = self.send_msg(
                    msg,
                    MsgFlags::FLUSH | MsgFlags::NO_RECORD,
                    Some(client_id),
                    transport,
                ) {
                    log::error!("sending snapshot to client {client_id} failed: {e}");
                    report.failed_snapshots += 1;
                    sent = false;
                    break;
                }
                report.chunks += 1;
                report.bytes += msg.len();
            }
            if sent {
                report.snapshots += 1;
            }
        }

        world.on_post_snap();
    }
}

fn chunk_snapshot(tick: Tick, offset: i32, crc: i32, data: &[u8], max_chunk: usize) -> Vec<MsgPacker> {
    let num_parts = data.len().div_ceil(max_chunk);
    data.chunks(max_chunk)
        .enumerate()
        .map(|(part, chunk)| {
            let mut msg = if num_parts == 1 {
                let mut msg = MsgPacker::new(SystemMsg::SnapSingle as i32, true);
                msg.add_int(tick).add_int(offset).add_int(crc);
                msg
            } else {
                let mut msg = MsgPacker::new(SystemMsg::Snap as i32, true);
                msg.add_int(tick)
                    .add_int(offset)
                    .add_int(num_parts as i32)
                    .add_int(part as i32)
                    .add_int(crc);
                msg
            };
            msg.add_int(chunk.len() as i32).add_raw(chunk);
            msg
        })
        .collect()
}

fn truncate(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

impl std::fmt::Debug for ServerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCore")
            .field("tick", &self.tick)
            .field("config", &self.config)
            .field("participants", &self.participants.len())
            .field("recording", &self.recorder.as_ref().is_some_and(|r| r.is_recording()))
            .finish()
    }
}
