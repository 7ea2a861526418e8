use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tickview::{
    ChatMsg, ClientId, ClientState, ClientSupport, EmoticonMsg, KillMsg, NetworkStats, QueueTransport,
    ServerCore, SlotRange, SnapRate, Tick, TickReport,
};

use crate::client::{ClientStats, SimClient};
use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};
use crate::simulation::{ITEM_PROJECTILE, PROJECTILE_SIZE, SimWorld};

const CHAT_CHANCE: f64 = 0.002;
const KILL_CHANCE: f64 = 0.003;
const EMOTICON_CHANCE: f64 = 0.004;

pub struct GameServer {
    core: ServerCore,
    transport: QueueTransport,
    world: SimWorld,
    clients: Vec<SimClient>,
    config: ServerConfig,
    rng: StdRng,
    tick_duration: Duration,
    last_tick_time: Instant,
    accumulator: Duration,
    running: Arc<AtomicBool>,
    start_time: Instant,
    last_report: TickReport,
    inbound: NetworkStats,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(config: ServerConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut core = ServerCore::new(config.core.clone())?;
        core.set_static_size(ITEM_PROJECTILE, PROJECTILE_SIZE);

        let mut rng = StdRng::seed_from_u64(seed);
        let world = SimWorld::new(config.arena_size, StdRng::seed_from_u64(rng.r#gen()));

        let mut server = Self {
            tick_duration: config.core.tick_duration(),
            core,
            transport: QueueTransport::new(),
            world,
            clients: Vec::new(),
            rng,
            last_tick_time: Instant::now(),
            accumulator: Duration::ZERO,
            running: Arc::new(AtomicBool::new(true)),
            start_time: Instant::now(),
            last_report: TickReport::default(),
            inbound: NetworkStats::default(),
            pending_events: VecDeque::new(),
            config,
        };
        server.populate()?;
        Ok(server)
    }

    fn populate(&mut self) -> Result<()> {
        let classes = [
            (self.config.vanilla_clients, ClientSupport::empty()),
            (self.config.ddnet_clients, ClientSupport::SUPPORTS_64P),
            (
                self.config.extended_clients,
                ClientSupport::SUPPORTS_64P | ClientSupport::SUPPORTS_128P,
            ),
        ];
        let mut client_id = 0;
        for (count, support) in classes {
            for _ in 0..count {
                self.connect_client(client_id, support)?;
                client_id += 1;
            }
        }
        for _ in 0..self.config.dummies {
            self.core.init_dummy(client_id)?;
            self.core.set_client_name(client_id, &format!("dummy{client_id}"))?;
            self.world.spawn(client_id);
            self.pending_events
                .push_back(ServerEvent::DummyJoined { client_id });
            client_id += 1;
        }
        Ok(())
    }

    fn connect_client(&mut self, client_id: ClientId, support: ClientSupport) -> Result<()> {
        self.core.new_client(client_id)?;
        self.core.set_support_flags(client_id, support)?;
        self.core.set_client_name(client_id, &format!("player{client_id}"))?;
        self.core.set_client_ready(client_id)?;
        self.core.enter_game(client_id)?;
        self.world.spawn(client_id);

        let mut client = SimClient::new(client_id, support, self.core.snapshot_delta().clone());
        if let Some(sim) = &self.config.global_packet_loss {
            client.set_packet_loss_sim(sim.clone());
        }
        self.clients.push(client);
        self.pending_events.push_back(ServerEvent::ClientJoined {
            client_id,
            range: SlotRange::from_support(support),
        });
        Ok(())
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn run(&mut self) {
        let interval = Duration::from_secs(self.config.summary_interval_secs.max(1));
        let mut last_summary = Instant::now();
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            for event in self.pending_events.drain(..) {
                log_event(&event);
            }
            if last_summary.elapsed() >= interval {
                last_summary = Instant::now();
                self.log_summary();
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_clients();
    }

    fn log_summary(&self) {
        let stats = self.stats();
        log::info!(
            "tick={} clients={} dummies={} init={} full={} recover={} ids={}/{} sent={}B",
            stats.tick,
            stats.client_count,
            stats.dummy_count,
            stats.initializing,
            stats.client_count - stats.initializing - stats.recovering,
            stats.recovering,
            stats.ids_in_use,
            stats.id_capacity,
            stats.network_stats.bytes_sent
        );
        if let Some(viewer) = self.clients.first().map(SimClient::client_id)
            && let Err(e) = self.core.dump_id_map(viewer)
        {
            log::warn!("id map dump for client {viewer} failed: {e}");
        }
    }

    pub fn shutdown_clients(&mut self) {
        let client_ids: Vec<ClientId> = self.clients.iter().map(SimClient::client_id).collect();
        for client_id in client_ids {
            self.disconnect(client_id, DisconnectReason::Graceful);
        }
    }

    pub fn kick_client(&mut self, client_id: ClientId) {
        self.disconnect(client_id, DisconnectReason::Kicked);
    }

    fn disconnect(&mut self, client_id: ClientId, reason: DisconnectReason) {
        let Some(index) = self.clients.iter().position(|c| c.client_id() == client_id) else {
            return;
        };
        self.clients.remove(index);
        self.world.despawn(client_id);
        if let Err(e) = self.core.drop_client(client_id, reason.as_str()) {
            self.pending_events.push_back(ServerEvent::Error {
                message: format!("dropping client {client_id}: {e}"),
            });
        }
        self.pending_events
            .push_back(ServerEvent::ClientLeft { client_id, reason });
    }

    pub fn stall_client(&mut self, client_id: ClientId) {
        let until = self.core.current_tick() + self.config.stall_ticks;
        if let Some(client) = self.clients.iter_mut().find(|c| c.client_id() == client_id) {
            client.stall(until);
            self.pending_events
                .push_back(ServerEvent::ClientStalled { client_id, until });
        }
    }

    /// Reconnects a previously kicked client slot with the given capabilities.
    pub fn rejoin(&mut self, client_id: ClientId, support: ClientSupport) -> Result<()> {
        let free = self
            .core
            .participant(client_id)
            .is_some_and(|p| p.state == ClientState::Empty);
        anyhow::ensure!(free, "client slot {client_id} is in use");
        self.connect_client(client_id, support)
    }

    pub fn reload_map(&mut self) -> Result<()> {
        self.world.clear_projectiles(&mut self.core)?;
        self.core.on_map_reload();
        for client in &mut self.clients {
            client.reset();
        }
        Ok(())
    }

    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;
        self.accumulator += delta;

        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            if let Err(e) = self.tick() {
                log::error!("tick {} failed: {e}", self.core.current_tick());
                self.pending_events.push_back(ServerEvent::Error {
                    message: format!("tick failed: {e}"),
                });
            }
        }
    }

    pub fn tick(&mut self) -> Result<()> {
        let dt = self.tick_duration.as_secs_f32();
        self.world.step(&mut self.core, dt)?;
        self.last_report = self.core.tick(&mut self.world, &mut self.transport)?;
        let now = self.core.current_tick();

        for chunk in self.transport.drain() {
            if let Some(client) = self
                .clients
                .iter_mut()
                .find(|c| c.client_id() == chunk.client_id)
            {
                client.push_chunk(now, chunk.data, &mut self.rng);
            }
        }

        let mut inputs = Vec::new();
        for client in &mut self.clients {
            for err in client.process(now) {
                log::debug!("client {} rejected snapshot: {err}", client.client_id());
                self.pending_events.push_back(ServerEvent::SnapshotRejected {
                    client_id: client.client_id(),
                    message: err.to_string(),
                });
            }
            if !client.is_stalled(now) && self.rng.gen_bool(self.config.stall_chance) {
                let until = now + self.config.stall_ticks;
                client.stall(until);
                self.pending_events.push_back(ServerEvent::ClientStalled {
                    client_id: client.client_id(),
                    until,
                });
            }
            if let Some(input) = client.take_input(now) {
                inputs.push((client.client_id(), input));
            }
        }
        for (client_id, input) in inputs {
            self.inbound.record_received(input.data().len());
            self.core
                .handle_message(client_id, input.data(), &mut self.transport)?;
        }

        self.maybe_chatter()?;
        Ok(())
    }

    fn maybe_chatter(&mut self) -> Result<()> {
        let ingame = self.core.participants().ingame_ids();
        if ingame.len() < 2 {
            return Ok(());
        }
        if self.rng.gen_bool(CHAT_CHANCE) {
            let author = ingame[self.rng.gen_range(0..ingame.len())];
            let chat = ChatMsg {
                team: 0,
                author: Some(author),
                message: format!("gg at tick {}", self.core.current_tick()),
            };
            self.core.send_chat(&chat, None, &mut self.transport)?;
        }
        if self.rng.gen_bool(KILL_CHANCE) {
            let killer = ingame[self.rng.gen_range(0..ingame.len())];
            let victim = ingame[self.rng.gen_range(0..ingame.len())];
            let kill = KillMsg {
                killer,
                victim,
                weapon: self.rng.gen_range(0..6),
                mode_special: 0,
            };
            self.core.send_kill_msg(&kill, &mut self.transport)?;
        }
        if self.rng.gen_bool(EMOTICON_CHANCE) {
            let emoticon = EmoticonMsg {
                author: ingame[self.rng.gen_range(0..ingame.len())],
                emoticon: self.rng.gen_range(0..16),
            };
            self.core.send_emoticon(&emoticon, &mut self.transport)?;
        }
        Ok(())
    }

    pub fn dump_id_map(&self, viewer: ClientId) -> Vec<String> {
        self.core.dump_id_map(viewer).unwrap_or_default()
    }

    pub fn stats(&self) -> ServerStats {
        let participants = self.core.participants();
        let count_rate = |rate: SnapRate| {
            participants
                .iter()
                .filter(|(_, p)| p.is_viewer() && p.snap_rate == rate)
                .count()
        };
        let count_range = |range: SlotRange| {
            self.clients
                .iter()
                .filter(|c| c.slot_range() == range)
                .count()
        };
        let mut network_stats = self.transport.stats().clone();
        network_stats.packets_received = self.inbound.packets_received;
        network_stats.bytes_received = self.inbound.bytes_received;
        ServerStats {
            tick: self.core.current_tick(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            client_count: participants.viewer_ids().len(),
            dummy_count: participants.count(ClientState::Dummy),
            vanilla_count: count_range(SlotRange::Vanilla),
            ddnet_count: count_range(SlotRange::DDNet),
            extended_count: count_range(SlotRange::Extended),
            initializing: count_rate(SnapRate::Init),
            recovering: count_rate(SnapRate::Recover),
            character_count: self.world.character_count(),
            projectile_count: self.world.projectile_count(),
            ids_in_use: self.core.id_pool().in_use(),
            id_capacity: self.core.id_pool().capacity(),
            last_report: self.last_report,
            network_stats,
        }
    }

    pub fn client_infos(&self) -> Vec<ClientSummary> {
        self.clients
            .iter()
            .map(|client| {
                let participant = self.core.participant(client.client_id());
                ClientSummary {
                    client_id: client.client_id(),
                    name: self.core.client_name(client.client_id()),
                    support: client.support(),
                    range: client.slot_range(),
                    snap_rate: participant.map(|p| p.snap_rate),
                    last_acked: participant.and_then(|p| p.last_acked),
                    latency_ms: participant.map_or(0, |p| p.latency_ms),
                    latest_tick: client.latest_tick(),
                    stalled: client.is_stalled(self.core.current_tick()),
                    stats: client.stats(),
                }
            })
            .collect()
    }
}

fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::ClientJoined { client_id, range } => {
            log::info!("simulated client {client_id} joined ({range:?})");
        }
        ServerEvent::DummyJoined { client_id } => log::info!("dummy {client_id} joined"),
        ServerEvent::ClientLeft { client_id, reason } => {
            log::info!("simulated client {client_id} {}", reason.as_str());
        }
        ServerEvent::ClientStalled { client_id, until } => {
            log::warn!("simulated client {client_id} stalled until tick {until}");
        }
        ServerEvent::SnapshotRejected { client_id, message } => {
            log::warn!("simulated client {client_id} rejected snapshot: {message}");
        }
        ServerEvent::Error { message } => log::error!("{message}"),
    }
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub tick: Tick,
    pub uptime_secs: u64,
    pub client_count: usize,
    pub dummy_count: usize,
    pub vanilla_count: usize,
    pub ddnet_count: usize,
    pub extended_count: usize,
    pub initializing: usize,
    pub recovering: usize,
    pub character_count: usize,
    pub projectile_count: usize,
    pub ids_in_use: usize,
    pub id_capacity: usize,
    pub last_report: TickReport,
    pub network_stats: NetworkStats,
}

#[derive(Debug, Clone)]
pub struct ClientSummary {
    pub client_id: ClientId,
    pub name: String,
    pub support: ClientSupport,
    pub range: SlotRange,
    pub snap_rate: Option<SnapRate>,
    pub last_acked: Option<Tick>,
    pub latency_ms: i32,
    pub latest_tick: Option<Tick>,
    pub stalled: bool,
    pub stats: ClientStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ServerConfig {
        ServerConfig {
            vanilla_clients: 2,
            ddnet_clients: 2,
            extended_clients: 2,
            dummies: 1,
            stall_chance: 0.0,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_clients_reach_full_rate() {
        let mut server = GameServer::new(small_config(), 11).unwrap();
        for _ in 0..100 {
            server.tick().unwrap();
        }
        let infos = server.client_infos();
        assert_eq!(infos.len(), 6);
        for info in infos {
            assert_eq!(info.snap_rate, Some(SnapRate::Full));
            assert_eq!(info.stats.rejected, 0);
            assert!(info.latest_tick.is_some_and(|tick| tick >= 98));
        }
        let stats = server.stats();
        assert_eq!(stats.dummy_count, 1);
        assert_eq!(stats.character_count, 7);
    }

    #[test]
    fn test_snapshots_keep_flowing_with_projectiles() {
        let mut server = GameServer::new(small_config(), 15).unwrap();
        let mut ticks_with_projectiles = 0;
        for _ in 0..200 {
            server.tick().unwrap();
            let stats = server.stats();
            if stats.tick > 20 && stats.tick % 2 == 0 && stats.projectile_count > 0 {
                ticks_with_projectiles += 1;
                assert_eq!(stats.last_report.snapshots, 6, "tick {}", stats.tick);
                assert_eq!(stats.last_report.failed_snapshots, 0);
            }
        }
        assert!(ticks_with_projectiles > 0);
        for info in server.client_infos() {
            assert_eq!(info.stats.rejected, 0);
            assert_eq!(info.latest_tick, Some(200));
        }
    }

    #[test]
    fn test_stalled_client_recovers() {
        let mut server = GameServer::new(small_config(), 12).unwrap();
        for _ in 0..20 {
            server.tick().unwrap();
        }
        server.clients[0].stall(420);
        for _ in 0..380 {
            server.tick().unwrap();
        }
        assert_eq!(server.stats().recovering, 1);
        for _ in 0..60 {
            server.tick().unwrap();
        }
        assert_eq!(server.stats().recovering, 0);
        assert_eq!(server.clients[0].stats().rejected, 0);
    }

    #[test]
    fn test_kick_and_rejoin() {
        let mut server = GameServer::new(small_config(), 13).unwrap();
        server.kick_client(1);
        assert_eq!(server.client_infos().len(), 5);
        assert!(server.rejoin(0, ClientSupport::empty()).is_err());
        server.rejoin(1, ClientSupport::SUPPORTS_128P).unwrap();
        for _ in 0..20 {
            server.tick().unwrap();
        }
        let events: Vec<_> = server.drain_events().collect();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ServerEvent::ClientLeft { client_id: 1, .. }))
        );
    }

    #[test]
    fn test_map_reload_restarts_streams() {
        let mut server = GameServer::new(small_config(), 14).unwrap();
        for _ in 0..40 {
            server.tick().unwrap();
        }
        server.reload_map().unwrap();
        assert_eq!(server.stats().projectile_count, 0);
        assert_eq!(server.stats().ids_in_use, 0);
        for _ in 0..20 {
            server.tick().unwrap();
        }
        for info in server.client_infos() {
            assert_eq!(info.stats.rejected, 0);
            assert!(info.latest_tick.is_some());
        }
    }
}
