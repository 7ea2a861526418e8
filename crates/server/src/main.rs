mod client;
mod config;
mod events;
mod server;
mod simulation;
mod tui;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use tickview::{ClientId, ClientSupport};

use config::ServerConfig;
use events::ServerEvent;
use server::GameServer;
use simulation::PacketLossSimulation;
use tui::TuiState;

#[derive(Parser)]
#[command(name = "tickview-server")]
#[command(about = "Snapshot server driving simulated clients")]
struct Args {
    #[arg(short, long, help = "JSON config file")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    tick_rate: Option<u32>,

    #[arg(long)]
    vanilla: Option<usize>,

    #[arg(long)]
    ddnet: Option<usize>,

    #[arg(long)]
    extended: Option<usize>,

    #[arg(long)]
    dummies: Option<usize>,

    #[arg(long, help = "Ticks between slot table recomputations")]
    id_map_update_rate: Option<u32>,

    #[arg(long, help = "Send snapshots every tick")]
    high_bandwidth: bool,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long)]
    headless: bool,

    #[arg(long, help = "Enable global packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ticks")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ticks")]
    max_latency: u32,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(tick_rate) = self.tick_rate {
            config.core.tick_speed = tick_rate;
        }
        if let Some(count) = self.vanilla {
            config.vanilla_clients = count;
        }
        if let Some(count) = self.ddnet {
            config.ddnet_clients = count;
        }
        if let Some(count) = self.extended {
            config.extended_clients = count;
        }
        if let Some(count) = self.dummies {
            config.dummies = count;
        }
        if let Some(rate) = self.id_map_update_rate {
            config.core.id_map_update_rate = rate;
        }
        config.core.high_bandwidth |= self.high_bandwidth;
        if self.simulate_packet_loss {
            config.global_packet_loss = Some(PacketLossSimulation {
                enabled: true,
                loss_percent: self.loss_percent,
                min_latency_ticks: self.min_latency,
                max_latency_ticks: self.max_latency,
            });
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let headless = args.headless;
    let seed = args.seed;
    let config = args.into_config()?;

    if headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut server = GameServer::new(config, seed)?;

    if headless {
        log::info!("Server started with {} clients", server.client_infos().len());
        server.run();
        log::info!("Server shutting down");
    } else {
        run_with_tui(&mut server)?;
    }

    Ok(())
}

fn describe(event: ServerEvent, tui_state: &mut TuiState) {
    match event {
        ServerEvent::ClientJoined { client_id, range } => {
            tui_state.log_info(format!("Client {} joined ({:?})", client_id, range));
        }
        ServerEvent::DummyJoined { client_id } => {
            tui_state.log_info(format!("Dummy {} joined", client_id));
        }
        ServerEvent::ClientLeft { client_id, reason } => {
            tui_state.log_info(format!("Client {} {}", client_id, reason.as_str()));
        }
        ServerEvent::ClientStalled { client_id, until } => {
            tui_state.log_warn(format!("Client {} stalled until tick {}", client_id, until));
        }
        ServerEvent::SnapshotRejected { client_id, message } => {
            tui_state.log_warn(format!("Client {} rejected snapshot: {}", client_id, message));
        }
        ServerEvent::Error { message } => {
            tui_state.log_error(message);
        }
    }
}

fn run_with_tui(server: &mut GameServer) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = server.running();
    let mut tui_state = TuiState::new();
    let mut kicked: Vec<(ClientId, ClientSupport)> = Vec::new();

    tui_state.log_info("Server started");

    while running.load(Ordering::SeqCst) {
        server.tick_once();

        for event in server.drain_events() {
            describe(event, &mut tui_state);
        }

        if event::poll(Duration::from_millis(1))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            let clients = server.client_infos();
            let selected = tui_state.selected(&clients).map(|c| c.client_id);
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    running.store(false, Ordering::SeqCst);
                }
                KeyCode::Up => tui_state.select_prev(clients.len()),
                KeyCode::Down => tui_state.select_next(clients.len()),
                KeyCode::Char('k') | KeyCode::Char('K') => {
                    if let Some(client) = tui_state.selected(&clients) {
                        server.kick_client(client.client_id);
                        kicked.push((client.client_id, client.support));
                    }
                }
                KeyCode::Char('j') | KeyCode::Char('J') => {
                    if let Some((client_id, support)) = kicked.pop()
                        && let Err(e) = server.rejoin(client_id, support)
                    {
                        tui_state.log_error(format!("Rejoin failed: {}", e));
                    }
                }
                KeyCode::Char('s') | KeyCode::Char('S') => {
                    if let Some(client_id) = selected {
                        server.stall_client(client_id);
                    }
                }
                KeyCode::Char('r') | KeyCode::Char('R') => {
                    if let Err(e) = server.reload_map() {
                        tui_state.log_error(format!("Map reload failed: {}", e));
                    } else {
                        tui_state.log_info("Map reloaded");
                    }
                }
                _ => {}
            }
        }

        let stats = server.stats();
        let clients = server.client_infos();
        let id_map = tui_state
            .selected(&clients)
            .map(|c| server.dump_id_map(c.client_id))
            .unwrap_or_default();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats, &clients, &id_map);
        })?;
    }

    tui_state.log_info("Shutting down...");
    server.shutdown_clients();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
