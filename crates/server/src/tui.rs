use std::collections::VecDeque;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};

use tickview::SnapRate;

use crate::server::{ClientSummary, ServerStats};

const MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Copy)]
enum LogLevel {
    Info,
    Warn,
    Error,
}

pub struct TuiState {
    log: VecDeque<(LogLevel, String)>,
    selected: usize,
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            log: VecDeque::new(),
            selected: 0,
        }
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn log_warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    fn push(&mut self, level: LogLevel, message: String) {
        if self.log.len() == MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back((level, message));
    }

    pub fn select_next(&mut self, count: usize) {
        if count > 0 {
            self.selected = (self.selected + 1) % count;
        }
    }

    pub fn select_prev(&mut self, count: usize) {
        if count > 0 {
            self.selected = (self.selected + count - 1) % count;
        }
    }

    pub fn selected<'a>(&self, clients: &'a [ClientSummary]) -> Option<&'a ClientSummary> {
        clients.get(self.selected.min(clients.len().saturating_sub(1)))
    }
}

pub fn render(
    frame: &mut Frame,
    state: &TuiState,
    stats: &ServerStats,
    clients: &[ClientSummary],
    id_map: &[String],
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(10),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, rows[0], stats);
    render_id_pool(frame, rows[1], stats);
    render_network(frame, rows[2], stats);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(35),
            Constraint::Percentage(25),
        ])
        .split(rows[3]);
    render_clients(frame, columns[0], state, clients);
    render_id_map(frame, columns[1], id_map);
    render_log(frame, columns[2], state);

    render_help(frame, rows[4]);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let title = format!(" tickview - Uptime: {} ", format_duration(stats.uptime_secs));
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let text = format!(
        "Tick: {}  |  Clients: {} ({}/{}/{} vanilla/ddnet/ext, +{} dummies)  |  Init {} Recover {}  |  Characters: {}  Projectiles: {}",
        stats.tick,
        stats.client_count,
        stats.vanilla_count,
        stats.ddnet_count,
        stats.extended_count,
        stats.dummy_count,
        stats.initializing,
        stats.recovering,
        stats.character_count,
        stats.projectile_count
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn render_id_pool(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Snapshot IDs ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let ratio = stats.ids_in_use as f64 / stats.id_capacity.max(1) as f64;
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio.min(1.0))
        .label(format!("{}/{} ids", stats.ids_in_use, stats.id_capacity));
    frame.render_widget(gauge, area);
}

fn render_network(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Network ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let net = &stats.network_stats;
    let report = &stats.last_report;
    let lines = vec![
        Line::from(vec![
            Span::styled("Chunks: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} sent / {}, {} inputs recv / {}",
                    net.packets_sent,
                    format_bytes(net.bytes_sent),
                    net.packets_received,
                    format_bytes(net.bytes_received)
                ),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Last tick: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} snapshots, {} empty, {} failed, {} chunks, {}",
                    report.snapshots,
                    report.empty_snapshots,
                    report.failed_snapshots,
                    report.chunks,
                    format_bytes(report.bytes as u64)
                ),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Slot tables: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} recomputed", report.mappings_updated),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_clients(frame: &mut Frame, area: Rect, state: &TuiState, clients: &[ClientSummary]) {
    let block = Block::default()
        .title(" Clients ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let selected = state.selected(clients).map(|c| c.client_id);
    let lines: Vec<Line> = clients
        .iter()
        .map(|client| {
            let rate = match client.snap_rate {
                Some(SnapRate::Init) => ("INIT", Color::Gray),
                Some(SnapRate::Full) => ("FULL", Color::Green),
                Some(SnapRate::Recover) => ("RECOVER", Color::Red),
                None => ("-", Color::DarkGray),
            };
            let mut style = Style::default().fg(Color::White);
            if Some(client.client_id) == selected {
                style = style.add_modifier(Modifier::REVERSED);
            }
            Line::from(vec![
                Span::styled(
                    format!(
                        "{:3} {:10} {:8?} ",
                        client.client_id, client.name, client.range
                    ),
                    style,
                ),
                Span::styled(format!("{:8}", rate.0), Style::default().fg(rate.1)),
                Span::styled(
                    format!(
                        " ack {:>6} seen {:>6} {:>4}ms rx {} drop {} snaps {} rej {}{}",
                        client.last_acked.map_or("-".to_string(), |t| t.to_string()),
                        client.latest_tick.map_or("-".to_string(), |t| t.to_string()),
                        client.latency_ms,
                        client.stats.chunks_received,
                        client.stats.chunks_dropped,
                        client.stats.snapshots_completed,
                        client.stats.rejected,
                        if client.stalled { " stalled" } else { "" }
                    ),
                    Style::default().fg(Color::Gray),
                ),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_id_map(frame: &mut Frame, area: Rect, id_map: &[String]) {
    let block = Block::default()
        .title(" ID Map ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let lines: Vec<Line> = id_map.iter().map(|l| Line::from(l.as_str())).collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Log ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .log
        .iter()
        .skip(state.log.len().saturating_sub(visible))
        .map(|(level, message)| {
            let color = match level {
                LogLevel::Info => Color::White,
                LogLevel::Warn => Color::Yellow,
                LogLevel::Error => Color::Red,
            };
            Line::from(Span::styled(message.as_str(), Style::default().fg(color)))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new(
        "q/ESC quit | Up/Down select viewer | k kick | j rejoin | s stall | r reload map",
    )
    .block(block)
    .style(
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    );
    frame.render_widget(text, area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
