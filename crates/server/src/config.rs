use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use tickview::{CoreConfig, MAX_CLIENTS};

use crate::simulation::PacketLossSimulation;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub core: CoreConfig,
    /// Simulated clients per protocol class.
    pub vanilla_clients: usize,
    pub ddnet_clients: usize,
    pub extended_clients: usize,
    pub dummies: usize,
    pub arena_size: f32,
    /// Chance per tick that a client stops acknowledging for `stall_ticks`.
    pub stall_chance: f64,
    pub stall_ticks: i32,
    pub global_packet_loss: Option<PacketLossSimulation>,
    pub summary_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            vanilla_clients: 8,
            ddnet_clients: 8,
            extended_clients: 24,
            dummies: 4,
            arena_size: 2000.0,
            stall_chance: 0.0005,
            stall_ticks: 200,
            global_packet_loss: None,
            summary_interval_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn total_clients(&self) -> usize {
        self.vanilla_clients + self.ddnet_clients + self.extended_clients + self.dummies
    }

    pub fn validate(&self) -> Result<()> {
        self.core.validate()?;
        anyhow::ensure!(
            self.total_clients() <= MAX_CLIENTS,
            "{} clients requested, at most {} supported",
            self.total_clients(),
            MAX_CLIENTS
        );
        anyhow::ensure!(self.arena_size > 0.0, "arena_size must be positive");
        Ok(())
    }
}
