use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::{MAX_SNAPSHOT_CHUNK, MAX_SNAPSHOT_PACKSIZE, SERVER_TICK_SPEED, Tick};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    Zero(&'static str),
    #[error("{name} must be at most {max}")]
    TooLarge { name: &'static str, max: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub tick_speed: u32,
    /// Send a snapshot every tick instead of every other tick.
    pub high_bandwidth: bool,
    /// Ticks between slot table recomputations.
    pub id_map_update_rate: u32,
    pub snapshot_history_secs: u32,
    pub id_quarantine_ms: u64,
    pub max_snapshot_packsize: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tick_speed: SERVER_TICK_SPEED,
            high_bandwidth: false,
            id_map_update_rate: 5,
            snapshot_history_secs: 3,
            id_quarantine_ms: 5000,
            max_snapshot_packsize: MAX_SNAPSHOT_PACKSIZE,
        }
    }
}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_speed == 0 {
            return Err(ConfigError::Zero("tick_speed"));
        }
        if self.id_map_update_rate == 0 {
            return Err(ConfigError::Zero("id_map_update_rate"));
        }
        if self.snapshot_history_secs == 0 {
            return Err(ConfigError::Zero("snapshot_history_secs"));
        }
        if self.max_snapshot_packsize == 0 {
            return Err(ConfigError::Zero("max_snapshot_packsize"));
        }
        if self.max_snapshot_packsize > MAX_SNAPSHOT_CHUNK {
            return Err(ConfigError::TooLarge {
                name: "max_snapshot_packsize",
                max: MAX_SNAPSHOT_CHUNK,
            });
        }
        Ok(())
    }

    pub fn history_ticks(&self) -> Tick {
        (self.tick_speed * self.snapshot_history_secs) as Tick
    }

    pub fn id_quarantine(&self) -> Duration {
        Duration::from_millis(self.id_quarantine_ms)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_speed.max(1) as f64)
    }
}
