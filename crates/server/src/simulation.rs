use glam::Vec2;
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use tickview::{
    Character, ClientId, GameWorld, MAX_CLIENTS, ServerCore, ServerError, SnapContext,
    SnapshotBuilder, SnapshotError,
};

pub const ITEM_PROJECTILE: i32 = 2;
pub const ITEM_CHARACTER: i32 = 9;
pub const ITEM_PLAYER_INFO: i32 = 10;

/// x, y, vel_x, vel_y, start_tick
pub const PROJECTILE_FIELDS: usize = 5;
pub const PROJECTILE_SIZE: usize = PROJECTILE_FIELDS * 4;

const MAX_SPEED: f32 = 400.0;
const ACCELERATION: f32 = 900.0;
const PROJECTILE_SPEED: f32 = 1100.0;
const PROJECTILE_LIFETIME: i32 = 40;
const FIRE_CHANCE: f64 = 0.01;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
    pub min_latency_ticks: u32,
    pub max_latency_ticks: u32,
}

impl PacketLossSimulation {
    pub fn should_drop(&self, rng: &mut impl Rng) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rng.gen_range(0.0..100.0) < self.loss_percent
    }

    pub fn delay_ticks(&self, rng: &mut impl Rng) -> u32 {
        if !self.enabled || self.max_latency_ticks == 0 {
            return 0;
        }
        let min = self.min_latency_ticks.min(self.max_latency_ticks);
        rng.gen_range(min..=self.max_latency_ticks)
    }
}

#[derive(Debug, Clone)]
pub struct SimCharacter {
    pub pos: Vec2,
    pub vel: Vec2,
}

impl Character for SimCharacter {
    fn position(&self) -> Vec2 {
        self.pos
    }
}

#[derive(Debug, Clone)]
struct Projectile {
    snap_id: usize,
    pos: Vec2,
    vel: Vec2,
    start_tick: i32,
    lifetime: i32,
}

/// Random-walking characters and the projectiles they fire.
pub struct SimWorld {
    characters: Vec<Option<SimCharacter>>,
    scores: Vec<i32>,
    projectiles: Vec<Projectile>,
    arena_size: f32,
    rng: StdRng,
}

impl SimWorld {
    pub fn new(arena_size: f32, rng: StdRng) -> Self {
        Self {
            characters: (0..MAX_CLIENTS).map(|_| None).collect(),
            scores: vec![0; MAX_CLIENTS],
            projectiles: Vec::new(),
            arena_size,
            rng,
        }
    }

    pub fn spawn(&mut self, client_id: ClientId) {
        let half = self.arena_size / 2.0;
        let pos = Vec2::new(
            self.rng.gen_range(-half..half),
            self.rng.gen_range(-half..half),
        );
        if let Some(slot) = self.characters.get_mut(client_id) {
            *slot = Some(SimCharacter {
                pos,
                vel: Vec2::ZERO,
            });
        }
    }

    pub fn despawn(&mut self, client_id: ClientId) {
        if let Some(slot) = self.characters.get_mut(client_id) {
            *slot = None;
        }
        if let Some(score) = self.scores.get_mut(client_id) {
            *score = 0;
        }
    }

    pub fn character_count(&self) -> usize {
        self.characters.iter().flatten().count()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    pub fn step(&mut self, core: &mut ServerCore, dt: f32) -> Result<(), ServerError> {
        let half = self.arena_size / 2.0;
        let tick = core.current_tick();

        for client_id in 0..MAX_CLIENTS {
            let Some(chr) = self.characters[client_id].as_mut() else {
                continue;
            };
            let accel = Vec2::new(
                self.rng.gen_range(-1.0..1.0),
                self.rng.gen_range(-1.0..1.0),
            ) * ACCELERATION;
            chr.vel = (chr.vel + accel * dt).clamp_length_max(MAX_SPEED);
            chr.pos += chr.vel * dt;
            if chr.pos.x.abs() > half {
                chr.vel.x = -chr.vel.x;
            }
            if chr.pos.y.abs() > half {
                chr.vel.y = -chr.vel.y;
            }
            chr.pos = chr.pos.clamp(Vec2::splat(-half), Vec2::splat(half));

            if self.rng.gen_bool(FIRE_CHANCE) {
                let dir = chr.vel.try_normalize().unwrap_or(Vec2::X);
                let pos = chr.pos;
                // pool exhaustion is logged by the pool; the shot is skipped
                if let Ok(snap_id) = core.snap_new_id() {
                    self.projectiles.push(Projectile {
                        snap_id,
                        pos,
                        vel: dir * PROJECTILE_SPEED,
                        start_tick: tick,
                        lifetime: PROJECTILE_LIFETIME,
                    });
                    self.scores[client_id] += 1;
                }
            }
        }

        for projectile in &mut self.projectiles {
            projectile.pos += projectile.vel * dt;
            projectile.lifetime -= 1;
        }
        let (expired, alive): (Vec<_>, Vec<_>) = self
            .projectiles
            .drain(..)
            .partition(|p| p.lifetime <= 0 || p.pos.abs().max_element() > half);
        self.projectiles = alive;
        for projectile in expired {
            core.snap_free_id(projectile.snap_id)?;
        }
        Ok(())
    }

    pub fn clear_projectiles(&mut self, core: &mut ServerCore) -> Result<(), ServerError> {
        for projectile in self.projectiles.drain(..) {
            core.snap_free_id(projectile.snap_id)?;
        }
        Ok(())
    }
}

impl GameWorld for SimWorld {
    fn snap(&self, ctx: &SnapContext<'_>, builder: &mut SnapshotBuilder) -> Result<(), SnapshotError> {
        for (client_id, chr) in self.characters.iter().enumerate() {
            let Some(chr) = chr else { continue };
            let Some(slot) = ctx.translate(client_id) else {
                continue;
            };
            builder.add_item(
                ITEM_CHARACTER,
                slot as i32,
                &[
                    ctx.tick(),
                    chr.pos.x as i32,
                    chr.pos.y as i32,
                    (chr.vel.x * 256.0) as i32,
                    (chr.vel.y * 256.0) as i32,
                ],
            )?;
            let local = ctx.viewer() == Some(client_id);
            builder.add_item(
                ITEM_PLAYER_INFO,
                slot as i32,
                &[local as i32, slot as i32, 0, self.scores[client_id]],
            )?;
        }

        for projectile in &self.projectiles {
            builder.add_item(
                ITEM_PROJECTILE,
                projectile.snap_id as i32,
                &[
                    projectile.pos.x as i32,
                    projectile.pos.y as i32,
                    (projectile.vel.x * 100.0) as i32,
                    (projectile.vel.y * 100.0) as i32,
                    projectile.start_tick,
                ],
            )?;
        }
        Ok(())
    }

    fn character(&self, client_id: ClientId) -> Option<&dyn Character> {
        self.characters
            .get(client_id)?
            .as_ref()
            .map(|chr| chr as &dyn Character)
    }
}
