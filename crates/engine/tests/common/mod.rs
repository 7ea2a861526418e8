#![allow(dead_code)]

use glam::Vec2;

use tickview::{
    Character, ClientId, ClientSupport, GameWorld, MAX_CLIENTS, MsgPacker, QueueTransport,
    ServerCore, SnapContext, SnapshotBuilder, SnapshotError, SystemMsg, Tick, TickReport,
};

pub const ITEM_CHARACTER: i32 = 2;
pub const ITEM_FIXED: i32 = 4;
pub const ITEM_BULK: i32 = 9;

pub const FIXED_FIELDS: usize = 3;

pub struct Body {
    pub pos: Vec2,
}

impl Character for Body {
    fn position(&self) -> Vec2 {
        self.pos
    }
}

/// Characters snapped at their translated slot, plus optional untranslated bulk items.
pub struct TestWorld {
    pub bodies: Vec<Option<Body>>,
    pub bulk: Vec<Vec<i32>>,
    pub fixed: Vec<Vec<i32>>,
    pub fixed_for: Vec<(ClientId, Vec<i32>)>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            bodies: (0..MAX_CLIENTS).map(|_| None).collect(),
            bulk: Vec::new(),
            fixed: Vec::new(),
            fixed_for: Vec::new(),
        }
    }

    pub fn place(&mut self, client_id: ClientId, pos: Vec2) {
        self.bodies[client_id] = Some(Body { pos });
    }

    pub fn remove(&mut self, client_id: ClientId) {
        self.bodies[client_id] = None;
    }
}

impl GameWorld for TestWorld {
    fn snap(&self, ctx: &SnapContext<'_>, builder: &mut SnapshotBuilder) -> Result<(), SnapshotError> {
        for (client_id, body) in self.bodies.iter().enumerate() {
            let Some(body) = body else { continue };
            let Some(slot) = ctx.translate(client_id) else {
                continue;
            };
            builder.add_item(
                ITEM_CHARACTER,
                slot as i32,
                &[body.pos.x as i32, body.pos.y as i32, ctx.tick()],
            )?;
        }
        for (id, data) in self.bulk.iter().enumerate() {
            builder.add_item(ITEM_BULK, id as i32, data)?;
        }
        for (id, data) in self.fixed.iter().enumerate() {
            builder.add_item(ITEM_FIXED, id as i32, data)?;
        }
        for (id, (viewer, data)) in self.fixed_for.iter().enumerate() {
            if ctx.viewer() == Some(*viewer) {
                builder.add_item(ITEM_FIXED, 100 + id as i32, data)?;
            }
        }
        Ok(())
    }

    fn character(&self, client_id: ClientId) -> Option<&dyn Character> {
        self.bodies
            .get(client_id)?
            .as_ref()
            .map(|body| body as &dyn Character)
    }
}

pub fn join(core: &mut ServerCore, client_id: ClientId, support: ClientSupport) {
    core.new_client(client_id).unwrap();
    core.set_support_flags(client_id, support).unwrap();
    core.set_client_ready(client_id).unwrap();
    core.enter_game(client_id).unwrap();
}

pub fn input(ack: Tick, intended: Tick) -> MsgPacker {
    let mut msg = MsgPacker::new(SystemMsg::Input as i32, true);
    msg.add_int(ack).add_int(intended).add_int(0);
    msg
}

pub fn ack(core: &mut ServerCore, transport: &mut QueueTransport, client_id: ClientId, tick: Tick) {
    let msg = input(tick, tick + 1);
    core.handle_message(client_id, msg.data(), transport).unwrap();
}

pub fn tick_until_mapped(
    core: &mut ServerCore,
    world: &mut TestWorld,
    transport: &mut QueueTransport,
) -> TickReport {
    loop {
        let report = core.tick(world, transport).unwrap();
        if report.mappings_updated > 0 {
            return report;
        }
    }
}
