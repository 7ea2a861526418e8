mod common;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tickview::{
    ChatMsg, ClientId, ClientSupport, CoreConfig, GameMsg, HookKind, HookOutcome, KillMsg,
    QueueTransport, ServerCore, SlotRange, Unpacker,
};

use common::{TestWorld, join, tick_until_mapped};

fn setup() -> (ServerCore, TestWorld, QueueTransport) {
    (
        ServerCore::new(CoreConfig::default()).unwrap(),
        TestWorld::new(),
        QueueTransport::new(),
    )
}

fn axis_pos(client_id: ClientId, distance: f32) -> Vec2 {
    match client_id % 4 {
        0 => Vec2::new(distance, 0.0),
        1 => Vec2::new(0.0, distance),
        2 => Vec2::new(-distance, 0.0),
        _ => Vec2::new(0.0, -distance),
    }
}

fn assert_consistent(core: &ServerCore, viewer: ClientId) {
    let map = core.id_map(viewer).unwrap();
    for (slot, client_id) in map.assigned() {
        assert_eq!(core.translate(client_id, viewer), Some(slot));
        assert_eq!(core.translate_reverse(slot, viewer), Some(client_id));
    }
    if map.range().needs_translation() {
        assert_eq!(map.slot_of(viewer), Some(0));
        assert_eq!(map.id_of(map.range().fallback_slot()), None);
        assert!(map.num_assigned() <= map.range().largest_assignable() + 1);
    }
}

#[test]
fn test_vanilla_viewer_sees_fourteen_nearest() {
    let (mut core, mut world, mut transport) = setup();

    join(&mut core, 0, ClientSupport::empty());
    world.place(0, Vec2::ZERO);
    let mut distances = Vec::new();
    for client_id in 1..20 {
        join(&mut core, client_id, ClientSupport::SUPPORTS_128P);
        let distance = (((client_id * 7) % 13) + 1) as f32 * 10.0;
        world.place(client_id, axis_pos(client_id, distance));
        distances.push((distance, client_id));
    }

    tick_until_mapped(&mut core, &mut world, &mut transport);

    distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    let (visible, hidden) = distances.split_at(14);

    let map = core.id_map(0).unwrap();
    assert_eq!(map.num_assigned(), 15);
    assert_eq!(core.translate(0, 0), Some(0));
    for &(_, client_id) in visible {
        let slot = core.translate(client_id, 0).unwrap();
        assert!((1..=14).contains(&slot));
    }
    for &(_, client_id) in hidden {
        assert_eq!(core.translate(client_id, 0), None);
    }
    assert_eq!(core.translate_reverse(15, 0), None);
    assert_consistent(&core, 0);

    for client_id in 1..20 {
        assert_eq!(core.translate(7, client_id), Some(7));
    }
}

#[test]
fn test_nearer_participant_takes_farthest_slot() {
    let (mut core, mut world, mut transport) = setup();

    join(&mut core, 0, ClientSupport::empty());
    world.place(0, Vec2::ZERO);
    for client_id in 1..=14 {
        join(&mut core, client_id, ClientSupport::SUPPORTS_128P);
        world.place(client_id, Vec2::new(client_id as f32 * 10.0, 0.0));
    }
    // bodiless 64-slot viewer
    join(&mut core, 20, ClientSupport::SUPPORTS_64P);

    tick_until_mapped(&mut core, &mut world, &mut transport);
    assert_eq!(core.id_map(0).unwrap().num_assigned(), 15);
    assert_eq!(core.translate(20, 0), None);

    let farthest = 14;
    let farthest_slot = core.translate(farthest, 0).unwrap();
    let other_before: Vec<_> = core.id_map(20).unwrap().assigned().collect();

    join(&mut core, 30, ClientSupport::SUPPORTS_128P);
    world.place(30, Vec2::new(5.0, 0.0));
    tick_until_mapped(&mut core, &mut world, &mut transport);

    assert_eq!(core.translate(30, 0), Some(farthest_slot));
    assert_eq!(core.translate(farthest, 0), None);
    for client_id in 1..14 {
        assert!(core.translate(client_id, 0).is_some());
    }

    let other = core.id_map(20).unwrap();
    for (slot, client_id) in other_before {
        assert_eq!(other.slot_of(client_id), Some(slot));
    }
    assert!(other.slot_of(30).is_some());
    assert_consistent(&core, 0);
    assert_consistent(&core, 20);
}

#[test]
fn test_self_slot_survives_random_movement() {
    let (mut core, mut world, mut transport) = setup();
    let mut rng = StdRng::seed_from_u64(0xfeed);

    for client_id in 0..60 {
        let support = match client_id % 3 {
            0 => ClientSupport::empty(),
            1 => ClientSupport::SUPPORTS_64P,
            _ => ClientSupport::SUPPORTS_128P,
        };
        join(&mut core, client_id, support);
        if client_id % 7 != 0 {
            world.place(
                client_id,
                Vec2::new(rng.gen_range(-500.0..500.0), rng.gen_range(-500.0..500.0)),
            );
        }
    }
    for dummy in 60..80 {
        core.init_dummy(dummy).unwrap();
        world.place(dummy, Vec2::new(rng.gen_range(-500.0..500.0), 0.0));
    }

    for round in 0..20 {
        for body in world.bodies.iter_mut().flatten() {
            body.pos += Vec2::new(rng.gen_range(-40.0..40.0), rng.gen_range(-40.0..40.0));
        }
        if round == 10 {
            core.drop_client(3, "timeout").unwrap();
            world.remove(3);
        }
        tick_until_mapped(&mut core, &mut world, &mut transport);

        for viewer in core.participants().viewer_ids() {
            assert_consistent(&core, viewer);
        }
    }
    assert!(core.id_map(60).unwrap().assigned().next().is_none());
}

#[test]
fn test_drop_clears_slot_everywhere() {
    let (mut core, mut world, mut transport) = setup();
    for client_id in 0..4 {
        join(&mut core, client_id, ClientSupport::empty());
        world.place(client_id, Vec2::ZERO);
    }
    tick_until_mapped(&mut core, &mut world, &mut transport);
    assert!(core.translate(2, 0).is_some());

    core.drop_client(2, "quit").unwrap();
    for viewer in [0, 1, 3] {
        assert_eq!(core.translate(2, viewer), None);
        assert_consistent(&core, viewer);
    }
}

#[test]
fn test_handled_hook_skips_recomputation() {
    let (mut core, mut world, mut transport) = setup();
    core.hooks_mut()
        .register(HookKind::IdMapUpdate, |viewer| {
            if viewer == 1 {
                HookOutcome::Handled
            } else {
                HookOutcome::Continue
            }
        });
    for client_id in 0..3 {
        join(&mut core, client_id, ClientSupport::empty());
        world.place(client_id, Vec2::ZERO);
    }

    let report = tick_until_mapped(&mut core, &mut world, &mut transport);
    assert_eq!(report.mappings_updated, 2);
    assert_eq!(core.id_map(1).unwrap().num_assigned(), 0);
    assert_eq!(core.id_map(0).unwrap().num_assigned(), 3);
}

#[test]
fn test_chat_and_kill_translation_per_viewer() {
    let (mut core, mut world, mut transport) = setup();
    join(&mut core, 0, ClientSupport::empty());
    world.place(0, Vec2::ZERO);
    for client_id in 1..=14 {
        join(&mut core, client_id, ClientSupport::SUPPORTS_128P);
        world.place(client_id, Vec2::new(client_id as f32, 0.0));
    }
    join(&mut core, 40, ClientSupport::SUPPORTS_128P);
    core.set_client_name(40, "faraway").unwrap();
    world.place(40, Vec2::new(9000.0, 0.0));
    tick_until_mapped(&mut core, &mut world, &mut transport);
    transport.drain().for_each(drop);

    let chat = ChatMsg {
        team: 0,
        author: Some(40),
        message: "hi".to_string(),
    };
    core.send_chat(&chat, None, &mut transport).unwrap();

    let to_vanilla = transport.drain_for(0);
    assert_eq!(to_vanilla.len(), 1);
    let mut unpacker = Unpacker::new(&to_vanilla[0].data);
    assert_eq!(unpacker.header().unwrap().msg_id, GameMsg::SvChat as i32);
    assert_eq!(unpacker.get_int().unwrap(), 0);
    assert_eq!(
        unpacker.get_int().unwrap(),
        SlotRange::Vanilla.fallback_slot() as i32
    );
    assert_eq!(unpacker.get_string().unwrap(), "faraway: hi");

    let to_extended = transport.drain_for(5);
    let mut unpacker = Unpacker::new(&to_extended[0].data);
    unpacker.header().unwrap();
    unpacker.get_int().unwrap();
    assert_eq!(unpacker.get_int().unwrap(), 40);
    assert_eq!(unpacker.get_string().unwrap(), "hi");
    transport.drain().for_each(drop);

    let kill = KillMsg {
        killer: 3,
        victim: 40,
        weapon: 2,
        mode_special: 0,
    };
    core.send_kill_msg(&kill, &mut transport).unwrap();
    assert!(transport.drain_for(0).is_empty());
    assert_eq!(transport.drain_for(5).len(), 1);
}

#[test]
fn test_dump_lists_every_slot() {
    let (mut core, mut world, mut transport) = setup();
    join(&mut core, 0, ClientSupport::SUPPORTS_64P);
    join(&mut core, 1, ClientSupport::empty());
    world.place(0, Vec2::ZERO);
    world.place(1, Vec2::ZERO);
    tick_until_mapped(&mut core, &mut world, &mut transport);

    let lines = core.dump_id_map(0).unwrap();
    assert_eq!(lines.len(), 34);
    assert_eq!(lines[0], "------------------[ ID MAP OF 0 ]-----------------------");
    assert!(lines[1].starts_with("    0 ->  0"));
    assert_eq!(lines[33], "end ID map");
    assert!(core.dump_id_map(200).is_err());
}
