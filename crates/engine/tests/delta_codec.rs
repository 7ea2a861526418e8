use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tickview::net::{compress, decompress};
use tickview::{Snapshot, SnapshotBuilder, SnapshotDelta};

fn random_snapshot(rng: &mut StdRng) -> Snapshot {
    let mut builder = SnapshotBuilder::new();
    for _ in 0..rng.gen_range(0..60) {
        let type_id = rng.gen_range(0..6);
        let id = rng.gen_range(0..20);
        let len = rng.gen_range(0..6);
        let data: Vec<i32> = (0..len).map(|_| rng.gen_range(-3..3)).collect();
        // duplicates are simply skipped
        let _ = builder.add_item(type_id, id, &data);
    }
    builder.finish()
}

#[test]
fn test_random_snapshots_round_trip() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut delta = SnapshotDelta::new();
    delta.set_static_size(5, 0);

    for _ in 0..500 {
        let mut from = random_snapshot(&mut rng);
        let mut to = random_snapshot(&mut rng);
        if delta.create_delta(&from, &to).is_err() {
            // static size violated by a random type-5 item
            from = Snapshot::empty();
            to = Snapshot::empty();
        }

        let encoded = delta.create_delta(&from, &to).unwrap();
        assert_eq!(delta.apply_delta(&from, &encoded).unwrap(), to);
        assert!(delta.create_delta(&to, &to).unwrap().is_empty());

        let packed = compress(&encoded, usize::MAX).unwrap();
        assert_eq!(decompress(&packed).unwrap(), encoded);
    }
}

#[test]
fn test_empty_baseline_is_all_additions() {
    let mut rng = StdRng::seed_from_u64(7);
    let delta = SnapshotDelta::new();
    let to = random_snapshot(&mut rng);
    let encoded = delta.create_delta(&Snapshot::empty(), &to).unwrap();
    if to.is_empty() {
        assert!(encoded.is_empty());
    } else {
        assert_eq!(encoded[0], 0);
        assert_eq!(encoded[1], to.num_items() as i32);
    }
}
