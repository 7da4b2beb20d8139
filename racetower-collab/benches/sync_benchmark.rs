use criterion::{criterion_group, criterion_main, Criterion};
use racetower_collab::broadcast::BroadcastGroup;
use racetower_collab::protocol::{PeerInfo, SyncMessage};
use racetower_collab::storage::{RocksSnapshotStore, StoreConfig};
use racetower_core::{
    global_positions, PositionPublisher, RacerFields, RosterSnapshot, RosterStore,
};
use std::hint::black_box;
use std::sync::Arc;
use uuid::Uuid;

fn roster(count: usize) -> RosterStore {
    let mut store = RosterStore::new();
    for i in 0..count {
        store
            .add_racer(
                RacerFields::new(format!("Racer {i}"))
                    .number(i.to_string())
                    .team("Team"),
            )
            .unwrap();
    }
    store
}

fn bench_update_encode(c: &mut Criterion) {
    let peer = Uuid::new_v4();
    let update = global_positions(&roster(20));

    c.bench_function("update_positions_encode_20", |b| {
        b.iter(|| {
            let msg =
                SyncMessage::update_positions(black_box(peer), black_box(1), black_box(&update))
                    .unwrap();
            black_box(msg.encode().unwrap());
        })
    });
}

fn bench_update_decode(c: &mut Criterion) {
    let update = global_positions(&roster(20));
    let encoded = SyncMessage::update_positions(Uuid::new_v4(), 1, &update)
        .unwrap()
        .encode()
        .unwrap();

    c.bench_function("update_positions_decode_20", |b| {
        b.iter(|| {
            let msg = SyncMessage::decode(black_box(&encoded)).unwrap();
            black_box(msg.positions().unwrap());
        })
    });
}

fn bench_broadcast_raw(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("broadcast_raw_100_peers", |b| {
        b.iter(|| {
            rt.block_on(async {
                let group = BroadcastGroup::new(1024);

                let mut receivers = Vec::new();
                for i in 0..100 {
                    let rx = group.add_peer(PeerInfo::viewer(format!("Tower{i}"))).await;
                    receivers.push(rx);
                }

                let data = Arc::new(vec![0u8; 256]);
                black_box(group.broadcast_raw(black_box(data)));
            });
        })
    });
}

fn bench_publish_1000_updates(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let update = global_positions(&roster(20));

    c.bench_function("publish_1000_updates_100_peers", |b| {
        b.iter(|| {
            rt.block_on(async {
                let group = BroadcastGroup::new(2048);

                let mut receivers = Vec::new();
                for i in 0..100 {
                    let rx = group.add_peer(PeerInfo::viewer(format!("Tower{i}"))).await;
                    receivers.push(rx);
                }

                for _ in 0..1000 {
                    group.publish(black_box(&update)).unwrap();
                }
            });
        })
    });
}

fn bench_rocks_save_snapshot(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::for_testing(dir.path().join("bench"));
    let store = RocksSnapshotStore::open(config).unwrap();
    let roster = roster(50);
    let snapshot = RosterSnapshot {
        roster: roster.list_all(),
        heats: Vec::new(),
        current_heat: None,
    };

    c.bench_function("rocks_save_snapshot_50", |b| {
        b.iter(|| black_box(store.save_snapshot(black_box(&snapshot)).unwrap()))
    });

    c.bench_function("rocks_load_snapshot_50", |b| {
        b.iter(|| black_box(store.load_snapshot().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_update_encode,
    bench_update_decode,
    bench_broadcast_raw,
    bench_publish_1000_updates,
    bench_rocks_save_snapshot,
);
criterion_main!(benches);
