//! Benchmarks for the transfer-state codec.
//!
//! Every turn copies a full snapshot in each direction, so encode/decode
//! throughput bounds how fast a match can run.

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use arbiter::transfer::{
    MAX_MINES, MAX_ORDERS, MAX_UNITS, Order, Terrain, TransferState, UnitEntry, UnitKind, wire,
};

/// A snapshot with every collection at capacity, the worst case for the
/// codec.
fn full_state() -> TransferState {
    let mut state = TransferState::default();
    for y in 0..8 {
        for x in 0..8 {
            state.terrain[y * 4][x * 4] = Terrain::Forest;
        }
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    for i in 0..MAX_UNITS as u32 {
        let entry = UnitEntry { id: i, x: i as i16, y: (i / 2) as i16, hp: 100 };
        state.own_warriors.push(entry);
        state.own_miners.push(entry);
        state.enemy_warriors.push(entry);
        state.enemy_miners.push(entry);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    for i in 0..MAX_MINES as i16 {
        state.mines.push((i, i));
    }
    #[allow(clippy::cast_possible_truncation)]
    for i in 0..MAX_ORDERS as u32 {
        if i % 2 == 0 {
            state.orders.push(Order::Move { unit: i, to: (3, 3) });
        } else {
            state.orders.push(Order::Recruit { kind: UnitKind::Miner, at: (1, 1) });
        }
    }
    state.score = 12_345;
    state.currency = 678;
    state
}

fn bench_encode(c: &mut Criterion) {
    let state = full_state();
    let mut buf = vec![0u8; wire::SNAPSHOT_BYTES];

    c.bench_function("encode_full_snapshot", |b| {
        b.iter(|| {
            black_box(&state).encode(&mut buf);
            black_box(&buf);
        });
    });
}

fn bench_decode(c: &mut Criterion) {
    let state = full_state();
    let mut buf = vec![0u8; wire::SNAPSHOT_BYTES];
    state.encode(&mut buf);

    c.bench_function("decode_full_snapshot", |b| {
        b.iter(|| {
            let decoded = TransferState::decode(black_box(&buf));
            black_box(decoded)
        });
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let state = full_state();
    let mut buf = vec![0u8; wire::SNAPSHOT_BYTES];

    c.bench_function("round_trip_full_snapshot", |b| {
        b.iter(|| {
            black_box(&state).encode(&mut buf);
            black_box(TransferState::decode(&buf))
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_round_trip);
criterion_main!(benches);
