//! Criterion benchmarks for the HID report hot path.
//!
//! Every browser event ends in one of these calls, so they must stay far below
//! the drain loop's 5 ms tick.
//!
//! Run with:
//! ```bash
//! cargo bench --package kvm-hid-core --bench report_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kvm_hid_core::{encode_absolute, encode_relative, KeyboardEvent, KeyboardState, LogicalKey};

fn bench_mouse_encoders(c: &mut Criterion) {
    let mut group = c.benchmark_group("mouse_encode");

    group.bench_function("absolute", |b| {
        b.iter(|| {
            encode_absolute(
                black_box(0x01),
                black_box(0.4375),
                black_box(0.8125),
                black_box(-1),
                black_box(0),
            )
        })
    });

    group.bench_function("relative", |b| {
        b.iter(|| {
            encode_relative(
                black_box(0x00),
                black_box(-12.5),
                black_box(300.0),
                black_box(2),
                black_box(0),
                black_box(1.5),
            )
        })
    });

    group.finish();
}

fn bench_keyboard_state(c: &mut Criterion) {
    let keys = [
        LogicalKey::ShiftLeft,
        LogicalKey::KeyA,
        LogicalKey::KeyS,
        LogicalKey::KeyD,
        LogicalKey::Space,
    ];

    c.bench_function("keyboard_press_release_cycle", |b| {
        let mut state = KeyboardState::new();
        b.iter(|| {
            for key in keys {
                black_box(state.apply(KeyboardEvent::from_key(key, true)));
            }
            for key in keys.iter().rev() {
                black_box(state.apply(KeyboardEvent::from_key(*key, false)));
            }
        })
    });
}

criterion_group!(benches, bench_mouse_encoders, bench_keyboard_state);
criterion_main!(benches);
