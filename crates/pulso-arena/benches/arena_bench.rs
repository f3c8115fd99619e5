//! Criterion benchmarks for the arena hot paths
//!
//! Run with: cargo bench -p pulso-arena
#![allow(missing_docs)]

use std::ops::ControlFlow;
use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pulso_arena::{ArenaConfig, NodeInit, NodePatch, RetryBudget, ScoreArena, Worker};

fn open_arena(capacity: u32) -> Arc<ScoreArena> {
    let config = ArenaConfig {
        safe_zone_ticks: 0,
        ..ArenaConfig::with_capacity(capacity)
    };
    Arc::new(ScoreArena::new(config).unwrap())
}

fn bench_alloc_free(c: &mut Criterion) {
    let arena = open_arena(4096);

    c.bench_function("free_list/alloc_free_cycle", |b| {
        b.iter(|| {
            let ptr = arena.alloc_node().unwrap();
            arena.free_node(black_box(ptr));
        });
    });
}

fn bench_patching(c: &mut Criterion) {
    let mut group = c.benchmark_group("seqlock");

    let arena = open_arena(64);
    let mut worker = Worker::claim(Arc::clone(&arena)).unwrap();
    let node = worker
        .insert_head(&NodeInit::note(60, 100, 10_000, 240), None)
        .unwrap();

    group.bench_function("patch_pitch", |b| {
        b.iter(|| arena.patch_pitch(black_box(node), black_box(64)).unwrap());
    });

    let patch = NodePatch {
        pitch: Some(64),
        velocity: Some(90),
        duration: Some(120),
        base_tick: Some(20_000),
        ..NodePatch::default()
    };
    group.bench_function("patch_many_4_fields", |b| {
        b.iter(|| arena.patch_many(black_box(node), &patch).unwrap());
    });

    group.bench_function("read_node_uncontended", |b| {
        b.iter(|| black_box(arena.read_node(node, RetryBudget::Audio).unwrap()));
    });

    group.finish();
}

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("traverse");

    for &chain_len in &[64u32, 512, 2048] {
        let arena = open_arena(4096);
        let mut worker = Worker::claim(Arc::clone(&arena)).unwrap();
        let mut prev = worker
            .insert_head(&NodeInit::note(60, 100, 10_000, 240), None)
            .unwrap();
        for i in 1..chain_len {
            prev = worker
                .insert_after(prev, &NodeInit::note(60, 100, 10_000 + i * 10, 240), None)
                .unwrap();
        }

        group.bench_function(format!("walk_{chain_len}"), |b| {
            b.iter(|| {
                let mut triggered = 0u32;
                arena
                    .traverse(|snap| {
                        triggered += u32::from(snap.velocity);
                        ControlFlow::Continue(())
                    })
                    .unwrap();
                black_box(triggered)
            });
        });
    }

    group.finish();
}

fn bench_command_ring(c: &mut Criterion) {
    let arena = open_arena(4096);
    let mut editor = pulso_arena::Editor::claim(Arc::clone(&arena)).unwrap();
    let mut worker = Worker::claim(Arc::clone(&arena)).unwrap();

    c.bench_function("ring/prepare_enqueue_drain", |b| {
        b.iter(|| {
            let node = editor
                .prepare(&NodeInit::note(60, 100, 10_000, 240))
                .unwrap();
            editor.enqueue_insert_head(node).unwrap();
            worker.process_commands();
            worker.delete(node).unwrap();
            // Zone B never reuses slots until reset; keep the cursor from
            // running off the end of the heap during long runs.
            editor.reset_bump().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_alloc_free,
    bench_patching,
    bench_traversal,
    bench_command_ring
);
criterion_main!(benches);
