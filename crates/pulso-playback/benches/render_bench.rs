//! Criterion benchmarks for the audio-side render path
//!
//! Run with: cargo bench -p pulso-playback
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pulso_arena::{ArenaConfig, NodeInit, ScoreArena, Worker};
use pulso_playback::{QuantumConfig, QuantumRenderer, TimedEvent};

fn populated_arena(notes: u32) -> Arc<ScoreArena> {
    let arena = Arc::new(ScoreArena::new(ArenaConfig::with_capacity(4096)).unwrap());
    let mut worker = Worker::claim(Arc::clone(&arena)).unwrap();
    let mut prev = worker
        .insert_head(&NodeInit::note(60, 100, 2000, 120), None)
        .unwrap();
    for i in 1..notes {
        prev = worker
            .insert_after(prev, &NodeInit::note(60, 100, 2000 + i * 60, 120), None)
            .unwrap();
    }
    arena
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for &notes in &[64u32, 512, 2000] {
        let arena = populated_arena(notes);
        let config = QuantumConfig {
            sample_rate: 48_000.0,
            frames: 128,
        };

        group.bench_function(format!("quantum_{notes}_notes"), |b| {
            let mut sink = |event: TimedEvent| {
                black_box(event);
            };
            b.iter(|| {
                // Fresh renderer per iteration so each one anchors and
                // walks the same window.
                arena.set_playhead(2000);
                let mut renderer = QuantumRenderer::new(&arena, config).unwrap();
                black_box(renderer.render(&arena, &mut sink))
            });
        });
    }

    group.finish();
}

fn bench_render_with_transforms(c: &mut Criterion) {
    let arena = populated_arena(512);
    arena.write_groove(0, &[0, 3, -2, 5, 0, 2, -4, 1]).unwrap();
    arena.publish_groove(0).unwrap();
    arena.set_humanize_timing_ppt(30);
    arena.set_humanize_velocity_ppt(80);
    arena.set_transpose(7);
    arena.set_velocity_mult_ppt(900);

    let config = QuantumConfig {
        sample_rate: 48_000.0,
        frames: 128,
    };

    c.bench_function("render/quantum_512_notes_all_transforms", |b| {
        let mut sink = |event: TimedEvent| {
            black_box(event);
        };
        b.iter(|| {
            arena.set_playhead(2000);
            let mut renderer = QuantumRenderer::new(&arena, config).unwrap();
            black_box(renderer.render(&arena, &mut sink))
        });
    });
}

criterion_group!(benches, bench_render, bench_render_with_transforms);
criterion_main!(benches);
