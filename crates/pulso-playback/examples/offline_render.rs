//! Render a short scored pattern offline and print the event log.
//!
//! Run with: cargo run -p pulso-playback --example offline_render

use std::sync::Arc;

use pulso_arena::{ArenaConfig, NodeInit, ScoreArena, Worker};
use pulso_playback::{QuantumConfig, QuantumRenderer, TimedEvent};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let arena = Arc::new(ScoreArena::new(ArenaConfig::with_capacity(256))?);
    let mut worker = Worker::claim(Arc::clone(&arena))?;

    // A rising arpeggio, one note per beat starting on beat four.
    let mut prev = worker.insert_head(&NodeInit::note(60, 100, 1920, 240), None)?;
    for (i, pitch) in [64u8, 67, 72].into_iter().enumerate() {
        let tick = 1920 + (i as u32 + 1) * 480;
        prev = worker.insert_after(prev, &NodeInit::note(pitch, 96, tick, 240), None)?;
    }

    // Push everything 12 ticks late.
    arena.write_groove(0, &[12])?;
    arena.publish_groove(0)?;

    let mut renderer = QuantumRenderer::new(
        &arena,
        QuantumConfig {
            sample_rate: 48_000.0,
            frames: 128,
        },
    )?;

    let mut events: Vec<TimedEvent> = Vec::new();
    for _ in 0..1600 {
        renderer.render(&arena, &mut events);
    }

    for event in &events {
        println!(
            "tick {:>5}  {:?} pitch {:>3} vel {:>3} dur {}",
            event.tick, event.kind, event.pitch, event.velocity, event.duration
        );
    }
    println!("{} events, playhead at tick {}", events.len(), arena.playhead());
    Ok(())
}
