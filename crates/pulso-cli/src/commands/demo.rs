//! The demo command: a scripted live session.
//!
//! Spawns a real worker thread draining the command ring, drives the
//! audio role quantum by quantum on the main thread, and interleaves
//! editor actions between quanta: a two-bar pattern is scheduled, then a
//! note is re-pitched mid-playback, another is muted, a groove lands,
//! and the tail of the pattern is deleted before it sounds.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use pulso_arena::{Editor, NodeInit, ScoreArena, Worker};
use pulso_playback::{QuantumRenderer, TimedEvent};

use crate::session::SessionConfig;

#[derive(Args)]
pub struct DemoArgs {
    /// Session config file (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of quanta to render (128 frames each by default, so 2000
    /// quanta cover a little over five seconds at 48 kHz)
    #[arg(long, default_value = "2000")]
    quanta: u32,

    /// Humanize seed; zero disables the jitter
    #[arg(long, default_value = "0")]
    seed: u32,

    /// Apply a swing groove to the pattern
    #[arg(long)]
    groove: bool,
}

pub fn run(args: DemoArgs) -> anyhow::Result<()> {
    let session = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading session {}", path.display()))?,
        None => SessionConfig::default(),
    };

    let arena = Arc::new(ScoreArena::new(session.arena_config())?);
    let mut editor = Editor::claim(Arc::clone(&arena))?;
    let mut worker = Worker::claim(Arc::clone(&arena))?;
    let mut renderer = QuantumRenderer::new(&arena, session.quantum_config())?;

    if args.seed != 0 {
        arena.set_prng_seed(args.seed);
        arena.set_humanize_timing_ppt(40);
        arena.set_humanize_velocity_ppt(120);
    }
    if args.groove {
        // Off / late / off / late: a light 16th-note swing.
        arena.write_groove(0, &[0, 30, 0, 30])?;
        arena.publish_groove(0)?;
    }

    // Worker thread: drain the ring until the session ends.
    let stop = Arc::new(AtomicBool::new(false));
    let worker_thread = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                if worker.process_commands() == 0 {
                    thread::park_timeout(Duration::from_micros(200));
                }
            }
            worker.process_commands()
        })
    };

    // Editor: schedule two bars of eighth notes. Start a bar past the
    // safe zone so every splice anchor stays clear of the exclusion
    // window even if the worker drains after playback has begun.
    let ppq = session.ppq;
    let eighth = ppq / 2;
    let start = session.safe_zone_ticks + ppq * 4;
    let scale = [60u8, 62, 64, 67, 69, 72, 69, 67];
    let mut scheduled = Vec::new();
    let mut prev = 0u32;
    for bar in 0..2u32 {
        for (step, &pitch) in scale.iter().enumerate() {
            let tick = start + bar * ppq * 4 + step as u32 * eighth;
            let source_id = bar * 100 + step as u32 + 1;
            let node = editor.prepare(
                &NodeInit::note(pitch, 96, tick, eighth / 2).with_source_id(source_id),
            )?;
            if prev == 0 {
                editor.enqueue_insert_head(node)?;
            } else {
                editor.enqueue_insert_after(node, prev)?;
            }
            prev = node;
            scheduled.push(node);
        }
    }
    tracing::info!(notes = scheduled.len(), start_tick = start, "pattern scheduled");

    // Audio loop on this thread, with editor actions between quanta.
    let mut events: Vec<TimedEvent> = Vec::new();
    let retune_at = args.quanta / 8;
    let mute_at = args.quanta / 4;
    let trim_at = args.quanta / 3;
    let mut trimmed = false;

    for quantum in 0..args.quanta {
        if quantum == retune_at {
            // Live re-pitch: instantly audible, no commit round-trip.
            arena.patch_pitch(scheduled[2], 76)?;
            tracing::info!(node = scheduled[2], "patched pitch to 76");
        }
        if quantum == mute_at {
            arena.patch_muted(scheduled[3], true)?;
            tracing::info!(node = scheduled[3], "muted");
        }
        if quantum == trim_at && !trimmed {
            // Drop the second bar if it is still outside the safe zone.
            for node in &scheduled[8..] {
                editor.enqueue_delete(*node)?;
            }
            trimmed = true;
            tracing::info!("second bar deleted");
        }

        renderer.render(&arena, &mut events);
    }

    stop.store(true, Ordering::Release);
    worker_thread.thread().unpark();
    worker_thread
        .join()
        .map_err(|_| anyhow::anyhow!("worker thread panicked"))?;

    // Event log.
    println!("tick     frame  kind     pitch vel dur   source");
    for event in &events {
        println!(
            "{:<8} {:<6} {:<8} {:<5} {:<3} {:<5} {}",
            event.tick,
            event.frame,
            format!("{:?}", event.kind),
            event.pitch,
            event.velocity,
            event.duration,
            event.source_id,
        );
    }

    let stats = arena.stats();
    let render_stats = renderer.stats();
    println!();
    println!(
        "{} events over {} quanta (playhead tick {})",
        events.len(),
        render_stats.quanta,
        stats.playhead
    );
    println!(
        "nodes: {} linked, {} free, {} zone-B in use; error flag: {:?}",
        stats.node_count,
        stats.free_count,
        arena.zone_b_in_use(),
        stats.error
    );
    if render_stats.contention_skips > 0 {
        println!("contention skips: {}", render_stats.contention_skips);
    }

    Ok(())
}
