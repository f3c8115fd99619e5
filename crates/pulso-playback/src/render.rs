//! The quantum renderer: the audio thread's view of the score.
//!
//! Once per rendering quantum the renderer computes the tick span the
//! buffer covers, services the commit handshake, walks the chain from
//! its cached cursor, applies the global transforms, and emits every
//! event whose trigger falls inside the quantum. Transform order is a
//! contract: quantize happens editor-side before nodes ever reach the
//! arena, groove shifts the trigger at audio time, humanize jitters it
//! last.
//!
//! Realtime discipline, inherited from the arena's audio role: no
//! allocation, no locks, no yielding. Versioned reads run on the hard
//! 50-retry budget; a node that stays contended is skipped for this
//! quantum and counted, never waited on.

use pulso_arena::{CommitFlag, NodeSnapshot, Opcode, RetryBudget, ScoreArena, NULL};

use crate::clock::TickClock;
use crate::error::Error;
use crate::event::{EventKind, EventSink, TimedEvent};
use crate::humanize;

/// Fixed parameters of the audio callback.
#[derive(Clone, Copy, Debug)]
pub struct QuantumConfig {
    /// System sample rate in Hz.
    pub sample_rate: f64,
    /// Frames per rendering quantum.
    pub frames: u32,
}

impl QuantumConfig {
    fn validate(&self) -> Result<(), Error> {
        if !(self.sample_rate > 0.0) {
            return Err(Error::InvalidQuantum("sample_rate must be positive"));
        }
        if self.frames == 0 {
            return Err(Error::InvalidQuantum("frames must be nonzero"));
        }
        Ok(())
    }
}

/// Counters the renderer keeps about its own behaviour. Diagnostics
/// only; nothing in the render path branches on them.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderStats {
    /// Quanta rendered.
    pub quanta: u64,
    /// Events emitted.
    pub events: u64,
    /// Nodes skipped because a versioned read stayed contended.
    pub contention_skips: u64,
    /// Cursor re-anchors forced by the commit flag.
    pub re_anchors: u64,
}

/// Walks the chain once per quantum and feeds an [`EventSink`].
///
/// The renderer owns the audio role: it is the only writer of
/// `PLAYHEAD_TICK` and the only party performing the PENDING -> ACK
/// commit transition. Create exactly one per arena.
pub struct QuantumRenderer {
    clock: TickClock,
    frames: u32,
    cursor: u32,
    anchored: bool,
    tick_frac: f64,
    stats: RenderStats,
}

impl QuantumRenderer {
    /// Build a renderer for an arena and callback geometry.
    pub fn new(arena: &ScoreArena, config: QuantumConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            clock: TickClock::new(arena.ppq(), config.sample_rate),
            frames: config.frames,
            cursor: NULL,
            anchored: false,
            tick_frac: 0.0,
            stats: RenderStats::default(),
        })
    }

    /// Counters accumulated since creation.
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Render one quantum: emit every event triggering inside it and
    /// advance the playhead by the quantum's whole-tick span. Returns the
    /// number of events emitted.
    pub fn render<S: EventSink>(&mut self, arena: &ScoreArena, sink: &mut S) -> u32 {
        let playhead = arena.playhead();
        let bpm = arena.bpm();

        let span_exact = self.clock.quantum_ticks(bpm, self.frames) + self.tick_frac;
        let (span, frac) = TickClock::split_span(span_exact);
        self.tick_frac = frac;
        let window_end = playhead + span;

        // Structural changes invalidate the cached cursor; re-find it
        // before acknowledging so the editor's sync_ack cannot complete
        // while we still point into the old topology.
        if arena.commit_flag() == CommitFlag::Pending {
            self.re_anchor(arena, playhead);
            arena.acknowledge_commit();
            self.stats.re_anchors += 1;
        } else if !self.anchored {
            self.re_anchor(arena, playhead);
        }

        // Registers are sampled once per quantum; mid-quantum writes
        // land on the next one.
        let transpose = arena.transpose();
        let velocity_ppt = arena.velocity_mult_ppt();
        let humanize_timing = arena.humanize_timing_ppt();
        let humanize_velocity = arena.humanize_velocity_ppt();
        let seed = arena.prng_seed();

        let mut emitted = 0u32;
        while self.cursor != NULL {
            let snapshot = match arena.read_node(self.cursor, RetryBudget::Audio) {
                Ok(snapshot) => snapshot,
                Err(_) => {
                    // Contended past the budget: skip the node for this
                    // quantum. A single-word load cannot tear, so the raw
                    // next pointer is a safe way past it.
                    self.stats.contention_skips += 1;
                    self.cursor = arena.peek_next(self.cursor);
                    continue;
                }
            };

            if snapshot.base_tick >= window_end {
                break;
            }
            self.cursor = snapshot.next_ptr;

            if snapshot.base_tick < playhead {
                // Behind the playhead: already sounded or inserted into
                // the past. Either way it is not this quantum's business.
                continue;
            }
            if let Some(event) = self.transform(
                arena,
                &snapshot,
                playhead,
                window_end,
                bpm,
                transpose,
                velocity_ppt,
                humanize_timing,
                humanize_velocity,
                seed,
            ) {
                sink.emit(event);
                emitted += 1;
            }
        }

        arena.set_playhead(window_end);
        self.stats.quanta += 1;
        self.stats.events += u64::from(emitted);
        emitted
    }

    /// Apply groove, humanize, transpose, and velocity scaling to one
    /// snapshot. Returns `None` for rests, muted/inactive nodes, unknown
    /// opcodes, and events whose trigger leaves the quantum.
    #[allow(clippy::too_many_arguments)]
    fn transform(
        &self,
        arena: &ScoreArena,
        snapshot: &NodeSnapshot,
        playhead: u32,
        window_end: u32,
        bpm: u32,
        transpose: i32,
        velocity_ppt: u32,
        humanize_timing: u32,
        humanize_velocity: u32,
        seed: u32,
    ) -> Option<TimedEvent> {
        if !snapshot.is_active() || snapshot.is_muted() {
            return None;
        }
        let opcode = snapshot.kind()?;
        let kind = EventKind::from_opcode(opcode)?;

        let groove = arena.groove_offset_at(snapshot.base_tick);
        let (tick_jitter, velocity_jitter) = humanize::offsets(
            snapshot.base_tick,
            seed,
            humanize_timing,
            humanize_velocity,
            self.clock.ppq(),
            snapshot.velocity,
        );

        let trigger = i64::from(snapshot.base_tick) + i64::from(groove) + i64::from(tick_jitter);
        if trigger < i64::from(playhead) || trigger >= i64::from(window_end) {
            return None;
        }
        let trigger = trigger as u32;

        // Pitch/velocity shaping applies to notes; CC and bend payloads
        // pass through untouched.
        let (pitch, velocity) = if opcode == Opcode::Note {
            let pitch = (i32::from(snapshot.pitch) + transpose).clamp(0, 127) as u8;
            let scaled = u32::from(snapshot.velocity) * velocity_ppt / 1000;
            let velocity = (scaled as i32 + velocity_jitter).clamp(0, 127) as u8;
            (pitch, velocity)
        } else {
            (snapshot.pitch, snapshot.velocity)
        };

        Some(TimedEvent {
            tick: trigger,
            frame: self
                .clock
                .frame_for_tick_offset(bpm, trigger - playhead, self.frames),
            kind,
            pitch,
            velocity,
            duration: snapshot.duration,
            source_id: snapshot.source_id,
        })
    }

    /// Walk from the head to the first node at or past the playhead and
    /// park the cursor there.
    fn re_anchor(&mut self, arena: &ScoreArena, playhead: u32) {
        let mut ptr = arena.head_ptr();
        let mut hops = 0u32;
        let limit = arena.config().node_capacity;

        while ptr != NULL && hops < limit {
            match arena.read_node(ptr, RetryBudget::Audio) {
                Ok(snapshot) => {
                    if snapshot.base_tick >= playhead {
                        break;
                    }
                    ptr = snapshot.next_ptr;
                }
                Err(_) => {
                    self.stats.contention_skips += 1;
                    ptr = arena.peek_next(ptr);
                }
            }
            hops += 1;
        }
        self.cursor = ptr;
        self.anchored = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulso_arena::{ArenaConfig, NodeInit, Worker};
    use std::sync::Arc;

    fn setup() -> (Arc<ScoreArena>, Worker, QuantumRenderer) {
        let arena = Arc::new(ScoreArena::new(ArenaConfig::with_capacity(256)).unwrap());
        let worker = Worker::claim(Arc::clone(&arena)).unwrap();
        let renderer = QuantumRenderer::new(
            &arena,
            QuantumConfig {
                sample_rate: 48_000.0,
                frames: 2500, // 50 ticks at 120 BPM / PPQ 480
            },
        )
        .unwrap();
        (arena, worker, renderer)
    }

    #[test]
    fn config_is_validated() {
        let arena = ScoreArena::new(ArenaConfig::with_capacity(16)).unwrap();
        assert!(
            QuantumRenderer::new(
                &arena,
                QuantumConfig {
                    sample_rate: 0.0,
                    frames: 128
                }
            )
            .is_err()
        );
        assert!(
            QuantumRenderer::new(
                &arena,
                QuantumConfig {
                    sample_rate: 48_000.0,
                    frames: 0
                }
            )
            .is_err()
        );
    }

    #[test]
    fn empty_chain_renders_silence_and_advances() {
        let (arena, _worker, mut renderer) = setup();
        let mut events: Vec<TimedEvent> = Vec::new();

        assert_eq!(renderer.render(&arena, &mut events), 0);
        assert!(events.is_empty());
        assert_eq!(arena.playhead(), 50);
    }

    #[test]
    fn muted_nodes_stay_silent() {
        let (arena, mut worker, mut renderer) = setup();
        worker
            .insert_head(&NodeInit::note(60, 100, 1920, 240).muted(), None)
            .unwrap();
        arena.set_playhead(1920);

        let mut events: Vec<TimedEvent> = Vec::new();
        renderer.render(&arena, &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn rests_advance_time_but_emit_nothing() {
        let (arena, mut worker, mut renderer) = setup();
        worker.insert_head(&NodeInit::rest(1920, 480), None).unwrap();
        arena.set_playhead(1920);

        let mut events: Vec<TimedEvent> = Vec::new();
        renderer.render(&arena, &mut events);
        assert!(events.is_empty());
        assert_eq!(arena.playhead(), 1970);
    }

    #[test]
    fn commit_flag_is_acknowledged_on_render() {
        let (arena, mut worker, mut renderer) = setup();
        worker
            .insert_head(&NodeInit::note(60, 100, 5000, 240), None)
            .unwrap();
        assert_eq!(arena.commit_flag(), CommitFlag::Pending);

        let mut sink = |_: TimedEvent| {};
        renderer.render(&arena, &mut sink);
        assert_eq!(arena.commit_flag(), CommitFlag::Ack);
        assert_eq!(renderer.stats().re_anchors, 1);
    }

    #[test]
    fn cc_and_bend_payloads_pass_through() {
        let (arena, mut worker, mut renderer) = setup();
        arena.set_transpose(12);
        arena.set_velocity_mult_ppt(500);

        let cc = NodeInit {
            opcode: Opcode::Cc,
            pitch: 74,      // controller number
            velocity: 101,  // controller value
            flags: 0,
            base_tick: 1920,
            duration: 0,
            source_id: 0,
        };
        worker.insert_head(&cc, None).unwrap();
        arena.set_playhead(1920);

        let mut events: Vec<TimedEvent> = Vec::new();
        renderer.render(&arena, &mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Control);
        assert_eq!(events[0].pitch, 74);
        assert_eq!(events[0].velocity, 101);
    }

    #[test]
    fn transpose_clamps_at_midi_range() {
        let (arena, mut worker, mut renderer) = setup();
        arena.set_transpose(100);
        worker
            .insert_head(&NodeInit::note(100, 100, 1920, 240), None)
            .unwrap();
        arena.set_playhead(1920);

        let mut events: Vec<TimedEvent> = Vec::new();
        renderer.render(&arena, &mut events);
        assert_eq!(events[0].pitch, 127);
    }
}
