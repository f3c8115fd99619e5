//! Tick clock: converting tempo and sample rate into tick spans.
//!
//! `BPM` and `PPQ` together define ticks per second; the clock folds in
//! the audio sample rate to answer the one question the renderer asks
//! every quantum: how many ticks does this buffer cover?

use libm::floor;

/// Converts between samples and ticks for a fixed PPQ and sample rate.
///
/// Tempo is passed per call because the BPM header word is live-mutable;
/// the renderer reads it fresh each quantum.
///
/// # Example
///
/// ```rust
/// use pulso_playback::TickClock;
///
/// // 120 BPM at PPQ 480 and 48 kHz: 960 ticks/second.
/// let clock = TickClock::new(480, 48_000.0);
/// assert!((clock.ticks_per_sample(120) - 0.02).abs() < 1e-12);
///
/// // A 128-frame quantum covers 2.56 ticks.
/// assert!((clock.quantum_ticks(120, 128) - 2.56).abs() < 1e-9);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct TickClock {
    ppq: u32,
    sample_rate: f64,
}

impl TickClock {
    /// Create a clock for the given PPQ and sample rate.
    pub fn new(ppq: u32, sample_rate: f64) -> Self {
        Self { ppq, sample_rate }
    }

    /// Pulses per quarter note.
    pub fn ppq(&self) -> u32 {
        self.ppq
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Ticks covered by one sample at `bpm`.
    pub fn ticks_per_sample(&self, bpm: u32) -> f64 {
        (f64::from(bpm) / 60.0) * f64::from(self.ppq) / self.sample_rate
    }

    /// Exact (fractional) ticks covered by a quantum of `frames` samples.
    pub fn quantum_ticks(&self, bpm: u32, frames: u32) -> f64 {
        self.ticks_per_sample(bpm) * f64::from(frames)
    }

    /// Split a fractional tick span into the whole ticks the playhead
    /// advances by and the remainder carried into the next quantum.
    pub fn split_span(span: f64) -> (u32, f64) {
        let whole = floor(span);
        (whole as u32, span - whole)
    }

    /// Frame offset inside a quantum for an event `ticks_in` ticks past
    /// the quantum start, clamped to the buffer.
    pub fn frame_for_tick_offset(&self, bpm: u32, ticks_in: u32, frames: u32) -> u32 {
        let tps = self.ticks_per_sample(bpm);
        let frame = floor(f64::from(ticks_in) / tps) as u32;
        frame.min(frames.saturating_sub(1))
    }
}
