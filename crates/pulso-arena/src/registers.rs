//! The register bank: global transform parameters for the audio walk.
//!
//! Every register is one 32-bit word written with a single atomic store;
//! there is no locking and no versioning. The audio thread samples the
//! bank once per quantum, so changes land cleanly at quantum boundaries.

use core::sync::atomic::Ordering;

use crate::arena::ScoreArena;
use crate::error::Error;
use crate::layout::{GROOVE_MAX_STEPS, NULL, register};

impl ScoreArena {
    /// Semitone transpose applied to every note at audio time.
    pub fn transpose(&self) -> i32 {
        self.word(register::TRANSPOSE).load(Ordering::Acquire) as i32
    }

    /// Set the global transpose.
    pub fn set_transpose(&self, semitones: i32) {
        self.word(register::TRANSPOSE)
            .store(semitones as u32, Ordering::Release);
    }

    /// Velocity multiplier in parts per thousand (1000 = unity).
    pub fn velocity_mult_ppt(&self) -> u32 {
        self.word(register::VELOCITY_MULT).load(Ordering::Acquire)
    }

    /// Set the velocity multiplier in parts per thousand.
    pub fn set_velocity_mult_ppt(&self, ppt: u32) {
        self.word(register::VELOCITY_MULT).store(ppt, Ordering::Release);
    }

    /// Humanize timing depth, parts per thousand of a quarter note.
    pub fn humanize_timing_ppt(&self) -> u32 {
        self.word(register::HUMANIZE_TIMING).load(Ordering::Acquire)
    }

    /// Set the humanize timing depth.
    pub fn set_humanize_timing_ppt(&self, ppt: u32) {
        self.word(register::HUMANIZE_TIMING).store(ppt, Ordering::Release);
    }

    /// Humanize velocity depth in parts per thousand.
    pub fn humanize_velocity_ppt(&self) -> u32 {
        self.word(register::HUMANIZE_VELOCITY).load(Ordering::Acquire)
    }

    /// Set the humanize velocity depth.
    pub fn set_humanize_velocity_ppt(&self, ppt: u32) {
        self.word(register::HUMANIZE_VELOCITY).store(ppt, Ordering::Release);
    }

    /// Seed mixed into the per-node humanize PRNG.
    pub fn prng_seed(&self) -> u32 {
        self.word(register::PRNG_SEED).load(Ordering::Acquire)
    }

    /// Set the humanize PRNG seed.
    pub fn set_prng_seed(&self, seed: u32) {
        self.word(register::PRNG_SEED).store(seed, Ordering::Release);
    }

    // ---- groove templates ---------------------------------------------

    /// Fill groove template `slot` with tick offsets. The template is not
    /// audible until [`ScoreArena::publish_groove`] points the registers
    /// at it.
    pub fn write_groove(&self, slot: u32, offsets: &[i32]) -> Result<(), Error> {
        if slot >= self.config().groove_slots {
            return Err(Error::InvalidConfig("groove slot out of range"));
        }
        if offsets.is_empty() || offsets.len() > GROOVE_MAX_STEPS as usize {
            return Err(Error::InvalidConfig("groove length must be 1..=16"));
        }

        let base = self.regions().groove_ptr(slot);
        for (i, &offset) in offsets.iter().enumerate() {
            self.word_at(base + 4 + i as u32 * 4)
                .store(offset as u32, Ordering::Relaxed);
        }
        self.word_at(base).store(offsets.len() as u32, Ordering::Release);
        Ok(())
    }

    /// Make template `slot` the active groove.
    pub fn publish_groove(&self, slot: u32) -> Result<(), Error> {
        if slot >= self.config().groove_slots {
            return Err(Error::InvalidConfig("groove slot out of range"));
        }
        let base = self.regions().groove_ptr(slot);
        let len = self.word_at(base).load(Ordering::Acquire);
        if len == 0 {
            return Err(Error::InvalidConfig("groove template is empty"));
        }
        // Length first, pointer last: a reader that sees the new pointer
        // also sees a usable length.
        self.word(register::GROOVE_LEN).store(len, Ordering::Release);
        self.word(register::GROOVE_PTR).store(base, Ordering::Release);
        Ok(())
    }

    /// Disable the groove transform.
    pub fn clear_groove(&self) {
        self.word(register::GROOVE_PTR).store(NULL, Ordering::Release);
        self.word(register::GROOVE_LEN).store(0, Ordering::Release);
    }

    /// Groove offset for an event at `tick`, in ticks. Zero when no
    /// groove is published.
    pub fn groove_offset_at(&self, tick: u32) -> i32 {
        let ptr = self.word(register::GROOVE_PTR).load(Ordering::Acquire);
        if ptr == NULL {
            return 0;
        }
        let len = self.word(register::GROOVE_LEN).load(Ordering::Acquire);
        if len == 0 {
            return 0;
        }
        let step = tick % len;
        self.word_at(ptr + 4 + step * 4).load(Ordering::Acquire) as i32
    }
}
