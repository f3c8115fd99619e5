//! Versioned attribute access: lockless field patches with torn-read
//! detection.
//!
//! Every single-field mutation adds one sequence unit to the node's
//! `SEQ_FLAGS` word, then performs an atomic read-modify-write of the
//! target word. Batches mark the reserved low bit while their words land
//! and fold the mark-clear into the final sequence bump. Readers sample
//! the sequence before and after copying the fields; a mismatch or a
//! live write mark means a writer interleaved and the copy is retried.
//! Patches are visible to the audio thread immediately. They bypass the
//! commit handshake entirely, because they never disturb chain topology.
//!
//! Retry budgets are asymmetric by role: the audio thread gives up after
//! 50 iterations and *never* yields (it reports contention and skips the
//! node for the quantum); every other thread gets 1000 iterations with a
//! scheduler yield every 100 spins, and exhaustion is a real failure.

use core::hint;
use core::sync::atomic::Ordering;

use crate::arena::ScoreArena;
use crate::backoff;
use crate::error::Error;
use crate::layout::{self, SEQ_UNIT, flags, node};
use crate::node::NodeSnapshot;

/// Retry discipline for a versioned read, selected by the calling role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryBudget {
    /// Hard-realtime reader: 50 retries, no yielding, non-fatal failure.
    Audio,
    /// Editor or worker: 1000 retries, yield every 100 spins.
    Editor,
}

/// Reserved low bit of `SEQ_FLAGS` flagging a multi-word batch write in
/// flight. Single-field patches never set it; one atomic word cannot
/// tear.
const WRITE_MARK: u32 = 1;

impl RetryBudget {
    #[inline]
    fn limit(self) -> u32 {
        match self {
            RetryBudget::Audio => 50,
            RetryBudget::Editor => 1000,
        }
    }

    #[inline]
    fn may_yield(self) -> bool {
        matches!(self, RetryBudget::Editor)
    }
}

/// A batch of field changes applied under a single sequence bump.
///
/// Readers observe either none of the batch or all of it (within the
/// bounds of their retry budget), never a field-mixed state.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodePatch {
    /// New pitch lane value.
    pub pitch: Option<u8>,
    /// New velocity lane value.
    pub velocity: Option<u8>,
    /// New duration in ticks.
    pub duration: Option<u32>,
    /// New event time in ticks.
    pub base_tick: Option<u32>,
    /// New mute state.
    pub muted: Option<bool>,
    /// New source identity.
    pub source_id: Option<u32>,
}

impl ScoreArena {
    /// Take a consistent snapshot of one node's fields.
    ///
    /// On budget exhaustion returns [`Error::Contention`]; audio callers
    /// treat that as "skip this node for the quantum", everyone else as a
    /// failed read.
    pub fn read_node(&self, ptr: u32, budget: RetryBudget) -> Result<NodeSnapshot, Error> {
        self.check_node_ptr(ptr)?;

        let seq_slot = self.node_word(ptr, node::SEQ_FLAGS);
        let mut attempts = 0u32;
        loop {
            let seq1 = seq_slot.load(Ordering::Acquire);
            if seq1 & WRITE_MARK != 0 {
                // A batch write is in flight; spin until it lands.
                attempts += 1;
                if attempts >= budget.limit() {
                    return Err(Error::Contention);
                }
                if budget.may_yield() && attempts % 100 == 0 {
                    backoff::yield_briefly();
                } else {
                    hint::spin_loop();
                }
                continue;
            }
            let packed = self.node_word(ptr, node::PACKED_A).load(Ordering::Acquire);
            let base_tick = self.node_word(ptr, node::BASE_TICK).load(Ordering::Acquire);
            let duration = self.node_word(ptr, node::DURATION).load(Ordering::Acquire);
            let next_ptr = self.node_word(ptr, node::NEXT_PTR).load(Ordering::Acquire);
            let prev_ptr = self.node_word(ptr, node::PREV_PTR).load(Ordering::Acquire);
            let source_id = self.node_word(ptr, node::SOURCE_ID).load(Ordering::Acquire);
            let seq2 = seq_slot.load(Ordering::Acquire);

            if seq1 == seq2 {
                let (opcode, pitch, velocity, flag_bits) = layout::unpack_attrs(packed);
                return Ok(NodeSnapshot {
                    ptr,
                    opcode,
                    pitch,
                    velocity,
                    flags: flag_bits,
                    base_tick,
                    duration,
                    next_ptr,
                    prev_ptr,
                    source_id,
                    sequence: seq1 >> layout::SEQ_SHIFT,
                });
            }

            attempts += 1;
            if attempts >= budget.limit() {
                return Err(Error::Contention);
            }
            if budget.may_yield() && attempts % 100 == 0 {
                backoff::yield_briefly();
            } else {
                hint::spin_loop();
            }
        }
    }

    #[inline]
    fn bump_sequence(&self, ptr: u32) {
        self.node_word(ptr, node::SEQ_FLAGS)
            .fetch_add(SEQ_UNIT, Ordering::Release);
    }

    /// Patch the pitch lane of a linked node.
    pub fn patch_pitch(&self, ptr: u32, pitch: u8) -> Result<(), Error> {
        self.check_node_ptr(ptr)?;
        self.bump_sequence(ptr);
        self.store_packed_byte(ptr, 16, pitch);
        Ok(())
    }

    /// Patch the velocity lane of a linked node.
    pub fn patch_velocity(&self, ptr: u32, velocity: u8) -> Result<(), Error> {
        self.check_node_ptr(ptr)?;
        self.bump_sequence(ptr);
        self.store_packed_byte(ptr, 8, velocity);
        Ok(())
    }

    /// Patch a node's duration.
    pub fn patch_duration(&self, ptr: u32, ticks: u32) -> Result<(), Error> {
        self.check_node_ptr(ptr)?;
        self.bump_sequence(ptr);
        self.node_word(ptr, node::DURATION).store(ticks, Ordering::Release);
        Ok(())
    }

    /// Patch a node's event time without relinking it.
    ///
    /// The chain is ordered by insertion, not re-sorted; moving a tick far
    /// enough to cross its neighbours is the caller's concern.
    pub fn patch_base_tick(&self, ptr: u32, tick: u32) -> Result<(), Error> {
        self.check_node_ptr(ptr)?;
        self.bump_sequence(ptr);
        self.node_word(ptr, node::BASE_TICK).store(tick, Ordering::Release);
        Ok(())
    }

    /// Set or clear a node's mute flag.
    pub fn patch_muted(&self, ptr: u32, muted: bool) -> Result<(), Error> {
        self.check_node_ptr(ptr)?;
        self.bump_sequence(ptr);
        self.update_flags(ptr, flags::MUTED, muted);
        Ok(())
    }

    /// Replace a node's source identity.
    pub fn patch_source_id(&self, ptr: u32, source_id: u32) -> Result<(), Error> {
        self.check_node_ptr(ptr)?;
        self.bump_sequence(ptr);
        self.node_word(ptr, node::SOURCE_ID)
            .store(source_id, Ordering::Release);
        Ok(())
    }

    /// Apply several field changes under one sequence bump.
    ///
    /// The batch spans multiple words, so the reserved low bit of
    /// `SEQ_FLAGS` marks the write in flight; readers refuse to snapshot
    /// while it is set and therefore observe either none of the batch or
    /// all of it. The sequence field still advances by exactly one unit.
    pub fn patch_many(&self, ptr: u32, patch: &NodePatch) -> Result<(), Error> {
        self.check_node_ptr(ptr)?;
        self.node_word(ptr, node::SEQ_FLAGS)
            .fetch_or(WRITE_MARK, Ordering::Release);

        if let Some(pitch) = patch.pitch {
            self.store_packed_byte(ptr, 16, pitch);
        }
        if let Some(velocity) = patch.velocity {
            self.store_packed_byte(ptr, 8, velocity);
        }
        if let Some(duration) = patch.duration {
            self.node_word(ptr, node::DURATION)
                .store(duration, Ordering::Release);
        }
        if let Some(tick) = patch.base_tick {
            self.node_word(ptr, node::BASE_TICK).store(tick, Ordering::Release);
        }
        if let Some(muted) = patch.muted {
            self.update_flags(ptr, flags::MUTED, muted);
        }
        if let Some(source_id) = patch.source_id {
            self.node_word(ptr, node::SOURCE_ID)
                .store(source_id, Ordering::Release);
        }

        // One sequence unit, and the write mark drops in the same store.
        self.node_word(ptr, node::SEQ_FLAGS)
            .fetch_add(SEQ_UNIT - WRITE_MARK, Ordering::Release);
        Ok(())
    }

    /// Atomic read-modify-write of one byte inside `PACKED_A`.
    fn store_packed_byte(&self, ptr: u32, shift: u32, value: u8) {
        let slot = self.node_word(ptr, node::PACKED_A);
        let mask = !(0xFFu32 << shift);
        // fetch_update never fails with these orderings; ignore the result.
        let _ = slot.fetch_update(Ordering::Release, Ordering::Relaxed, |word| {
            Some((word & mask) | (u32::from(value) << shift))
        });
    }

    fn update_flags(&self, ptr: u32, bit: u8, set: bool) {
        let slot = self.node_word(ptr, node::PACKED_A);
        let _ = slot.fetch_update(Ordering::Release, Ordering::Relaxed, |word| {
            if set {
                Some(word | u32::from(bit))
            } else {
                Some(word & !u32::from(bit))
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ArenaConfig;
    use crate::node::NodeInit;

    fn arena_with_node() -> (ScoreArena, u32) {
        let a = ScoreArena::new(ArenaConfig::with_capacity(8)).unwrap();
        let p = a.alloc_node().unwrap();
        a.init_node(p, &NodeInit::note(60, 100, 1920, 240));
        (a, p)
    }

    #[test]
    fn snapshot_reflects_init() {
        let (a, p) = arena_with_node();
        let snap = a.read_node(p, RetryBudget::Editor).unwrap();
        assert_eq!(snap.pitch, 60);
        assert_eq!(snap.velocity, 100);
        assert_eq!(snap.base_tick, 1920);
        assert_eq!(snap.duration, 240);
        assert!(snap.is_active());
        assert!(!snap.is_muted());
    }

    #[test]
    fn patch_bumps_sequence_by_one() {
        let (a, p) = arena_with_node();
        let before = a.read_node(p, RetryBudget::Editor).unwrap().sequence;

        a.patch_pitch(p, 64).unwrap();
        let after = a.read_node(p, RetryBudget::Editor).unwrap();
        assert_eq!(after.pitch, 64);
        assert_eq!(after.sequence, before + 1);
        // Untouched lanes survive.
        assert_eq!(after.velocity, 100);
        assert_eq!(after.base_tick, 1920);
    }

    #[test]
    fn each_patch_kind_lands() {
        let (a, p) = arena_with_node();
        a.patch_velocity(p, 33).unwrap();
        a.patch_duration(p, 480).unwrap();
        a.patch_base_tick(p, 3840).unwrap();
        a.patch_muted(p, true).unwrap();
        a.patch_source_id(p, 42).unwrap();

        let snap = a.read_node(p, RetryBudget::Editor).unwrap();
        assert_eq!(snap.velocity, 33);
        assert_eq!(snap.duration, 480);
        assert_eq!(snap.base_tick, 3840);
        assert!(snap.is_muted());
        assert_eq!(snap.source_id, 42);
    }

    #[test]
    fn unmute_clears_only_the_mute_bit() {
        let (a, p) = arena_with_node();
        a.patch_muted(p, true).unwrap();
        a.patch_muted(p, false).unwrap();
        let snap = a.read_node(p, RetryBudget::Editor).unwrap();
        assert!(!snap.is_muted());
        assert!(snap.is_active());
    }

    #[test]
    fn batch_patch_is_one_bump() {
        let (a, p) = arena_with_node();
        let before = a.read_node(p, RetryBudget::Editor).unwrap().sequence;

        let patch = NodePatch {
            pitch: Some(72),
            velocity: Some(80),
            duration: Some(120),
            ..NodePatch::default()
        };
        a.patch_many(p, &patch).unwrap();

        let snap = a.read_node(p, RetryBudget::Editor).unwrap();
        assert_eq!(snap.sequence, before + 1);
        assert_eq!((snap.pitch, snap.velocity, snap.duration), (72, 80, 120));
    }

    #[test]
    fn patch_rejects_bad_pointers() {
        let (a, _) = arena_with_node();
        assert!(matches!(
            a.patch_pitch(0, 64),
            Err(Error::InvalidPointer { .. })
        ));
        assert!(matches!(
            a.patch_pitch(a.regions().heap + 3, 64),
            Err(Error::InvalidPointer { .. })
        ));
    }

    #[test]
    fn commit_flag_untouched_by_patches() {
        let (a, p) = arena_with_node();
        a.patch_pitch(p, 61).unwrap();
        a.patch_many(p, &NodePatch::default()).unwrap();
        assert_eq!(a.commit_flag(), crate::arena::CommitFlag::Idle);
    }
}
