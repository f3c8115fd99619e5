//! The shared score arena: one contiguous region of atomic 32-bit words.
//!
//! `ScoreArena` owns the allocation and hands out typed access to the
//! header, the register bank, and the node heap. Everything the editor,
//! worker, and audio roles share lives inside this one region; the struct
//! itself holds only immutable layout metadata, so a `ScoreArena` can be
//! wrapped in an `Arc` and touched from all three threads at once.
//!
//! Access discipline: every slot is an [`AtomicU32`], which satisfies the
//! format's rule that all multi-byte reads and writes are 32-bit aligned
//! atomics, and keeps the whole crate free of `unsafe`.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::Error;
use crate::layout::{
    ArenaConfig, NODE_SIZE, NODE_WORDS, NULL, Regions, header, node, register,
};
use crate::{free_list, layout};

/// State of the structural-commit handshake between worker and audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum CommitFlag {
    /// No structural change outstanding.
    Idle = 0,
    /// The chain changed; the audio cursor may be stale.
    Pending = 1,
    /// The audio thread re-anchored and acknowledged.
    Ack = 2,
}

impl CommitFlag {
    fn from_u32(raw: u32) -> Self {
        match raw {
            1 => CommitFlag::Pending,
            2 => CommitFlag::Ack,
            _ => CommitFlag::Idle,
        }
    }
}

/// Sticky diagnostic mirror of the most recent arena error.
///
/// `KernelPanic` is terminal and is never overwritten by later errors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorFlag {
    /// No error recorded.
    #[default]
    Ok = 0,
    /// A node allocation failed.
    HeapExhausted = 1,
    /// A structural edit was rejected inside the safe zone.
    SafeZoneViolation = 2,
    /// An operation received a bad node pointer.
    InvalidPointer = 3,
    /// The command ring overflowed.
    CommandQueueOverflow = 4,
    /// A lock or handshake timed out; the arena is presumed corrupt.
    KernelPanic = 5,
    /// The identity table passed 75% occupancy. Non-fatal.
    LoadFactorWarning = 6,
}

impl ErrorFlag {
    fn from_u32(raw: u32) -> Self {
        match raw {
            1 => ErrorFlag::HeapExhausted,
            2 => ErrorFlag::SafeZoneViolation,
            3 => ErrorFlag::InvalidPointer,
            4 => ErrorFlag::CommandQueueOverflow,
            5 => ErrorFlag::KernelPanic,
            6 => ErrorFlag::LoadFactorWarning,
            _ => ErrorFlag::Ok,
        }
    }
}

/// Point-in-time counters for diagnostics and tests.
#[derive(Clone, Copy, Debug)]
pub struct ArenaStats {
    /// Nodes currently allocated (floating or linked).
    pub node_count: u32,
    /// Nodes on the Zone-A free stack.
    pub free_count: u32,
    /// Total node slots.
    pub node_capacity: u32,
    /// First Zone-B index.
    pub zone_split: u32,
    /// Next unallocated Zone-B index.
    pub bump_cursor: u32,
    /// Zone-B slots deleted and retired until bump reset.
    pub zone_b_retired: u32,
    /// Occupied plus tombstoned identity entries.
    pub id_used: u32,
    /// Identity table capacity.
    pub id_capacity: u32,
    /// Current error flag.
    pub error: ErrorFlag,
    /// Current commit flag.
    pub commit: CommitFlag,
    /// Current playhead tick.
    pub playhead: u32,
}

/// The shared arena region.
pub struct ScoreArena {
    words: Box<[AtomicU32]>,
    regions: Regions,
    config: ArenaConfig,
}

impl ScoreArena {
    /// Create and initialize an arena: zeroed region, header written,
    /// Zone-A free stack threaded, tables empty, registers at defaults.
    pub fn new(config: ArenaConfig) -> Result<Self, Error> {
        let regions = Regions::compute(&config)?;
        let words: Box<[AtomicU32]> = (0..regions.total_words)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let arena = Self {
            words,
            regions,
            config,
        };

        arena.store_header(header::MAGIC, layout::MAGIC);
        arena.store_header(header::VERSION, layout::VERSION);
        arena.store_header(header::PPQ, config.ppq);
        arena.store_header(header::BPM, config.bpm);
        arena.store_header(header::SAFE_ZONE_TICKS, config.safe_zone_ticks);
        arena.store_header(header::NODE_CAPACITY, config.node_capacity);
        arena.store_header(header::ZONE_SPLIT, config.zone_split);
        arena.store_header(header::BUMP_CURSOR, config.zone_split);
        arena.store_header(header::RB_CAPACITY, config.ring_capacity);
        arena.store_header(header::COMMAND_RING_PTR, regions.ring);
        arena.store_header(header::ID_TABLE_PTR, regions.id_table);
        arena.store_header(header::ID_TABLE_CAPACITY, regions.table_capacity);
        arena.store_header(header::SYMBOL_TABLE_PTR, regions.symbol_table);
        arena.store_header(header::GROOVE_REGION_PTR, regions.groove);
        arena.store_header(header::GROOVE_SLOTS, config.groove_slots);
        arena
            .word(register::VELOCITY_MULT)
            .store(1000, Ordering::Relaxed);

        free_list::initialize(&arena);
        Ok(arena)
    }

    /// Verify the header identity and format words.
    pub fn validate(&self) -> Result<(), Error> {
        if self.load_header(header::MAGIC) != layout::MAGIC
            || self.load_header(header::VERSION) != layout::VERSION
        {
            return Err(Error::InvalidConfig("arena magic/version mismatch"));
        }
        Ok(())
    }

    /// The sizing parameters this arena was created with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Computed byte offsets of the arena regions.
    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    #[inline]
    pub(crate) fn word(&self, index: usize) -> &AtomicU32 {
        &self.words[index]
    }

    /// Slot at an arena byte offset. Callers validate the offset first.
    #[inline]
    pub(crate) fn word_at(&self, byte_offset: u32) -> &AtomicU32 {
        &self.words[(byte_offset / 4) as usize]
    }

    /// Field slot of the node at `ptr`.
    #[inline]
    pub(crate) fn node_word(&self, ptr: u32, field: usize) -> &AtomicU32 {
        debug_assert!(field < NODE_WORDS as usize);
        &self.words[(ptr / 4) as usize + field]
    }

    #[inline]
    fn load_header(&self, index: usize) -> u32 {
        self.words[index].load(Ordering::Relaxed)
    }

    #[inline]
    fn store_header(&self, index: usize, value: u32) {
        self.words[index].store(value, Ordering::Relaxed);
    }

    // ---- pointer validation -------------------------------------------

    fn node_ptr_ok(&self, ptr: u32) -> bool {
        let heap = self.regions.heap;
        let end = heap + self.config.node_capacity * NODE_SIZE;
        ptr != NULL && ptr >= heap && ptr < end && (ptr - heap) % NODE_SIZE == 0
    }

    /// Check that `ptr` is a node-aligned byte offset inside the heap.
    pub fn check_node_ptr(&self, ptr: u32) -> Result<(), Error> {
        if !self.node_ptr_ok(ptr) {
            self.raise_error(ErrorFlag::InvalidPointer);
            return Err(Error::InvalidPointer { ptr });
        }
        Ok(())
    }

    /// Raw load of a node's next pointer, bypassing the versioned read.
    ///
    /// One word cannot tear, so this is safe to use for advancing past a
    /// node whose full snapshot keeps failing on contention. Returns null
    /// for an invalid pointer instead of raising the error flag, since the
    /// audio walk must stay silent.
    pub fn peek_next(&self, ptr: u32) -> u32 {
        if !self.node_ptr_ok(ptr) {
            return NULL;
        }
        self.node_word(ptr, node::NEXT_PTR).load(Ordering::Acquire)
    }

    /// Whether the node at `ptr` lives in Zone A (free-list managed).
    pub(crate) fn is_zone_a(&self, ptr: u32) -> bool {
        self.regions.node_index(ptr) < self.config.zone_split
    }

    // ---- chain head ----------------------------------------------------

    /// First chain node, or null.
    #[inline]
    pub fn head_ptr(&self) -> u32 {
        self.word(header::HEAD_PTR).load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_head_ptr(&self, ptr: u32) {
        self.word(header::HEAD_PTR).store(ptr, Ordering::Release);
    }

    // ---- playhead and safe zone ---------------------------------------

    /// Current audio position in ticks.
    #[inline]
    pub fn playhead(&self) -> u32 {
        self.word(header::PLAYHEAD_TICK).load(Ordering::Acquire)
    }

    /// Move the playhead. Audio-role only.
    #[inline]
    pub fn set_playhead(&self, tick: u32) {
        self.word(header::PLAYHEAD_TICK).store(tick, Ordering::Release);
    }

    /// Width of the structural-edit exclusion window in ticks.
    #[inline]
    pub fn safe_zone_ticks(&self) -> u32 {
        self.word(header::SAFE_ZONE_TICKS).load(Ordering::Relaxed)
    }

    /// Check `tick` against the exclusion window ahead of the playhead.
    ///
    /// Ticks behind the playhead have already sounded and stay editable.
    pub fn check_safe_zone(&self, tick: u32) -> Result<(), Error> {
        let playhead = self.playhead();
        let window = self.safe_zone_ticks();
        if tick >= playhead && tick - playhead < window {
            self.raise_error(ErrorFlag::SafeZoneViolation);
            return Err(Error::SafeZoneViolation {
                tick,
                playhead,
                window,
            });
        }
        Ok(())
    }

    // ---- timing --------------------------------------------------------

    /// Pulses per quarter note.
    #[inline]
    pub fn ppq(&self) -> u32 {
        self.load_header(header::PPQ)
    }

    /// Current tempo in beats per minute.
    #[inline]
    pub fn bpm(&self) -> u32 {
        self.load_header(header::BPM)
    }

    /// Change the tempo live. Takes effect at the next audio quantum.
    #[inline]
    pub fn set_bpm(&self, bpm: u32) {
        self.store_header(header::BPM, bpm.max(1));
    }

    // ---- commit handshake ----------------------------------------------

    /// Current commit handshake state.
    #[inline]
    pub fn commit_flag(&self) -> CommitFlag {
        CommitFlag::from_u32(self.word(header::COMMIT_FLAG).load(Ordering::Acquire))
    }

    /// Mark a structural change. Called with the chain mutex held.
    pub(crate) fn mark_commit_pending(&self) {
        self.word(header::COMMIT_FLAG)
            .store(CommitFlag::Pending as u32, Ordering::Release);
    }

    /// Audio-side PENDING -> ACK transition. Returns `true` when this call
    /// performed the transition (the caller must have re-anchored first).
    pub fn acknowledge_commit(&self) -> bool {
        self.word(header::COMMIT_FLAG)
            .compare_exchange(
                CommitFlag::Pending as u32,
                CommitFlag::Ack as u32,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Editor-side ACK -> IDLE transition closing the handshake.
    pub(crate) fn consume_ack(&self) -> bool {
        self.word(header::COMMIT_FLAG)
            .compare_exchange(
                CommitFlag::Ack as u32,
                CommitFlag::Idle as u32,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    // ---- error flag ----------------------------------------------------

    /// Current error flag.
    pub fn error_flag(&self) -> ErrorFlag {
        ErrorFlag::from_u32(self.word(header::ERROR_FLAG).load(Ordering::Acquire))
    }

    /// Record an error for external observers. `KernelPanic` is sticky.
    pub(crate) fn raise_error(&self, flag: ErrorFlag) {
        let slot = self.word(header::ERROR_FLAG);
        if ErrorFlag::from_u32(slot.load(Ordering::Relaxed)) == ErrorFlag::KernelPanic {
            return;
        }
        slot.store(flag as u32, Ordering::Release);
    }

    /// Clear a non-terminal error flag.
    pub fn clear_error(&self) {
        let slot = self.word(header::ERROR_FLAG);
        if ErrorFlag::from_u32(slot.load(Ordering::Relaxed)) != ErrorFlag::KernelPanic {
            slot.store(ErrorFlag::Ok as u32, Ordering::Release);
        }
    }

    // ---- counters ------------------------------------------------------

    /// Nodes currently allocated (floating or linked).
    #[inline]
    pub fn node_count(&self) -> u32 {
        self.word(header::NODE_COUNT).load(Ordering::Relaxed)
    }

    /// Nodes on the Zone-A free stack.
    #[inline]
    pub fn free_count(&self) -> u32 {
        self.word(header::FREE_COUNT).load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn adjust_counts(&self, node_delta: i32, free_delta: i32) {
        let nodes = self.word(header::NODE_COUNT);
        let free = self.word(header::FREE_COUNT);
        match node_delta {
            1 => {
                nodes.fetch_add(1, Ordering::Relaxed);
            }
            -1 => {
                nodes.fetch_sub(1, Ordering::Relaxed);
            }
            _ => {}
        }
        match free_delta {
            1 => {
                free.fetch_add(1, Ordering::Relaxed);
            }
            -1 => {
                free.fetch_sub(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Snapshot the counters for diagnostics.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            node_count: self.node_count(),
            free_count: self.free_count(),
            node_capacity: self.config.node_capacity,
            zone_split: self.config.zone_split,
            bump_cursor: self.load_header(header::BUMP_CURSOR),
            zone_b_retired: self.load_header(header::ZONE_B_RETIRED),
            id_used: self.load_header(header::ID_TABLE_USED),
            id_capacity: self.regions.table_capacity,
            error: self.error_flag(),
            commit: self.commit_flag(),
            playhead: self.playhead(),
        }
    }

    // ---- node snapshots (non-versioned, for init and tests) -----------

    /// Raw single-word load of a node field. Each word is individually
    /// atomic; use the seqlock read path when cross-field consistency
    /// matters.
    #[inline]
    pub(crate) fn node_field(&self, ptr: u32, field: usize) -> u32 {
        self.node_word(ptr, field).load(Ordering::Acquire)
    }

    /// Zero every node word except `SEQ_FLAGS`, which survives the
    /// node's whole lifetime.
    pub(crate) fn scrub_node(&self, ptr: u32) {
        for field in [
            node::PACKED_A,
            node::BASE_TICK,
            node::DURATION,
            node::NEXT_PTR,
            node::PREV_PTR,
            node::SOURCE_ID,
            node::RESERVED,
        ] {
            self.node_word(ptr, field).store(0, Ordering::Relaxed);
        }
    }
}
