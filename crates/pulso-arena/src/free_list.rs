//! Zone-A free list: a lock-free LIFO stack of node slots.
//!
//! The stack head lives in the `FREE_LIST_PTR` header slot; each free node
//! stores its successor in the `PACKED_A` word (a node on the stack has no
//! attributes, so the slot is free for reuse). Pops and pushes are
//! compare-exchange loops on the head, with no locks and no allocation.
//!
//! ABA protection: the node's sequence counter is bumped on *free*, not on
//! alloc. Any reader holding a stale reference to a recycled slot will
//! observe a changed sequence on its next versioned read and retry.

use core::sync::atomic::Ordering;

use crate::arena::{ErrorFlag, ScoreArena};
use crate::error::Error;
use crate::layout::{NULL, SEQ_UNIT, header, node};

/// Thread slots `[0, zone_split)` into one chain and point the stack head
/// at the first. Called once from arena creation.
pub(crate) fn initialize(arena: &ScoreArena) {
    let split = arena.config().zone_split;
    let regions = arena.regions();

    for index in 0..split {
        let ptr = regions.node_ptr(index);
        let next = if index + 1 < split {
            regions.node_ptr(index + 1)
        } else {
            NULL
        };
        arena.node_word(ptr, node::PACKED_A).store(next, Ordering::Relaxed);
    }

    arena
        .word(header::FREE_LIST_PTR)
        .store(regions.node_ptr(0), Ordering::Release);
    arena.word(header::FREE_COUNT).store(split, Ordering::Relaxed);
    arena.word(header::NODE_COUNT).store(0, Ordering::Relaxed);
    arena.word(header::HEAD_PTR).store(NULL, Ordering::Release);
}

impl ScoreArena {
    /// Pop a Zone-A slot from the free stack.
    ///
    /// The returned node has every field zeroed except its sequence
    /// counter, which survives across reuse. Fails with
    /// [`Error::HeapExhausted`] (mirrored into the error flag) when the
    /// stack is empty.
    pub fn alloc_node(&self) -> Result<u32, Error> {
        let head_slot = self.word(header::FREE_LIST_PTR);
        let ptr = loop {
            let head = head_slot.load(Ordering::Acquire);
            if head == NULL {
                self.raise_error(ErrorFlag::HeapExhausted);
                return Err(Error::HeapExhausted);
            }
            let next = self.node_word(head, node::PACKED_A).load(Ordering::Acquire);
            if head_slot
                .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break head;
            }
        };

        self.scrub_node(ptr);
        self.adjust_counts(1, -1);
        Ok(ptr)
    }

    /// Push a Zone-A slot back onto the free stack. Ignores null.
    ///
    /// Bumps the node's sequence counter first so stale references detect
    /// the recycle, then links the old head into `PACKED_A` and publishes
    /// the slot as the new head.
    pub fn free_node(&self, ptr: u32) {
        if ptr == NULL {
            return;
        }
        debug_assert!(self.is_zone_a(ptr), "free_node is Zone-A only");

        self.node_word(ptr, node::SEQ_FLAGS)
            .fetch_add(SEQ_UNIT, Ordering::Release);

        let head_slot = self.word(header::FREE_LIST_PTR);
        loop {
            let head = head_slot.load(Ordering::Acquire);
            self.node_word(ptr, node::PACKED_A).store(head, Ordering::Relaxed);
            if head_slot
                .compare_exchange_weak(head, ptr, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }

        self.adjust_counts(-1, 1);
    }
}
