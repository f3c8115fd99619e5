//! Zone-B bump allocator: contention-free slots for the editor.
//!
//! The editor prepares a node's fields *before* handing it to the worker
//! through the command ring, so it needs somewhere to allocate without
//! touching the contended free stack. Zone B is that place: a cursor
//! marching through `[zone_split, node_capacity)`, single writer, no
//! compare-exchange, no reclamation. A Zone-B node deleted from the chain
//! retires its slot; retired slots come back only when the whole zone is
//! reset while quiesced.

use core::sync::atomic::Ordering;

use crate::arena::{ErrorFlag, ScoreArena};
use crate::error::Error;
use crate::layout::header;

impl ScoreArena {
    /// Allocate the next Zone-B slot. Editor-role only (single writer).
    pub(crate) fn bump_alloc(&self) -> Result<u32, Error> {
        let cursor = self.word(header::BUMP_CURSOR);
        let index = cursor.load(Ordering::Relaxed);
        if index >= self.config().node_capacity {
            self.raise_error(ErrorFlag::HeapExhausted);
            return Err(Error::HeapExhausted);
        }
        cursor.store(index + 1, Ordering::Relaxed);

        let ptr = self.regions().node_ptr(index);
        self.scrub_node(ptr);
        self.adjust_counts(1, 0);
        Ok(ptr)
    }

    /// Retire a Zone-B slot after its node left the chain. The slot stays
    /// unusable until [`ScoreArena::bump_reset`].
    pub(crate) fn retire_zone_b(&self, ptr: u32) {
        debug_assert!(!self.is_zone_a(ptr), "retire is Zone-B only");
        self.word(header::ZONE_B_RETIRED).fetch_add(1, Ordering::Relaxed);
        self.adjust_counts(-1, 0);
    }

    /// Zone-B nodes currently alive (floating or linked).
    pub fn zone_b_in_use(&self) -> u32 {
        let cursor = self.word(header::BUMP_CURSOR).load(Ordering::Relaxed);
        let retired = self.word(header::ZONE_B_RETIRED).load(Ordering::Relaxed);
        cursor - self.config().zone_split - retired
    }

    /// Rewind the bump cursor to the zone start.
    ///
    /// Permitted only while the zone is quiesced: every slot handed out
    /// must have been retired first, otherwise live nodes would be
    /// silently recycled.
    pub(crate) fn bump_reset(&self) -> Result<(), Error> {
        if self.zone_b_in_use() != 0 {
            return Err(Error::InvalidConfig(
                "bump reset requires a quiesced Zone B",
            ));
        }
        self.word(header::BUMP_CURSOR)
            .store(self.config().zone_split, Ordering::Relaxed);
        self.word(header::ZONE_B_RETIRED).store(0, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ArenaConfig, NODE_SIZE};

    fn arena() -> ScoreArena {
        ScoreArena::new(ArenaConfig::with_capacity(8)).unwrap()
    }

    #[test]
    fn cursor_marches_through_zone_b() {
        let a = arena();
        let first = a.bump_alloc().unwrap();
        let second = a.bump_alloc().unwrap();
        assert_eq!(second, first + NODE_SIZE);
        assert_eq!(a.regions().node_index(first), 4);
        assert_eq!(a.zone_b_in_use(), 2);
    }

    #[test]
    fn exhaustion_at_zone_end() {
        let a = arena();
        for _ in 0..4 {
            a.bump_alloc().unwrap();
        }
        assert_eq!(a.bump_alloc(), Err(Error::HeapExhausted));
        assert_eq!(a.error_flag(), ErrorFlag::HeapExhausted);
    }

    #[test]
    fn reset_requires_quiescence() {
        let a = arena();
        let p = a.bump_alloc().unwrap();
        assert!(a.bump_reset().is_err());

        a.retire_zone_b(p);
        a.bump_reset().unwrap();
        assert_eq!(a.zone_b_in_use(), 0);

        // The zone hands out from the start again.
        assert_eq!(a.bump_alloc().unwrap(), p);
    }

    #[test]
    fn bump_does_not_touch_free_count() {
        let a = arena();
        let free_before = a.free_count();
        a.bump_alloc().unwrap();
        assert_eq!(a.free_count(), free_before);
        assert_eq!(a.node_count(), 1);
    }
}
