//! Identity and symbol tables: source token to node, and source token to
//! source location.
//!
//! Both tables are open-addressed with linear probing over the same
//! power-of-two capacity, keyed by the 32-bit source id through Knuth's
//! multiplicative hash. They share the probe sequence: the symbol entry
//! for an id lives at the same slot index as its identity entry, and is
//! written *first*, so a node is never visible by id while its location
//! is missing.
//!
//! Identity entries are `[source_id, node_ptr]`; id 0 means empty and
//! `u32::MAX` is a tombstone, so neither value is a legal source id.
//! Lookups skip tombstones, inserts reuse the first one seen. There is no
//! background compaction; `clear` is the only way tombstones go away,
//! and occupancy past 75% raises a non-fatal load-factor warning.

use core::sync::atomic::Ordering;

use crate::arena::{ErrorFlag, ScoreArena};
use crate::error::Error;
use crate::layout::header;

/// Knuth's multiplicative hash constant, 2^32 / phi.
const HASH_MULTIPLIER: u32 = 2_654_435_761;

/// Empty-slot sentinel.
const EMPTY: u32 = 0;

/// Tombstone sentinel for removed entries.
const TOMBSTONE: u32 = u32::MAX;

/// A compiler-supplied source location for a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceLoc {
    /// Hash of the originating file path.
    pub file_hash: u32,
    /// 1-based line number.
    pub line: u16,
    /// 1-based column number.
    pub column: u16,
}

impl SourceLoc {
    #[inline]
    fn pack(self) -> u32 {
        (u32::from(self.line) << 16) | u32::from(self.column)
    }

    #[inline]
    fn unpack(file_hash: u32, packed: u32) -> Self {
        Self {
            file_hash,
            line: (packed >> 16) as u16,
            column: packed as u16,
        }
    }
}

#[inline]
fn slot_of(source_id: u32, capacity: u32) -> u32 {
    source_id.wrapping_mul(HASH_MULTIPLIER) & (capacity - 1)
}

impl ScoreArena {
    #[inline]
    fn id_entry(&self, slot: u32) -> (u32, u32) {
        let base = self.regions().id_table + slot * 8;
        (base, base + 4)
    }

    #[inline]
    fn symbol_entry(&self, slot: u32) -> (u32, u32) {
        let base = self.regions().symbol_table + slot * 8;
        (base, base + 4)
    }

    /// Bind `source_id` to `node_ptr`, optionally recording its source
    /// location. Rebinding an id overwrites its pointer; the most recent
    /// binding wins.
    ///
    /// Worker-role only. Ids 0 and `u32::MAX` are reserved sentinels.
    pub(crate) fn id_insert(
        &self,
        source_id: u32,
        node_ptr: u32,
        loc: Option<SourceLoc>,
    ) -> Result<(), Error> {
        if source_id == EMPTY || source_id == TOMBSTONE {
            return Err(Error::ReservedSourceId { id: source_id });
        }

        let capacity = self.regions().table_capacity;
        let mut slot = slot_of(source_id, capacity);
        let mut reusable = None;

        for _ in 0..capacity {
            let (id_off, ptr_off) = self.id_entry(slot);
            let existing = self.word_at(id_off).load(Ordering::Acquire);

            if existing == source_id {
                // Rebind in place. Location first, pointer second.
                self.write_symbol(slot, loc);
                self.word_at(ptr_off).store(node_ptr, Ordering::Release);
                return Ok(());
            }
            if existing == TOMBSTONE {
                reusable.get_or_insert(slot);
            } else if existing == EMPTY {
                let target = reusable.unwrap_or(slot);
                return self.publish_entry(target, source_id, node_ptr, loc, reusable.is_none());
            }
            slot = (slot + 1) & (capacity - 1);
        }

        if let Some(target) = reusable {
            return self.publish_entry(target, source_id, node_ptr, loc, false);
        }
        // Every slot occupied. Unreachable with the 2x sizing rule, but
        // capacity exhaustion must still fail loudly.
        self.raise_error(ErrorFlag::HeapExhausted);
        Err(Error::HeapExhausted)
    }

    fn publish_entry(
        &self,
        slot: u32,
        source_id: u32,
        node_ptr: u32,
        loc: Option<SourceLoc>,
        fresh_slot: bool,
    ) -> Result<(), Error> {
        let (id_off, ptr_off) = self.id_entry(slot);

        // Symbol entry goes in before the id becomes visible.
        self.write_symbol(slot, loc);
        self.word_at(ptr_off).store(node_ptr, Ordering::Relaxed);
        self.word_at(id_off).store(source_id, Ordering::Release);

        if fresh_slot {
            let used = self.word(header::ID_TABLE_USED).fetch_add(1, Ordering::Relaxed) + 1;
            let capacity = self.regions().table_capacity;
            if used * 4 > capacity * 3 {
                self.raise_error(ErrorFlag::LoadFactorWarning);
                #[cfg(feature = "tracing")]
                tracing::warn!(used, capacity, "identity table past 75% occupancy");
            }
        }
        Ok(())
    }

    fn write_symbol(&self, slot: u32, loc: Option<SourceLoc>) {
        if let Some(loc) = loc {
            let (hash_off, pos_off) = self.symbol_entry(slot);
            self.word_at(hash_off).store(loc.file_hash, Ordering::Relaxed);
            self.word_at(pos_off).store(loc.pack(), Ordering::Release);
        }
    }

    /// Resolve a source id to its node pointer.
    pub fn id_lookup(&self, source_id: u32) -> Option<u32> {
        if source_id == EMPTY || source_id == TOMBSTONE {
            return None;
        }
        let capacity = self.regions().table_capacity;
        let mut slot = slot_of(source_id, capacity);

        for _ in 0..capacity {
            let (id_off, ptr_off) = self.id_entry(slot);
            let existing = self.word_at(id_off).load(Ordering::Acquire);
            if existing == source_id {
                return Some(self.word_at(ptr_off).load(Ordering::Acquire));
            }
            if existing == EMPTY {
                return None;
            }
            slot = (slot + 1) & (capacity - 1);
        }
        None
    }

    /// Resolve a source id to its recorded source location.
    pub fn symbol_lookup(&self, source_id: u32) -> Option<SourceLoc> {
        if source_id == EMPTY || source_id == TOMBSTONE {
            return None;
        }
        let capacity = self.regions().table_capacity;
        let mut slot = slot_of(source_id, capacity);

        for _ in 0..capacity {
            let (id_off, _) = self.id_entry(slot);
            let existing = self.word_at(id_off).load(Ordering::Acquire);
            if existing == source_id {
                let (hash_off, pos_off) = self.symbol_entry(slot);
                let file_hash = self.word_at(hash_off).load(Ordering::Acquire);
                let packed = self.word_at(pos_off).load(Ordering::Acquire);
                return Some(SourceLoc::unpack(file_hash, packed));
            }
            if existing == EMPTY {
                return None;
            }
            slot = (slot + 1) & (capacity - 1);
        }
        None
    }

    /// Unbind a source id, leaving a tombstone. Returns the pointer the id
    /// mapped to. Worker-role only.
    pub(crate) fn id_remove(&self, source_id: u32) -> Option<u32> {
        if source_id == EMPTY || source_id == TOMBSTONE {
            return None;
        }
        let capacity = self.regions().table_capacity;
        let mut slot = slot_of(source_id, capacity);

        for _ in 0..capacity {
            let (id_off, ptr_off) = self.id_entry(slot);
            let existing = self.word_at(id_off).load(Ordering::Acquire);
            if existing == source_id {
                let ptr = self.word_at(ptr_off).load(Ordering::Acquire);
                self.word_at(id_off).store(TOMBSTONE, Ordering::Release);
                return Some(ptr);
            }
            if existing == EMPTY {
                return None;
            }
            slot = (slot + 1) & (capacity - 1);
        }
        None
    }

    /// Zero both table regions and reset occupancy. Also clears a
    /// lingering load-factor warning.
    pub(crate) fn clear_tables(&self) {
        let capacity = self.regions().table_capacity;
        for slot in 0..capacity {
            let (id_off, ptr_off) = self.id_entry(slot);
            self.word_at(id_off).store(EMPTY, Ordering::Relaxed);
            self.word_at(ptr_off).store(0, Ordering::Relaxed);
            let (hash_off, pos_off) = self.symbol_entry(slot);
            self.word_at(hash_off).store(0, Ordering::Relaxed);
            self.word_at(pos_off).store(0, Ordering::Relaxed);
        }
        self.word(header::ID_TABLE_USED).store(0, Ordering::Release);
        if self.error_flag() == ErrorFlag::LoadFactorWarning {
            self.clear_error();
        }
    }

    /// Occupied plus tombstoned identity entries.
    pub fn id_table_used(&self) -> u32 {
        self.word(header::ID_TABLE_USED).load(Ordering::Relaxed)
    }
}
