//! Linker core: structural chain operations and the commit handshake.
//!
//! Every structural edit follows the same shape: take the chain mutex,
//! re-check the safe zone (the playhead may have advanced while we
//! waited), splice, update the identity table, raise `COMMIT_FLAG =
//! PENDING`, release. The pending flag is the single ordering point
//! between a topology change and its audio-visible effect: the audio
//! thread re-anchors its cursor when it sees PENDING and answers with
//! ACK, which the editor's `sync_ack` consumes back to IDLE.
//!
//! Node publication: a floating node's fields are written with plain
//! per-word stores, and the final store that links it (`NEXT_PTR` of the
//! predecessor, or `HEAD_PTR`) is a release store. A reader that reaches
//! the node through an acquire load of that pointer sees initialized
//! contents.

use core::hint;
use core::ops::ControlFlow;
use core::sync::atomic::Ordering;

use crate::arena::{ErrorFlag, ScoreArena};
use crate::backoff;
use crate::chain_lock::PANIC_THRESHOLD;
use crate::error::Error;
use crate::identity::SourceLoc;
use crate::layout::{NULL, flags, node};
use crate::node::{NodeInit, NodeSnapshot};
use crate::ring::Command;
use crate::seqlock::RetryBudget;

/// Commands drained per `process_commands` call, bounding worker latency
/// so a flooded ring cannot starve everything else the worker does.
const COMMAND_BATCH: usize = 256;

impl ScoreArena {
    // ---- splicing (chain mutex held) ----------------------------------

    /// Link `ptr` after `after`, or at the head when `after` is null.
    fn splice(&self, after: u32, ptr: u32) {
        if after == NULL {
            let old_head = self.head_ptr();
            self.node_word(ptr, node::NEXT_PTR).store(old_head, Ordering::Relaxed);
            self.node_word(ptr, node::PREV_PTR).store(NULL, Ordering::Relaxed);
            if old_head != NULL {
                self.node_word(old_head, node::PREV_PTR).store(ptr, Ordering::Release);
            }
            self.set_head_ptr(ptr);
        } else {
            let next = self.node_field(after, node::NEXT_PTR);
            self.node_word(ptr, node::NEXT_PTR).store(next, Ordering::Relaxed);
            self.node_word(ptr, node::PREV_PTR).store(after, Ordering::Relaxed);
            if next != NULL {
                self.node_word(next, node::PREV_PTR).store(ptr, Ordering::Release);
            }
            // Publication point: the node becomes reachable here.
            self.node_word(after, node::NEXT_PTR).store(ptr, Ordering::Release);
        }
    }

    /// Unlink `ptr` from the chain. O(1) through the back pointer.
    fn unsplice(&self, ptr: u32) {
        let next = self.node_field(ptr, node::NEXT_PTR);
        let prev = self.node_field(ptr, node::PREV_PTR);
        if prev != NULL {
            self.node_word(prev, node::NEXT_PTR).store(next, Ordering::Release);
        } else {
            self.set_head_ptr(next);
        }
        if next != NULL {
            self.node_word(next, node::PREV_PTR).store(prev, Ordering::Release);
        }
    }

    /// Return a node's slot to its zone after unlinking or a rejected
    /// insert. Tombstone step: the fields are zeroed (sequence excepted)
    /// before the slot is reclaimed.
    fn release_node(&self, ptr: u32) {
        self.scrub_node(ptr);
        if self.is_zone_a(ptr) {
            self.free_node(ptr);
        } else {
            self.node_word(ptr, node::SEQ_FLAGS)
                .fetch_add(crate::layout::SEQ_UNIT, Ordering::Release);
            self.retire_zone_b(ptr);
        }
    }

    /// Safe-zone check for an insert. The protected node is the anchor
    /// whose links the splice rewrites: the `after` node, or the current
    /// head for a head insert. An empty chain anchors nothing, so any
    /// insert into it passes. Called with the chain mutex held.
    fn check_anchor_safe_zone(&self, after: u32) -> Result<(), Error> {
        let anchor = if after == NULL { self.head_ptr() } else { after };
        if anchor == NULL {
            return Ok(());
        }
        self.check_safe_zone(self.node_field(anchor, node::BASE_TICK))
    }

    // ---- worker-role structural operations ----------------------------

    /// Allocate a Zone-A node and splice it after `after`.
    pub(crate) fn insert_after(
        &self,
        after: u32,
        init: &NodeInit,
        loc: Option<SourceLoc>,
    ) -> Result<u32, Error> {
        self.check_node_ptr(after)?;
        self.insert_at(Some(after), init, loc)
    }

    /// Allocate a Zone-A node and splice it at the chain head.
    pub(crate) fn insert_head(
        &self,
        init: &NodeInit,
        loc: Option<SourceLoc>,
    ) -> Result<u32, Error> {
        self.insert_at(None, init, loc)
    }

    fn insert_at(
        &self,
        after: Option<u32>,
        init: &NodeInit,
        loc: Option<SourceLoc>,
    ) -> Result<u32, Error> {
        if init.source_id == u32::MAX {
            return Err(Error::ReservedSourceId { id: init.source_id });
        }

        let ptr = self.alloc_node()?;
        self.init_node(ptr, init);

        let guard = match self.lock_chain() {
            Ok(guard) => guard,
            Err(e) => {
                self.release_node(ptr);
                return Err(e);
            }
        };
        // The playhead may have moved while we spun on the lock.
        if let Err(e) = self.check_anchor_safe_zone(after.unwrap_or(NULL)) {
            drop(guard);
            self.release_node(ptr);
            return Err(e);
        }

        self.splice(after.unwrap_or(NULL), ptr);
        if init.source_id != 0 {
            self.bind_identity(init.source_id, ptr, loc);
        }
        self.mark_commit_pending();
        drop(guard);
        Ok(ptr)
    }

    fn bind_identity(&self, source_id: u32, ptr: u32, loc: Option<SourceLoc>) {
        if let Err(_e) = self.id_insert(source_id, ptr, loc) {
            // The node is already linked; a table failure downgrades to a
            // diagnostic rather than tearing the splice back out.
            #[cfg(feature = "tracing")]
            tracing::warn!(source_id, ptr, error = %_e, "identity bind failed");
        }
    }

    /// Unlink a node and reclaim its slot.
    pub(crate) fn delete(&self, ptr: u32) -> Result<(), Error> {
        self.check_node_ptr(ptr)?;

        let guard = self.lock_chain()?;
        let packed = self.node_field(ptr, node::PACKED_A);
        if packed & u32::from(flags::ACTIVE) == 0 {
            drop(guard);
            self.raise_error(ErrorFlag::InvalidPointer);
            return Err(Error::InvalidPointer { ptr });
        }
        let base_tick = self.node_field(ptr, node::BASE_TICK);
        if let Err(e) = self.check_safe_zone(base_tick) {
            drop(guard);
            return Err(e);
        }

        self.unsplice(ptr);
        let source_id = self.node_field(ptr, node::SOURCE_ID);
        if source_id != 0 && source_id != u32::MAX && self.id_lookup(source_id) == Some(ptr) {
            self.id_remove(source_id);
        }
        self.mark_commit_pending();
        drop(guard);

        self.release_node(ptr);
        Ok(())
    }

    /// Tear down the whole chain and both tables.
    pub(crate) fn clear(&self) -> Result<(), Error> {
        let guard = self.lock_chain()?;
        let mut ptr = self.head_ptr();
        self.set_head_ptr(NULL);

        let mut remaining = self.config().node_capacity;
        while ptr != NULL && remaining > 0 {
            let next = self.node_field(ptr, node::NEXT_PTR);
            self.release_node(ptr);
            ptr = next;
            remaining -= 1;
        }
        if ptr != NULL {
            // More links than slots: the chain was cyclic. Unrecoverable.
            self.raise_error(ErrorFlag::KernelPanic);
            drop(guard);
            return Err(Error::KernelPanic { spins: 0 });
        }

        self.clear_tables();
        self.mark_commit_pending();
        drop(guard);
        Ok(())
    }

    // ---- command execution --------------------------------------------

    /// Splice an editor-prepared floating node after `after` (null =
    /// head). The INSERT command path.
    pub(crate) fn execute_insert(&self, node_ptr: u32, after: u32) -> Result<(), Error> {
        self.check_node_ptr(node_ptr)?;
        if after != NULL {
            self.check_node_ptr(after)?;
        }

        let guard = self.lock_chain()?;
        if let Err(e) = self.check_anchor_safe_zone(after) {
            drop(guard);
            // The producer contract forbids touching a node after it was
            // enqueued, so a rejected insert reclaims the slot here.
            self.release_node(node_ptr);
            return Err(e);
        }

        // Linking forces the node live regardless of what the producer
        // left in the flag bits.
        let _ = self
            .node_word(node_ptr, node::PACKED_A)
            .fetch_or(u32::from(flags::ACTIVE), Ordering::Relaxed);

        self.splice(after, node_ptr);
        let source_id = self.node_field(node_ptr, node::SOURCE_ID);
        if source_id != 0 && source_id != u32::MAX {
            self.bind_identity(source_id, node_ptr, None);
        }
        self.mark_commit_pending();
        drop(guard);
        Ok(())
    }

    /// Drain up to [`COMMAND_BATCH`] commands from the ring, dispatching
    /// each by opcode. Failed commands mirror their error into the error
    /// flag and do not stop the batch. Returns the number of commands
    /// consumed.
    pub(crate) fn process_commands(&self) -> usize {
        let mut processed = 0;
        while processed < COMMAND_BATCH {
            let Some(slot) = self.pop_command() else {
                break;
            };
            processed += 1;

            match Command::decode(slot) {
                Some(Command::Insert { node, after }) => {
                    if let Err(_e) = self.execute_insert(node, after) {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(node, after, error = %_e, "insert command failed");
                    }
                }
                Some(Command::Delete { node }) => {
                    if let Err(_e) = self.delete(node) {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(node, error = %_e, "delete command failed");
                    }
                }
                Some(Command::Clear) => {
                    if let Err(_e) = self.clear() {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %_e, "clear command failed");
                    }
                }
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(opcode = slot[0], "unknown command opcode, skipping");
                }
            }
        }
        processed
    }

    // ---- traversal -----------------------------------------------------

    /// Walk the chain from the head, handing each node's consistent
    /// snapshot to `visit`. Zero allocation; advancement uses the
    /// `next_ptr` captured inside the snapshot. Returns the number of
    /// nodes visited.
    pub fn traverse<F>(&self, mut visit: F) -> Result<u32, Error>
    where
        F: FnMut(NodeSnapshot) -> ControlFlow<()>,
    {
        let mut ptr = self.head_ptr();
        let mut visited = 0u32;
        let capacity = self.config().node_capacity;

        while ptr != NULL {
            if visited >= capacity {
                self.raise_error(ErrorFlag::KernelPanic);
                return Err(Error::KernelPanic { spins: 0 });
            }
            let snapshot = self.read_node(ptr, RetryBudget::Editor)?;
            visited += 1;
            if let ControlFlow::Break(()) = visit(snapshot) {
                break;
            }
            ptr = snapshot.next_ptr;
        }
        Ok(visited)
    }

    // ---- commit handshake (editor side) --------------------------------

    /// Block until the audio thread has acknowledged all pending
    /// structural changes and the handshake is back to IDLE.
    pub(crate) fn sync_ack(&self) -> Result<(), Error> {
        use crate::arena::CommitFlag;

        let mut spins = 0u32;
        loop {
            match self.commit_flag() {
                CommitFlag::Idle => return Ok(()),
                CommitFlag::Ack => {
                    if self.consume_ack() {
                        return Ok(());
                    }
                }
                CommitFlag::Pending => {}
            }

            spins += 1;
            if spins >= PANIC_THRESHOLD {
                self.raise_error(ErrorFlag::KernelPanic);
                return Err(Error::KernelPanic { spins });
            }
            if spins % 100 == 0 {
                backoff::yield_briefly();
            } else {
                hint::spin_loop();
            }
        }
    }
}
