//! Role handles: ownership-enforced views for the editor and worker.
//!
//! The command ring is strictly single-producer / single-consumer, and
//! the Zone-B bump cursor has exactly one writer. Rather than trusting
//! every caller to remember that, the producer side lives only on
//! [`Editor`] and the consumer side only on [`Worker`]; each claims its
//! role with a compare-exchange on a header lease word, so a second
//! handle per role cannot exist for the same arena, even across
//! processes-worth of threads. Neither handle is `Clone`, and the
//! mutating operations take `&mut self`.
//!
//! The audio role needs no handle here: it is read-only on the chain and
//! touches only the playhead word and the PENDING -> ACK transition,
//! both of which are plain methods on [`ScoreArena`]. The renderer crate
//! builds on those.

#[cfg(not(feature = "std"))]
use alloc::sync::Arc;
#[cfg(feature = "std")]
use std::sync::Arc;

use core::sync::atomic::Ordering;

use crate::arena::ScoreArena;
use crate::error::Error;
use crate::identity::SourceLoc;
use crate::layout::header;
use crate::node::NodeInit;
use crate::ring::Command;

fn claim_lease(arena: &ScoreArena, lease: usize, role: &'static str) -> Result<(), Error> {
    arena
        .word(lease)
        .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
        .map(|_| ())
        .map_err(|_| Error::RoleClaimed { role })
}

/// The editor role: prepares floating nodes in Zone B, patches
/// attributes, and enqueues structural intents for the worker.
pub struct Editor {
    arena: Arc<ScoreArena>,
}

impl Editor {
    /// Claim the editor role. At most one `Editor` exists per arena.
    pub fn claim(arena: Arc<ScoreArena>) -> Result<Self, Error> {
        arena.validate()?;
        claim_lease(&arena, header::EDITOR_LEASE, "editor")?;
        Ok(Self { arena })
    }

    /// Shared view of the underlying arena (for reads and attribute
    /// patches, which are lockless and role-free).
    pub fn arena(&self) -> &ScoreArena {
        &self.arena
    }

    /// Allocate a Zone-B slot and write a node's fields into it. The
    /// node floats, invisible to the audio thread, until an INSERT
    /// command for it is executed.
    pub fn prepare(&mut self, init: &NodeInit) -> Result<u32, Error> {
        let ptr = self.arena.bump_alloc()?;
        self.arena.init_node(ptr, init);
        Ok(ptr)
    }

    /// Queue an INSERT splicing `node` after `after`.
    ///
    /// Contract: the node's fields are final before this call, and the
    /// editor never touches the node again until it re-observes it
    /// through the chain.
    pub fn enqueue_insert_after(&mut self, node: u32, after: u32) -> Result<(), Error> {
        self.arena.check_node_ptr(node)?;
        self.arena.check_node_ptr(after)?;
        self.arena.push_command(Command::Insert { node, after })
    }

    /// Queue an INSERT splicing `node` at the chain head.
    pub fn enqueue_insert_head(&mut self, node: u32) -> Result<(), Error> {
        self.arena.check_node_ptr(node)?;
        self.arena.push_command(Command::Insert {
            node,
            after: crate::layout::NULL,
        })
    }

    /// Queue a DELETE for a linked node. The editor must not reference
    /// the node after this call.
    pub fn enqueue_delete(&mut self, node: u32) -> Result<(), Error> {
        self.arena.check_node_ptr(node)?;
        self.arena.push_command(Command::Delete { node })
    }

    /// Queue a CLEAR tearing down the whole chain.
    pub fn enqueue_clear(&mut self) -> Result<(), Error> {
        self.arena.push_command(Command::Clear)
    }

    /// Block until every outstanding structural change has been
    /// acknowledged by the audio thread.
    pub fn sync_ack(&self) -> Result<(), Error> {
        self.arena.sync_ack()
    }

    /// Rewind the Zone-B bump cursor. Requires a quiesced zone: every
    /// prepared node must have been deleted (or never linked and
    /// explicitly abandoned via delete) first.
    pub fn reset_bump(&mut self) -> Result<(), Error> {
        self.arena.bump_reset()
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        self.arena.word(header::EDITOR_LEASE).store(0, Ordering::Release);
    }
}

/// The worker role: drains the command ring and performs all structural
/// chain surgery under the chain mutex.
pub struct Worker {
    arena: Arc<ScoreArena>,
}

impl Worker {
    /// Claim the worker role. At most one `Worker` exists per arena.
    pub fn claim(arena: Arc<ScoreArena>) -> Result<Self, Error> {
        arena.validate()?;
        claim_lease(&arena, header::WORKER_LEASE, "worker")?;
        Ok(Self { arena })
    }

    /// Shared view of the underlying arena.
    pub fn arena(&self) -> &ScoreArena {
        &self.arena
    }

    /// Drain up to one batch of queued commands. Returns the number
    /// consumed; zero means the ring was empty.
    pub fn process_commands(&mut self) -> usize {
        self.arena.process_commands()
    }

    /// Allocate from Zone A and splice a node at the chain head.
    pub fn insert_head(&mut self, init: &NodeInit, loc: Option<SourceLoc>) -> Result<u32, Error> {
        self.arena.insert_head(init, loc)
    }

    /// Allocate from Zone A and splice a node after `after`.
    pub fn insert_after(
        &mut self,
        after: u32,
        init: &NodeInit,
        loc: Option<SourceLoc>,
    ) -> Result<u32, Error> {
        self.arena.insert_after(after, init, loc)
    }

    /// Unlink a node and reclaim its slot.
    pub fn delete(&mut self, ptr: u32) -> Result<(), Error> {
        self.arena.delete(ptr)
    }

    /// Tear down the chain and both identity tables.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.arena.clear()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.arena.word(header::WORKER_LEASE).store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ArenaConfig;

    fn shared_arena() -> Arc<ScoreArena> {
        Arc::new(ScoreArena::new(ArenaConfig::with_capacity(16)).unwrap())
    }

    #[test]
    fn roles_are_single_occupancy() {
        let arena = shared_arena();
        let editor = Editor::claim(Arc::clone(&arena)).unwrap();
        assert!(matches!(
            Editor::claim(Arc::clone(&arena)),
            Err(Error::RoleClaimed { role: "editor" })
        ));

        drop(editor);
        // The lease frees on drop.
        let _editor = Editor::claim(Arc::clone(&arena)).unwrap();
        let _worker = Worker::claim(arena).unwrap();
    }

    #[test]
    fn prepare_then_insert_via_ring() {
        let arena = shared_arena();
        let mut editor = Editor::claim(Arc::clone(&arena)).unwrap();
        let mut worker = Worker::claim(Arc::clone(&arena)).unwrap();

        let node = editor.prepare(&NodeInit::note(60, 100, 1920, 240)).unwrap();
        editor.enqueue_insert_head(node).unwrap();
        assert_eq!(arena.head_ptr(), crate::layout::NULL);

        assert_eq!(worker.process_commands(), 1);
        assert_eq!(arena.head_ptr(), node);
    }

    #[test]
    fn enqueue_validates_pointers() {
        let arena = shared_arena();
        let mut editor = Editor::claim(arena).unwrap();
        assert!(matches!(
            editor.enqueue_delete(12345),
            Err(Error::InvalidPointer { .. })
        ));
    }

    #[test]
    fn delete_via_ring_then_bump_reset() {
        let arena = shared_arena();
        let mut editor = Editor::claim(Arc::clone(&arena)).unwrap();
        let mut worker = Worker::claim(Arc::clone(&arena)).unwrap();

        let node = editor.prepare(&NodeInit::note(60, 100, 1920, 240)).unwrap();
        editor.enqueue_insert_head(node).unwrap();
        worker.process_commands();

        assert!(editor.reset_bump().is_err());

        editor.enqueue_delete(node).unwrap();
        worker.process_commands();
        assert_eq!(arena.zone_b_in_use(), 0);
        editor.reset_bump().unwrap();
    }
}
