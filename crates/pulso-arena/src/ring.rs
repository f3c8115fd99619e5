//! The command ring: structural intents from editor to worker.
//!
//! A fixed circular buffer of four-word slots
//! (`opcode | param1 | param2 | reserved`) with exactly one producer (the
//! editor) and one consumer (the worker). The indices live in the
//! `RB_HEAD`/`RB_TAIL` header slots; the producer release-stores the tail
//! after filling a slot and the consumer acquire-loads it, so slot
//! contents are published without any further ordering on the data words
//! themselves. A full ring is an error surfaced to the producer; a
//! structural intent is never dropped silently.
//!
//! The on-disk command set is INSERT, DELETE, and CLEAR. The source
//! format once reserved a PATCH opcode here; it was never executable and
//! is gone: attribute patches go through the seqlock and need no worker
//! round-trip. The consumer still skips unknown opcodes defensively.

use core::sync::atomic::Ordering;

use crate::arena::{ErrorFlag, ScoreArena};
use crate::error::Error;
use crate::layout::{RING_SLOT_WORDS, header};

/// Command ring opcodes.
mod opcode {
    pub const INSERT: u32 = 1;
    pub const DELETE: u32 = 2;
    pub const CLEAR: u32 = 3;
}

/// A structural intent moving through the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Splice a prepared floating node after `after` (null = at the head).
    Insert {
        /// Byte offset of the floating node, fields already written.
        node: u32,
        /// Byte offset of the predecessor, or null for the chain head.
        after: u32,
    },
    /// Unlink and reclaim the node at `node`.
    Delete {
        /// Byte offset of the linked node.
        node: u32,
    },
    /// Tear down the whole chain and both tables.
    Clear,
}

impl Command {
    /// Encode into a ring slot.
    pub(crate) fn encode(self) -> [u32; 4] {
        match self {
            Command::Insert { node, after } => [opcode::INSERT, node, after, 0],
            Command::Delete { node } => [opcode::DELETE, node, 0, 0],
            Command::Clear => [opcode::CLEAR, 0, 0, 0],
        }
    }

    /// Decode a ring slot. `None` for unknown opcodes, which the consumer
    /// logs and skips.
    pub(crate) fn decode(slot: [u32; 4]) -> Option<Self> {
        match slot[0] {
            opcode::INSERT => Some(Command::Insert {
                node: slot[1],
                after: slot[2],
            }),
            opcode::DELETE => Some(Command::Delete { node: slot[1] }),
            opcode::CLEAR => Some(Command::Clear),
            _ => None,
        }
    }
}

impl ScoreArena {
    /// Enqueue a command. Producer side; exactly one thread may call this.
    pub(crate) fn push_command(&self, command: Command) -> Result<(), Error> {
        let capacity = self.config().ring_capacity;
        let head = self.word(header::RB_HEAD).load(Ordering::Acquire);
        let tail = self.word(header::RB_TAIL).load(Ordering::Relaxed);

        if (tail + 1) % capacity == head {
            self.raise_error(ErrorFlag::CommandQueueOverflow);
            return Err(Error::CommandQueueOverflow { capacity });
        }

        let slot = self.regions().ring + tail * RING_SLOT_WORDS * 4;
        for (i, word) in command.encode().into_iter().enumerate() {
            self.word_at(slot + i as u32 * 4).store(word, Ordering::Relaxed);
        }
        self.word(header::RB_TAIL)
            .store((tail + 1) % capacity, Ordering::Release);
        Ok(())
    }

    /// Dequeue a raw slot. Consumer side; exactly one thread may call this.
    pub(crate) fn pop_command(&self) -> Option<[u32; 4]> {
        let capacity = self.config().ring_capacity;
        let head = self.word(header::RB_HEAD).load(Ordering::Relaxed);
        let tail = self.word(header::RB_TAIL).load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        let slot = self.regions().ring + head * RING_SLOT_WORDS * 4;
        let mut words = [0u32; 4];
        for (i, word) in words.iter_mut().enumerate() {
            *word = self.word_at(slot + i as u32 * 4).load(Ordering::Relaxed);
        }
        self.word(header::RB_HEAD)
            .store((head + 1) % capacity, Ordering::Release);
        Some(words)
    }

    /// Commands currently queued.
    pub fn pending_commands(&self) -> u32 {
        let capacity = self.config().ring_capacity;
        let head = self.word(header::RB_HEAD).load(Ordering::Acquire);
        let tail = self.word(header::RB_TAIL).load(Ordering::Acquire);
        (tail + capacity - head) % capacity
    }
}
