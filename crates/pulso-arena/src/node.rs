//! Node records: the 32-byte musical events stored in the heap.

use core::sync::atomic::Ordering;

use crate::arena::ScoreArena;
use crate::layout::{self, NULL, Opcode, flags, node};

/// Field values for a node about to enter the chain.
#[derive(Clone, Copy, Debug)]
pub struct NodeInit {
    /// Event kind.
    pub opcode: Opcode,
    /// MIDI pitch for notes; controller number for CC; coarse value for
    /// bends.
    pub pitch: u8,
    /// MIDI velocity for notes; controller value for CC.
    pub velocity: u8,
    /// Extra flag bits. `ACTIVE` is forced on at link time regardless.
    pub flags: u8,
    /// Grid-aligned event time in ticks.
    pub base_tick: u32,
    /// Event length in ticks.
    pub duration: u32,
    /// Stable identity supplied by the compiler, 0 for none.
    pub source_id: u32,
}

impl NodeInit {
    /// A note event with no source identity.
    pub fn note(pitch: u8, velocity: u8, base_tick: u32, duration: u32) -> Self {
        Self {
            opcode: Opcode::Note,
            pitch,
            velocity,
            flags: 0,
            base_tick,
            duration,
            source_id: 0,
        }
    }

    /// A rest occupying `duration` ticks.
    pub fn rest(base_tick: u32, duration: u32) -> Self {
        Self {
            opcode: Opcode::Rest,
            pitch: 0,
            velocity: 0,
            flags: 0,
            base_tick,
            duration,
            source_id: 0,
        }
    }

    /// Attach a source identity.
    pub fn with_source_id(mut self, source_id: u32) -> Self {
        self.source_id = source_id;
        self
    }

    /// Start the node muted.
    pub fn muted(mut self) -> Self {
        self.flags |= flags::MUTED;
        self
    }
}

/// A consistent by-value copy of one node, produced by the versioned
/// read loop. Plain data; never borrows the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeSnapshot {
    /// Byte offset of the node this snapshot was taken from.
    pub ptr: u32,
    /// Raw opcode byte.
    pub opcode: u8,
    /// Pitch lane.
    pub pitch: u8,
    /// Velocity lane.
    pub velocity: u8,
    /// Flag bits.
    pub flags: u8,
    /// Event time in ticks.
    pub base_tick: u32,
    /// Event length in ticks.
    pub duration: u32,
    /// Next chain node at snapshot time, or null.
    pub next_ptr: u32,
    /// Previous chain node at snapshot time, or null.
    pub prev_ptr: u32,
    /// Source identity, 0 for none.
    pub source_id: u32,
    /// Sequence counter value the snapshot was validated against.
    pub sequence: u32,
}

impl NodeSnapshot {
    /// Whether the node is linked and live.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.flags & flags::ACTIVE != 0
    }

    /// Whether the node is suppressed from playback.
    #[inline]
    pub fn is_muted(&self) -> bool {
        self.flags & flags::MUTED != 0
    }

    /// Decoded opcode, if the byte is a known kind.
    #[inline]
    pub fn kind(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }
}

impl ScoreArena {
    /// Write a freshly allocated node's fields.
    ///
    /// The node is floating: nothing can reach it until a linking pointer
    /// is published, so plain per-word stores suffice and the sequence
    /// counter is left untouched (it carries over from the slot's past
    /// lives on the free stack).
    pub(crate) fn init_node(&self, ptr: u32, init: &NodeInit) {
        let packed = layout::pack_attrs(
            init.opcode as u8,
            init.pitch,
            init.velocity,
            init.flags | flags::ACTIVE,
        );
        self.node_word(ptr, node::PACKED_A).store(packed, Ordering::Relaxed);
        self.node_word(ptr, node::BASE_TICK)
            .store(init.base_tick, Ordering::Relaxed);
        self.node_word(ptr, node::DURATION)
            .store(init.duration, Ordering::Relaxed);
        self.node_word(ptr, node::NEXT_PTR).store(NULL, Ordering::Relaxed);
        self.node_word(ptr, node::PREV_PTR).store(NULL, Ordering::Relaxed);
        self.node_word(ptr, node::SOURCE_ID)
            .store(init.source_id, Ordering::Relaxed);
        self.node_word(ptr, node::RESERVED).store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ArenaConfig;

    #[test]
    fn init_forces_active_flag() {
        let a = ScoreArena::new(ArenaConfig::with_capacity(8)).unwrap();
        let p = a.alloc_node().unwrap();
        a.init_node(p, &NodeInit::note(60, 100, 0, 240));

        let (opcode, pitch, velocity, f) = layout::unpack_attrs(a.node_field(p, node::PACKED_A));
        assert_eq!((opcode, pitch, velocity), (Opcode::Note as u8, 60, 100));
        assert_ne!(f & flags::ACTIVE, 0);
    }

    #[test]
    fn builders_compose() {
        let init = NodeInit::note(64, 90, 1920, 480).with_source_id(7).muted();
        assert_eq!(init.source_id, 7);
        assert_eq!(init.flags & flags::MUTED, flags::MUTED);
        assert_eq!(init.opcode, Opcode::Note);
    }

    #[test]
    fn rest_has_no_voice() {
        let init = NodeInit::rest(960, 480);
        assert_eq!(init.opcode, Opcode::Rest);
        assert_eq!(init.pitch, 0);
        assert_eq!(init.velocity, 0);
    }
}
