//! Property-based tests for the arena invariants.
//!
//! A randomly generated trace of structural and attribute operations is
//! applied through the worker role while a plain `Vec` model mirrors the
//! intended chain. Afterwards the arena must agree with the model on
//! ordering, linkage, counters, and identity bindings.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use pulso_arena::{
    ArenaConfig, Error, NodeInit, NodeSnapshot, RetryBudget, ScoreArena, Worker,
};

const CAPACITY: u32 = 64;
const ZONE_A: u32 = 32;

/// Arena with the safe zone disabled so traces can use any tick.
fn open_arena() -> Arc<ScoreArena> {
    let config = ArenaConfig {
        safe_zone_ticks: 0,
        ..ArenaConfig::with_capacity(CAPACITY)
    };
    Arc::new(ScoreArena::new(config).unwrap())
}

#[derive(Clone, Debug)]
enum Op {
    InsertHead { tick: u32, source_id: u32 },
    InsertAfter { pos: usize, tick: u32 },
    Delete { pos: usize },
    PatchPitch { pos: usize, pitch: u8 },
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (1000u32..100_000, 1u32..40)
            .prop_map(|(tick, source_id)| Op::InsertHead { tick, source_id }),
        5 => (0usize..CAPACITY as usize, 1000u32..100_000)
            .prop_map(|(pos, tick)| Op::InsertAfter { pos, tick }),
        3 => (0usize..CAPACITY as usize).prop_map(|pos| Op::Delete { pos }),
        3 => (0usize..CAPACITY as usize, 0u8..128)
            .prop_map(|(pos, pitch)| Op::PatchPitch { pos, pitch }),
        1 => Just(Op::Clear),
    ]
}

/// One live node as the model sees it.
#[derive(Clone, Debug, PartialEq)]
struct ModelNode {
    ptr: u32,
    tick: u32,
    pitch: u8,
    source_id: u32,
}

fn collect_chain(arena: &ScoreArena) -> Vec<NodeSnapshot> {
    let mut nodes = Vec::new();
    arena
        .traverse(|snap| {
            nodes.push(snap);
            ControlFlow::Continue(())
        })
        .unwrap();
    nodes
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Invariants 1-3, 5 and property 9 over random operation traces:
    /// the chain stays doubly linked and acyclic, matches the model in
    /// order and content, the counters stay consistent, and identity
    /// lookups resolve to the most recent live binding.
    #[test]
    fn random_traces_preserve_invariants(ops in prop::collection::vec(op_strategy(), 1..48)) {
        let arena = open_arena();
        let mut worker = Worker::claim(Arc::clone(&arena)).unwrap();

        let mut model: Vec<ModelNode> = Vec::new();
        let mut bindings: HashMap<u32, Option<u32>> = HashMap::new();

        for op in ops {
            match op {
                Op::InsertHead { tick, source_id } => {
                    let init = NodeInit::note(60, 100, tick, 240).with_source_id(source_id);
                    match worker.insert_head(&init, None) {
                        Ok(ptr) => {
                            model.insert(0, ModelNode { ptr, tick, pitch: 60, source_id });
                            bindings.insert(source_id, Some(ptr));
                        }
                        Err(Error::HeapExhausted) => {
                            prop_assert_eq!(arena.free_count(), 0);
                        }
                        Err(e) => return Err(TestCaseError::fail(format!("insert_head: {e}"))),
                    }
                }
                Op::InsertAfter { pos, tick } => {
                    if model.is_empty() {
                        continue;
                    }
                    let pos = pos % model.len();
                    let after = model[pos].ptr;
                    match worker.insert_after(after, &NodeInit::note(60, 100, tick, 240), None) {
                        Ok(ptr) => {
                            model.insert(pos + 1, ModelNode { ptr, tick, pitch: 60, source_id: 0 });
                        }
                        Err(Error::HeapExhausted) => {
                            prop_assert_eq!(arena.free_count(), 0);
                        }
                        Err(e) => return Err(TestCaseError::fail(format!("insert_after: {e}"))),
                    }
                }
                Op::Delete { pos } => {
                    if model.is_empty() {
                        continue;
                    }
                    let pos = pos % model.len();
                    let node = model.remove(pos);
                    worker.delete(node.ptr).unwrap();
                    if node.source_id != 0 {
                        if let Some(bound) = bindings.get_mut(&node.source_id) {
                            if *bound == Some(node.ptr) {
                                *bound = None;
                            }
                        }
                    }
                }
                Op::PatchPitch { pos, pitch } => {
                    if model.is_empty() {
                        continue;
                    }
                    let pos = pos % model.len();
                    arena.patch_pitch(model[pos].ptr, pitch).unwrap();
                    model[pos].pitch = pitch;
                }
                Op::Clear => {
                    worker.clear().unwrap();
                    model.clear();
                    bindings.clear();
                }
            }
        }

        // Order and content match the model.
        let chain = collect_chain(&arena);
        prop_assert_eq!(chain.len(), model.len());
        for (snap, expected) in chain.iter().zip(&model) {
            prop_assert_eq!(snap.ptr, expected.ptr);
            prop_assert_eq!(snap.base_tick, expected.tick);
            prop_assert_eq!(snap.pitch, expected.pitch);
        }

        // Invariant 1: doubly linked, head has no predecessor.
        for (i, snap) in chain.iter().enumerate() {
            let expected_prev = if i == 0 { 0 } else { chain[i - 1].ptr };
            let expected_next = if i + 1 == chain.len() { 0 } else { chain[i + 1].ptr };
            prop_assert_eq!(snap.prev_ptr, expected_prev);
            prop_assert_eq!(snap.next_ptr, expected_next);
        }

        // Invariants 2-3: every slot is linked or free, and the counters
        // agree (worker traces never touch Zone B).
        prop_assert_eq!(arena.node_count(), model.len() as u32);
        prop_assert_eq!(arena.free_count(), ZONE_A - model.len() as u32);
        prop_assert_eq!(arena.zone_b_in_use(), 0);

        // Property 9: identity lookups resolve to the latest live binding.
        for (source_id, bound) in &bindings {
            prop_assert_eq!(arena.id_lookup(*source_id), *bound);
        }
    }

    /// Property 4: N alloc/free cycles on one slot advance its sequence
    /// by at least N.
    #[test]
    fn sequence_outpaces_reuse(cycles in 1u32..64) {
        let arena = open_arena();

        let probe = arena.alloc_node().unwrap();
        let start = arena.read_node(probe, RetryBudget::Editor).unwrap().sequence;
        arena.free_node(probe);

        for _ in 0..cycles {
            let ptr = arena.alloc_node().unwrap();
            prop_assert_eq!(ptr, probe);
            arena.free_node(ptr);
        }

        let ptr = arena.alloc_node().unwrap();
        let end = arena.read_node(ptr, RetryBudget::Editor).unwrap().sequence;
        prop_assert!(end.wrapping_sub(start) >= cycles);
    }

    /// Property 8: an insert succeeds exactly when its anchor's tick is
    /// outside `[playhead, playhead + safe_zone)`. The anchor is the node
    /// whose links the splice rewrites; the new node's own tick plays no
    /// part in the check.
    #[test]
    fn safe_zone_is_exact(anchor_tick in 0u32..60_000, playhead in 0u32..50_000) {
        let arena = Arc::new(ScoreArena::new(ArenaConfig::with_capacity(16)).unwrap());
        let mut worker = Worker::claim(Arc::clone(&arena)).unwrap();

        // Seeding an empty chain anchors nothing, so this always lands.
        let anchor = worker
            .insert_head(&NodeInit::note(60, 100, anchor_tick, 240), None)
            .unwrap();
        arena.set_playhead(playhead);

        let in_window = anchor_tick >= playhead && anchor_tick - playhead < 960;

        // Both insert shapes anchor on the same node here: `after` for the
        // mid-chain splice, the current head for the head splice.
        let mid = worker.insert_after(anchor, &NodeInit::note(64, 100, 100_000, 240), None);
        let head = worker.insert_head(&NodeInit::note(65, 100, 100_000, 240), None);
        if in_window {
            let mid_is_violation = matches!(mid, Err(Error::SafeZoneViolation { .. }));
            let head_is_violation = matches!(head, Err(Error::SafeZoneViolation { .. }));
            prop_assert!(mid_is_violation);
            prop_assert!(head_is_violation);
            prop_assert_eq!(arena.node_count(), 1);
        } else {
            prop_assert!(mid.is_ok());
            prop_assert!(head.is_ok());
        }
    }

    /// Property 5: insert-then-delete round-trips to the identical chain,
    /// node identities and field values included.
    #[test]
    fn insert_delete_round_trip(
        seed_ticks in prop::collection::vec(1000u32..100_000, 1..8),
        pos in 0usize..8,
        tick in 1000u32..100_000,
    ) {
        let arena = open_arena();
        let mut worker = Worker::claim(Arc::clone(&arena)).unwrap();

        for t in &seed_ticks {
            worker.insert_head(&NodeInit::note(60, 100, *t, 240), None).unwrap();
        }
        let before = collect_chain(&arena);

        let after_ptr = before[pos % before.len()].ptr;
        let fresh = worker
            .insert_after(after_ptr, &NodeInit::note(72, 90, tick, 120), None)
            .unwrap();
        worker.delete(fresh).unwrap();

        let after = collect_chain(&arena);
        prop_assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(&after) {
            prop_assert_eq!(b.ptr, a.ptr);
            prop_assert_eq!(b.base_tick, a.base_tick);
            prop_assert_eq!(b.pitch, a.pitch);
            prop_assert_eq!(b.next_ptr, a.next_ptr);
            prop_assert_eq!(b.prev_ptr, a.prev_ptr);
        }
    }
}
