//! Pulso Arena - the shared score memory for live-coded music.
//!
//! This crate owns the hard part of a live-coding runtime: one flat,
//! lock-free arena holding a doubly-linked chain of musical events,
//! edited concurrently by an editor thread and a structural worker while
//! a hard-realtime audio thread walks it every rendering quantum without
//! ever allocating, blocking, or taking a lock.
//!
//! # Core Abstractions
//!
//! ## The Arena
//!
//! - [`ScoreArena`] - the contiguous region: header, registers, node
//!   heap, identity/symbol tables, groove templates, command ring
//! - [`ArenaConfig`] / [`Regions`] - sizing and computed byte layout
//!
//! ## Allocation
//!
//! - Zone A: a lock-free CAS free stack for worker-side allocation, with
//!   sequence-bump-on-free ABA protection
//! - Zone B: a single-writer bump cursor for the editor, reset only when
//!   quiesced
//!
//! ## Concurrency
//!
//! - [`NodeSnapshot`] + [`RetryBudget`] - versioned (seqlock) reads with
//!   role-specific retry budgets; the audio thread never yields
//! - [`NodePatch`] - batched attribute writes under one sequence bump
//! - [`ChainGuard`] - the spin/yield chain mutex with a dead-man's switch
//! - [`CommitFlag`] - the IDLE/PENDING/ACK cursor-invalidation handshake
//!
//! ## Roles
//!
//! - [`Editor`] - Zone-B preparation, attribute patches, ring producer
//! - [`Worker`] - ring consumer, chain surgery, identity tables
//! - the audio role is plain read methods plus
//!   [`ScoreArena::acknowledge_commit`] and [`ScoreArena::set_playhead`]
//!
//! # Example
//!
//! ```rust
//! use pulso_arena::{ArenaConfig, Editor, NodeInit, ScoreArena, Worker};
//! use std::sync::Arc;
//!
//! let arena = Arc::new(ScoreArena::new(ArenaConfig::with_capacity(4096)).unwrap());
//! let mut editor = Editor::claim(Arc::clone(&arena)).unwrap();
//! let mut worker = Worker::claim(Arc::clone(&arena)).unwrap();
//!
//! // Editor prepares a note and hands it over; worker splices it.
//! let node = editor.prepare(&NodeInit::note(60, 100, 1920, 240)).unwrap();
//! editor.enqueue_insert_head(node).unwrap();
//! worker.process_commands();
//! assert_eq!(arena.head_ptr(), node);
//! ```
//!
//! # no_std Support
//!
//! `no_std` compatible (with `alloc`) when the default `std` feature is
//! disabled; the zero-allocation yield degrades to a spin hint.
//!
//! # Design Principles
//!
//! - **Wait-free reads on the audio thread**: versioned reads with a
//!   hard retry cap, commit-flag re-anchoring instead of locks
//! - **All shared state is 32-bit atomics**: the arena is a slice of
//!   `AtomicU32`, no `unsafe` anywhere
//! - **Errors are loud and mirrored**: every failure returns an error
//!   *and* lands in the arena's error flag for external observers

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod arena;
mod backoff;
mod bump;
pub mod chain_lock;
pub mod error;
mod free_list;
pub mod handles;
pub mod identity;
pub mod layout;
mod linker;
pub mod node;
mod registers;
pub mod ring;
pub mod seqlock;

pub use arena::{ArenaStats, CommitFlag, ErrorFlag, ScoreArena};
pub use chain_lock::ChainGuard;
pub use error::Error;
pub use handles::{Editor, Worker};
pub use identity::SourceLoc;
pub use layout::{ArenaConfig, NODE_SIZE, NULL, Opcode, Regions, flags};
pub use node::{NodeInit, NodeSnapshot};
pub use ring::Command;
pub use seqlock::{NodePatch, RetryBudget};

/// Convenience alias for arena results.
pub type Result<T> = core::result::Result<T, Error>;
