//! Pulso Playback - the audio-side consumer of the score arena.
//!
//! Where `pulso-arena` owns the shared memory, this crate owns the
//! realtime walk over it: once per rendering quantum the
//! [`QuantumRenderer`] converts tempo into a tick span, services the
//! commit handshake, traverses the event chain with budgeted versioned
//! reads, applies the global transforms (groove, then humanize, then
//! transpose and velocity scaling), and hands timestamped events to an
//! [`EventSink`].
//!
//! # Components
//!
//! - [`TickClock`] - BPM/PPQ/sample-rate arithmetic with fractional
//!   tick carry between quanta
//! - [`QuantumRenderer`] + [`QuantumConfig`] - the per-quantum walk
//! - [`TimedEvent`] / [`EventKind`] / [`EventSink`] - zero-allocation
//!   event delivery
//! - [`humanize`] - deterministic per-node timing/velocity jitter
//!
//! # Realtime rules
//!
//! The render path never allocates, blocks, yields, or takes a lock.
//! Everything it needs is either on its own stack or a single atomic
//! word away in the arena.
//!
//! # no_std Support
//!
//! `no_std` compatible when the default `std` feature is disabled
//! (`libm` supplies the float floors).

#![cfg_attr(not(feature = "std"), no_std)]

pub mod clock;
pub mod error;
pub mod event;
pub mod humanize;
pub mod render;

pub use clock::TickClock;
pub use error::Error;
pub use event::{EventKind, EventSink, TimedEvent};
pub use render::{QuantumConfig, QuantumRenderer, RenderStats};
