//! Error types for arena operations.

/// Errors surfaced by arena operations.
///
/// Recoverable kinds (`HeapExhausted`, `SafeZoneViolation`,
/// `CommandQueueOverflow`) are also mirrored into the arena's error-flag
/// word so an external observer can diagnose a session after the fact.
/// `KernelPanic` means a lock holder is presumed dead and the arena must
/// be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The Zone-A free stack is empty, or the Zone-B bump cursor hit the
    /// end of the heap.
    #[error("node heap exhausted")]
    HeapExhausted,

    /// A structural edit targeted a tick inside the exclusion window
    /// ahead of the playhead.
    #[error("edit at tick {tick} inside safe zone (playhead {playhead}, window {window})")]
    SafeZoneViolation {
        /// Tick of the rejected edit.
        tick: u32,
        /// Playhead position at the time of the check.
        playhead: u32,
        /// Width of the exclusion window in ticks.
        window: u32,
    },

    /// A pointer was null, misaligned, or outside the node heap.
    #[error("invalid node pointer {ptr:#010x}")]
    InvalidPointer {
        /// The offending byte offset.
        ptr: u32,
    },

    /// The producer attempted to enqueue onto a full command ring.
    #[error("command ring full ({capacity} slots)")]
    CommandQueueOverflow {
        /// Ring capacity in slots.
        capacity: u32,
    },

    /// A lock or handshake spun past the dead-man's switch. The arena is
    /// presumed corrupt; the only recovery is recreating it.
    #[error("lock holder presumed dead after {spins} spins; arena unrecoverable")]
    KernelPanic {
        /// Total spins before giving up.
        spins: u32,
    },

    /// A versioned read exceeded its retry budget. On the audio thread
    /// this is non-fatal: the caller skips the node for the quantum.
    #[error("versioned read exceeded its retry budget")]
    Contention,

    /// A source id was 0 or the tombstone sentinel, which the identity
    /// table cannot store.
    #[error("source id {id:#010x} is reserved")]
    ReservedSourceId {
        /// The rejected id.
        id: u32,
    },

    /// A second handle tried to claim a single-occupancy role.
    #[error("{role} role already claimed for this arena")]
    RoleClaimed {
        /// Role name, for diagnostics.
        role: &'static str,
    },

    /// Arena sizing parameters were rejected.
    #[error("invalid arena config: {0}")]
    InvalidConfig(&'static str),
}
