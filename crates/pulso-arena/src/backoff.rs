//! Zero-allocation waiting for non-audio threads.

/// Give up the CPU for about a millisecond without allocating.
///
/// `park_timeout` is futex-backed on Linux and takes no heap; the
/// `YIELD_SLOT` header word stays reserved as an in-arena wait target for
/// ports where parking is unavailable. A stray unpark token can end the
/// wait early, which is harmless here: every caller sits in a retry
/// loop. Never called on the audio thread.
#[cfg(feature = "std")]
pub(crate) fn yield_briefly() {
    std::thread::park_timeout(core::time::Duration::from_millis(1));
}

/// Without an OS scheduler there is nothing to yield to; back off with a
/// spin hint instead.
#[cfg(not(feature = "std"))]
pub(crate) fn yield_briefly() {
    core::hint::spin_loop();
}
