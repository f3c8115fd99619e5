//! The chain mutex: one header word guarding chain topology.
//!
//! The lock protects `HEAD_PTR` and the `NEXT_PTR`/`PREV_PTR` pairs and
//! nothing else. Attribute words stay lockless under the seqlock, and the
//! audio thread never takes this lock at all; it re-anchors through the
//! commit handshake instead.
//!
//! Acquisition spins on a CAS from 0 to 1, yielding after every 100
//! failed attempts. A dead-man's switch trips after one million total
//! spins: the holder is presumed crashed, `KERNEL_PANIC` is recorded, and
//! the arena must be discarded. Release is a plain store of 0, performed
//! by an RAII guard so every exit path unlocks.

use core::hint;
use core::sync::atomic::Ordering;

use crate::arena::{ErrorFlag, ScoreArena};
use crate::backoff;
use crate::error::Error;
use crate::layout::header;

/// Failed acquisition attempts between scheduler yields.
const SPINS_PER_YIELD: u32 = 100;

/// Total attempts before the holder is presumed dead.
pub(crate) const PANIC_THRESHOLD: u32 = 1_000_000;

/// RAII guard for the chain mutex. Dropping it releases the lock.
#[must_use = "dropping the guard releases the chain mutex"]
pub struct ChainGuard<'a> {
    arena: &'a ScoreArena,
}

impl Drop for ChainGuard<'_> {
    fn drop(&mut self) {
        self.arena
            .word(header::CHAIN_MUTEX)
            .store(0, Ordering::Release);
    }
}

impl ScoreArena {
    /// Acquire the chain mutex.
    ///
    /// Fails with [`Error::KernelPanic`] after the dead-man's switch
    /// trips; the error flag is set and the arena is unrecoverable.
    pub fn lock_chain(&self) -> Result<ChainGuard<'_>, Error> {
        let slot = self.word(header::CHAIN_MUTEX);
        let mut spins = 0u32;
        loop {
            if slot
                .compare_exchange_weak(0, 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(ChainGuard { arena: self });
            }

            spins += 1;
            if spins >= PANIC_THRESHOLD {
                self.raise_error(ErrorFlag::KernelPanic);
                return Err(Error::KernelPanic { spins });
            }
            if spins % SPINS_PER_YIELD == 0 {
                backoff::yield_briefly();
            } else {
                hint::spin_loop();
            }
        }
    }
}
