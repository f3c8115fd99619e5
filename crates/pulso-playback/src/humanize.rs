//! Deterministic humanize: PRNG-driven timing and velocity jitter.
//!
//! The point of humanize in a *live* system is that it must not drift
//! between rebuilds: the same node at the same tick with the same seed
//! always lands in the same place. So the PRNG is seeded per node from
//! `base_tick * 2654435761 xor seed`, not from any global stream.

/// Xorshift32. Small, fast, and good enough for musical jitter.
#[derive(Clone, Copy, Debug)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    /// Seed the generator. A zero seed (which xorshift cannot accept) is
    /// replaced with a fixed non-zero constant.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    /// Next 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

/// Centered jitter in `[-amplitude, +amplitude]`.
fn centered(raw: u32, amplitude: u32) -> i32 {
    if amplitude == 0 {
        return 0;
    }
    (raw % (2 * amplitude + 1)) as i32 - amplitude as i32
}

/// Timing and velocity offsets for one node.
///
/// `timing_ppt` scales against one quarter note (PPQ ticks) and
/// `velocity_ppt` against the node's own velocity, both in parts per
/// thousand. Deterministic: same inputs, same offsets.
pub fn offsets(
    base_tick: u32,
    seed: u32,
    timing_ppt: u32,
    velocity_ppt: u32,
    ppq: u32,
    velocity: u8,
) -> (i32, i32) {
    if timing_ppt == 0 && velocity_ppt == 0 {
        return (0, 0);
    }

    let mut rng = XorShift32::new(base_tick.wrapping_mul(2_654_435_761) ^ seed);
    let timing_amp = ppq * timing_ppt / 1000;
    let velocity_amp = u32::from(velocity) * velocity_ppt / 1000;

    let tick_offset = centered(rng.next_u32(), timing_amp);
    let velocity_offset = centered(rng.next_u32(), velocity_amp);
    (tick_offset, velocity_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_depth_means_no_jitter() {
        assert_eq!(offsets(1920, 12345, 0, 0, 480, 100), (0, 0));
    }

    #[test]
    fn offsets_are_deterministic_per_node() {
        let a = offsets(1920, 777, 50, 100, 480, 100);
        let b = offsets(1920, 777, 50, 100, 480, 100);
        assert_eq!(a, b);
    }

    #[test]
    fn different_ticks_usually_diverge() {
        let mut distinct = 0;
        let reference = offsets(0, 777, 100, 100, 480, 100);
        for tick in 1..50u32 {
            if offsets(tick, 777, 100, 100, 480, 100) != reference {
                distinct += 1;
            }
        }
        assert!(distinct > 40);
    }

    #[test]
    fn jitter_respects_amplitude() {
        // 50 ppt of a 480-tick quarter note: +/- 24 ticks.
        for tick in 0..200u32 {
            let (t, v) = offsets(tick * 13, 42, 50, 200, 480, 100);
            assert!(t.abs() <= 24, "timing offset {t} out of range");
            // 200 ppt of velocity 100: +/- 20.
            assert!(v.abs() <= 20, "velocity offset {v} out of range");
        }
    }

    #[test]
    fn seed_register_changes_the_field() {
        let diverged = (0..20u32)
            .map(|i| 1920 + i * 7)
            .filter(|&tick| {
                offsets(tick, 1, 100, 100, 480, 100) != offsets(tick, 2, 100, 100, 480, 100)
            })
            .count();
        assert!(diverged > 0, "two seeds produced identical jitter fields");
    }

    #[test]
    fn xorshift_never_sticks_at_zero() {
        let mut rng = XorShift32::new(0);
        for _ in 0..100 {
            assert_ne!(rng.next_u32(), 0);
        }
    }
}
