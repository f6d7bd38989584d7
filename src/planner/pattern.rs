//! Pattern generation for one macrocycle segment (spec.md §4.C.1).
//!
//! Three families are supported, each consuming the same parameter set:
//! a uniformly-random Fisher-Yates permutation (RNDP), the natural
//! (optionally reversed) finger order (Sequential), or a pattern that is
//! always mirrored across hands but whose per-hand order may be either
//! natural or random (Mirrored).

use crate::rng::RandomSource;
use heapless::Vec;

/// Hardware-specific upper bound on finger count (spec.md §6: "4-5").
pub const MAX_FINGERS: usize = 5;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PatternKind {
    RandomPermutation,
    Sequential { reversed: bool },
    Mirrored { randomized: bool },
}

#[derive(Clone, Copy, Debug)]
pub struct PatternParams {
    pub num_fingers: usize,
    pub burst_on_ms: u16,
    pub burst_off_ms: u16,
    /// Fractional jitter bound, e.g. `0.1` for +/-10%.
    pub jitter_fraction: f32,
    /// Whether the contralateral hand mirrors the primary hand's order.
    pub mirrored: bool,
}

impl PatternParams {
    /// Total span of one full pattern across all fingers: `n * (on + off)`.
    /// Also the basis for the planner's relax window (spec.md §4.C.4).
    pub fn inter_burst_ms(&self) -> u32 {
        self.num_fingers as u32 * (self.burst_on_ms as u32 + self.burst_off_ms as u32)
    }

    fn step_spacing_ms(&self) -> u32 {
        self.burst_on_ms as u32 + self.burst_off_ms as u32
    }
}

pub struct GeneratedPattern {
    /// Finger order for the hand the macrocycle was generated for.
    pub primary_fingers: Vec<u8, MAX_FINGERS>,
    /// Finger order for the contralateral hand.
    pub secondary_fingers: Vec<u8, MAX_FINGERS>,
    /// Cumulative, jittered offset (ms) of each step from the start of this pattern.
    pub step_times_ms: Vec<u16, MAX_FINGERS>,
}

/// Fisher-Yates shuffle of `0..n` in place.
fn shuffled_order<R: RandomSource>(n: usize, rng: &mut R) -> Vec<u8, MAX_FINGERS> {
    let mut order: Vec<u8, MAX_FINGERS> = (0..n as u8).collect();
    for i in (1..order.len()).rev() {
        let j = rng.next_below((i + 1) as u32) as usize;
        order.swap(i, j);
    }
    order
}

fn natural_order(n: usize, reversed: bool) -> Vec<u8, MAX_FINGERS> {
    let mut order: Vec<u8, MAX_FINGERS> = (0..n as u8).collect();
    if reversed {
        order.reverse();
    }
    order
}

/// Jittered, cumulative step times for `n` steps spaced `step_spacing_ms` apart.
fn jittered_step_times<R: RandomSource>(
    n: usize,
    step_spacing_ms: u32,
    jitter_fraction: f32,
    rng: &mut R,
) -> Vec<u16, MAX_FINGERS> {
    let mut times: Vec<u16, MAX_FINGERS> = Vec::new();
    let mut cumulative: u32 = 0;
    for i in 0..n {
        if i > 0 {
            let jitter = rng.next_signed_unit() * jitter_fraction;
            let jittered = (step_spacing_ms as f32 * (1.0 + jitter)).max(0.0);
            cumulative += jittered as u32;
        }
        let _ = times.push(cumulative.min(u16::MAX as u32) as u16);
    }
    times
}

pub fn generate<R: RandomSource>(
    kind: PatternKind,
    params: &PatternParams,
    rng: &mut R,
) -> GeneratedPattern {
    let n = params.num_fingers.min(MAX_FINGERS);

    let (primary_fingers, secondary_fingers) = match kind {
        PatternKind::RandomPermutation => {
            let primary = shuffled_order(n, rng);
            let secondary = if params.mirrored {
                primary.clone()
            } else {
                shuffled_order(n, rng)
            };
            (primary, secondary)
        }
        PatternKind::Sequential { reversed } => {
            let primary = natural_order(n, reversed);
            let secondary = if params.mirrored {
                primary.clone()
            } else {
                natural_order(n, !reversed)
            };
            (primary, secondary)
        }
        PatternKind::Mirrored { randomized } => {
            let primary = if randomized {
                shuffled_order(n, rng)
            } else {
                natural_order(n, false)
            };
            (primary.clone(), primary)
        }
    };

    let step_times_ms = jittered_step_times(n, params.step_spacing_ms(), params.jitter_fraction, rng);

    GeneratedPattern { primary_fingers, secondary_fingers, step_times_ms }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SplitMix64;

    #[test]
    fn random_permutation_covers_all_fingers_exactly_once() {
        let mut rng = SplitMix64::new(1);
        let params = PatternParams {
            num_fingers: 4,
            burst_on_ms: 50,
            burst_off_ms: 50,
            jitter_fraction: 0.0,
            mirrored: true,
        };
        let pattern = generate(PatternKind::RandomPermutation, &params, &mut rng);
        let mut seen = pattern.primary_fingers.clone();
        seen.sort_unstable();
        assert_eq!(seen.as_slice(), &[0, 1, 2, 3]);
    }

    #[test]
    fn mirrored_true_gives_identical_contralateral_order() {
        let mut rng = SplitMix64::new(2);
        let params = PatternParams {
            num_fingers: 4,
            burst_on_ms: 50,
            burst_off_ms: 50,
            jitter_fraction: 0.0,
            mirrored: true,
        };
        let pattern = generate(PatternKind::RandomPermutation, &params, &mut rng);
        assert_eq!(pattern.primary_fingers, pattern.secondary_fingers);
    }

    #[test]
    fn sequential_is_natural_order_unless_reversed() {
        let mut rng = SplitMix64::new(3);
        let params = PatternParams {
            num_fingers: 4,
            burst_on_ms: 50,
            burst_off_ms: 50,
            jitter_fraction: 0.0,
            mirrored: false,
        };
        let pattern = generate(PatternKind::Sequential { reversed: false }, &params, &mut rng);
        assert_eq!(pattern.primary_fingers.as_slice(), &[0, 1, 2, 3]);
        assert_eq!(pattern.secondary_fingers.as_slice(), &[3, 2, 1, 0]);
    }

    #[test]
    fn step_times_are_non_decreasing_and_start_at_zero() {
        let mut rng = SplitMix64::new(4);
        let params = PatternParams {
            num_fingers: 5,
            burst_on_ms: 30,
            burst_off_ms: 20,
            jitter_fraction: 0.2,
            mirrored: true,
        };
        let pattern = generate(PatternKind::RandomPermutation, &params, &mut rng);
        assert_eq!(pattern.step_times_ms[0], 0);
        for pair in pattern.step_times_ms.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn inter_burst_ms_is_n_times_on_plus_off() {
        let params = PatternParams {
            num_fingers: 4,
            burst_on_ms: 50,
            burst_off_ms: 30,
            jitter_fraction: 0.0,
            mirrored: true,
        };
        assert_eq!(params.inter_burst_ms(), 4 * (50 + 30));
    }
}
