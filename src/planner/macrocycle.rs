//! Macrocycle data model and composition (spec.md §3 "Macrocycle", §4.C.2).

use crate::config::planner::{FREQ_BASE_HZ, FREQ_STEP_HZ, MAX_EVENTS_PER_MACROCYCLE};
use crate::rng::RandomSource;
use heapless::Vec;

/// One timed haptic event within a macrocycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Event {
    /// Offset from `base_time`, non-decreasing across a macrocycle's events.
    pub delta_time_ms: u16,
    pub finger: u8,
    /// 0..=100.
    pub amplitude: u8,
    /// Small signed offset from [`FREQ_BASE_HZ`], in units of [`FREQ_STEP_HZ`].
    pub freq_offset: i8,
}

impl Event {
    pub fn frequency_hz(&self) -> u16 {
        (i32::from(FREQ_BASE_HZ) + i32::from(self.freq_offset) * i32::from(FREQ_STEP_HZ))
            .clamp(1, u16::MAX as i32) as u16
    }
}

/// A contiguous batch of timed haptic events for one therapy interval.
#[derive(Clone, PartialEq, Debug)]
pub struct Macrocycle {
    pub sequence_id: u32,
    pub base_time_us: u64,
    pub duration_ms: u16,
    pub events: Vec<Event, MAX_EVENTS_PER_MACROCYCLE>,
}

impl Macrocycle {
    /// `delta_time_ms` is non-decreasing across `events` (spec.md §3, §8).
    pub fn has_monotonic_deltas(&self) -> bool {
        self.events.windows(2).all(|pair| pair[1].delta_time_ms >= pair[0].delta_time_ms)
    }
}

/// Parameters controlling amplitude/frequency randomization for event composition.
#[derive(Clone, Copy, Debug)]
pub struct ProfileRange {
    pub amp_min: u8,
    pub amp_max: u8,
    pub freq_randomized: bool,
    pub freq_min_offset: i8,
    pub freq_max_offset: i8,
    pub fixed_freq_offset: i8,
}

fn draw_amplitude<R: RandomSource>(range: &ProfileRange, rng: &mut R) -> u8 {
    if range.amp_min >= range.amp_max {
        return range.amp_min;
    }
    let span = u32::from(range.amp_max - range.amp_min) + 1;
    range.amp_min + rng.next_below(span) as u8
}

fn draw_freq_offset<R: RandomSource>(range: &ProfileRange, rng: &mut R) -> i8 {
    if !range.freq_randomized || range.freq_min_offset >= range.freq_max_offset {
        return range.fixed_freq_offset;
    }
    let span = u32::from((range.freq_max_offset - range.freq_min_offset) as u8) + 1;
    range.freq_min_offset + rng.next_below(span) as i8
}

/// Concatenate generated patterns into one macrocycle batch, assigning
/// amplitude/frequency per event and a shared `burst_duration_ms`
/// (spec.md §4.C.2). `sequence_id` is the PRIMARY's next monotonic id.
///
/// Each pattern contributes both a `local_fingers` order (this device's own
/// hand, used to schedule activations locally) and a `peer_fingers` order
/// (the contralateral hand's paired permutation, spec.md §4.C.2: "the
/// primary sequence's next finger; contralateral is computed from the
/// paired secondary sequence only when the SECONDARY consumes the
/// macrocycle"). The two coincide when a pattern is generated `mirrored`.
/// Returns the peer-facing [`Macrocycle`] (what goes out over the wire, and
/// what the SECONDARY will schedule on receipt unmodified) alongside the
/// local finger order for each event, in the same order as `events`, for
/// the PRIMARY to schedule against directly without round-tripping through
/// the wire format.
pub fn compose<R: RandomSource>(
    sequence_id: u32,
    base_time_us: u64,
    duration_ms: u16,
    patterns: &[(&[u8], &[u8], &[u16])],
    range: &ProfileRange,
    rng: &mut R,
) -> (Macrocycle, Vec<u8, MAX_EVENTS_PER_MACROCYCLE>) {
    let mut events: Vec<Event, MAX_EVENTS_PER_MACROCYCLE> = Vec::new();
    let mut local_fingers: Vec<u8, MAX_EVENTS_PER_MACROCYCLE> = Vec::new();
    let mut base_offset_ms: u32 = 0;

    for (local_order, peer_order, step_times_ms) in patterns {
        let steps = local_order.iter().zip(peer_order.iter()).zip(step_times_ms.iter());
        for ((&local_finger, &peer_finger), &step_time) in steps {
            if events.is_full() {
                break;
            }
            let delta = (base_offset_ms + u32::from(step_time)).min(u16::MAX as u32) as u16;
            let _ = events.push(Event {
                delta_time_ms: delta,
                finger: peer_finger,
                amplitude: draw_amplitude(range, rng),
                freq_offset: draw_freq_offset(range, rng),
            });
            let _ = local_fingers.push(local_finger);
        }
        base_offset_ms += step_times_ms.last().copied().unwrap_or(0) as u32;
    }

    (Macrocycle { sequence_id, base_time_us, duration_ms, events }, local_fingers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SplitMix64;

    fn fixed_range() -> ProfileRange {
        ProfileRange {
            amp_min: 80,
            amp_max: 80,
            freq_randomized: false,
            freq_min_offset: 0,
            freq_max_offset: 0,
            fixed_freq_offset: 0,
        }
    }

    #[test]
    fn composed_macrocycle_has_monotonic_deltas() {
        let mut rng = SplitMix64::new(9);
        let fingers_a = [0u8, 1, 2, 3];
        let peer_a = [3u8, 2, 1, 0];
        let times_a = [0u16, 50, 100, 150];
        let fingers_b = [2u8, 0, 3, 1];
        let peer_b = [1u8, 3, 0, 2];
        let times_b = [0u16, 40, 90, 140];
        let patterns: [(&[u8], &[u8], &[u16]); 2] =
            [(&fingers_a, &peer_a, &times_a), (&fingers_b, &peer_b, &times_b)];
        let (mc, local_fingers) = compose(1, 0, 100, &patterns, &fixed_range(), &mut rng);
        assert!(mc.has_monotonic_deltas());
        assert_eq!(mc.events.len(), 8);
        assert_eq!(local_fingers.len(), 8);
    }

    #[test]
    fn wire_events_carry_the_peer_finger_order_not_the_local_one() {
        let mut rng = SplitMix64::new(10);
        let local = [0u8, 1, 2, 3];
        let peer = [3u8, 2, 1, 0]; // independent (non-mirrored) permutation
        let times = [0u16, 50, 100, 150];
        let patterns: [(&[u8], &[u8], &[u16]); 1] = [(&local, &peer, &times)];
        let (mc, local_fingers) = compose(1, 0, 100, &patterns, &fixed_range(), &mut rng);

        let wire_fingers: heapless::Vec<u8, 4> = mc.events.iter().map(|e| e.finger).collect();
        assert_eq!(wire_fingers.as_slice(), &peer);
        assert_eq!(local_fingers.as_slice(), &local);
    }

    #[test]
    fn fixed_amplitude_range_always_returns_that_value() {
        let mut rng = SplitMix64::new(5);
        let range = fixed_range();
        for _ in 0..20 {
            assert_eq!(draw_amplitude(&range, &mut rng), 80);
        }
    }

    #[test]
    fn frequency_hz_applies_base_and_step() {
        let event = Event { delta_time_ms: 0, finger: 0, amplitude: 50, freq_offset: 2 };
        assert_eq!(event.frequency_hz(), FREQ_BASE_HZ + 2 * FREQ_STEP_HZ as u16);
    }

    #[test]
    fn event_delta_zero_on_first_event_is_permitted() {
        let mut rng = SplitMix64::new(11);
        let fingers = [0u8];
        let times = [0u16];
        let patterns: [(&[u8], &[u8], &[u16]); 1] = [(&fingers, &fingers, &times)];
        let (mc, _) = compose(1, 1_000_000, 100, &patterns, &fixed_range(), &mut rng);
        assert_eq!(mc.events[0].delta_time_ms, 0);
    }
}
