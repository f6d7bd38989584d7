//! Clock synchronizer (spec.md §4.B, component B): the only component
//! allowed to convert between the local and peer microsecond clock
//! domains.

pub mod latency;
pub mod ring;
pub mod wire;

use crate::config::sync::{
    DRIFT_CLAMP_US_PER_MS, EMA_WEIGHT, MAX_PENDING_PINGS, OFFSET_OUTLIER_DEVIATION_US,
    RTT_QUALITY_THRESHOLD_US, SYNC_MAX_AGE_US,
};
use crate::error::SyncCounters;
use crate::time::{DriftRate, LocalTimestamp, Offset, PeerTimestamp};
use heapless::Vec;
use latency::LatencyEstimator;
use ring::{OffsetRing, OffsetSample};
use wire::{Ping, Pong, WireSeq};

/// Result of crossing the clock domain boundary. `valid` is `false` (and
/// the conversion is the zero-offset identity) when the synchronizer
/// hasn't yet accumulated [`crate::config::sync::MIN_VALID_SAMPLES`]
/// samples (spec.md §4.B.6).
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Conversion<T> {
    pub timestamp: T,
    pub valid: bool,
}

struct PendingPing {
    seq: WireSeq,
    t1: u64,
}

/// Maintains a filtered offset + drift-rate estimate between this device's
/// clock and the peer's, and converts timestamps between the two domains.
pub struct Synchronizer {
    ring: OffsetRing,
    latency: LatencyEstimator,
    drift: DriftRate,
    /// (local time, median offset) of the last sample admitted to the ring;
    /// anchor for the drift-corrected offset projection.
    last_sample: Option<(u64, i64)>,
    next_seq: WireSeq,
    pending: Vec<PendingPing, MAX_PENDING_PINGS>,
    pub counters: SyncCounters,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer {
    pub fn new() -> Self {
        Self {
            ring: OffsetRing::new(),
            latency: LatencyEstimator::new(),
            drift: DriftRate::ZERO,
            last_sample: None,
            next_seq: 0,
            pending: Vec::new(),
            counters: SyncCounters::new(),
        }
    }

    /// Whether enough samples have been accepted to trust conversions, and
    /// at least one of them is recent enough to trust at `now`.
    ///
    /// A transport outage stops new exchanges from completing, but doesn't
    /// shrink the ring: without this age check, a synchronizer that lost
    /// its peer minutes ago would keep reporting `valid` forever on a
    /// stale offset (spec.md §4.B.6).
    pub fn is_valid(&self, now: LocalTimestamp) -> bool {
        self.ring.is_valid() && self.is_fresh(now)
    }

    fn is_fresh(&self, now: LocalTimestamp) -> bool {
        match self.last_sample {
            Some((last_now, _)) => now.0.saturating_sub(last_now) <= SYNC_MAX_AGE_US,
            None => false,
        }
    }

    pub fn drift_rate(&self) -> DriftRate {
        self.drift
    }

    /// Begin a four-timestamp exchange: records `t1` and returns the PING
    /// to send to the peer.
    pub fn initiate_ping(&mut self, now: LocalTimestamp) -> Ping {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        if self.pending.is_full() {
            self.pending.remove(0); // evict oldest in-flight ping
        }
        let _ = self.pending.push(PendingPing { seq, t1: now.0 });

        Ping { seq, t1: now.0 }
    }

    /// Respond to an inbound PING. Pure: the receiving side of an exchange
    /// carries no state of its own (spec.md §4.B.1 — either device may
    /// initiate).
    pub fn on_ping_received(&self, ping: Ping, t2: LocalTimestamp, t3: LocalTimestamp) -> Pong {
        Pong { seq: ping.seq, t2: t2.0, t3: t3.0 }
    }

    /// Complete an exchange this device initiated. Returns `Err` (and
    /// leaves the ring untouched) if the PONG's sequence id has no
    /// matching in-flight PING.
    pub fn on_pong_received(&mut self, pong: Pong, t4: LocalTimestamp) -> Result<(), ()> {
        let Some(idx) = self.pending.iter().position(|p| p.seq == pong.seq) else {
            self.counters.unknown_pong_sequence = self.counters.unknown_pong_sequence.saturating_add(1);
            return Err(());
        };
        let t1 = self.pending.remove(idx).t1;

        let (t2, t3, t4) = (pong.t2 as i64, pong.t3 as i64, t4.0 as i64);
        let t1 = t1 as i64;

        let offset_us = ((t2 - t1) + (t3 - t4)) / 2;
        let rtt_us = ((t4 - t1) - (t3 - t2)).max(0) as u64;

        self.admit_sample(OffsetSample { offset_us, rtt_us }, LocalTimestamp(t4 as u64));
        Ok(())
    }

    fn admit_sample(&mut self, sample: OffsetSample, now: LocalTimestamp) {
        if sample.rtt_us > RTT_QUALITY_THRESHOLD_US {
            self.counters.poor_rtt_samples = self.counters.poor_rtt_samples.saturating_add(1);
            return;
        }

        if self.ring.is_valid() {
            let median = self.ring.median_offset();
            if (sample.offset_us - median).unsigned_abs() > OFFSET_OUTLIER_DEVIATION_US as u64 {
                self.counters.offset_outliers = self.counters.offset_outliers.saturating_add(1);
                return;
            }
        }

        let was_valid_before = self.ring.is_valid();
        self.ring.push(sample);

        if was_valid_before {
            if let Some((prev_now, prev_offset)) = self.last_sample {
                let elapsed_ms = now.0.saturating_sub(prev_now) as f32 / 1000.0;
                if elapsed_ms > 0.0 {
                    let instantaneous_rate = (sample.offset_us - prev_offset) as f32 / elapsed_ms;
                    let smoothed =
                        EMA_WEIGHT * instantaneous_rate + (1.0 - EMA_WEIGHT) * self.drift.0;
                    self.drift = DriftRate(smoothed.clamp(-DRIFT_CLAMP_US_PER_MS, DRIFT_CLAMP_US_PER_MS));
                }
            }
        }
        self.last_sample = Some((now.0, sample.offset_us));

        if self.latency.update(EMA_WEIGHT, sample.rtt_us) {
            self.counters.latency_outliers = self.counters.latency_outliers.saturating_add(1);
        }
    }

    /// Median offset plus drift-rate projection to `now` (spec.md §4.B.3).
    fn corrected_offset(&self, now: LocalTimestamp) -> Offset {
        let median = self.ring.median_offset();
        let projected = match self.last_sample {
            Some((last_now, _)) => {
                let elapsed_ms = now.0.saturating_sub(last_now) as f32 / 1000.0;
                median as f32 + self.drift.0 * elapsed_ms
            }
            None => median as f32,
        };
        Offset(projected as i64)
    }

    /// Convert a peer-domain timestamp into this device's local domain.
    /// Returns an invalid, zero-offset conversion if sync isn't established yet.
    pub fn peer_to_local(&self, peer_ts: PeerTimestamp, now: LocalTimestamp) -> Conversion<LocalTimestamp> {
        if !self.is_valid(now) {
            return Conversion { timestamp: LocalTimestamp(peer_ts.0), valid: false };
        }
        let offset = self.corrected_offset(now);
        Conversion { timestamp: LocalTimestamp(peer_ts.0.saturating_sub_signed(offset.0)), valid: true }
    }

    /// Convert a local-domain timestamp into the peer's domain.
    pub fn local_to_peer(&self, local_ts: LocalTimestamp, now: LocalTimestamp) -> Conversion<PeerTimestamp> {
        if !self.is_valid(now) {
            return Conversion { timestamp: PeerTimestamp(local_ts.0), valid: false };
        }
        let offset = self.corrected_offset(now);
        Conversion { timestamp: PeerTimestamp(local_ts.0.saturating_add_signed(offset.0)), valid: true }
    }

    /// The adaptive lead time the planner should add before scheduling
    /// the next macrocycle (spec.md §4.B.5).
    pub fn adaptive_lead_us(&self) -> u32 {
        latency::adaptive_lead_us(self.latency.measured_latency_us(), self.ring.rtt_variance())
    }

    /// The median-plus-drift corrected offset at `now`, in microseconds,
    /// for the planner to stamp onto an outbound macrocycle so the peer
    /// can cross-check it (spec.md §4.C.3).
    pub fn corrected_offset_us(&self, now: LocalTimestamp) -> i64 {
        self.corrected_offset(now).0
    }
}

trait SaturatingSigned {
    fn saturating_add_signed(self, delta: i64) -> Self;
    fn saturating_sub_signed(self, delta: i64) -> Self;
}

impl SaturatingSigned for u64 {
    fn saturating_add_signed(self, delta: i64) -> Self {
        if delta >= 0 {
            self.saturating_add(delta as u64)
        } else {
            self.saturating_sub(delta.unsigned_abs())
        }
    }

    fn saturating_sub_signed(self, delta: i64) -> Self {
        self.saturating_add_signed(-delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_symmetric_exchange_yields_zero_offset() {
        let mut sync = Synchronizer::new();
        let ping = sync.initiate_ping(LocalTimestamp(1_000_000));
        let pong = sync.on_ping_received(ping, LocalTimestamp(1_005_000), LocalTimestamp(1_010_000));
        sync.on_pong_received(pong, LocalTimestamp(1_015_000)).unwrap();

        assert_eq!(sync.ring.iter().next().unwrap().offset_us, 0);
        assert_eq!(sync.ring.iter().next().unwrap().rtt_us, 10_000);
    }

    #[test]
    fn unmatched_pong_is_discarded_without_affecting_ring() {
        let mut sync = Synchronizer::new();
        let stray = Pong { seq: 999, t2: 1, t3: 2 };
        assert!(sync.on_pong_received(stray, LocalTimestamp(3)).is_err());
        assert_eq!(sync.ring.len(), 0);
        assert_eq!(sync.counters.unknown_pong_sequence, 1);
    }

    #[test]
    fn becomes_valid_after_five_exchanges() {
        let mut sync = Synchronizer::new();
        let mut t = 0u64;
        for _ in 0..5 {
            let ping = sync.initiate_ping(LocalTimestamp(t));
            let pong = sync.on_ping_received(ping, LocalTimestamp(t + 5_000), LocalTimestamp(t + 5_000));
            sync.on_pong_received(pong, LocalTimestamp(t + 10_000)).unwrap();
            t += 100_000;
        }
        assert!(sync.is_valid(LocalTimestamp(t)));
    }

    #[test]
    fn poor_rtt_sample_is_rejected() {
        let mut sync = Synchronizer::new();
        let ping = sync.initiate_ping(LocalTimestamp(0));
        // RTT will be 200ms, above the 120ms quality threshold
        let pong = sync.on_ping_received(ping, LocalTimestamp(100_000), LocalTimestamp(100_000));
        sync.on_pong_received(pong, LocalTimestamp(200_000)).unwrap();
        assert_eq!(sync.ring.len(), 0);
        assert_eq!(sync.counters.poor_rtt_samples, 1);
    }

    #[test]
    fn rtt_exactly_at_threshold_is_accepted() {
        let mut sync = Synchronizer::new();
        let ping = sync.initiate_ping(LocalTimestamp(0));
        // t2=t3=60_000 -> rtt = (120_000 - 0) - 0 = 120_000, exactly the threshold
        let pong = sync.on_ping_received(ping, LocalTimestamp(60_000), LocalTimestamp(60_000));
        sync.on_pong_received(pong, LocalTimestamp(120_000)).unwrap();
        assert_eq!(sync.ring.len(), 1);
    }

    #[test]
    fn not_valid_conversion_is_tagged_invalid_and_zero_offset() {
        let sync = Synchronizer::new();
        let now = LocalTimestamp(1_000_000);
        let conv = sync.peer_to_local(PeerTimestamp(1_000_000), now);
        assert!(!conv.valid);
        assert_eq!(conv.timestamp.0, 1_000_000);
    }

    #[test]
    fn peer_to_local_round_trips_with_constant_offset() {
        let mut sync = Synchronizer::new();
        // drive five identical-offset exchanges so the median is a known constant
        for i in 0..5u64 {
            let t = i * 100_000;
            let ping = sync.initiate_ping(LocalTimestamp(t));
            let pong = sync.on_ping_received(ping, LocalTimestamp(t + 5_300), LocalTimestamp(t + 5_300));
            sync.on_pong_received(pong, LocalTimestamp(t + 10_000)).unwrap();
        }
        let now = LocalTimestamp(1_000_000);
        assert!(sync.is_valid(now));
        let local = LocalTimestamp(2_000_000);
        let peer = sync.local_to_peer(local, now);
        assert!(peer.valid);
        let back = sync.peer_to_local(peer.timestamp, now);
        assert!(back.valid);
        assert_eq!(back.timestamp, local);
    }

    #[test]
    fn downgrades_to_not_valid_after_max_age_with_no_fresh_samples() {
        let mut sync = Synchronizer::new();
        let mut t = 0u64;
        for _ in 0..5 {
            let ping = sync.initiate_ping(LocalTimestamp(t));
            let pong = sync.on_ping_received(ping, LocalTimestamp(t + 5_000), LocalTimestamp(t + 5_000));
            sync.on_pong_received(pong, LocalTimestamp(t + 10_000)).unwrap();
            t += 100_000;
        }
        let last_sample_at = LocalTimestamp(t);
        assert!(sync.is_valid(last_sample_at));

        let stale_now = last_sample_at.offset_by(crate::config::sync::SYNC_MAX_AGE_US as i64 + 1);
        assert!(!sync.is_valid(stale_now), "a synchronizer with no fresh samples must downgrade to not-valid");

        let conv = sync.peer_to_local(PeerTimestamp(stale_now.0), stale_now);
        assert!(!conv.valid, "conversions during the stale window must be tagged invalid");
    }
}
