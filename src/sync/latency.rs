//! One-way latency EMA and adaptive lead time (spec.md §4.B.5).

use crate::config::sync::{
    LATENCY_WARMUP_SAMPLES, LEAD_MAX_US, LEAD_MIN_US, LEAD_VARIANCE_WEIGHT, OUTLIER_MULT,
    PROCESSING_OVERHEAD_US,
};
use fixed::types::U32F0;
use fixed_sqrt::FixedSqrt;

/// Exponentially-smoothed one-way latency estimate, fed from `rtt / 2`.
///
/// Used only to compute the planner's transmission lead time, never for
/// clock offset (that's the ring's job).
pub struct LatencyEstimator {
    smoothed_us: f32,
    warm_samples: u32,
}

impl LatencyEstimator {
    pub const fn new() -> Self {
        Self {
            smoothed_us: 0.0,
            warm_samples: 0,
        }
    }

    /// Whether the EMA has absorbed enough samples to be meaningful.
    pub fn is_warm(&self) -> bool {
        self.warm_samples >= LATENCY_WARMUP_SAMPLES
    }

    pub fn measured_latency_us(&self) -> u32 {
        self.smoothed_us as u32
    }

    /// Feed one new RTT (microseconds); internally converted to one-way latency.
    ///
    /// Returns `true` if the sample was an outlier (> `OUTLIER_MULT` times
    /// the current smoothed value) and therefore left the EMA unchanged.
    pub fn update(&mut self, ema_weight: f32, rtt_us: u64) -> bool {
        let one_way = (rtt_us / 2) as f32;

        if self.is_warm() && one_way > self.smoothed_us * OUTLIER_MULT as f32 {
            return true;
        }

        if self.warm_samples == 0 {
            self.smoothed_us = one_way;
        } else {
            self.smoothed_us = ema_weight * one_way + (1.0 - ema_weight) * self.smoothed_us;
        }
        self.warm_samples = self.warm_samples.saturating_add(1);
        false
    }
}

/// Adaptive lead time per spec.md §4.B.5:
/// `lead = 2*one_way_latency + k*sqrt(rtt_variance) + PROCESSING_OVERHEAD`,
/// clamped to `[LEAD_MIN_US, LEAD_MAX_US]`.
pub fn adaptive_lead_us(one_way_latency_us: u32, rtt_variance_us2: u64) -> u32 {
    let variance_fixed = U32F0::from_num(rtt_variance_us2.min(u64::from(u32::MAX)) as u32);
    let stddev: u32 = FixedSqrt::sqrt(variance_fixed).to_num();

    let lead = 2 * one_way_latency_us
        + (LEAD_VARIANCE_WEIGHT * stddev as f32) as u32
        + PROCESSING_OVERHEAD_US;

    lead.clamp(LEAD_MIN_US, LEAD_MAX_US)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sync::EMA_WEIGHT;

    #[test]
    fn warms_up_after_three_samples() {
        let mut est = LatencyEstimator::new();
        for rtt in [20_000, 20_000, 20_000] {
            est.update(EMA_WEIGHT, rtt);
        }
        assert!(est.is_warm());
        assert_eq!(est.measured_latency_us(), 10_000);
    }

    #[test]
    fn outlier_leaves_smoothed_value_unchanged() {
        let mut est = LatencyEstimator::new();
        for rtt in [20_000, 20_000, 20_000] {
            est.update(EMA_WEIGHT, rtt);
        }
        let before = est.measured_latency_us();
        // one-way would be 200_000, way more than OUTLIER_MULT * 10_000
        let was_outlier = est.update(EMA_WEIGHT, 400_000);
        assert!(was_outlier);
        assert_eq!(est.measured_latency_us(), before);
    }

    #[test]
    fn adaptive_lead_stays_within_bounds_under_jitter() {
        let mut est = LatencyEstimator::new();
        for rtt in [20_000, 20_000, 20_000, 24_000] {
            est.update(EMA_WEIGHT, rtt);
        }
        assert!(est.is_warm());
        let lead = adaptive_lead_us(est.measured_latency_us(), 4_000_000);
        assert!(lead >= LEAD_MIN_US);
        assert!(lead <= LEAD_MAX_US);
    }

    #[test]
    fn adaptive_lead_clamps_to_minimum_when_tiny() {
        let lead = adaptive_lead_us(0, 0);
        assert_eq!(lead, LEAD_MIN_US.max(PROCESSING_OVERHEAD_US));
    }
}
