//! Tunable constants, collected by subsystem.
//!
//! Mirrors the teacher firmware's `config::{clk, adc, fft}` layout of
//! nested `pub mod`s of `const`s, one module per subsystem, rather than a
//! single flat list.

/// Clock synchronizer tuning (spec.md §4.B, §6).
pub mod sync {
    /// Reject offset samples whose RTT exceeds this (inclusive boundary is accepted).
    pub const RTT_QUALITY_THRESHOLD_US: u64 = 120_000;

    /// Reject a latency sample if it exceeds this multiple of the smoothed estimate.
    pub const OUTLIER_MULT: u32 = 3;

    /// Offset ring capacity.
    pub const OFFSET_SAMPLE_CAP: usize = 10;

    /// Samples required before the synchronizer reports `valid`.
    pub const MIN_VALID_SAMPLES: usize = 5;

    /// EMA weight given to each new sample (latency EMA and drift EMA).
    pub const EMA_WEIGHT: f32 = 0.3;

    /// Warm-up sample count before the latency EMA is considered meaningful.
    pub const LATENCY_WARMUP_SAMPLES: u32 = 3;

    /// Outlier deviation bound for offset samples once the ring is populated (§4.B.2).
    pub const OFFSET_OUTLIER_DEVIATION_US: i64 = 5_000;

    /// Drift rate clamp, in microseconds per millisecond (100ppm).
    pub const DRIFT_CLAMP_US_PER_MS: f32 = 0.1;

    /// Minimum adaptive lead time.
    pub const LEAD_MIN_US: u32 = 65_000;

    /// Maximum adaptive lead time.
    pub const LEAD_MAX_US: u32 = 150_000;

    /// Fixed overhead added to the adaptive lead time estimate.
    pub const PROCESSING_OVERHEAD_US: u32 = 20_000;

    /// Weight `k` applied to `sqrt(rtt_variance)` in the lead time formula.
    pub const LEAD_VARIANCE_WEIGHT: f32 = 1.0;

    /// Age after which a synchronizer with no fresh samples downgrades to not-valid.
    pub const SYNC_MAX_AGE_US: u64 = 10_000_000;

    /// Maximum number of in-flight (unanswered) pings tracked at once.
    pub const MAX_PENDING_PINGS: usize = 4;
}

/// Macrocycle planner tuning (spec.md §4.C).
pub mod planner {
    /// Hard cap on events in a single macrocycle.
    pub const MAX_EVENTS_PER_MACROCYCLE: usize = 12;

    /// Number of independently-generated patterns concatenated into a macrocycle.
    pub const PATTERNS_PER_MACROCYCLE: usize = 3;

    /// Hardware-specific finger count; configurable between 4 and 5.
    pub const NUM_FINGERS: usize = 4;

    /// Grace window for rejecting macrocycle events that are already past-due on arrival.
    pub const GRACE_WINDOW_US: u64 = 5_000;

    /// Base frequency (Hz) that on-wire `freq_offset` bytes are relative to.
    pub const FREQ_BASE_HZ: u16 = 100;

    /// Hz represented by one unit of on-wire `freq_offset`.
    pub const FREQ_STEP_HZ: i16 = 5;
}

/// Execution scheduler tuning (spec.md §4.D).
pub mod scheduler {
    /// Minimum delay the hardware timer may be armed for, protecting against
    /// immediate-fire due to setup overhead.
    pub const MIN_ARMING_DELAY_US: u32 = 50;

    /// Grace window for dropping activations that are already past-due.
    pub const GRACE_WINDOW_US: u64 = 1_000;
}

/// Wire format framing.
pub mod wire {
    /// End-of-message framing byte appended by the transport.
    pub const FRAMING_BYTE: u8 = 0x04;
}
