//! Non-fatal error categories and their counters (spec.md §7).
//!
//! No recoverable error is propagated up to the mobile app; each category
//! is just a saturating counter the owning component exposes read-only.
//! Counters are split per component rather than pooled into one struct,
//! mirroring spec.md §3's ownership rule (the synchronizer owns its ring
//! and drift estimate, the planner owns its macrocycle, the scheduler owns
//! its pending queue) — the same component that owns the state that can go
//! wrong owns the counter that records it going wrong.

/// Why an inbound message or sample was rejected.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub enum RejectReason {
    /// Bad field count, non-numeric field, or missing field.
    Malformed,
    /// RTT above [`crate::config::sync::RTT_QUALITY_THRESHOLD_US`].
    PoorRtt,
    /// Offset deviates from the current median beyond the outlier bound.
    OffsetOutlier,
    /// A PONG referencing a sequence id with no matching in-flight PING.
    UnknownPingSequence,
    /// `sequence_id` not strictly greater than the last accepted one.
    StaleSequence,
    /// Computed local fire time is already in the past by more than the grace window.
    PastDue,
    /// Conversion or macrocycle start attempted before sync is valid.
    SyncNotValid,
}

/// Counters owned by [`crate::sync::Synchronizer`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct SyncCounters {
    pub poor_rtt_samples: u32,
    pub offset_outliers: u32,
    pub latency_outliers: u32,
    pub unknown_pong_sequence: u32,
}

impl SyncCounters {
    pub const fn new() -> Self {
        Self { poor_rtt_samples: 0, offset_outliers: 0, latency_outliers: 0, unknown_pong_sequence: 0 }
    }
}

/// Counters owned by [`crate::planner::Planner`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct PlannerCounters {
    pub malformed_macrocycles: u32,
    pub stale_macrocycles: u32,
    pub dropped_events_on_receipt: u32,
    pub peer_missed_macrocycles: u32,
}

impl PlannerCounters {
    pub const fn new() -> Self {
        Self {
            malformed_macrocycles: 0,
            stale_macrocycles: 0,
            dropped_events_on_receipt: 0,
            peer_missed_macrocycles: 0,
        }
    }
}

/// Counters owned by [`crate::scheduler::Scheduler`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct SchedulerCounters {
    pub past_due_events_dropped: u32,
    pub motor_driver_failures: u32,
    pub timer_arm_failures: u32,
}

impl SchedulerCounters {
    pub const fn new() -> Self {
        Self { past_due_events_dropped: 0, motor_driver_failures: 0, timer_arm_failures: 0 }
    }
}

/// Aggregate snapshot of all counters, for a single read-only status report
/// upward (e.g. to the phone app via the session state machine).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct Counters {
    pub sync: SyncCounters,
    pub planner: PlannerCounters,
    pub scheduler: SchedulerCounters,
}
