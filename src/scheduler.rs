//! Execution scheduler (spec.md §4.D, component D): arms one hardware
//! timer for the next-due activation, fires it in ISR context by setting
//! a flag, and performs the actual I2C motor activation from main-loop
//! context only.
//!
//! The pending-activation flag is the single datum crossing the ISR/main
//! boundary (spec.md §5, §9): an [`core::sync::atomic::AtomicBool`],
//! release-stored by [`Scheduler::mark_fired`] (called from ISR context)
//! and acquire-swapped by [`Scheduler::poll`] (called from the main
//! loop). No lock is needed because every other field is touched only
//! from main-loop context.

use crate::capability::{HardwareTimer, MotorDriver};
use crate::config::planner::MAX_EVENTS_PER_MACROCYCLE;
use crate::config::scheduler::{GRACE_WINDOW_US, MIN_ARMING_DELAY_US};
use crate::error::SchedulerCounters;
use crate::planner::pattern::MAX_FINGERS;
use crate::time::LocalTimestamp;
use core::sync::atomic::{AtomicBool, Ordering};
use heapless::Vec;

/// A single scheduled haptic activation, derived from a macrocycle event
/// by the receiver (spec.md §3 "Scheduled activation").
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct PendingActivation {
    pub fire_time_us: LocalTimestamp,
    pub finger: u8,
    pub amplitude: u8,
    pub duration_ms: u16,
    pub frequency_hz: u16,
}

/// Arms a single hardware timer for the earliest pending activation and
/// hands firing off to main-loop context (spec.md §4.D).
pub struct Scheduler<M, T> {
    motor: M,
    timer: T,
    /// Ascending by `fire_time_us`; ties keep arrival order (spec.md §5).
    pending: Vec<PendingActivation, MAX_EVENTS_PER_MACROCYCLE>,
    /// Set by the ISR, tested and cleared by `poll`.
    fired: AtomicBool,
    /// Whether the hardware timer currently has an outstanding arm that
    /// hasn't yet been stopped by the main loop.
    armed: bool,
    active_fingers: [bool; MAX_FINGERS],
    pub counters: SchedulerCounters,
}

impl<M: MotorDriver, T: HardwareTimer> Scheduler<M, T> {
    pub fn new(motor: M, timer: T) -> Self {
        Self {
            motor,
            timer,
            pending: Vec::new(),
            fired: AtomicBool::new(false),
            armed: false,
            active_fingers: [false; MAX_FINGERS],
            counters: SchedulerCounters::new(),
        }
    }

    /// Called from ISR context only: flips the pending flag and returns.
    /// Must never touch the motor driver or transport (spec.md §4.D.2).
    pub fn mark_fired(&self) {
        self.fired.store(true, Ordering::Release);
    }

    /// Queue one activation for local fire time `fire_time_us`. Drops (and
    /// counts) activations already past-due by more than the grace window.
    /// Arms the hardware timer immediately if nothing else was armed.
    pub fn schedule(
        &mut self,
        now: LocalTimestamp,
        fire_time_us: LocalTimestamp,
        finger: u8,
        amplitude: u8,
        duration_ms: u16,
        frequency_hz: u16,
    ) {
        if now.diff_us(fire_time_us) > GRACE_WINDOW_US as i64 {
            self.counters.past_due_events_dropped =
                self.counters.past_due_events_dropped.saturating_add(1);
            return;
        }

        let activation = PendingActivation { fire_time_us, finger, amplitude, duration_ms, frequency_hz };
        let pos = self
            .pending
            .iter()
            .position(|a| a.fire_time_us > fire_time_us)
            .unwrap_or(self.pending.len());
        // Queue is bounded to MAX_EVENTS_PER_MACROCYCLE; a full queue here
        // would mean more activations in flight than one macrocycle can
        // ever hold, which the planner's invariants already rule out.
        let _ = self.pending.insert(pos, activation);

        if !self.armed {
            self.arm_for_front(now);
        }
    }

    /// Main-loop hand-off (spec.md §4.D.3): test the flag, and if set,
    /// stop the timer, dequeue and activate the due event, then arm for
    /// whatever is next.
    pub fn poll(&mut self, now: LocalTimestamp) {
        if !self.fired.swap(false, Ordering::Acquire) {
            return;
        }

        self.timer.stop();
        self.armed = false;

        if !self.pending.is_empty() {
            let activation = self.pending.remove(0);
            self.activate(activation);
        }

        self.arm_for_front(now);
    }

    fn activate(&mut self, activation: PendingActivation) {
        if !self.motor.is_enabled(activation.finger) {
            return;
        }
        if self.motor.activate(
            activation.finger,
            activation.amplitude,
            activation.duration_ms,
            activation.frequency_hz,
        ) {
            if let Some(slot) = self.active_fingers.get_mut(activation.finger as usize) {
                *slot = true;
            }
        } else {
            self.counters.motor_driver_failures = self.counters.motor_driver_failures.saturating_add(1);
        }
    }

    fn arm_for_front(&mut self, now: LocalTimestamp) {
        let Some(front) = self.pending.first() else {
            self.armed = false;
            return;
        };

        let delay_us = front
            .fire_time_us
            .diff_us(now)
            .max(0)
            .unsigned_abs()
            .max(MIN_ARMING_DELAY_US as u64)
            .min(u64::from(u32::MAX)) as u32;

        if self.timer.arm(delay_us) {
            self.armed = true;
        } else {
            // Hardware busy: prefer an immediate (best-effort) fire over
            // silently dropping the event (spec.md §4.D.5).
            self.counters.timer_arm_failures = self.counters.timer_arm_failures.saturating_add(1);
            self.armed = true;
            self.fired.store(true, Ordering::Release);
        }
    }

    /// Whether any activations remain pending (spec.md §4.D.3 step 4).
    pub fn scheduling_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Stop the timer, empty the pending queue, and deactivate every
    /// finger currently known to be vibrating. Idempotent (spec.md §8).
    pub fn cancel_all(&mut self) {
        if self.armed {
            self.timer.stop();
            self.armed = false;
        }
        self.fired.store(false, Ordering::Release);
        self.pending.clear();

        for (finger, active) in self.active_fingers.iter_mut().enumerate() {
            if *active {
                self.motor.deactivate(finger as u8);
                *active = false;
            }
        }
    }
}
