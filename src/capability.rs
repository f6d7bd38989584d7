//! Narrow capability interfaces for the core's I/O collaborators
//! (spec.md §6, §9 Design Notes).
//!
//! The source this firmware is descended from reaches global singleton
//! objects for the transport, motor driver, and timer. We instead pass
//! capabilities in at construction, the way `dantetimesync`'s
//! `NtpSource`/`PtpNetwork` traits do for its network and clock
//! collaborators — so the same core drives real hardware in `src/bin/main.rs`
//! and mock hardware in tests.

use crate::time::Micros;

/// A bidirectional, reliable, ordered byte stream to the peer device,
/// framed with [`crate::config::wire::FRAMING_BYTE`] (spec.md §6).
///
/// `send` is best-effort: the transport may drop when disconnected, and the
/// core is responsible for handling that (counting it, never panicking).
/// `try_recv` returns one whole framed message at a time, or `None` if
/// nothing is available; reassembly of partial reads is the transport's
/// responsibility, not the core's.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Send one message, returning `true` on success.
    fn send(&mut self, message: &[u8]) -> bool;

    /// Receive one complete, unframed message if available.
    fn try_recv(&mut self, buf: &mut [u8]) -> Option<usize>;
}

/// Per-finger haptic motor control (spec.md §6).
#[cfg_attr(test, mockall::automock)]
pub trait MotorDriver {
    /// Start vibrating `finger` at the given amplitude/frequency/duration.
    /// Returns `true` on success.
    fn activate(&mut self, finger: u8, amplitude: u8, duration_ms: u16, frequency_hz: u16)
        -> bool;

    /// Stop vibrating `finger`. Returns `true` on success.
    fn deactivate(&mut self, finger: u8) -> bool;

    /// Whether `finger` is enabled; disabled fingers are silently skipped.
    fn is_enabled(&self, finger: u8) -> bool;
}

/// A single hardware one-shot timer (spec.md §4.D, §6).
///
/// `arm` is called from main-loop context only. The ISR it schedules must
/// do nothing but flip a flag: see [`crate::scheduler::Scheduler`].
#[cfg_attr(test, mockall::automock)]
pub trait HardwareTimer {
    /// Arm the timer to fire after `delay_us`. Returns `false` if the
    /// hardware was busy (e.g. already armed).
    fn arm(&mut self, delay_us: u32) -> bool;

    /// Stop the timer. Not callable from ISR context on this platform.
    fn stop(&mut self);
}

/// The free-running 32-bit microsecond hardware counter behind
/// [`crate::clock::MonotonicClock`] (spec.md §4.A).
#[cfg_attr(test, mockall::automock)]
pub trait ClockCounter {
    /// Read the raw, wrapping 32-bit microsecond counter.
    fn read_raw_us(&mut self) -> u32;
}

/// A type alias used only for documentation: capabilities report times in
/// plain [`Micros`] where the local/peer distinction doesn't yet apply
/// (e.g. a raw hardware timer delay).
pub type DelayUs = Micros;
