//! Core timing engine for a pair of bilateral haptic therapy gloves.
//!
//! This crate is the part of the firmware that has to be right: a PTP-style
//! clock synchronizer between PRIMARY and SECONDARY devices, a macrocycle
//! planner that turns a therapy profile into a batch of timed haptic events,
//! and a hardware-timer-driven scheduler that fires them without blocking
//! the wireless stack. Everything else (transport framing, motor driver,
//! profile storage, the phone-facing command parser, session state machine)
//! is a collaborator reached only through the capability traits in
//! [`capability`].
//!
//! Built `no_std` for the firmware target; built against `std` under
//! `cargo test` so the PTP math, wire formats, and scheduling logic can be
//! exercised on the host.
#![cfg_attr(not(test), no_std)]

pub mod capability;
pub mod clock;
pub mod config;
pub mod error;
pub mod planner;
pub mod rng;
pub mod scheduler;
pub mod sync;
pub mod time;

pub use clock::MonotonicClock;
pub use error::Counters;
pub use planner::Planner;
pub use scheduler::Scheduler;
pub use sync::Synchronizer;
