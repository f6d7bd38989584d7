//! Macrocycle planner (spec.md §4.C, component C): produces one
//! macrocycle at a time, publishes it to the peer and the local
//! scheduler, and tracks the four-state lifecycle of spec.md §3:
//!
//! ```text
//!   IDLE ──(start of cycle)──▶ ACTIVE
//!    ▲                          │
//!    │                          │(all events scheduled into D)
//!    │                          ▼
//!    └── WAITING_RELAX ◀────────┘
//!                (relax window elapsed)
//! ```
//!
//! Per spec.md §9's preference for message passing over callback webs,
//! a cycle's output is an enumeration of [`SchedulerCommand`]s rather
//! than direct calls into the scheduler or transport: a thin dispatcher
//! (the firmware binary's main loop) applies them to the real
//! capabilities, which keeps this module capability-agnostic and
//! trivially host-testable.

pub mod macrocycle;
pub mod pattern;
pub mod wire;

use crate::config::planner::PATTERNS_PER_MACROCYCLE;
use crate::error::{PlannerCounters, RejectReason};
use crate::rng::RandomSource;
use crate::sync::Synchronizer;
use crate::time::{LocalTimestamp, PeerTimestamp};
use heapless::{String, Vec};
use macrocycle::{Macrocycle, ProfileRange};
use pattern::{GeneratedPattern, PatternKind, PatternParams};

use crate::config::planner::MAX_EVENTS_PER_MACROCYCLE;

/// Where one planner instance currently is in the macrocycle lifecycle
/// (spec.md §3).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LifecycleState {
    Idle,
    Active,
    WaitingRelax,
}

/// Therapy-profile parameters for one session: which three pattern
/// families to concatenate (spec.md §4.C.2), their shared timing/jitter
/// parameters, and the amplitude/frequency draw ranges.
#[derive(Clone, Copy, Debug)]
pub struct Profile {
    pub pattern_kinds: [PatternKind; PATTERNS_PER_MACROCYCLE],
    pub pattern_params: PatternParams,
    pub range: ProfileRange,
    pub burst_duration_ms: u16,
}

/// One activation to hand to the scheduler, or an instruction to cancel
/// everything currently pending — emitted by the planner, applied by the
/// firmware's dispatcher.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SchedulerCommand {
    Schedule {
        fire_time_us: LocalTimestamp,
        finger: u8,
        amplitude: u8,
        duration_ms: u16,
        frequency_hz: u16,
    },
    CancelAll,
}

/// Instruction for the transport dispatcher, mirroring [`SchedulerCommand`]
/// (spec.md §9 supplement: message passing over callback webs). The only
/// variant today is "send this framed line"; kept as an enum rather than a
/// bare `String` so the dispatcher's match arm reads the same way as the
/// scheduler one, and so a future retry/priority variant has somewhere to go.
#[derive(Clone, Debug)]
pub enum TransportCommand {
    Send(String<MAX_WIRE_LEN>),
}

/// What beginning a new macrocycle on the PRIMARY produces: the
/// macrocycle itself (for logging/inspection), the transport command to
/// publish it to the peer, and the scheduler commands to arm locally.
pub struct PrimaryCycleOutput {
    pub macrocycle: Macrocycle,
    pub transport_command: TransportCommand,
    pub scheduler_commands: Vec<SchedulerCommand, MAX_EVENTS_PER_MACROCYCLE>,
}

const MAX_WIRE_LEN: usize = 256;

/// What a single `poll_primary` tick produced.
pub enum PlannerTick {
    /// Nothing happened this tick.
    Idle,
    /// A new macrocycle was generated and should be transmitted/scheduled.
    Started(PrimaryCycleOutput),
    /// The relax window elapsed; the cycle is fully retired.
    CycleComplete,
}

/// Drives one side (PRIMARY or SECONDARY) of the macrocycle lifecycle.
/// The same type serves both roles: PRIMARY calls [`Planner::poll_primary`]
/// to generate and transmit macrocycles, SECONDARY calls
/// [`Planner::accept_macrocycle`] to ingest them.
pub struct Planner<R> {
    rng: R,
    state: LifecycleState,
    running: bool,
    paused: bool,
    profile: Option<Profile>,
    session_duration_us: u64,
    elapsed_us: u64,
    last_tick: Option<LocalTimestamp>,
    next_seq: u32,
    last_accepted_seq: Option<u32>,
    relax_until: Option<LocalTimestamp>,
    pub counters: PlannerCounters,
}

impl<R: RandomSource> Planner<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            state: LifecycleState::Idle,
            running: false,
            paused: false,
            profile: None,
            session_duration_us: 0,
            elapsed_us: 0,
            last_tick: None,
            next_seq: 0,
            last_accepted_seq: None,
            relax_until: None,
            counters: PlannerCounters::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running && !self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.running && self.paused
    }

    pub fn elapsed_s(&self) -> u32 {
        (self.elapsed_us / 1_000_000) as u32
    }

    pub fn remaining_s(&self) -> u32 {
        (self.session_duration_us.saturating_sub(self.elapsed_us) / 1_000_000) as u32
    }

    /// Begin a new therapy session. Resets the lifecycle to `IDLE` so the
    /// first macrocycle is generated on the next `poll_primary` tick.
    pub fn start_session(&mut self, profile: Profile, duration_s: u32) {
        self.profile = Some(profile);
        self.running = true;
        self.paused = false;
        self.state = LifecycleState::Idle;
        self.session_duration_us = u64::from(duration_s) * 1_000_000;
        self.elapsed_us = 0;
        self.last_tick = None;
        self.relax_until = None;
    }

    /// Pause the session. The caller must also apply the returned
    /// [`SchedulerCommand::CancelAll`] to the scheduler (spec.md §8
    /// scenario 5: pausing mid-vibration deactivates every enabled,
    /// currently-vibrating finger and empties the pending queue).
    pub fn pause(&mut self) -> SchedulerCommand {
        self.paused = true;
        SchedulerCommand::CancelAll
    }

    /// Resume a paused session. The next macrocycle is generated from
    /// scratch starting from `IDLE`; there is no partial replay of
    /// whatever was in flight when `pause` was called.
    pub fn resume(&mut self) {
        self.paused = false;
        self.state = LifecycleState::Idle;
        self.relax_until = None;
    }

    pub fn stop(&mut self) -> SchedulerCommand {
        self.running = false;
        self.paused = false;
        self.state = LifecycleState::Idle;
        self.profile = None;
        SchedulerCommand::CancelAll
    }

    /// Record that the transport failed to send the last macrocycle
    /// (spec.md §4.C.5): the PRIMARY still executes locally, so this is
    /// just a counted, non-fatal condition.
    pub fn note_transport_send_failed(&mut self) {
        self.counters.peer_missed_macrocycles = self.counters.peer_missed_macrocycles.saturating_add(1);
    }

    /// PRIMARY-side lifecycle tick (spec.md §4.C.4, §3). `scheduling_complete`
    /// is the scheduler's own report that no activations remain pending.
    pub fn poll_primary(
        &mut self,
        now: LocalTimestamp,
        sync: &Synchronizer,
        scheduling_complete: bool,
    ) -> PlannerTick {
        if !self.running || self.paused {
            return PlannerTick::Idle;
        }

        if let Some(last) = self.last_tick {
            self.elapsed_us = self.elapsed_us.saturating_add(last.diff_us(now).unsigned_abs());
        }
        self.last_tick = Some(now);

        if self.elapsed_us >= self.session_duration_us {
            self.running = false;
            return PlannerTick::Idle;
        }

        match self.state {
            LifecycleState::Idle => {
                if !sync.is_valid(now) {
                    // Refuse to start a new macrocycle until sync is regained (spec.md §4.C.5).
                    return PlannerTick::Idle;
                }
                self.state = LifecycleState::Active;
                PlannerTick::Started(self.begin_cycle(now, sync))
            }
            LifecycleState::Active => {
                if scheduling_complete {
                    let relax_ms = self.relax_window_ms();
                    self.relax_until = Some(now.offset_by(i64::from(relax_ms) * 1_000));
                    self.state = LifecycleState::WaitingRelax;
                }
                PlannerTick::Idle
            }
            LifecycleState::WaitingRelax => {
                match self.relax_until {
                    Some(deadline) if now >= deadline => {
                        self.state = LifecycleState::Idle;
                        self.relax_until = None;
                        PlannerTick::CycleComplete
                    }
                    _ => PlannerTick::Idle,
                }
            }
        }
    }

    fn relax_window_ms(&self) -> u32 {
        let params = self
            .profile
            .as_ref()
            .map(|p| p.pattern_params)
            .unwrap_or(PatternParams {
                num_fingers: 0,
                burst_on_ms: 0,
                burst_off_ms: 0,
                jitter_fraction: 0.0,
                mirrored: true,
            });
        2 * params.inter_burst_ms()
    }

    fn begin_cycle(&mut self, now: LocalTimestamp, sync: &Synchronizer) -> PrimaryCycleOutput {
        let profile = self.profile.expect("profile must be set before a cycle begins");

        let lead_us = sync.adaptive_lead_us();
        let base_time_local = now.offset_by(i64::from(lead_us));

        let generated: [GeneratedPattern; PATTERNS_PER_MACROCYCLE] =
            core::array::from_fn(|i| pattern::generate(profile.pattern_kinds[i], &profile.pattern_params, &mut self.rng));
        // `primary_fingers` is this device's own hand, scheduled locally
        // below; `secondary_fingers` is the contralateral hand's paired
        // order, which is what actually goes out over the wire (spec.md
        // §4.C.2: the SECONDARY executes the paired secondary sequence,
        // not the PRIMARY's own-hand order, when the two aren't mirrored).
        let refs: [(&[u8], &[u8], &[u16]); PATTERNS_PER_MACROCYCLE] = core::array::from_fn(|i| {
            (
                generated[i].primary_fingers.as_slice(),
                generated[i].secondary_fingers.as_slice(),
                generated[i].step_times_ms.as_slice(),
            )
        });

        let sequence_id = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let (mc, local_fingers) = macrocycle::compose(
            sequence_id,
            base_time_local.0,
            profile.burst_duration_ms,
            &refs,
            &profile.range,
            &mut self.rng,
        );

        let mut scheduler_commands: Vec<SchedulerCommand, MAX_EVENTS_PER_MACROCYCLE> = Vec::new();
        for (event, &local_finger) in mc.events.iter().zip(local_fingers.iter()) {
            let fire_time_us = base_time_local.offset_by(i64::from(event.delta_time_ms) * 1_000);
            let _ = scheduler_commands.push(SchedulerCommand::Schedule {
                fire_time_us,
                finger: local_finger,
                amplitude: event.amplitude,
                duration_ms: mc.duration_ms,
                frequency_hz: event.frequency_hz(),
            });
        }

        let peer_base = sync.local_to_peer(base_time_local, now);
        let base_time_ms = peer_base.timestamp.0 / 1_000;
        let offset_us = sync.corrected_offset_us(now);
        let wire = wire::serialize(&mc, base_time_ms, offset_us);

        PrimaryCycleOutput { macrocycle: mc, transport_command: TransportCommand::Send(wire), scheduler_commands }
    }

    /// SECONDARY-side ingestion of an inbound macrocycle (spec.md §4.C.3,
    /// §4.C.5). Rejects malformed or stale messages outright; otherwise
    /// drops (and counts) individual events whose converted local fire
    /// time is already past-due, returning scheduler commands for the rest.
    pub fn accept_macrocycle(
        &mut self,
        line: &str,
        now: LocalTimestamp,
        sync: &Synchronizer,
    ) -> Result<Vec<SchedulerCommand, MAX_EVENTS_PER_MACROCYCLE>, RejectReason> {
        if !sync.is_valid(now) {
            return Err(RejectReason::SyncNotValid);
        }

        let parsed = wire::parse(line).map_err(|reason| {
            self.counters.malformed_macrocycles = self.counters.malformed_macrocycles.saturating_add(1);
            reason
        })?;

        if let Some(last) = self.last_accepted_seq {
            if parsed.sequence_id <= last {
                self.counters.stale_macrocycles = self.counters.stale_macrocycles.saturating_add(1);
                return Err(RejectReason::StaleSequence);
            }
        }
        self.last_accepted_seq = Some(parsed.sequence_id);
        self.state = LifecycleState::Active;

        let base_peer = PeerTimestamp(parsed.base_time_ms * 1_000);
        let mut commands: Vec<SchedulerCommand, MAX_EVENTS_PER_MACROCYCLE> = Vec::new();
        let mut dropped = 0u32;

        for event in &parsed.events {
            let peer_fire = base_peer.offset_by(i64::from(event.delta_time_ms) * 1_000);
            let conv = sync.peer_to_local(peer_fire, now);
            let local_fire = conv.timestamp;

            if now > local_fire && now.diff_us(local_fire) > crate::config::planner::GRACE_WINDOW_US as i64 {
                dropped += 1;
                continue;
            }

            let _ = commands.push(SchedulerCommand::Schedule {
                fire_time_us: local_fire,
                finger: event.finger,
                amplitude: event.amplitude,
                duration_ms: parsed.duration_ms,
                frequency_hz: event.frequency_hz(),
            });
        }

        self.counters.dropped_events_on_receipt =
            self.counters.dropped_events_on_receipt.saturating_add(dropped);

        Ok(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SplitMix64;
    use crate::time::LocalTimestamp;

    fn test_profile() -> Profile {
        Profile {
            pattern_kinds: [
                PatternKind::RandomPermutation,
                PatternKind::RandomPermutation,
                PatternKind::RandomPermutation,
            ],
            pattern_params: PatternParams {
                num_fingers: 4,
                burst_on_ms: 50,
                burst_off_ms: 50,
                jitter_fraction: 0.1,
                mirrored: true,
            },
            range: ProfileRange {
                amp_min: 80,
                amp_max: 80,
                freq_randomized: false,
                freq_min_offset: 0,
                freq_max_offset: 0,
                fixed_freq_offset: 0,
            },
            burst_duration_ms: 100,
        }
    }

    fn synced() -> Synchronizer {
        let mut sync = Synchronizer::new();
        let mut t = 0u64;
        for _ in 0..5 {
            let ping = sync.initiate_ping(LocalTimestamp(t));
            let pong = sync.on_ping_received(ping, LocalTimestamp(t + 5_000), LocalTimestamp(t + 5_000));
            sync.on_pong_received(pong, LocalTimestamp(t + 10_000)).unwrap();
            t += 100_000;
        }
        sync
    }

    #[test]
    fn refuses_to_start_while_sync_not_valid() {
        let mut planner = Planner::new(SplitMix64::new(1));
        planner.start_session(test_profile(), 60);
        let not_synced = Synchronizer::new();
        match planner.poll_primary(LocalTimestamp(0), &not_synced, false) {
            PlannerTick::Idle => {}
            _ => panic!("must not start a macrocycle without valid sync"),
        }
        assert_eq!(planner.state(), LifecycleState::Idle);
    }

    #[test]
    fn idle_to_active_to_waiting_relax_to_idle_cycle() {
        let mut planner = Planner::new(SplitMix64::new(2));
        planner.start_session(test_profile(), 60);
        let sync = synced();

        match planner.poll_primary(LocalTimestamp(1_000_000), &sync, false) {
            PlannerTick::Started(_) => {}
            _ => panic!("expected a macrocycle to start"),
        }
        assert_eq!(planner.state(), LifecycleState::Active);

        match planner.poll_primary(LocalTimestamp(1_001_000), &sync, true) {
            PlannerTick::Idle => {}
            _ => panic!(),
        }
        assert_eq!(planner.state(), LifecycleState::WaitingRelax);

        // Not elapsed yet.
        match planner.poll_primary(LocalTimestamp(1_001_100), &sync, true) {
            PlannerTick::Idle => {}
            _ => panic!(),
        }
        assert_eq!(planner.state(), LifecycleState::WaitingRelax);

        // Well past the relax window (2 * 4 * 100ms = 800ms after it started).
        match planner.poll_primary(LocalTimestamp(1_802_000), &sync, true) {
            PlannerTick::CycleComplete => {}
            _ => panic!("expected cycle-complete event"),
        }
        assert_eq!(planner.state(), LifecycleState::Idle);
    }

    #[test]
    fn pause_emits_cancel_all_and_resume_starts_fresh() {
        let mut planner = Planner::new(SplitMix64::new(3));
        planner.start_session(test_profile(), 60);
        let sync = synced();
        let _ = planner.poll_primary(LocalTimestamp(0), &sync, false);
        assert_eq!(planner.state(), LifecycleState::Active);

        assert_eq!(planner.pause(), SchedulerCommand::CancelAll);
        assert!(planner.is_paused());
        assert!(!planner.is_running());

        planner.resume();
        assert!(planner.is_running());
        assert_eq!(planner.state(), LifecycleState::Idle);
    }

    #[test]
    fn sequence_id_strictly_increases_across_cycles() {
        let mut planner = Planner::new(SplitMix64::new(4));
        planner.start_session(test_profile(), 600);
        let sync = synced();
        let first_seq = match planner.poll_primary(LocalTimestamp(0), &sync, false) {
            PlannerTick::Started(out) => out.macrocycle.sequence_id,
            _ => panic!(),
        };
        let _ = planner.poll_primary(LocalTimestamp(1_000), &sync, true); // -> WAITING_RELAX
        let _ = planner.poll_primary(LocalTimestamp(2_000_000), &sync, true); // -> CycleComplete
        let second_seq = match planner.poll_primary(LocalTimestamp(2_000_001), &sync, false) {
            PlannerTick::Started(out) => out.macrocycle.sequence_id,
            _ => panic!(),
        };
        assert!(second_seq > first_seq);
    }

    #[test]
    fn stale_inbound_sequence_is_rejected() {
        let mut planner = Planner::new(SplitMix64::new(5));
        let sync = synced();
        let wire = "MC:5|0|0|0|100|1|0,0,80\u{4}";
        planner.accept_macrocycle(wire, LocalTimestamp(0), &sync).unwrap();
        assert_eq!(planner.counters.stale_macrocycles, 0);

        let result = planner.accept_macrocycle(wire, LocalTimestamp(0), &sync);
        assert_eq!(result.unwrap_err(), RejectReason::StaleSequence);
        assert_eq!(planner.counters.stale_macrocycles, 1);
    }

    #[test]
    fn late_macrocycle_drops_all_events_and_counts_them() {
        let mut planner = Planner::new(SplitMix64::new(6));
        let sync = synced();
        // base_time_ms=0 with two events; at now=200_000us (200ms) both are
        // 200ms in the past, well beyond the grace window.
        let wire = "MC:1|0|0|0|100|2|0,0,80|10,1,90\u{4}";
        let commands = planner.accept_macrocycle(wire, LocalTimestamp(200_000), &sync).unwrap();
        assert!(commands.is_empty());
        assert_eq!(planner.counters.dropped_events_on_receipt, 2);
    }

    #[test]
    fn malformed_inbound_macrocycle_is_rejected_and_counted() {
        let mut planner = Planner::new(SplitMix64::new(7));
        let sync = synced();
        let result = planner.accept_macrocycle("MC:garbage", LocalTimestamp(0), &sync);
        assert!(result.is_err());
        assert_eq!(planner.counters.malformed_macrocycles, 1);
    }
}
