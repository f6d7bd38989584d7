//! Macrocycle wire format (spec.md §4.C.3):
//!
//! ```text
//! MC:<seq>|<base_time_ms>|<offset_high>|<offset_low>|<duration_ms>|<count>|<e0>|<e1>|...
//! ```
//!
//! Each event `ei` is `delta_ms,finger,amplitude[,freq_offset]` with
//! `freq_offset` omitted when zero. Parsing is rejectful: any malformed
//! field, count mismatch, or non-monotonic `delta_ms` fails the whole
//! message (spec.md's Open Questions note prefers this unambiguous
//! `(high, low)` pair over a concatenated-string encoding, which doesn't
//! round-trip timestamps whose low 32 bits need leading zeros).

use super::macrocycle::{Event, Macrocycle};
use crate::config::planner::MAX_EVENTS_PER_MACROCYCLE;
use crate::config::wire::FRAMING_BYTE;
use crate::error::RejectReason;
use core::fmt::Write as _;
use heapless::{String, Vec};

const MAX_MESSAGE_LEN: usize = 256;

/// Serializes a macrocycle given the peer-time millisecond base and the
/// sender's current corrected offset (for the receiver's cross-check).
pub fn serialize(mc: &Macrocycle, base_time_ms: u64, offset_us: i64) -> String<MAX_MESSAGE_LEN> {
    let offset_bits = offset_us as u64;
    let offset_high = (offset_bits >> 32) as u32;
    let offset_low = offset_bits as u32;

    let mut out = String::new();
    let _ = write!(
        out,
        "MC:{}|{}|{}|{}|{}|{}",
        mc.sequence_id,
        base_time_ms,
        offset_high,
        offset_low,
        mc.duration_ms,
        mc.events.len()
    );
    for event in &mc.events {
        if event.freq_offset == 0 {
            let _ = write!(out, "|{},{},{}", event.delta_time_ms, event.finger, event.amplitude);
        } else {
            let _ = write!(
                out,
                "|{},{},{},{}",
                event.delta_time_ms, event.finger, event.amplitude, event.freq_offset
            );
        }
    }
    let _ = out.push(FRAMING_BYTE as char);
    out
}

pub struct ParsedMacrocycle {
    pub sequence_id: u32,
    pub base_time_ms: u64,
    pub offset_us: i64,
    pub duration_ms: u16,
    pub events: Vec<Event, MAX_EVENTS_PER_MACROCYCLE>,
}

pub fn parse(line: &str) -> Result<ParsedMacrocycle, RejectReason> {
    let body = line
        .trim_end_matches(FRAMING_BYTE as char)
        .strip_prefix("MC:")
        .ok_or(RejectReason::Malformed)?;
    let mut fields = body.split('|');

    let sequence_id: u32 = next(&mut fields)?.parse().map_err(|_| RejectReason::Malformed)?;
    let base_time_ms: u64 = next(&mut fields)?.parse().map_err(|_| RejectReason::Malformed)?;
    let offset_high: u32 = next(&mut fields)?.parse().map_err(|_| RejectReason::Malformed)?;
    let offset_low: u32 = next(&mut fields)?.parse().map_err(|_| RejectReason::Malformed)?;
    let duration_ms: u16 = next(&mut fields)?.parse().map_err(|_| RejectReason::Malformed)?;
    let count: usize = next(&mut fields)?.parse().map_err(|_| RejectReason::Malformed)?;

    if count > MAX_EVENTS_PER_MACROCYCLE {
        return Err(RejectReason::Malformed);
    }

    let offset_us = ((u64::from(offset_high) << 32) | u64::from(offset_low)) as i64;

    let mut events: Vec<Event, MAX_EVENTS_PER_MACROCYCLE> = Vec::new();
    let mut last_delta: u16 = 0;
    let mut seen = 0usize;
    for field in fields {
        let mut parts = field.split(',');
        let delta_time_ms: u16 = next(&mut parts)?.parse().map_err(|_| RejectReason::Malformed)?;
        let finger: u8 = next(&mut parts)?.parse().map_err(|_| RejectReason::Malformed)?;
        let amplitude: u8 = next(&mut parts)?.parse().map_err(|_| RejectReason::Malformed)?;
        let freq_offset: i8 = match parts.next() {
            Some(s) => s.parse().map_err(|_| RejectReason::Malformed)?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(RejectReason::Malformed);
        }
        if delta_time_ms < last_delta {
            return Err(RejectReason::Malformed);
        }
        last_delta = delta_time_ms;

        events.push(Event { delta_time_ms, finger, amplitude, freq_offset }).map_err(|_| RejectReason::Malformed)?;
        seen += 1;
    }

    if seen != count {
        return Err(RejectReason::Malformed);
    }

    Ok(ParsedMacrocycle { sequence_id, base_time_ms, offset_us, duration_ms, events })
}

fn next<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Result<&'a str, RejectReason> {
    fields.next().ok_or(RejectReason::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::macrocycle::Macrocycle;
    use heapless::Vec as HVec;

    #[test]
    fn serialize_matches_spec_example() {
        let mut events: HVec<Event, MAX_EVENTS_PER_MACROCYCLE> = HVec::new();
        events.push(Event { delta_time_ms: 0, finger: 0, amplitude: 80, freq_offset: 0 }).unwrap();
        events.push(Event { delta_time_ms: 50, finger: 1, amplitude: 90, freq_offset: 0 }).unwrap();
        let mc = Macrocycle { sequence_id: 42, base_time_us: 5_000_000, duration_ms: 100, events };

        let wire = serialize(&mc, 5_000, 1_000);
        assert!(wire.starts_with("MC:42|5000|0|1000|100|2|0,0,80|50,1,90"));
        assert_eq!(wire.as_bytes()[wire.len() - 1], FRAMING_BYTE);
    }

    #[test]
    fn round_trips_through_parse() {
        let mut events: HVec<Event, MAX_EVENTS_PER_MACROCYCLE> = HVec::new();
        events.push(Event { delta_time_ms: 0, finger: 0, amplitude: 80, freq_offset: 0 }).unwrap();
        events.push(Event { delta_time_ms: 50, finger: 1, amplitude: 90, freq_offset: 3 }).unwrap();
        let mc = Macrocycle { sequence_id: 42, base_time_us: 5_000_000, duration_ms: 100, events: events.clone() };

        let wire = serialize(&mc, 5_000, 1_000);
        let parsed = parse(&wire).unwrap();
        assert_eq!(parsed.sequence_id, mc.sequence_id);
        assert_eq!(parsed.base_time_ms, 5_000);
        assert_eq!(parsed.offset_us, 1_000);
        assert_eq!(parsed.duration_ms, mc.duration_ms);
        assert_eq!(parsed.events, events);
    }

    #[test]
    fn rejects_non_monotonic_delta() {
        let wire = "MC:1|0|0|0|100|2|50,0,80|0,1,90\u{4}";
        assert_eq!(parse(wire), Err(RejectReason::Malformed));
    }

    #[test]
    fn rejects_count_mismatch() {
        let wire = "MC:1|0|0|0|100|3|0,0,80|50,1,90\u{4}";
        assert_eq!(parse(wire), Err(RejectReason::Malformed));
    }

    #[test]
    fn rejects_malformed_numeric_field() {
        let wire = "MC:1|0|0|0|100|1|x,0,80\u{4}";
        assert!(parse(wire).is_err());
    }
}
