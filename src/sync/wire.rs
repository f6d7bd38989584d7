//! PING/PONG wire format (spec.md §6):
//!
//! ```text
//! PING:<seq>|<t1_high>|<t1_low>
//! PONG:<seq>|<t2_high>|<t2_low>|<t3_high>|<t3_low>
//! ```
//!
//! 64-bit timestamps are split high/low because the serializer is
//! 32-bit-oriented; the combined value is `(high << 32) | low`. Parsing is
//! rejectful: any malformed field fails the whole message, never partially
//! applies it.

use crate::config::wire::FRAMING_BYTE;
use crate::error::RejectReason;
use core::fmt::Write as _;
use heapless::String;

pub type WireSeq = u32;

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Ping {
    pub seq: WireSeq,
    pub t1: u64,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Pong {
    pub seq: WireSeq,
    pub t2: u64,
    pub t3: u64,
}

const MAX_MESSAGE_LEN: usize = 96;

fn split_hi_lo(t: u64) -> (u32, u32) {
    ((t >> 32) as u32, t as u32)
}

fn join_hi_lo(hi: u32, lo: u32) -> u64 {
    (u64::from(hi) << 32) | u64::from(lo)
}

impl Ping {
    pub fn serialize(&self) -> String<MAX_MESSAGE_LEN> {
        let (hi, lo) = split_hi_lo(self.t1);
        let mut out = String::new();
        let _ = write!(out, "PING:{}|{}|{}", self.seq, hi, lo);
        let _ = out.push(FRAMING_BYTE as char);
        out
    }

    pub fn parse(line: &str) -> Result<Ping, RejectReason> {
        let body = line.strip_prefix("PING:").ok_or(RejectReason::Malformed)?;
        let mut fields = body.split('|');
        let seq = next_u32(&mut fields)?;
        let hi = next_u32(&mut fields)?;
        let lo = next_u32(&mut fields)?;
        if fields.next().is_some() {
            return Err(RejectReason::Malformed);
        }
        Ok(Ping { seq, t1: join_hi_lo(hi, lo) })
    }
}

impl Pong {
    pub fn serialize(&self) -> String<MAX_MESSAGE_LEN> {
        let (t2_hi, t2_lo) = split_hi_lo(self.t2);
        let (t3_hi, t3_lo) = split_hi_lo(self.t3);
        let mut out = String::new();
        let _ = write!(
            out,
            "PONG:{}|{}|{}|{}|{}",
            self.seq, t2_hi, t2_lo, t3_hi, t3_lo
        );
        let _ = out.push(FRAMING_BYTE as char);
        out
    }

    pub fn parse(line: &str) -> Result<Pong, RejectReason> {
        let body = line.strip_prefix("PONG:").ok_or(RejectReason::Malformed)?;
        let mut fields = body.split('|');
        let seq = next_u32(&mut fields)?;
        let t2_hi = next_u32(&mut fields)?;
        let t2_lo = next_u32(&mut fields)?;
        let t3_hi = next_u32(&mut fields)?;
        let t3_lo = next_u32(&mut fields)?;
        if fields.next().is_some() {
            return Err(RejectReason::Malformed);
        }
        Ok(Pong {
            seq,
            t2: join_hi_lo(t2_hi, t2_lo),
            t3: join_hi_lo(t3_hi, t3_lo),
        })
    }
}

fn next_u32<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Result<u32, RejectReason> {
    fields
        .next()
        .ok_or(RejectReason::Malformed)?
        .trim_end_matches(FRAMING_BYTE as char)
        .parse()
        .map_err(|_| RejectReason::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_round_trips() {
        let ping = Ping { seq: 7, t1: 0x1_0000_0005 };
        let wire = ping.serialize();
        let parsed = Ping::parse(wire.trim_end_matches(FRAMING_BYTE as char)).unwrap();
        assert_eq!(parsed, ping);
    }

    #[test]
    fn pong_round_trips() {
        let pong = Pong { seq: 99, t2: 1_005_000, t3: 1_010_000 };
        let wire = pong.serialize();
        let parsed = Pong::parse(wire.trim_end_matches(FRAMING_BYTE as char)).unwrap();
        assert_eq!(parsed, pong);
    }

    #[test]
    fn rejects_malformed_field_count() {
        assert!(Ping::parse("PING:1|2").is_err());
        assert!(Pong::parse("PONG:1|2|3|4").is_err());
    }

    #[test]
    fn rejects_non_numeric_field() {
        assert!(Ping::parse("PING:x|2|3").is_err());
    }

    #[test]
    fn rejects_wrong_prefix() {
        assert!(Ping::parse("PONG:1|2|3").is_err());
    }
}
