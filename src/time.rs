//! Timestamp and offset types for the local/peer clock domains (spec.md §3).
//!
//! `LocalTimestamp` and `PeerTimestamp` are deliberately distinct types: the
//! clock synchronizer is the only component allowed to convert between
//! them, and keeping them separate at the type level means a planner or
//! scheduler bug that mixes up the two domains fails to compile instead of
//! firing a glove at the wrong instant.

/// Microseconds since some boot-local epoch.
pub type Micros = u64;

/// A 64-bit microsecond timestamp in this device's own clock domain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct LocalTimestamp(pub Micros);

/// A 64-bit microsecond timestamp in the peer device's clock domain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct PeerTimestamp(pub Micros);

impl LocalTimestamp {
    pub const ZERO: LocalTimestamp = LocalTimestamp(0);

    /// `self + delta_us`, saturating at zero for negative deltas.
    pub fn offset_by(self, delta_us: i64) -> Self {
        LocalTimestamp(add_signed(self.0, delta_us))
    }

    /// `self - other`, as a signed microsecond delta.
    pub fn diff_us(self, other: Self) -> i64 {
        signed_diff(self.0, other.0)
    }
}

impl PeerTimestamp {
    pub const ZERO: PeerTimestamp = PeerTimestamp(0);

    pub fn offset_by(self, delta_us: i64) -> Self {
        PeerTimestamp(add_signed(self.0, delta_us))
    }

    pub fn diff_us(self, other: Self) -> i64 {
        signed_diff(self.0, other.0)
    }
}

fn add_signed(base: u64, delta: i64) -> u64 {
    if delta >= 0 {
        base.saturating_add(delta as u64)
    } else {
        base.saturating_sub(delta.unsigned_abs())
    }
}

fn signed_diff(a: u64, b: u64) -> i64 {
    if a >= b {
        (a - b) as i64
    } else {
        -((b - a) as i64)
    }
}

/// Signed microsecond offset such that `peer_time = local_time + offset`.
///
/// Positive means the peer's clock reads ahead of this device's.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct Offset(pub i64);

impl Offset {
    pub const ZERO: Offset = Offset(0);
}

/// Drift rate in microseconds per millisecond (first derivative of offset
/// with respect to local elapsed time).
#[derive(Clone, Copy, PartialEq, Debug, Default)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct DriftRate(pub f32);

impl DriftRate {
    pub const ZERO: DriftRate = DriftRate(0.0);
}
