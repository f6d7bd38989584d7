//! The raw 32-bit microsecond counter behind [`bilatherm::clock::MonotonicClock`]
//! (spec.md §4.A), derived from the DWT cycle counter the way
//! `dwt-systick-monotonic` derives its own tick source.

use bilatherm::capability::ClockCounter;
use cortex_m::peripheral::DWT;

pub struct DwtMicros {
    cycles_per_us: u32,
}

impl DwtMicros {
    /// `dwt` and `dcb` are consumed only to prove the cycle counter has been
    /// enabled by the caller; `sysclk_hz` must be an exact multiple of 1MHz.
    pub fn new(dwt: &mut DWT, dcb: &mut cortex_m::peripheral::DCB, sysclk_hz: u32) -> Self {
        assert!(sysclk_hz % 1_000_000 == 0, "sysclk must be a whole number of MHz");
        dcb.enable_trace();
        unsafe { dwt.cyccnt.write(0) };
        dwt.enable_cycle_counter();
        Self { cycles_per_us: sysclk_hz / 1_000_000 }
    }
}

impl ClockCounter for DwtMicros {
    fn read_raw_us(&mut self) -> u32 {
        DWT::cycle_count() / self.cycles_per_us
    }
}
