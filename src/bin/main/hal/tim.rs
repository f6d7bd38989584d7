use bilatherm::capability::HardwareTimer;
use stm32f1xx_hal::device::{RCC, TIM1};
use stm32f1xx_hal::rcc::Clocks;
use stm32f1xx_hal::timer::Instance;

/// A free-running timer peripheral configured with a prescaler only; the
/// counting mode is set up by whoever turns it into something concrete
/// (here, [`OneshotAlarm::from`]).
pub struct OneshotTimer<TIM: Instance, const FREQ: u32> {
    tim: TIM,
}

// modified from
// https://github.com/stm32-rs/stm32f1xx-hal/blob/f9b24f4d9bac7fc3c93764bd295125800944f53b/src/timer.rs#L713-L735
impl<TIM: Instance, const FREQ: u32> OneshotTimer<TIM, FREQ> {
    pub fn new(tim: TIM, clocks: &Clocks) -> Self {
        unsafe {
            //NOTE(unsafe) this reference will only be used for atomic writes with no side effects
            let rcc = &(*RCC::ptr());
            // Enable and reset the timer peripheral
            TIM::enable(rcc);
            TIM::reset(rcc);
        }

        let mut t = Self { tim };
        t.configure(clocks);
        t
    }

    /// Calculate prescaler depending on `Clocks` state
    fn configure(&mut self, clocks: &Clocks) {
        let clk = TIM::timer_clock(clocks);
        assert!(clk.raw() % FREQ == 0);
        let psc = clk.raw() / FREQ;
        self.tim.set_prescaler(u16::try_from(psc - 1).unwrap());
    }
}

/// A one-shot, interrupt-driven alarm built directly on TIM1's counter
/// (spec.md §4.D, §6 "TIM1 one-shot hardware timer"). Unlike the teacher's
/// `OnePulse`, this drives no capture/compare output — the scheduler only
/// needs an interrupt after `delay_us`, not a waveform — so `arm` rewrites
/// `ARR`/`CNT` per call instead of fixing the period at construction.
pub struct OneshotAlarm<const FREQ: u32> {
    timer: OneshotTimer<TIM1, FREQ>,
}

impl<const FREQ: u32> OneshotAlarm<FREQ> {
    pub fn new(tim: TIM1, clocks: &Clocks) -> Self {
        let timer = OneshotTimer::new(tim, clocks);
        // One-pulse mode: CEN clears itself at the next update event, so a
        // fired alarm never free-runs even if `stop` is delayed.
        timer.tim.cr1.modify(|_, w| w.opm().set_bit());
        Self { timer }
    }
}

impl<const FREQ: u32> HardwareTimer for OneshotAlarm<FREQ> {
    fn arm(&mut self, delay_us: u32) -> bool {
        if self.timer.tim.cr1.read().cen().bit_is_set() {
            return false; // still counting down from a previous arm
        }

        let ticks = u64::from(delay_us) * u64::from(FREQ) / 1_000_000;
        let Ok(arr) = u16::try_from(ticks.saturating_sub(1).max(1)) else {
            return false; // delay too long for a 16-bit counter at this FREQ
        };

        self.timer.tim.arr.write(|w| w.arr().bits(arr));
        self.timer.tim.cnt.write(|w| w.cnt().bits(0));
        self.timer.tim.sr.modify(|_, w| w.uif().clear_bit());
        self.timer.tim.dier.modify(|_, w| w.uie().set_bit());
        self.timer.tim.cr1.modify(|_, w| w.cen().set_bit());
        true
    }

    fn stop(&mut self) {
        self.timer.tim.cr1.modify(|_, w| w.cen().clear_bit());
        self.timer.tim.dier.modify(|_, w| w.uie().clear_bit());
        self.timer.tim.sr.modify(|_, w| w.uif().clear_bit());
    }
}

/// Clear TIM1's update-interrupt flag from ISR context, without needing to
/// own the [`OneshotAlarm`] (which lives inside `Scheduler`, main-loop side
/// only). The NVIC line is level-sensitive on this bit: leaving it set
/// would re-enter the ISR immediately after return.
///
/// # Safety
/// Must only be called from the `TIM1_UP` interrupt handler while a
/// `OneshotAlarm<TIM1, _>` elsewhere owns the peripheral; this function
/// does not itself take ownership, so it must not race a concurrent
/// `arm`/`stop` call (it can't, since both only ever run at `TIM1_UP`'s
/// priority or above).
pub fn ack_tim1_update_interrupt() {
    unsafe { (*TIM1::ptr()).sr.modify(|_, w| w.uif().clear_bit()) }
}
