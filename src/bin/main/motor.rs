//! I2C motor driver board adapter (spec.md §6): one frame per finger
//! activation/deactivation, addressed to [`crate::config::motor::I2C_ADDR`].

use crate::config::motor::I2C_ADDR;
use bilatherm::capability::MotorDriver;
use bilatherm::config::planner::NUM_FINGERS;
use embedded_hal::blocking::i2c::Write;

const CMD_ACTIVATE: u8 = 0x01;
const CMD_DEACTIVATE: u8 = 0x00;

pub struct I2cMotorDriver<I2C> {
    i2c: I2C,
    /// Hardware-configured finger count; fingers beyond it are silently
    /// skipped by the scheduler (spec.md §4.D, §6: "4-5 fingers").
    enabled: [bool; NUM_FINGERS],
}

impl<I2C: Write> I2cMotorDriver<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c, enabled: [true; NUM_FINGERS] }
    }
}

impl<I2C: Write> MotorDriver for I2cMotorDriver<I2C> {
    fn activate(&mut self, finger: u8, amplitude: u8, duration_ms: u16, frequency_hz: u16) -> bool {
        let [dur_hi, dur_lo] = duration_ms.to_be_bytes();
        let [freq_hi, freq_lo] = frequency_hz.to_be_bytes();
        let frame = [CMD_ACTIVATE, finger, amplitude, dur_hi, dur_lo, freq_hi, freq_lo];
        self.i2c.write(I2C_ADDR, &frame).is_ok()
    }

    fn deactivate(&mut self, finger: u8) -> bool {
        self.i2c.write(I2C_ADDR, &[CMD_DEACTIVATE, finger]).is_ok()
    }

    fn is_enabled(&self, finger: u8) -> bool {
        self.enabled.get(finger as usize).copied().unwrap_or(false)
    }
}
