//! Clock configuration
//!
//! See clock tree in https://www.st.com/resource/en/datasheet/stm32f103c8.pdf
//! Rough layout:
//!
//!   SYSCLK -> AHB prescaler -> APB1 prescaler -> PCLK1
//!              / 1,2..512   |   / 1,2,4,8,16
//!                           |
//!                           -> APB2 prescaler -> PCLK2
//!                               / 1,2,4,8,16
pub mod clk {
    use fugit::Rate;

    /// Use external oscillator (required to get max 72MHz sysclk)
    pub const HSE_FREQ: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::MHz(8);

    /// PLLMUL @ x9 (max 72MHz)
    pub const SYSCLK: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::MHz(72);
    pub const SYSCLK_HZ: u32 = SYSCLK.to_Hz();

    /// APB1 prescaler @ /2 (max 36MHz; I2C1 lives here)
    pub const PCLK1: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::MHz(36);
    /// APB2 prescaler @ /1 (max 72MHz; USART1 and TIM1 live here)
    pub const PCLK2: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::MHz(72);

    /// Tick rate for the scheduler's one-shot alarm: 1 tick = 1us, so an
    /// arming delay in microseconds is an ARR value directly.
    pub const TIM1CLK_HZ: u32 = 1_000_000;
}

/// Transport (UART link to the peer glove) configuration (spec.md §6).
pub mod transport {
    use fugit::Rate;

    pub const BAUD: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::bps(115_200);

    /// Capacity of the byte queue the RX interrupt feeds and `try_recv` drains.
    pub const RX_QUEUE_CAP: usize = 512;

    /// Longest single framed message `try_recv` will assemble before giving
    /// up and discarding a line that never carries the framing byte.
    pub const MAX_FRAME_LEN: usize = 256;
}

/// Motor driver (I2C link to the per-finger driver board) configuration.
pub mod motor {
    use fugit::Rate;

    pub const I2C_FREQ: Rate<u32, 1, 1> = Rate::<u32, 1, 1>::kHz(100);

    /// 7-bit I2C address of the driver board.
    pub const I2C_ADDR: u8 = 0x42;
}

/// Which side of the pair this build is flashed for. Either device may
/// initiate a PTP exchange (spec.md §4.B.1), but exactly one side generates
/// macrocycles (PRIMARY) while the other ingests them (SECONDARY, spec.md
/// §3/§9). Flipped between the two units at build time, since there is no
/// hardware strap to read it from at runtime.
pub mod role {
    pub const IS_PRIMARY: bool = true;
}

pub fn dump_to_log() {
    defmt::info!(
        "sysclk={}Hz pclk1={}Hz pclk2={}Hz primary={}",
        clk::SYSCLK.to_Hz(),
        clk::PCLK1.to_Hz(),
        clk::PCLK2.to_Hz(),
        role::IS_PRIMARY,
    );
}
