//! Extensions to the `stm32f1xx-hal` Hardware Abstraction Layer.

pub mod tim;

#[allow(non_camel_case_types)]
pub mod pins {
    use stm32f1xx_hal::gpio::{Alternate, Floating, Input, OpenDrain, Output, Pin, PushPull, CRH, CRL};

    /// UART TX to the peer glove
    pub type A9_USART1_TX = Pin<Alternate<PushPull>, CRH, 'A', 9>;
    /// UART RX from the peer glove
    pub type A10_USART1_RX = Pin<Input<Floating>, CRH, 'A', 10>;

    /// I2C SCL to the per-finger motor driver board
    pub type B6_I2C1_SCL = Pin<Alternate<OpenDrain>, CRL, 'B', 6>;
    /// I2C SDA to the per-finger motor driver board
    pub type B7_I2C1_SDA = Pin<Alternate<OpenDrain>, CRL, 'B', 7>;

    /// Scheduler alarm. Drives no external signal; TIM1's update interrupt
    /// is the only thing this pin's channel is used for, so it is claimed
    /// but left unconfigured as an alternate function.
    pub type A8_TIM1C1_ALARM = Pin<Alternate<PushPull>, CRH, 'A', 8>;

    /// Debug LED output
    pub type C13_DEBUG_LED = Pin<Output<PushPull>, CRH, 'C', 13>;

    /// Deliberately unconnected analog pin: the only thing ever read from
    /// it is voltage noise, used once at boot to seed the pattern
    /// generator's PRNG (spec.md §9 "Random numbers").
    pub type A1_ADC1C1_ENTROPY = Pin<stm32f1xx_hal::gpio::Analog, CRL, 'A', 1>;
}
