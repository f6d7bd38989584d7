#![no_main]
#![no_std]
#![allow(
    clippy::assertions_on_constants,
    clippy::let_and_return,
    clippy::let_unit_value,
    clippy::needless_range_loop,
    clippy::redundant_pattern_matching,
    clippy::type_complexity
)]
#![warn(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::ptr_as_ptr
)]

use defmt_rtt as _; // global logger
use panic_probe as _; // panicking-behavior
use stm32f1xx_hal as _; // memory layout

// same panicking *behavior* as `panic-probe` but doesn't print a panic message
// this prevents the panic message being printed *twice* when `defmt::panic` is invoked
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

mod clock_counter;
mod config;
mod hal;
mod motor;
mod panic;
mod time;
mod transport;

#[rtic::app(device = stm32f1xx_hal::pac, peripherals = true)]
mod app {
    use crate::clock_counter::DwtMicros;
    use crate::config;
    use crate::hal::pins;
    use crate::hal::tim::{ack_tim1_update_interrupt, OneshotAlarm};
    use crate::motor::I2cMotorDriver;
    use crate::panic::OptionalExt;
    use crate::transport::{RxQueue, UartTransport};
    use bilatherm::capability::Transport;
    use bilatherm::planner::macrocycle::ProfileRange;
    use bilatherm::planner::pattern::{PatternKind, PatternParams};
    use bilatherm::planner::{Planner, PlannerTick, Profile, SchedulerCommand, TransportCommand};
    use bilatherm::rng::SplitMix64;
    use bilatherm::scheduler::Scheduler;
    use bilatherm::sync::wire::{Ping, Pong};
    use bilatherm::sync::Synchronizer;
    use bilatherm::time::LocalTimestamp;
    use bilatherm::MonotonicClock;
    use cortex_m::singleton;
    use heapless::spsc::{Consumer, Producer};
    use stm32f1xx_hal::adc::Adc;
    use stm32f1xx_hal::gpio::PinState;
    use stm32f1xx_hal::i2c::{BlockingI2c, DutyCycle, Mode as I2cMode};
    use stm32f1xx_hal::prelude::*;
    use stm32f1xx_hal::serial::{Config as SerialConfig, Rx, Serial};

    type Motor = I2cMotorDriver<
        BlockingI2c<stm32f1xx_hal::device::I2C1, (pins::B6_I2C1_SCL, pins::B7_I2C1_SDA)>,
    >;
    type Timer = OneshotAlarm<{ config::clk::TIM1CLK_HZ }>;

    #[shared]
    struct Shared {
        clock: MonotonicClock<DwtMicros>,
        sync: Synchronizer,
        planner: Planner<SplitMix64>,
        scheduler: Scheduler<Motor, Timer>,
        transport: UartTransport,
    }

    #[local]
    struct Local {
        rx_periph: Rx<stm32f1xx_hal::device::USART1>,
        rx_producer: Producer<'static, u8, { config::transport::RX_QUEUE_CAP }>,
        debug_led: pins::C13_DEBUG_LED,
        /// Local clock reading at the last PING this device sent; gates
        /// `maybe_initiate_ping`'s cadence. `idle`-local rather than a
        /// function-local `static mut`, since `idle` never re-enters itself.
        last_ping_at: LocalTimestamp,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::info!("Dumping config...");

        config::dump_to_log();

        defmt::info!("Starting init...");

        let mut afio = cx.device.AFIO.constrain();
        let mut flash = cx.device.FLASH.constrain();
        let mut gpioa = cx.device.GPIOA.split();
        let mut gpiob = cx.device.GPIOB.split();
        let mut gpioc = cx.device.GPIOC.split();
        let rcc = cx.device.RCC.constrain();

        defmt::info!("Configuring clocks...");

        let clocks = rcc
            .cfgr
            .use_hse(config::clk::HSE_FREQ)
            .sysclk(config::clk::SYSCLK)
            .pclk1(config::clk::PCLK1)
            .pclk2(config::clk::PCLK2)
            .freeze(&mut flash.acr);

        assert!(config::clk::SYSCLK == clocks.sysclk());
        assert!(config::clk::PCLK1 == clocks.pclk1());
        assert!(config::clk::PCLK2 == clocks.pclk2());

        defmt::info!("Seeding pattern PRNG from entropy pin...");

        let entropy_pin: pins::A1_ADC1C1_ENTROPY = gpioa.pa1.into_analog(&mut gpioa.crl);
        let mut adc1 = Adc::adc1(cx.device.ADC1, clocks);
        let mut entropy_pin = entropy_pin;
        let seed: u16 = adc1.read(&mut entropy_pin).unwrap_infallible();
        let rng = SplitMix64::new(u64::from(seed) ^ 0x9E3779B97F4A7C15);

        defmt::info!("Configuring UART transport to peer glove...");

        let tx_pin: pins::A9_USART1_TX = gpioa.pa9.into_alternate_push_pull(&mut gpioa.crh);
        let rx_pin: pins::A10_USART1_RX = gpioa.pa10.into_floating_input(&mut gpioa.crh);

        let serial = Serial::new(
            cx.device.USART1,
            (tx_pin, rx_pin),
            &mut afio.mapr,
            SerialConfig::default().baudrate(config::transport::BAUD),
            &clocks,
        );
        let (tx, mut rx) = serial.split();
        rx.listen();

        let rx_queue = singleton!(: RxQueue = RxQueue::new()).unwrap();
        let (rx_producer, rx_consumer) = rx_queue.split();

        let transport = UartTransport::new(tx, rx_consumer);

        defmt::info!("Configuring I2C motor driver link...");

        let scl: pins::B6_I2C1_SCL = gpiob.pb6.into_alternate_open_drain(&mut gpiob.crl);
        let sda: pins::B7_I2C1_SDA = gpiob.pb7.into_alternate_open_drain(&mut gpiob.crl);

        let i2c = BlockingI2c::i2c1(
            cx.device.I2C1,
            (scl, sda),
            &mut afio.mapr,
            I2cMode::Fast { frequency: config::motor::I2C_FREQ.to_Hz().Hz(), duty_cycle: DutyCycle::Ratio2to1 },
            clocks,
            1000,
            10,
            1000,
            1000,
        );
        let motor = I2cMotorDriver::new(i2c);

        defmt::info!("Configuring scheduler alarm timer...");

        let _alarm_pin: pins::A8_TIM1C1_ALARM = gpioa.pa8.into_alternate_push_pull(&mut gpioa.crh);
        let timer = OneshotAlarm::new(cx.device.TIM1, &clocks);
        let scheduler = Scheduler::new(motor, timer);

        defmt::info!("Configuring monotonic clock source...");

        let mut core = cx.core;
        let counter = DwtMicros::new(&mut core.DWT, &mut core.DCB, clocks.sysclk().to_Hz());
        let clock = MonotonicClock::new(counter);

        defmt::info!("Configuring debug indicator LED...");

        let led: pins::C13_DEBUG_LED = gpioc
            .pc13
            .into_push_pull_output_with_state(&mut gpioc.crh, PinState::High);

        let sync = Synchronizer::new();
        let planner = Planner::new(rng);

        defmt::info!("Finished init.");

        (
            Shared { clock, sync, planner, scheduler, transport },
            Local { rx_periph: rx, rx_producer, debug_led: led, last_ping_at: LocalTimestamp::ZERO },
            init::Monotonics(),
        )
    }

    // Task priorities
    //
    // Prio | Task          | Description
    //    2 | tim1_up       | scheduler alarm ISR (flag-only, spec.md §4.D.2)
    //    1 | usart1        | UART RX ISR (byte-only, into the spsc queue)
    //    0 | idle          | main loop: PTP, macrocycle lifecycle, scheduler hand-off

    /// Scheduler alarm ISR. Does exactly two things and returns (spec.md
    /// §4.D.2): acknowledge the hardware interrupt flag, and set the
    /// scheduler's pending-activation flag. Must never touch the motor
    /// driver or transport.
    #[task(binds = TIM1_UP, shared = [scheduler], priority = 2)]
    fn tim1_up(mut cx: tim1_up::Context) {
        ack_tim1_update_interrupt();
        cx.shared.scheduler.lock(|scheduler| scheduler.mark_fired());
    }

    /// UART RX ISR: moves one byte from the hardware data register into the
    /// lock-free queue `transport::UartTransport::try_recv` drains from
    /// main-loop context. No framing or parsing happens here.
    #[task(binds = USART1, local = [rx_periph, rx_producer], priority = 1)]
    fn usart1(cx: usart1::Context) {
        match cx.local.rx_periph.read() {
            Ok(byte) => {
                if cx.local.rx_producer.enqueue(byte).is_err() {
                    defmt::warn!("rx queue full, dropping byte");
                }
            }
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(_)) => {
                defmt::warn!("UART RX framing/overrun error");
            }
        }
    }

    #[idle(shared = [clock, sync, planner, scheduler, transport], local = [debug_led, last_ping_at])]
    fn idle(mut cx: idle::Context) -> ! {
        // A real build wires `start_session` from the phone-facing command
        // parser and session state machine (both out of scope here); this
        // default profile exists so the core's full loop runs standalone.
        let profile = default_profile();
        cx.shared.planner.lock(|planner| planner.start_session(profile, 3600));

        loop {
            cx.local.debug_led.toggle();

            let now = cx.shared.clock.lock(|clock| clock.now());

            let mut recv_buf = [0u8; config::transport::MAX_FRAME_LEN];
            let received = cx.shared.transport.lock(|transport| transport.try_recv(&mut recv_buf));

            if let Some(len) = received {
                handle_inbound_message(&mut cx, now, &recv_buf[..len]);
            }

            let scheduling_complete = cx.shared.scheduler.lock(|s| s.scheduling_complete());

            if config::role::IS_PRIMARY {
                let tick = (&mut cx.shared.planner, &mut cx.shared.sync)
                    .lock(|planner, sync| planner.poll_primary(now, sync, scheduling_complete));
                match tick {
                    PlannerTick::Started(output) => {
                        apply_scheduler_commands(&mut cx, now, &output.scheduler_commands);
                        let TransportCommand::Send(wire) = output.transport_command;
                        let sent = cx.shared.transport.lock(|t| t.send(wire.as_bytes()));
                        if !sent {
                            cx.shared.planner.lock(|p| p.note_transport_send_failed());
                        }
                    }
                    PlannerTick::Idle | PlannerTick::CycleComplete => {}
                }
            }

            cx.shared.scheduler.lock(|s| s.poll(now));

            // Periodic PING initiation (spec.md §4.B.1): either device may
            // initiate, and the PRIMARY must too — it's the side that has
            // to be `valid` to stamp peer-time base/offset (§4.C.3) and
            // compute adaptive lead (§4.C.4), so it cannot rely solely on
            // the peer pinging it.
            maybe_initiate_ping(&mut cx, now);
        }
    }

    fn default_profile() -> Profile {
        Profile {
            pattern_kinds: [
                PatternKind::RandomPermutation,
                PatternKind::RandomPermutation,
                PatternKind::Mirrored { randomized: false },
            ],
            pattern_params: PatternParams {
                num_fingers: bilatherm::config::planner::NUM_FINGERS,
                burst_on_ms: 150,
                burst_off_ms: 100,
                jitter_fraction: 0.1,
                mirrored: true,
            },
            range: ProfileRange {
                amp_min: 60,
                amp_max: 100,
                freq_randomized: false,
                freq_min_offset: 0,
                freq_max_offset: 0,
                fixed_freq_offset: 0,
            },
            burst_duration_ms: 120,
        }
    }

    fn apply_scheduler_commands(
        cx: &mut idle::Context,
        now: LocalTimestamp,
        commands: &[SchedulerCommand],
    ) {
        cx.shared.scheduler.lock(|scheduler| {
            for command in commands {
                match *command {
                    SchedulerCommand::Schedule { fire_time_us, finger, amplitude, duration_ms, frequency_hz } => {
                        scheduler.schedule(now, fire_time_us, finger, amplitude, duration_ms, frequency_hz);
                    }
                    SchedulerCommand::CancelAll => scheduler.cancel_all(),
                }
            }
        });
    }

    fn handle_inbound_message(cx: &mut idle::Context, now: LocalTimestamp, message: &[u8]) {
        let Ok(line) = core::str::from_utf8(message) else {
            defmt::warn!("inbound message was not valid utf-8");
            return;
        };

        if let Ok(ping) = Ping::parse(line) {
            // Respond to PING: only the PRIMARY's inbound side needs this
            // in the steady state, but either role may be asked to pong.
            let t2 = now;
            let t3 = cx.shared.clock.lock(|clock| clock.now());
            let pong = cx.shared.sync.lock(|sync| sync.on_ping_received(ping, t2, t3));
            let wire = pong.serialize();
            let _ = cx.shared.transport.lock(|t| t.send(wire.as_bytes()));
            return;
        }

        if let Ok(pong) = Pong::parse(line) {
            let t4 = now;
            let _ = cx.shared.sync.lock(|sync| sync.on_pong_received(pong, t4));
            return;
        }

        if line.starts_with("MC:") && !config::role::IS_PRIMARY {
            let result = (&mut cx.shared.planner, &mut cx.shared.sync)
                .lock(|planner, sync| planner.accept_macrocycle(line, now, sync));
            if let Ok(commands) = result {
                apply_scheduler_commands(cx, now, &commands);
            }
        }
    }

    fn maybe_initiate_ping(cx: &mut idle::Context, now: LocalTimestamp) {
        // A fixed-cadence PTP probe is enough for this firmware: the idle
        // loop runs far more often than the ~1s cadence a real session
        // needs, so gating on elapsed time since the last PING is a cheap
        // way to avoid flooding the link with PINGs every pass.
        const PING_PERIOD_US: u64 = 1_000_000;

        if now.0.saturating_sub(cx.local.last_ping_at.0) < PING_PERIOD_US {
            return;
        }
        *cx.local.last_ping_at = now;

        let ping = cx.shared.sync.lock(|sync| sync.initiate_ping(now));
        let wire = ping.serialize();
        let _ = cx.shared.transport.lock(|t| t.send(wire.as_bytes()));
    }
}
