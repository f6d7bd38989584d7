//! UART transport to the peer glove, framed on [`bilatherm::config::wire::FRAMING_BYTE`]
//! (spec.md §6). Bytes arrive one at a time from the `USART1` RX interrupt
//! into a lock-free `heapless::spsc` queue; [`Transport::try_recv`]
//! assembles them into whole framed messages on the main-loop side.

use crate::config::transport::{MAX_FRAME_LEN, RX_QUEUE_CAP};
use bilatherm::capability::Transport;
use bilatherm::config::wire::FRAMING_BYTE;
use embedded_hal::blocking::serial::Write as _;
use embedded_hal::serial::Write as _;
use heapless::spsc::Consumer;
use heapless::Vec;
use stm32f1xx_hal::device::USART1;
use stm32f1xx_hal::serial::Tx;

pub type RxQueue = heapless::spsc::Queue<u8, RX_QUEUE_CAP>;

pub struct UartTransport {
    tx: Tx<USART1>,
    rx: Consumer<'static, u8, RX_QUEUE_CAP>,
    partial: Vec<u8, MAX_FRAME_LEN>,
}

impl UartTransport {
    pub fn new(tx: Tx<USART1>, rx: Consumer<'static, u8, RX_QUEUE_CAP>) -> Self {
        Self { tx, rx, partial: Vec::new() }
    }
}

impl Transport for UartTransport {
    fn send(&mut self, message: &[u8]) -> bool {
        self.tx.bwrite_all(message).is_ok() && nb::block!(self.tx.flush()).is_ok()
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Option<usize> {
        while let Some(byte) = self.rx.dequeue() {
            if self.partial.push(byte).is_err() {
                // Overlong line with no framing byte in sight: drop and resync.
                defmt::warn!("transport: dropping overlong unframed line");
                self.partial.clear();
                continue;
            }
            if byte == FRAMING_BYTE {
                let len = self.partial.len().min(buf.len());
                buf[..len].copy_from_slice(&self.partial[..len]);
                self.partial.clear();
                return Some(len);
            }
        }
        None
    }
}
