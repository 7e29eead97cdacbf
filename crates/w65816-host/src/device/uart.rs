//! Virtual UART: a tiny example device demonstrating interrupt aggregation.
//!
//! Not part of the processor core — a host-crate-only device in the spirit
//! of `rustynes-cpu::bus`'s doc-comment `FlatBus` example, sized to actually
//! exercise [`crate::mapper::Mapper::interrupt_line`] rather than just
//! illustrate the `Device` trait.

use serde_json::json;

use super::Device;
use crate::save_state::SaveStateError;

const REG_STATUS: u32 = 0;
const REG_CONTROL: u32 = 1;
const REG_DATA: u32 = 2;
const REG_BAUD: u32 = 3;

const STATUS_RX_READY: u8 = 0b0000_0001;
const STATUS_TX_EMPTY: u8 = 0b0000_0010;
const CONTROL_RX_IRQ_ENABLE: u8 = 0b0000_0001;

/// A register-mapped serial port: status, control, data, and baud-rate
/// registers at four consecutive addresses.
#[derive(Debug, Clone, Default)]
pub struct Uart {
    rx: Option<u8>,
    control: u8,
    baud: u8,
    transmitted: Vec<u8>,
}

impl Uart {
    /// A UART with no pending RX byte, interrupts disabled, baud rate zero.
    #[must_use]
    pub fn new() -> Self {
        Uart::default()
    }

    /// Simulate an incoming byte arriving on the line.
    pub fn receive(&mut self, byte: u8) {
        self.rx = Some(byte);
    }

    /// Bytes written to the data register since the last call, in order,
    /// draining the internal buffer.
    pub fn take_transmitted(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.transmitted)
    }
}

impl Device for Uart {
    fn read(&mut self, offset: u32) -> Option<u8> {
        match offset {
            REG_STATUS => {
                let mut status = STATUS_TX_EMPTY;
                if self.rx.is_some() {
                    status |= STATUS_RX_READY;
                }
                Some(status)
            }
            REG_CONTROL => Some(self.control),
            REG_DATA => Some(self.rx.take().unwrap_or(0)),
            REG_BAUD => Some(self.baud),
            _ => None,
        }
    }

    fn write(&mut self, offset: u32, value: u8) {
        match offset {
            REG_STATUS => {}
            REG_CONTROL => self.control = value,
            REG_DATA => self.transmitted.push(value),
            REG_BAUD => self.baud = value,
            _ => {}
        }
    }

    fn peek(&self, offset: u32) -> Option<u8> {
        match offset {
            REG_STATUS => {
                let mut status = STATUS_TX_EMPTY;
                if self.rx.is_some() {
                    status |= STATUS_RX_READY;
                }
                Some(status)
            }
            REG_CONTROL => Some(self.control),
            REG_DATA => self.rx,
            REG_BAUD => Some(self.baud),
            _ => None,
        }
    }

    fn interrupting(&self) -> bool {
        self.rx.is_some() && self.control & CONTROL_RX_IRQ_ENABLE != 0
    }

    fn reset(&mut self) {
        self.rx = None;
        self.control = 0;
        self.baud = 0;
        self.transmitted.clear();
    }

    fn kind(&self) -> &'static str {
        "uart"
    }

    fn size(&self) -> u32 {
        4
    }

    fn params(&self) -> serde_json::Value {
        json!({})
    }

    fn to_state(&self) -> serde_json::Value {
        json!({ "rx": self.rx, "control": self.control, "baud": self.baud })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<(), SaveStateError> {
        self.rx = state.get("rx").and_then(|v| v.as_u64()).map(|v| v as u8);
        if let Some(control) = state.get("control").and_then(serde_json::Value::as_u64) {
            self.control = control as u8;
        }
        if let Some(baud) = state.get("baud").and_then(serde_json::Value::as_u64) {
            self.baud = baud as u8;
        }
        Ok(())
    }
}

/// Construct a [`Uart`] from save-state `params` (currently unused).
///
/// # Errors
///
/// Never fails; present for symmetry with the other device constructors in
/// [`super::registry`].
pub(crate) fn from_params(_params: &serde_json::Value) -> Result<Box<dyn Device>, SaveStateError> {
    Ok(Box::new(Uart::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_ready_bit_tracks_pending_byte() {
        let mut uart = Uart::new();
        assert_eq!(uart.read(REG_STATUS).unwrap() & STATUS_RX_READY, 0);
        uart.receive(0x41);
        assert_ne!(uart.read(REG_STATUS).unwrap() & STATUS_RX_READY, 0);
    }

    #[test]
    fn reading_data_register_clears_rx_ready() {
        let mut uart = Uart::new();
        uart.receive(0x41);
        assert_eq!(uart.read(REG_DATA), Some(0x41));
        assert_eq!(uart.read(REG_STATUS).unwrap() & STATUS_RX_READY, 0);
    }

    #[test]
    fn interrupts_only_when_enabled_and_rx_pending() {
        let mut uart = Uart::new();
        uart.receive(0x41);
        assert!(!uart.interrupting());
        uart.write(REG_CONTROL, CONTROL_RX_IRQ_ENABLE);
        assert!(uart.interrupting());
        uart.read(REG_DATA);
        assert!(!uart.interrupting());
    }

    #[test]
    fn writes_to_data_register_are_collected() {
        let mut uart = Uart::new();
        uart.write(REG_DATA, b'h');
        uart.write(REG_DATA, b'i');
        assert_eq!(uart.take_transmitted(), vec![b'h', b'i']);
        assert!(uart.take_transmitted().is_empty());
    }
}
