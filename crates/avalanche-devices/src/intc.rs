//! Interrupt controller.
//!
//! Two 32-bit banks of enable masks gate the peripheral interrupt inputs.
//! Accepted inputs map to mask channels as `channel = irq - 8`; on an
//! enabled rising level the controller publishes `(channel << 16) | channel`
//! in the priority vector word and drives the CPU's hardware interrupt
//! line 0 (Cause bit `0x400`). Falling level clears the vector and the
//! line. Everything else in the window is guest-visible storage.

use avalanche_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use tracing::{trace, warn};

use crate::irq::{CpuIrqSink, IRQ_CPMAC0, IRQ_CPMAC1, IRQ_UART0, IRQ_UART1};
use crate::regs::RegisterWindow;

pub const INTC_WINDOW_LEN: usize = 0x300;

/// Word indexes of the named registers.
pub const INTSR1: usize = 0;
pub const INTSR2: usize = 1;
pub const INTCR1: usize = 4;
pub const INTCR2: usize = 5;
pub const INTESR1: usize = 8;
pub const INTESR2: usize = 9;
pub const INTECR1: usize = 12;
pub const INTECR2: usize = 13;
/// Priority interrupt index register; doubles as the delivery vector.
pub const PINTIR: usize = 16;
pub const INTMSR: usize = 17;
pub const INTPOLR1: usize = 20;
pub const INTPOLR2: usize = 21;
pub const INTTYPR1: usize = 24;
pub const INTTYPR2: usize = 25;

const TAG_REGS: u16 = 1;
const TAG_INTMASK0: u16 = 2;
const TAG_INTMASK1: u16 = 3;

pub struct Ar7Intc {
    regs: RegisterWindow,
    intmask: [u32; 2],
    cpu: Box<dyn CpuIrqSink>,
}

impl Ar7Intc {
    pub fn new(cpu: Box<dyn CpuIrqSink>) -> Self {
        Self {
            regs: RegisterWindow::new(INTC_WINDOW_LEN),
            intmask: [0; 2],
            cpu,
        }
    }

    pub fn reset(&mut self) {
        self.regs.clear();
        self.intmask = [0; 2];
        self.cpu.set_irq_pending(false);
    }

    pub fn intmask(&self, bank: usize) -> u32 {
        self.intmask[bank]
    }

    pub fn mmio_read(&mut self, offset: u32) -> u32 {
        let word = offset as usize / 4;
        let value = match word {
            INTESR1 => self.intmask[0],
            INTESR2 => self.intmask[1],
            _ => self.regs.read_word(offset as usize),
        };
        trace!(target: "intc", offset, value, "read");
        value
    }

    pub fn mmio_write(&mut self, offset: u32, value: u32) {
        trace!(target: "intc", offset, value, "write");
        let word = offset as usize / 4;
        match word {
            INTESR1 => self.intmask[0] |= value,
            INTESR2 => self.intmask[1] |= value,
            INTECR1 => self.intmask[0] &= !value,
            INTECR2 => self.intmask[1] &= !value,
            _ => self.regs.write_word(offset as usize, value),
        }
        // Keep the enable-status words readable through the backing store
        // too (snapshot parity).
        self.regs.write_word(INTESR1 * 4, self.intmask[0]);
        self.regs.write_word(INTESR2 * 4, self.intmask[1]);
    }

    /// Peripheral-side line change. Only the four wired inputs are
    /// accepted; anything else is a modelling bug in the caller and is
    /// dropped with a warning.
    pub fn set_line(&mut self, irq: u32, level: bool) {
        match irq {
            IRQ_UART0 | IRQ_UART1 | IRQ_CPMAC0 | IRQ_CPMAC1 => {}
            _ => {
                warn!(target: "intc", irq, level, "line change on unwired input");
                return;
            }
        }
        let channel = irq - 8;
        if level {
            let bank = (channel / 32) as usize;
            let bit = 1u32 << (channel % 32);
            if self.intmask[bank] & bit == 0 {
                trace!(target: "intc", irq, channel, "interrupt masked");
                return;
            }
            self.regs.write_word(PINTIR * 4, (channel << 16) | channel);
            self.cpu.set_irq_pending(true);
        } else {
            self.regs.write_word(PINTIR * 4, 0);
            self.cpu.set_irq_pending(false);
        }
    }
}

impl IoSnapshot for Ar7Intc {
    const DEVICE_ID: [u8; 4] = *b"INTC";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(TAG_REGS, self.regs.as_bytes().to_vec());
        w.field_u32(TAG_INTMASK0, self.intmask[0]);
        w.field_u32(TAG_INTMASK1, self.intmask[1]);
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID, Self::DEVICE_VERSION)?;
        let mut regs = RegisterWindow::new(INTC_WINDOW_LEN);
        if let Some(b) = r.field_bytes(TAG_REGS) {
            if !regs.load_bytes(b) {
                return Err(SnapshotError::InvalidFieldEncoding("intc regs size"));
            }
        }
        let intmask = [
            r.field_u32(TAG_INTMASK0, "intc intmask0")?.unwrap_or(0),
            r.field_u32(TAG_INTMASK1, "intc intmask1")?.unwrap_or(0),
        ];

        self.regs = regs;
        self.intmask = intmask;
        // Re-drive the CPU line from the restored vector word.
        let pending = self.regs.read_word(PINTIR * 4) != 0;
        self.cpu.set_irq_pending(pending);
        Ok(())
    }
}
