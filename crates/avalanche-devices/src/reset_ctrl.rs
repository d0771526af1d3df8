//! Reset controller.
//!
//! Word 0 is the peripheral reset mask; writes are diffed against the
//! previous value so the log shows exactly which blocks came out of or went
//! into reset. A write to word 4 is a software system-reset request, which
//! is queued for the host machine loop to act on.

use std::collections::VecDeque;

use avalanche_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use tracing::{debug, trace};

use crate::regs::RegisterWindow;

pub const RESET_WINDOW_LEN: usize = 0x200;

pub const RESET_PERIPHERAL: usize = 0x00;
pub const RESET_SOFTWARE: usize = 0x04;
pub const RESET_STATUS: usize = 0x08;

/// Reset requests the model can raise towards the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetEvent {
    /// Guest wrote the software-reset register; the machine should reboot.
    System,
}

/// Peripherals behind each bit of the reset mask, for diagnostics.
const RESET_BIT_NAMES: [&str; 32] = [
    "uncpmac0",     // 0
    "bbif",         // 1
    "atm sar",      // 2
    "usb slave",    // 3
    "vlynq0",       // 4
    "bit5",         // 5
    "dsp",          // 6
    "ephy",         // 7
    "bit8",         // 8
    "adsl",         // 9
    "bit10",        // 10
    "vdma",         // 11
    "fser",         // 12
    "bit13",        // 13
    "bit14",        // 14
    "bit15",        // 15
    "vlynq1",       // 16
    "uncpmac1",     // 17
    "i2c",          // 18
    "dma",          // 19
    "bist",         // 20
    "bit21",        // 21
    "mdio",         // 22
    "bit23",        // 23
    "bit24",        // 24
    "bit25",        // 25
    "ohio wdt",     // 26
    "bit27",        // 27
    "bit28",        // 28
    "bit29",        // 29
    "bit30",        // 30
    "bit31",        // 31
];

const TAG_REGS: u16 = 1;

pub struct ResetCtrl {
    regs: RegisterWindow,
    events: VecDeque<ResetEvent>,
}

impl Default for ResetCtrl {
    fn default() -> Self {
        Self::new()
    }
}

impl ResetCtrl {
    pub fn new() -> Self {
        Self {
            regs: RegisterWindow::new(RESET_WINDOW_LEN),
            events: VecDeque::new(),
        }
    }

    pub fn reset(&mut self) {
        self.regs.clear();
        self.events.clear();
    }

    /// Drains queued reset requests; the host machine loop polls this.
    pub fn take_events(&mut self) -> Vec<ResetEvent> {
        self.events.drain(..).collect()
    }

    pub fn mmio_read(&mut self, offset: u32) -> u32 {
        let value = self.regs.read_word(offset as usize);
        trace!(target: "reset", offset, value, "read");
        value
    }

    pub fn mmio_write(&mut self, offset: u32, value: u32) {
        trace!(target: "reset", offset, value, "write");
        match offset as usize {
            RESET_PERIPHERAL => {
                let previous = self.regs.read_word(RESET_PERIPHERAL);
                let changed = previous ^ value;
                for bit in 0..32 {
                    if changed & (1 << bit) != 0 {
                        debug!(
                            target: "reset",
                            peripheral = RESET_BIT_NAMES[bit],
                            enabled = value & (1 << bit) != 0,
                            "peripheral reset bit changed"
                        );
                    }
                }
                self.regs.write_word(RESET_PERIPHERAL, value);
            }
            RESET_SOFTWARE => {
                debug!(target: "reset", value, "software reset requested");
                self.regs.write_word(RESET_SOFTWARE, value);
                self.events.push_back(ResetEvent::System);
            }
            off => self.regs.write_word(off, value),
        }
    }
}

impl IoSnapshot for ResetCtrl {
    const DEVICE_ID: [u8; 4] = *b"RSTC";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(TAG_REGS, self.regs.as_bytes().to_vec());
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID, Self::DEVICE_VERSION)?;
        let mut regs = RegisterWindow::new(RESET_WINDOW_LEN);
        if let Some(b) = r.field_bytes(TAG_REGS) {
            if !regs.load_bytes(b) {
                return Err(SnapshotError::InvalidFieldEncoding("reset regs size"));
            }
        }
        self.regs = regs;
        // Pending reset requests are host-transient and intentionally not
        // carried across a snapshot.
        self.events.clear();
        Ok(())
    }
}
