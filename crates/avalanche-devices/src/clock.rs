//! Clock and PLL controller.
//!
//! Mostly storage, with one hardware quirk the guest's PLL setup loop
//! depends on: the lock bit of each PLL status word reads differently
//! depending on whether a divisor has been programmed. A stored value of 4
//! (bypass, no divisor) reads back with bit 0 clear; anything else reads
//! back with bit 0 set, i.e. "locked".

use avalanche_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use tracing::{debug, trace};

use crate::regs::RegisterWindow;

pub const CLOCK_WINDOW_LEN: usize = 0x100;

/// PLL status words with the lock-bit read quirk.
const PLL_STATUS_WORDS: [usize; 4] = [0x0c, 0x14, 0x1c, 0x24];

const POWER_STATE_NAMES: [&str; 4] = ["run", "idle", "standby", "power down"];

const TAG_REGS: u16 = 1;

pub struct ClockCtrl {
    regs: RegisterWindow,
}

impl Default for ClockCtrl {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockCtrl {
    pub fn new() -> Self {
        Self {
            regs: RegisterWindow::new(CLOCK_WINDOW_LEN),
        }
    }

    pub fn reset(&mut self) {
        self.regs.clear();
    }

    pub fn mmio_read(&mut self, offset: u32) -> u32 {
        let off = offset as usize;
        let stored = self.regs.read_word(off);
        let value = if PLL_STATUS_WORDS.contains(&off) {
            if stored == 4 {
                stored & !1
            } else {
                stored | 1
            }
        } else {
            stored
        };
        trace!(target: "clock", offset, value, "read");
        value
    }

    pub fn mmio_write(&mut self, offset: u32, value: u32) {
        trace!(target: "clock", offset, value, "write");
        if offset == 0 {
            let previous = self.regs.read_word(0);
            let state = (value >> 30) as usize;
            if state != (previous >> 30) as usize {
                debug!(
                    target: "clock",
                    state = POWER_STATE_NAMES[state & 3],
                    "global power state changed"
                );
            }
        }
        self.regs.write_word(offset as usize, value);
    }
}

impl IoSnapshot for ClockCtrl {
    const DEVICE_ID: [u8; 4] = *b"CLKC";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(TAG_REGS, self.regs.as_bytes().to_vec());
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID, Self::DEVICE_VERSION)?;
        let mut regs = RegisterWindow::new(CLOCK_WINDOW_LEN);
        if let Some(b) = r.field_bytes(TAG_REGS) {
            if !regs.load_bytes(b) {
                return Err(SnapshotError::InvalidFieldEncoding("clock regs size"));
            }
        }
        self.regs = regs;
        Ok(())
    }
}
