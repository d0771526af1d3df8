//! VLYNQ serial-bus bridge, register interface only.
//!
//! The remote bus behind the bridge is not modelled; the guest just needs
//! the revision id, and a link that comes up as soon as the port is taken
//! out of reset.

use avalanche_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use tracing::trace;

use crate::regs::RegisterWindow;

pub const VLYNQ_WINDOW_LEN: usize = 0x100;

pub const VLYNQ_REVID: usize = 0x00;
pub const VLYNQ_CTRL: usize = 0x04;
pub const VLYNQ_STAT: usize = 0x08;

/// Revision 2.6, what the AR7 reports.
pub const VLYNQ_REVISION: u32 = 0x0001_0206;

const CTRL_RESET: u32 = 1 << 0;
const STAT_LINK: u32 = 1 << 0;

const TAG_REGS: u16 = 1;

pub struct Vlynq {
    index: usize,
    regs: RegisterWindow,
}

impl Vlynq {
    pub fn new(index: usize) -> Self {
        let mut vlynq = Self {
            index,
            regs: RegisterWindow::new(VLYNQ_WINDOW_LEN),
        };
        vlynq.reset();
        vlynq
    }

    pub fn reset(&mut self) {
        self.regs.clear();
        self.regs.write_word(VLYNQ_REVID, VLYNQ_REVISION);
    }

    pub fn mmio_read(&mut self, offset: u32) -> u32 {
        let value = match offset as usize {
            VLYNQ_REVID => VLYNQ_REVISION,
            off => self.regs.read_word(off),
        };
        trace!(target: "vlynq", index = self.index, offset, value, "read");
        value
    }

    pub fn mmio_write(&mut self, offset: u32, value: u32) {
        trace!(target: "vlynq", index = self.index, offset, value, "write");
        match offset as usize {
            VLYNQ_CTRL => {
                if value & CTRL_RESET == 0 {
                    // Out of reset: the (virtual) link partner is always there.
                    self.regs.set_bits(VLYNQ_STAT, STAT_LINK);
                } else {
                    self.regs.clear_bits(VLYNQ_STAT, STAT_LINK);
                }
                self.regs.write_word(VLYNQ_CTRL, value);
            }
            off => self.regs.write_word(off, value),
        }
    }
}

impl IoSnapshot for Vlynq {
    const DEVICE_ID: [u8; 4] = *b"VLNQ";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(TAG_REGS, self.regs.as_bytes().to_vec());
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID, Self::DEVICE_VERSION)?;
        let mut regs = RegisterWindow::new(VLYNQ_WINDOW_LEN);
        if let Some(b) = r.field_bytes(TAG_REGS) {
            if !regs.load_bytes(b) {
                return Err(SnapshotError::InvalidFieldEncoding("vlynq regs size"));
            }
        }
        self.regs = regs;
        Ok(())
    }
}
