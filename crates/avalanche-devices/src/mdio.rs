//! MDIO management interface and the attached PHY.
//!
//! The guest talks to the PHY through `useraccess0` transactions; the model
//! completes each transaction synchronously against a small PHY register
//! file. The PHY itself only pretends: reset and renegotiate requests are
//! observed on read-back and answered with the post-handshake register
//! values a real transceiver would settle on.

use avalanche_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use tracing::trace;

use crate::regs::RegisterWindow;

pub const MDIO_WINDOW_LEN: usize = 0x88;

/// Word indexes.
pub const MDIO_VER: usize = 0;
pub const MDIO_CONTROL: usize = 1;
pub const MDIO_ALIVE: usize = 2;
pub const MDIO_LINK: usize = 3;
pub const MDIO_USERACCESS0: usize = 0x20;

/// `useraccess0` bit fields.
pub const USERACCESS_GO: u32 = 1 << 31;
pub const USERACCESS_WRITE: u32 = 1 << 30;
pub const USERACCESS_ACK: u32 = 1 << 29;
const USERACCESS_REGADR_SHIFT: u32 = 21;
const USERACCESS_PHYADR_SHIFT: u32 = 16;
const USERACCESS_DATA: u32 = 0xffff;

/// PHY register numbers.
pub const PHY_CONTROL_REG: u32 = 0;
pub const PHY_STATUS_REG: u32 = 1;
pub const NWAY_ADVERTISE_REG: u32 = 4;
pub const NWAY_REMADVERTISE_REG: u32 = 5;

/// PHY control bits.
pub const PHY_RESET: u16 = 0x8000;
pub const AUTO_NEGOTIATE_EN: u16 = 0x1000;
pub const PHY_ISOLATE: u16 = 0x0400;
pub const RENEGOTIATE: u16 = 0x0200;

/// Status / autonegotiation bits.
pub const NWAY_CAPABLE: u16 = 0x0008;
pub const NWAY_FD100: u16 = 0x0100;
pub const NWAY_HD100: u16 = 0x0080;
pub const NWAY_FD10: u16 = 0x0040;
pub const NWAY_HD10: u16 = 0x0020;
pub const NWAY_AUTO: u16 = 0x0001;

/// Management-bus address the internal PHY answers on.
const INTERNAL_PHY_ADDR: u32 = 31;
const PHY_REG_COUNT: usize = 6;

const TAG_REGS: u16 = 1;
const TAG_PHY0: u16 = 2;
const TAG_REGADDR: u16 = 3;
const TAG_PHYADDR: u16 = 4;
const TAG_DATA: u16 = 5;

pub struct Mdio {
    regs: RegisterWindow,
    phy0: [u16; PHY_REG_COUNT],
    // Last decoded transaction fields.
    regaddr: u32,
    phyaddr: u32,
    data: u32,
}

impl Default for Mdio {
    fn default() -> Self {
        Self::new()
    }
}

impl Mdio {
    pub fn new() -> Self {
        let mut mdio = Self {
            regs: RegisterWindow::new(MDIO_WINDOW_LEN),
            phy0: [0; PHY_REG_COUNT],
            regaddr: 0,
            phyaddr: 0,
            data: 0,
        };
        mdio.reset();
        mdio
    }

    pub fn reset(&mut self) {
        self.regs.clear();
        self.regs.write_word(MDIO_VER * 4, 0x0007_0101);
        self.regs.write_word(MDIO_CONTROL * 4, 0);
        self.regs.write_word(MDIO_ALIVE * 4, 0xffff_ffff);
        self.phy0 = [0; PHY_REG_COUNT];
        self.phy0[PHY_CONTROL_REG as usize] = AUTO_NEGOTIATE_EN;
        self.phy0[PHY_STATUS_REG as usize] = 0x7801 | NWAY_CAPABLE;
        self.phy0[NWAY_ADVERTISE_REG as usize] =
            NWAY_FD100 | NWAY_HD100 | NWAY_FD10 | NWAY_HD10 | NWAY_AUTO;
        self.phy0[NWAY_REMADVERTISE_REG as usize] = NWAY_AUTO;
        self.regaddr = 0;
        self.phyaddr = 0;
        self.data = 0;
    }

    pub fn phy_reg(&self, reg: u32) -> u16 {
        self.phy0[reg as usize]
    }

    pub fn mmio_read(&mut self, offset: u32) -> u32 {
        let value = self.regs.read_word(offset as usize);
        trace!(target: "mdio", offset, value, "read");
        value
    }

    pub fn mmio_write(&mut self, offset: u32, value: u32) {
        trace!(target: "mdio", offset, value, "write");
        let word = offset as usize / 4;
        match word {
            MDIO_USERACCESS0 => self.useraccess(value),
            _ => self.regs.write_word(offset as usize, value),
        }
    }

    fn useraccess(&mut self, value: u32) {
        if value & USERACCESS_GO == 0 {
            self.regs.write_word(MDIO_USERACCESS0 * 4, value);
            return;
        }
        let write = value & USERACCESS_WRITE != 0;
        self.regaddr = (value >> USERACCESS_REGADR_SHIFT) & 0x1f;
        self.phyaddr = (value >> USERACCESS_PHYADR_SHIFT) & 0x1f;
        self.data = value & USERACCESS_DATA;

        if self.phyaddr != INTERNAL_PHY_ADDR || self.regaddr as usize >= PHY_REG_COUNT {
            // No transceiver there; latch the raw request and move on.
            self.regs.write_word(MDIO_USERACCESS0 * 4, value);
            return;
        }

        if write {
            trace!(target: "mdio", reg = self.regaddr, data = self.data, "phy write");
            self.phy0[self.regaddr as usize] = self.data as u16;
        } else {
            let loaded = self.phy0[self.regaddr as usize];
            trace!(target: "mdio", reg = self.regaddr, data = loaded, "phy read");
            if self.regaddr == PHY_CONTROL_REG {
                self.control_read_back(loaded);
            }
            self.data = u32::from(loaded);
        }
        // The transaction completes synchronously: only the data field is
        // left in the register, GO and ACK never stay set.
        self.regs
            .write_word(MDIO_USERACCESS0 * 4, self.data & USERACCESS_DATA);
    }

    /// Reset and renegotiate are single-shot requests the driver confirms by
    /// reading the control register back; complete them on that read.
    fn control_read_back(&mut self, loaded: u16) {
        if loaded & PHY_RESET != 0 {
            trace!(target: "mdio", "phy reset completed");
            self.phy0[PHY_CONTROL_REG as usize] = (loaded & !PHY_RESET) | AUTO_NEGOTIATE_EN;
        } else if loaded & RENEGOTIATE != 0 {
            trace!(target: "mdio", "phy renegotiation completed");
            self.phy0[PHY_CONTROL_REG as usize] = loaded & !RENEGOTIATE;
            self.phy0[PHY_STATUS_REG as usize] = 0x782d;
            self.phy0[NWAY_REMADVERTISE_REG as usize] =
                self.phy0[NWAY_ADVERTISE_REG as usize] | PHY_ISOLATE | PHY_RESET;
            self.regs.write_word(MDIO_LINK * 4, 0x8000_0000);
        }
    }
}

impl IoSnapshot for Mdio {
    const DEVICE_ID: [u8; 4] = *b"MDIO";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(TAG_REGS, self.regs.as_bytes().to_vec());
        let mut phy = Vec::with_capacity(PHY_REG_COUNT * 2);
        for reg in self.phy0 {
            phy.extend_from_slice(&reg.to_le_bytes());
        }
        w.field_bytes(TAG_PHY0, phy);
        w.field_u32(TAG_REGADDR, self.regaddr);
        w.field_u32(TAG_PHYADDR, self.phyaddr);
        w.field_u32(TAG_DATA, self.data);
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID, Self::DEVICE_VERSION)?;
        let mut regs = RegisterWindow::new(MDIO_WINDOW_LEN);
        if let Some(b) = r.field_bytes(TAG_REGS) {
            if !regs.load_bytes(b) {
                return Err(SnapshotError::InvalidFieldEncoding("mdio regs size"));
            }
        }
        let mut phy0 = [0u16; PHY_REG_COUNT];
        if let Some(b) = r.field_bytes(TAG_PHY0) {
            if b.len() != PHY_REG_COUNT * 2 {
                return Err(SnapshotError::InvalidFieldEncoding("mdio phy file size"));
            }
            for (i, chunk) in b.chunks_exact(2).enumerate() {
                phy0[i] = u16::from_le_bytes([chunk[0], chunk[1]]);
            }
        }
        let regaddr = r.field_u32(TAG_REGADDR, "mdio regaddr")?.unwrap_or(0);
        let phyaddr = r.field_u32(TAG_PHYADDR, "mdio phyaddr")?.unwrap_or(0);
        let data = r.field_u32(TAG_DATA, "mdio data")?.unwrap_or(0);

        self.regs = regs;
        self.phy0 = phy0;
        self.regaddr = regaddr;
        self.phyaddr = phyaddr;
        self.data = data;
        Ok(())
    }
}
