//! Watchdog timer, unlock protocol only.
//!
//! Every programmable sub-register is guarded by its own lock register with
//! a staged magic-number handshake: the first constant arms the lock, the
//! following constants advance it, and only a fully advanced lock (state 3)
//! accepts a value write. The timer itself never fires in this model; the
//! interesting contract is the handshake, which real guest drivers do get
//! wrong.

use avalanche_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use tracing::{trace, warn};

use crate::regs::RegisterWindow;

pub const WDT_WINDOW_LEN: usize = 0x80;

/// Byte offsets of the register pairs.
pub const WDT_KICK_LOCK: usize = 0x00;
pub const WDT_KICK: usize = 0x04;
pub const WDT_CHANGE_LOCK: usize = 0x08;
pub const WDT_CHANGE: usize = 0x0c;
pub const WDT_DISABLE_LOCK: usize = 0x10;
pub const WDT_DISABLE: usize = 0x14;
pub const WDT_PRESCALE_LOCK: usize = 0x18;
pub const WDT_PRESCALE: usize = 0x1c;

const STATE_MASK: u32 = 0x3;
const UNLOCKED: u32 = 3;

const TAG_REGS: u16 = 1;

/// Stage constants per lock: writing `stages[i]` while the lock is in state
/// `i` advances it to `encoded_state[i]`.
struct LockProtocol {
    name: &'static str,
    stages: &'static [u32],
}

const KICK_PROTOCOL: LockProtocol = LockProtocol {
    name: "kick",
    stages: &[0x5555, 0xaaaa],
};
const CHANGE_PROTOCOL: LockProtocol = LockProtocol {
    name: "change",
    stages: &[0x6666, 0xbbbb],
};
const DISABLE_PROTOCOL: LockProtocol = LockProtocol {
    name: "disable",
    stages: &[0x7777, 0xcccc, 0xdddd],
};
const PRESCALE_PROTOCOL: LockProtocol = LockProtocol {
    name: "prescale",
    stages: &[0x5a5a, 0xa5a5],
};

impl LockProtocol {
    /// State encoding after each completed stage. Two-stage locks go
    /// 1 -> 3; the three-stage disable lock goes 1 -> 2 -> 3.
    fn state_after(&self, stage: usize) -> u32 {
        if stage + 1 == self.stages.len() {
            UNLOCKED
        } else {
            stage as u32 + 1
        }
    }
}

pub struct Watchdog {
    regs: RegisterWindow,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            regs: RegisterWindow::new(WDT_WINDOW_LEN),
        }
    }

    pub fn reset(&mut self) {
        self.regs.clear();
    }

    /// Lock state (low two bits of the lock register).
    pub fn lock_state(&self, lock_offset: usize) -> u32 {
        self.regs.read_word(lock_offset) & STATE_MASK
    }

    pub fn mmio_read(&mut self, offset: u32) -> u32 {
        let value = self.regs.read_word(offset as usize);
        trace!(target: "watchdog", offset, value, "read");
        value
    }

    pub fn mmio_write(&mut self, offset: u32, value: u32) {
        trace!(target: "watchdog", offset, value, "write");
        match offset as usize {
            WDT_KICK_LOCK => self.lock_write(WDT_KICK_LOCK, &KICK_PROTOCOL, value),
            WDT_CHANGE_LOCK => self.lock_write(WDT_CHANGE_LOCK, &CHANGE_PROTOCOL, value),
            WDT_DISABLE_LOCK => self.lock_write(WDT_DISABLE_LOCK, &DISABLE_PROTOCOL, value),
            WDT_PRESCALE_LOCK => self.lock_write(WDT_PRESCALE_LOCK, &PRESCALE_PROTOCOL, value),
            WDT_KICK => self.value_write(WDT_KICK, WDT_KICK_LOCK, &KICK_PROTOCOL, value),
            WDT_CHANGE => self.value_write(WDT_CHANGE, WDT_CHANGE_LOCK, &CHANGE_PROTOCOL, value),
            WDT_DISABLE => {
                self.value_write(WDT_DISABLE, WDT_DISABLE_LOCK, &DISABLE_PROTOCOL, value)
            }
            WDT_PRESCALE => {
                self.value_write(WDT_PRESCALE, WDT_PRESCALE_LOCK, &PRESCALE_PROTOCOL, value)
            }
            off => self.regs.write_word(off, value),
        }
    }

    fn lock_write(&mut self, lock_offset: usize, protocol: &LockProtocol, value: u32) {
        let state = self.lock_state(lock_offset);
        for (stage, &magic) in protocol.stages.iter().enumerate() {
            if value == magic {
                // The first stage always (re)arms; later stages require the
                // preceding stage to have just completed.
                if stage == 0 || state == stage as u32 {
                    self.regs
                        .write_word(lock_offset, (value & !STATE_MASK) | protocol.state_after(stage));
                } else {
                    warn!(
                        target: "watchdog",
                        lock = protocol.name, value, state,
                        "UNEXPECTED out-of-sequence unlock stage"
                    );
                }
                return;
            }
        }
        warn!(
            target: "watchdog",
            lock = protocol.name, value,
            "UNEXPECTED unlock constant"
        );
    }

    fn value_write(
        &mut self,
        offset: usize,
        lock_offset: usize,
        protocol: &LockProtocol,
        value: u32,
    ) {
        if self.lock_state(lock_offset) != UNLOCKED {
            warn!(
                target: "watchdog",
                register = protocol.name, value,
                "UNEXPECTED value write while locked"
            );
        } else {
            trace!(target: "watchdog", register = protocol.name, value, "programmed");
        }
        // The write lands either way; no timer is armed by this model.
        self.regs.write_word(offset, value);
    }
}

impl IoSnapshot for Watchdog {
    const DEVICE_ID: [u8; 4] = *b"WDOG";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(TAG_REGS, self.regs.as_bytes().to_vec());
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID, Self::DEVICE_VERSION)?;
        let mut regs = RegisterWindow::new(WDT_WINDOW_LEN);
        if let Some(b) = r.field_bytes(TAG_REGS) {
            if !regs.load_bytes(b) {
                return Err(SnapshotError::InvalidFieldEncoding("watchdog regs size"));
            }
        }
        self.regs = regs;
        Ok(())
    }
}
