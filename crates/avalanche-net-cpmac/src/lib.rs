//! CPMAC Ethernet MAC model.
//!
//! The AR7 carries two of these. Each one owns an 0x800-byte register
//! window and a pair of DMA descriptor engines: the transmit side drains a
//! guest-built descriptor chain the moment a head pointer is written, the
//! receive side fills the head descriptor when the host hands us a frame.
//! Completed transmit frames queue up for the host to pop; the host is also
//! responsible for only offering receive frames while [`CpmacDevice::can_receive`]
//! says there is an owned descriptor to put them in.
//!
//! Descriptor handling trusts the guest driver the same way the hardware's
//! DMA engine does: a descriptor that is missing SOF/EOF/OWNERSHIP, or
//! whose embedded size disagrees with its length word, is a contract
//! violation and aborts the emulator rather than limping on.

use std::collections::VecDeque;

use avalanche_devices::irq::IrqLine;
use avalanche_devices::regs::RegisterWindow;
#[cfg(feature = "io-snapshot")]
use avalanche_io_snapshot::io::state::{
    codec::{Decoder, Encoder},
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use memory::MemoryBus;
use tracing::{trace, warn};

pub const CPMAC_WINDOW_LEN: usize = 0x800;

/// Longest frame the MAC moves: 1514 bytes of Ethernet plus the FCS the
/// backend strips or supplies.
pub const MAX_FRAME_LEN: usize = 1514 + 4;
/// Frames shorter than this are counted as undersized on receive.
pub const MIN_FRAME_LEN: usize = 64;

/// Register offsets (byte offsets into the window).
pub const TX_CONTROL: u32 = 0x004;
pub const RX_CONTROL: u32 = 0x014;
pub const RX_MBP_ENABLE: u32 = 0x100;
pub const RX_MAXLEN: u32 = 0x10c;
pub const TX_INTMASK_SET: u32 = 0x178;
pub const TX_INTMASK_CLEAR: u32 = 0x17c;
pub const MAC_IN_VECTOR: u32 = 0x180;
pub const MAC_EOI_VECTOR: u32 = 0x184;
pub const MACADDRLO_0: u32 = 0x1b0;
pub const MACADDRMID: u32 = 0x1d0;
pub const MACADDRHI: u32 = 0x1d4;
pub const TX0_HDP: u32 = 0x600;
pub const RX0_HDP: u32 = 0x620;

/// Statistics window (inclusive start, exclusive end).
pub const STATS_BASE: u32 = 0x200;
pub const STATS_END: u32 = 0x290;

pub const RXGOODFRAMES: u32 = 0x200;
pub const RXBROADCASTFRAMES: u32 = 0x204;
pub const RXMULTICASTFRAMES: u32 = 0x208;
pub const RXOVERSIZEDFRAMES: u32 = 0x218;
pub const RXUNDERSIZEDFRAMES: u32 = 0x220;
pub const TXGOODFRAMES: u32 = 0x234;

/// `MAC_IN_VECTOR` cause bits; the low half carries the channel number.
pub const MAC_IN_VECTOR_TX_INT_OR: u32 = 1 << 16;
pub const MAC_IN_VECTOR_RX_INT_OR: u32 = 1 << 17;

/// DMA channels per direction.
pub const NUM_CHANNELS: u32 = 8;

/// Descriptor `mode` word bits.
const MODE_SOF: u32 = 1 << 31;
const MODE_EOF: u32 = 1 << 30;
const MODE_OWNERSHIP: u32 = 1 << 29;
const MODE_EOQ: u32 = 1 << 28;
const MODE_SIZE_MASK: u32 = 0xffff;

/// Upper bound on descriptors visited per chain walk. Well-formed driver
/// chains are far shorter; only a guest-constructed cycle gets here.
const MAX_CHAIN_DESCRIPTORS: usize = 1024;

/// Pending-frame bounds enforced on snapshot restore.
const MAX_PENDING_TX_FRAMES: usize = 256;

#[cfg(feature = "io-snapshot")]
const TAG_REGS: u16 = 1;
#[cfg(feature = "io-snapshot")]
const TAG_MAC_ADDR: u16 = 2;
#[cfg(feature = "io-snapshot")]
const TAG_TX_PENDING: u16 = 3;
#[cfg(feature = "io-snapshot")]
const TAG_IRQ_LEVEL: u16 = 4;

/// One 16-byte buffer descriptor, fetched from guest memory.
#[derive(Debug, Clone, Copy)]
struct Descriptor {
    next: u32,
    buff: u32,
    length: u32,
    mode: u32,
}

impl Descriptor {
    fn fetch(bus: &mut dyn MemoryBus, addr: u32) -> Self {
        let mut raw = [0u8; 16];
        bus.read_physical(u64::from(addr), &mut raw);
        let word = |i: usize| u32::from_le_bytes(raw[i * 4..i * 4 + 4].try_into().expect("slice length"));
        Self {
            next: word(0),
            buff: word(1),
            length: word(2),
            mode: word(3),
        }
    }

    /// Writes the length and mode words back; `next` and `buff` always stay
    /// the guest's.
    fn write_back(&self, bus: &mut dyn MemoryBus, addr: u32) {
        bus.write_u32(u64::from(addr) + 8, self.length);
        bus.write_u32(u64::from(addr) + 12, self.mode);
    }

    fn size(&self) -> u32 {
        self.mode & MODE_SIZE_MASK
    }
}

pub struct CpmacDevice {
    index: usize,
    regs: RegisterWindow,
    mac_addr: [u8; 6],
    irq: Box<dyn IrqLine>,
    irq_level: bool,
    /// Frames drained from the guest's TX rings, waiting for the host.
    tx_frames: VecDeque<Vec<u8>>,
}

impl CpmacDevice {
    pub fn new(index: usize, irq: Box<dyn IrqLine>) -> Self {
        Self {
            index,
            regs: RegisterWindow::new(CPMAC_WINDOW_LEN),
            mac_addr: [0; 6],
            irq,
            irq_level: false,
            tx_frames: VecDeque::new(),
        }
    }

    pub fn reset(&mut self) {
        self.regs.clear();
        self.tx_frames.clear();
        self.set_irq(false);
    }

    pub fn mac_addr(&self) -> [u8; 6] {
        self.mac_addr
    }

    /// Host-assigned address used until the guest programs its own.
    pub fn set_mac_addr(&mut self, mac: [u8; 6]) {
        self.mac_addr = mac;
    }

    pub fn irq_level(&self) -> bool {
        self.irq_level
    }

    /// Next completed transmit frame, oldest first.
    pub fn pop_tx_frame(&mut self) -> Option<Vec<u8>> {
        self.tx_frames.pop_front()
    }

    /// Whether an owned receive descriptor is queued on channel 0.
    pub fn can_receive(&self) -> bool {
        self.regs.read_word(RX0_HDP as usize) != 0
    }

    fn set_irq(&mut self, level: bool) {
        self.irq_level = level;
        self.irq.set_level(level);
    }

    fn raise_vector(&mut self, bits: u32) {
        self.regs.set_bits(MAC_IN_VECTOR as usize, bits);
        self.set_irq(true);
    }

    pub fn mmio_read(&mut self, offset: u32) -> u32 {
        let value = match offset {
            // Reading the vector acknowledges it.
            MAC_IN_VECTOR => {
                let v = self.regs.read_word(MAC_IN_VECTOR as usize);
                self.regs.write_word(MAC_IN_VECTOR as usize, 0);
                v
            }
            _ => self.regs.read_word(offset as usize),
        };
        trace!(target: "cpmac", index = self.index, offset, value, "read");
        value
    }

    pub fn mmio_write(&mut self, bus: &mut dyn MemoryBus, offset: u32, value: u32) {
        trace!(target: "cpmac", index = self.index, offset, value, "write");
        match offset {
            TX0_HDP..=0x61c => {
                let channel = (offset - TX0_HDP) / 4;
                self.transmit_chain(bus, channel, value);
            }
            RX0_HDP..=0x63c => {
                self.regs.write_word(offset as usize, value);
                if value != 0 {
                    // Look at what the driver queued, for the trace only;
                    // draining happens when a frame actually arrives.
                    let desc = Descriptor::fetch(bus, value);
                    trace!(
                        target: "cpmac",
                        index = self.index,
                        channel = (offset - RX0_HDP) / 4,
                        addr = value,
                        buff = desc.buff,
                        mode = desc.mode,
                        "rx descriptor queued"
                    );
                }
            }
            STATS_BASE..=0x28c => {
                if value == 0xffff_ffff {
                    self.regs.write_word(offset as usize, 0);
                } else {
                    warn!(
                        target: "cpmac",
                        index = self.index, offset, value,
                        "unexpected write to statistics register"
                    );
                }
            }
            TX_INTMASK_SET => {
                self.regs.set_bits(offset as usize, value);
                if value != 0 {
                    let channel = value.trailing_zeros();
                    self.raise_vector(MAC_IN_VECTOR_TX_INT_OR | channel);
                }
            }
            MACADDRHI => {
                self.regs.write_word(offset as usize, value);
                self.assemble_mac_addr();
            }
            _ => self.regs.write_word(offset as usize, value),
        }
    }

    /// The address registers are written low/mid/high; the high write
    /// publishes the assembled station address.
    fn assemble_mac_addr(&mut self) {
        let hi = MACADDRHI as usize;
        self.mac_addr = [
            self.regs.read_byte(hi),
            self.regs.read_byte(hi + 1),
            self.regs.read_byte(hi + 2),
            self.regs.read_byte(hi + 3),
            self.regs.read_byte(MACADDRMID as usize),
            self.regs.read_byte(MACADDRLO_0 as usize),
        ];
        trace!(
            target: "cpmac",
            index = self.index,
            mac = ?self.mac_addr,
            "station address programmed"
        );
    }

    /// Walks the descriptor chain rooted at `head`, emitting one frame per
    /// descriptor. The head-pointer register tracks the walk and ends at 0.
    fn transmit_chain(&mut self, bus: &mut dyn MemoryBus, channel: u32, head: u32) {
        let hdp_offset = (TX0_HDP + channel * 4) as usize;
        let mut addr = head;
        let mut visited = 0usize;
        while addr != 0 {
            visited += 1;
            assert!(
                visited <= MAX_CHAIN_DESCRIPTORS,
                "tx descriptor chain exceeds {MAX_CHAIN_DESCRIPTORS} entries (cycle?)"
            );
            self.regs.write_word(hdp_offset, addr);

            let mut desc = Descriptor::fetch(bus, addr);
            assert!(
                desc.mode & MODE_SOF != 0 && desc.mode & MODE_EOF != 0,
                "tx descriptor at {addr:#x} is not a whole frame"
            );
            assert!(
                desc.mode & MODE_OWNERSHIP != 0,
                "tx descriptor at {addr:#x} not owned by the device"
            );
            assert_eq!(
                desc.size(),
                desc.length,
                "tx descriptor at {addr:#x} has inconsistent sizes"
            );
            let size = desc.size() as usize;
            assert!(
                size <= MAX_FRAME_LEN,
                "tx frame of {size} bytes exceeds the device maximum"
            );

            let mut frame = vec![0u8; size];
            bus.read_physical(u64::from(desc.buff), &mut frame);

            // Hand the descriptor back before the frame becomes visible
            // anywhere else, the same order the bus master uses.
            desc.mode &= !MODE_OWNERSHIP;
            desc.write_back(bus, addr);

            trace!(
                target: "cpmac",
                index = self.index, channel, size,
                "frame transmitted"
            );
            self.tx_frames.push_back(frame);
            self.regs.incr(TXGOODFRAMES as usize);
            self.raise_vector(MAC_IN_VECTOR_TX_INT_OR | channel);

            addr = desc.next;
        }
        self.regs.write_word(hdp_offset, 0);
    }

    /// Host-side frame delivery into the channel-0 receive ring.
    pub fn receive_frame(&mut self, bus: &mut dyn MemoryBus, frame: &[u8]) {
        let size = frame.len();
        if frame.len() >= 6 && frame[..6] == [0xff; 6] {
            self.regs.incr(RXBROADCASTFRAMES as usize);
        } else if !frame.is_empty() && frame[0] & 0x01 != 0 {
            self.regs.incr(RXMULTICASTFRAMES as usize);
        }
        if size < MIN_FRAME_LEN {
            self.regs.incr(RXUNDERSIZEDFRAMES as usize);
        } else if size > MAX_FRAME_LEN - 4 {
            self.regs.incr(RXOVERSIZEDFRAMES as usize);
        }
        self.regs.incr(RXGOODFRAMES as usize);

        let addr = self.regs.read_word(RX0_HDP as usize);
        if addr == 0 {
            trace!(target: "cpmac", index = self.index, size, "rx frame dropped, no descriptor");
            return;
        }
        let mut desc = Descriptor::fetch(bus, addr);
        if desc.mode & MODE_OWNERSHIP == 0 {
            trace!(
                target: "cpmac",
                index = self.index, addr, size,
                "rx frame dropped, descriptor not owned by device"
            );
            return;
        }

        desc.mode &= !(MODE_OWNERSHIP | MODE_SIZE_MASK);
        desc.mode |= MODE_SOF | MODE_EOF | (size as u32 & MODE_SIZE_MASK);
        if desc.next == 0 {
            desc.mode |= MODE_EOQ;
        }
        desc.length = size as u32;
        desc.write_back(bus, addr);
        bus.write_physical(u64::from(desc.buff), frame);

        // Publish the consumed descriptor before interrupting.
        self.regs.write_word(RX0_HDP as usize, desc.next);
        self.raise_vector(MAC_IN_VECTOR_RX_INT_OR);
        trace!(target: "cpmac", index = self.index, size, "frame received");
    }
}

#[cfg(feature = "io-snapshot")]
impl IoSnapshot for CpmacDevice {
    const DEVICE_ID: [u8; 4] = *b"CPMC";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(TAG_REGS, self.regs.as_bytes().to_vec());
        w.field_bytes(TAG_MAC_ADDR, self.mac_addr.to_vec());
        let mut enc = Encoder::new().u32(self.tx_frames.len() as u32);
        for frame in &self.tx_frames {
            enc = enc.len_bytes(frame);
        }
        w.field_bytes(TAG_TX_PENDING, enc.finish());
        w.field_bool(TAG_IRQ_LEVEL, self.irq_level);
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID, Self::DEVICE_VERSION)?;

        let mut regs = RegisterWindow::new(CPMAC_WINDOW_LEN);
        if let Some(b) = r.field_bytes(TAG_REGS) {
            if !regs.load_bytes(b) {
                return Err(SnapshotError::InvalidFieldEncoding("cpmac regs size"));
            }
        }
        let mac_addr = match r.field_bytes(TAG_MAC_ADDR) {
            None => [0; 6],
            Some(b) => b
                .try_into()
                .map_err(|_| SnapshotError::InvalidFieldEncoding("cpmac mac"))?,
        };
        let mut tx_frames = VecDeque::new();
        if let Some(b) = r.field_bytes(TAG_TX_PENDING) {
            let mut d = Decoder::new(b);
            let count = d
                .u32()
                .map_err(|_| SnapshotError::InvalidFieldEncoding("cpmac tx_pending count"))?;
            if count as usize > MAX_PENDING_TX_FRAMES {
                return Err(SnapshotError::InvalidFieldEncoding("cpmac tx_pending count"));
            }
            for _ in 0..count {
                let len = d
                    .u32()
                    .map_err(|_| SnapshotError::InvalidFieldEncoding("cpmac tx_pending frame"))?
                    as usize;
                if len > MAX_FRAME_LEN {
                    return Err(SnapshotError::InvalidFieldEncoding("cpmac tx_pending frame"));
                }
                let frame = d
                    .bytes(len)
                    .map_err(|_| SnapshotError::InvalidFieldEncoding("cpmac tx_pending frame"))?;
                tx_frames.push_back(frame.to_vec());
            }
        }
        let irq_level = r
            .field_bool(TAG_IRQ_LEVEL, "cpmac irq_level")?
            .unwrap_or(false);

        self.regs = regs;
        self.mac_addr = mac_addr;
        self.tx_frames = tx_frames;
        // Re-drive the line so the restored controller state agrees.
        self.set_irq(irq_level);
        Ok(())
    }
}
