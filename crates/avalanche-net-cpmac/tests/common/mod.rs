#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use avalanche_devices::irq::IrqLine;
use memory::MemoryBus;

/// Flat guest memory for descriptor rings and frame buffers.
pub struct TestDma {
    mem: Vec<u8>,
}

impl TestDma {
    pub fn new(size: usize) -> Self {
        Self { mem: vec![0; size] }
    }

    pub fn write(&mut self, addr: u64, bytes: &[u8]) {
        let addr = addr as usize;
        self.mem[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    pub fn read_vec(&self, addr: u64, len: usize) -> Vec<u8> {
        let addr = addr as usize;
        self.mem[addr..addr + len].to_vec()
    }
}

impl MemoryBus for TestDma {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]) {
        let addr = paddr as usize;
        buf.copy_from_slice(&self.mem[addr..addr + buf.len()]);
    }

    fn write_physical(&mut self, paddr: u64, buf: &[u8]) {
        let addr = paddr as usize;
        self.mem[addr..addr + buf.len()].copy_from_slice(buf);
    }
}

/// Interrupt line that remembers every level transition.
pub struct RecordingIrq {
    pub log: Rc<RefCell<Vec<bool>>>,
}

impl RecordingIrq {
    pub fn new() -> (Box<Self>, Rc<RefCell<Vec<bool>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        (Box::new(Self { log: log.clone() }), log)
    }
}

impl IrqLine for RecordingIrq {
    fn set_level(&mut self, level: bool) {
        self.log.borrow_mut().push(level);
    }
}

/// 16-byte transmit/receive descriptor as the guest driver lays it out.
pub fn write_desc(dma: &mut TestDma, addr: u64, next: u32, buff: u32, length: u32, mode: u32) {
    dma.write(addr, &next.to_le_bytes());
    dma.write(addr + 4, &buff.to_le_bytes());
    dma.write(addr + 8, &length.to_le_bytes());
    dma.write(addr + 12, &mode.to_le_bytes());
}

pub fn read_desc(dma: &mut TestDma, addr: u64) -> (u32, u32, u32, u32) {
    let mut raw = [0u8; 16];
    dma.read_physical(addr, &mut raw);
    let word = |i: usize| u32::from_le_bytes(raw[i * 4..i * 4 + 4].try_into().unwrap());
    (word(0), word(1), word(2), word(3))
}

pub fn build_test_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(14 + payload.len());
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
    frame.extend_from_slice(&0x0800u16.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}
