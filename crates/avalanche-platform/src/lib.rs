//! The AR7 peripheral complex as one platform object.
//!
//! [`Ar7Platform`] owns guest RAM, the I/O port bus the host UART models
//! sit on, the interrupt controller, and every register block of the SoC.
//! The host CPU model forwards MMIO accesses into [`Ar7Platform::read32`]
//! and friends; device DMA flows back out through the owned memory bus,
//! and interrupts surface through the pluggable [`CpuIrqSink`].
//!
//! Blocks with real behavior live in `avalanche-devices` and
//! `avalanche-net-cpmac`; everything else in the map is backing storage
//! sized to the guest-visible window, with the documented power-on values.

pub mod io;
pub mod map;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use avalanche_devices::clock::ClockCtrl;
use avalanche_devices::intc::Ar7Intc;
use avalanche_devices::irq::{CpuIrqSink, PlatformIrqLine, IRQ_CPMAC0, IRQ_CPMAC1, IRQ_UART0, IRQ_UART1};
use avalanche_devices::mdio::Mdio;
use avalanche_devices::regs::RegisterWindow;
use avalanche_devices::reset_ctrl::ResetCtrl;
use avalanche_devices::vlynq::Vlynq;
use avalanche_devices::watchdog::Watchdog;
use avalanche_io_snapshot::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter,
};
use avalanche_net_cpmac::CpmacDevice;
use memory::{DenseMemory, PhysicalMemoryBus};
use tracing::warn;

pub use avalanche_devices::reset_ctrl::ResetEvent;
pub use crate::io::{IoPortBus, IoPortHandler};
use crate::map::*;

/// Fans the controller's CPU line out to an always-present latch (for
/// polling hosts) and an optional host-provided sink.
struct FanoutCpuIrq {
    latch: Rc<Cell<bool>>,
    host: Option<Box<dyn CpuIrqSink>>,
}

impl CpuIrqSink for FanoutCpuIrq {
    fn set_irq_pending(&mut self, pending: bool) {
        self.latch.set(pending);
        if let Some(host) = &mut self.host {
            host.set_irq_pending(pending);
        }
    }
}

pub struct Ar7PlatformConfig {
    pub ram_size: usize,
    /// Station addresses handed to the two CPMACs until the guest programs
    /// its own.
    pub mac_addrs: [[u8; 6]; 2],
    /// CPU-side interrupt sink; when absent the platform only latches the
    /// level for [`Ar7Platform::cpu_irq_pending`].
    pub cpu_irq: Option<Box<dyn CpuIrqSink>>,
}

impl Default for Ar7PlatformConfig {
    fn default() -> Self {
        Self {
            ram_size: 16 * 1024 * 1024,
            mac_addrs: [
                [0x52, 0x54, 0x00, 0x12, 0x34, 0x56],
                [0x52, 0x54, 0x00, 0x12, 0x34, 0x57],
            ],
            cpu_irq: None,
        }
    }
}

pub struct Ar7Platform {
    pub memory: PhysicalMemoryBus,
    pub io: IoPortBus,
    pub interrupts: Rc<RefCell<Ar7Intc>>,
    cpu_irq_latch: Rc<Cell<bool>>,

    cpmac: [CpmacDevice; 2],
    mdio: Mdio,
    vlynq: [Vlynq; 2],
    watchdog: Watchdog,
    reset_ctrl: ResetCtrl,
    clock: ClockCtrl,

    emif: RegisterWindow,
    gpio: RegisterWindow,
    timer0: RegisterWindow,
    timer1: RegisterWindow,
    usb: RegisterWindow,
    dcl: RegisterWindow,
    ohio_wdt: RegisterWindow,
    /// Read/written when no host UART is registered on the port bus.
    uart_shadow: [RegisterWindow; 2],

    adsl: RegisterWindow,
    bbif: RegisterWindow,
    atm_sar: RegisterWindow,
    usb_mem: RegisterWindow,
    vlynq0_mem: RegisterWindow,
}

impl Ar7Platform {
    pub fn new(ram_size: usize) -> Self {
        Self::new_with_config(Ar7PlatformConfig {
            ram_size,
            ..Default::default()
        })
    }

    pub fn new_with_config(config: Ar7PlatformConfig) -> Self {
        let ram = DenseMemory::new(config.ram_size).expect("guest RAM allocation");
        let cpu_irq_latch = Rc::new(Cell::new(false));
        let interrupts = Rc::new(RefCell::new(Ar7Intc::new(Box::new(FanoutCpuIrq {
            latch: cpu_irq_latch.clone(),
            host: config.cpu_irq,
        }))));

        let mut cpmac0 = CpmacDevice::new(
            0,
            Box::new(PlatformIrqLine::new(interrupts.clone(), IRQ_CPMAC0)),
        );
        let mut cpmac1 = CpmacDevice::new(
            1,
            Box::new(PlatformIrqLine::new(interrupts.clone(), IRQ_CPMAC1)),
        );
        cpmac0.set_mac_addr(config.mac_addrs[0]);
        cpmac1.set_mac_addr(config.mac_addrs[1]);

        let mut platform = Self {
            memory: PhysicalMemoryBus::new(Box::new(ram)),
            io: IoPortBus::new(),
            interrupts,
            cpu_irq_latch,
            cpmac: [cpmac0, cpmac1],
            mdio: Mdio::new(),
            vlynq: [Vlynq::new(0), Vlynq::new(1)],
            watchdog: Watchdog::new(),
            reset_ctrl: ResetCtrl::new(),
            clock: ClockCtrl::new(),
            emif: RegisterWindow::new(EMIF_LEN as usize),
            gpio: RegisterWindow::new(GPIO_LEN as usize),
            timer0: RegisterWindow::new(TIMER0_LEN as usize),
            timer1: RegisterWindow::new(TIMER1_LEN as usize),
            usb: RegisterWindow::new(USB_LEN as usize),
            dcl: RegisterWindow::new(DCL_LEN as usize),
            ohio_wdt: RegisterWindow::new(OHIO_WDT_LEN as usize),
            uart_shadow: [
                RegisterWindow::new(UART0_LEN as usize),
                RegisterWindow::new(UART1_LEN as usize),
            ],
            adsl: RegisterWindow::new(ADSL_LEN as usize),
            bbif: RegisterWindow::new(BBIF_LEN as usize),
            atm_sar: RegisterWindow::new(ATM_SAR_LEN as usize),
            usb_mem: RegisterWindow::new(USB_MEM_LEN as usize),
            vlynq0_mem: RegisterWindow::new(VLYNQ0_MEM_LEN as usize),
        };
        platform.init_storage_defaults();
        platform
    }

    /// Published power-on values of the storage blocks.
    fn init_storage_defaults(&mut self) {
        self.gpio.write_word(0, 0x0000_0800);
        self.dcl.write_word(0, 0x025d_4291);
        // Line status shadow: transmitter idle, so polling guests make
        // progress even with no UART wired up.
        self.uart_shadow[0].write_word(5 * 4, 0x20);
    }

    /// Back to the power-on state. Guest RAM and host wiring (I/O port
    /// handlers, CPU sink) are preserved.
    pub fn reset(&mut self) {
        for cpmac in &mut self.cpmac {
            cpmac.reset();
        }
        self.mdio.reset();
        for vlynq in &mut self.vlynq {
            vlynq.reset();
        }
        self.watchdog.reset();
        self.reset_ctrl.reset();
        self.clock.reset();
        self.interrupts.borrow_mut().reset();

        for window in [
            &mut self.emif,
            &mut self.gpio,
            &mut self.timer0,
            &mut self.timer1,
            &mut self.usb,
            &mut self.dcl,
            &mut self.ohio_wdt,
            &mut self.adsl,
            &mut self.bbif,
            &mut self.atm_sar,
            &mut self.usb_mem,
            &mut self.vlynq0_mem,
        ] {
            window.clear();
        }
        for shadow in &mut self.uart_shadow {
            shadow.clear();
        }
        self.init_storage_defaults();
    }

    /// Level of the CPU's hardware interrupt line 0.
    pub fn cpu_irq_pending(&self) -> bool {
        self.cpu_irq_latch.get()
    }

    /// Reset requests raised by the guest since the last call.
    pub fn take_reset_events(&mut self) -> Vec<ResetEvent> {
        self.reset_ctrl.take_events()
    }

    /// Interrupt line for a host UART model (`index` 0 or 1).
    pub fn uart_irq_line(&self, index: usize) -> PlatformIrqLine {
        let irq = [IRQ_UART0, IRQ_UART1][index];
        PlatformIrqLine::new(self.interrupts.clone(), irq)
    }

    // Host-facing NIC surface.

    pub fn cpmac_mac_addr(&self, index: usize) -> [u8; 6] {
        self.cpmac[index].mac_addr()
    }

    pub fn cpmac_pop_tx_frame(&mut self, index: usize) -> Option<Vec<u8>> {
        self.cpmac[index].pop_tx_frame()
    }

    pub fn cpmac_can_receive(&self, index: usize) -> bool {
        self.cpmac[index].can_receive()
    }

    pub fn cpmac_receive_frame(&mut self, index: usize, frame: &[u8]) {
        self.cpmac[index].receive_frame(&mut self.memory, frame);
    }

    // MMIO dispatch.

    pub fn read32(&mut self, addr: u32) -> u32 {
        assert!(addr % 4 == 0, "unaligned 32-bit read at {addr:#010x}");
        if let Some(off) = window(addr, CPMAC0_BASE, CPMAC0_LEN) {
            self.cpmac[0].mmio_read(off)
        } else if let Some(off) = window(addr, EMIF_BASE, EMIF_LEN) {
            self.emif.read_word(off as usize)
        } else if let Some(off) = window(addr, GPIO_BASE, GPIO_LEN) {
            self.gpio.read_word(off as usize)
        } else if let Some(off) = window(addr, CLOCK_BASE, CLOCK_LEN) {
            self.clock.mmio_read(off)
        } else if let Some(off) = window(addr, WATCHDOG_BASE, WATCHDOG_LEN) {
            self.watchdog.mmio_read(off)
        } else if let Some(off) = window(addr, TIMER0_BASE, TIMER0_LEN) {
            self.timer0.read_word(off as usize)
        } else if let Some(off) = window(addr, TIMER1_BASE, TIMER1_LEN) {
            self.timer1.read_word(off as usize)
        } else if let Some(off) = window(addr, UART0_BASE, UART0_LEN) {
            u32::from(self.uart_read(0, off))
        } else if let Some(off) = window(addr, UART1_BASE, UART1_LEN) {
            u32::from(self.uart_read(1, off))
        } else if let Some(off) = window(addr, USB_BASE, USB_LEN) {
            self.usb.read_word(off as usize)
        } else if let Some(off) = window(addr, RESET_BASE, RESET_LEN) {
            self.reset_ctrl.mmio_read(off)
        } else if let Some(off) = window(addr, VLYNQ0_BASE, VLYNQ0_LEN) {
            self.vlynq[0].mmio_read(off)
        } else if let Some(off) = window(addr, DCL_BASE, DCL_LEN) {
            self.dcl.read_word(off as usize)
        } else if let Some(off) = window(addr, VLYNQ1_BASE, VLYNQ1_LEN) {
            self.vlynq[1].mmio_read(off)
        } else if let Some(off) = window(addr, MDIO_BASE, MDIO_LEN) {
            self.mdio.mmio_read(off)
        } else if let Some(off) = window(addr, OHIO_WDT_BASE, OHIO_WDT_LEN) {
            self.ohio_wdt.read_word(off as usize)
        } else if let Some(off) = window(addr, INTC_BASE, INTC_LEN) {
            self.interrupts.borrow_mut().mmio_read(off)
        } else if let Some(off) = window(addr, CPMAC1_BASE, CPMAC1_LEN) {
            self.cpmac[1].mmio_read(off)
        } else if let Some(off) = window(addr, ADSL_BASE, ADSL_LEN) {
            self.adsl.read_word(off as usize)
        } else if let Some(off) = window(addr, BBIF_BASE, BBIF_LEN) {
            self.bbif.read_word(off as usize)
        } else if let Some(off) = window(addr, ATM_SAR_BASE, ATM_SAR_LEN) {
            self.atm_sar.read_word(off as usize)
        } else if let Some(off) = window(addr, USB_MEM_BASE, USB_MEM_LEN) {
            self.usb_mem.read_word(off as usize)
        } else if let Some(off) = window(addr, VLYNQ0_MEM_BASE, VLYNQ0_MEM_LEN) {
            if addr == VLYNQ0_MEM_PCI_ID_ADDR {
                // A probe into the remote bus window; report the canned
                // device id so the guest sees a card.
                VLYNQ0_MEM_PCI_ID
            } else {
                self.vlynq0_mem.read_word(off as usize)
            }
        } else {
            warn!(target: "ar7", addr, "read from unassigned address");
            0xffff_ffff
        }
    }

    pub fn write32(&mut self, addr: u32, value: u32) {
        assert!(addr % 4 == 0, "unaligned 32-bit write at {addr:#010x}");
        if let Some(off) = window(addr, CPMAC0_BASE, CPMAC0_LEN) {
            self.cpmac[0].mmio_write(&mut self.memory, off, value);
        } else if let Some(off) = window(addr, EMIF_BASE, EMIF_LEN) {
            self.emif.write_word(off as usize, value);
        } else if let Some(off) = window(addr, GPIO_BASE, GPIO_LEN) {
            self.gpio.write_word(off as usize, value);
        } else if let Some(off) = window(addr, CLOCK_BASE, CLOCK_LEN) {
            self.clock.mmio_write(off, value);
        } else if let Some(off) = window(addr, WATCHDOG_BASE, WATCHDOG_LEN) {
            self.watchdog.mmio_write(off, value);
        } else if let Some(off) = window(addr, TIMER0_BASE, TIMER0_LEN) {
            self.timer0.write_word(off as usize, value);
        } else if let Some(off) = window(addr, TIMER1_BASE, TIMER1_LEN) {
            self.timer1.write_word(off as usize, value);
        } else if let Some(off) = window(addr, UART0_BASE, UART0_LEN) {
            self.uart_write(0, off, value as u8);
        } else if let Some(off) = window(addr, UART1_BASE, UART1_LEN) {
            self.uart_write(1, off, value as u8);
        } else if let Some(off) = window(addr, USB_BASE, USB_LEN) {
            self.usb.write_word(off as usize, value);
        } else if let Some(off) = window(addr, RESET_BASE, RESET_LEN) {
            self.reset_ctrl.mmio_write(off, value);
        } else if let Some(off) = window(addr, VLYNQ0_BASE, VLYNQ0_LEN) {
            self.vlynq[0].mmio_write(off, value);
        } else if let Some(off) = window(addr, DCL_BASE, DCL_LEN) {
            self.dcl.write_word(off as usize, value);
        } else if let Some(off) = window(addr, VLYNQ1_BASE, VLYNQ1_LEN) {
            self.vlynq[1].mmio_write(off, value);
        } else if let Some(off) = window(addr, MDIO_BASE, MDIO_LEN) {
            self.mdio.mmio_write(off, value);
        } else if let Some(off) = window(addr, OHIO_WDT_BASE, OHIO_WDT_LEN) {
            self.ohio_wdt.write_word(off as usize, value);
        } else if let Some(off) = window(addr, INTC_BASE, INTC_LEN) {
            self.interrupts.borrow_mut().mmio_write(off, value);
        } else if let Some(off) = window(addr, CPMAC1_BASE, CPMAC1_LEN) {
            self.cpmac[1].mmio_write(&mut self.memory, off, value);
        } else if let Some(off) = window(addr, ADSL_BASE, ADSL_LEN) {
            self.adsl.write_word(off as usize, value);
        } else if let Some(off) = window(addr, BBIF_BASE, BBIF_LEN) {
            self.bbif.write_word(off as usize, value);
        } else if let Some(off) = window(addr, ATM_SAR_BASE, ATM_SAR_LEN) {
            self.atm_sar.write_word(off as usize, value);
        } else if let Some(off) = window(addr, USB_MEM_BASE, USB_MEM_LEN) {
            self.usb_mem.write_word(off as usize, value);
        } else if let Some(off) = window(addr, VLYNQ0_MEM_BASE, VLYNQ0_MEM_LEN) {
            self.vlynq0_mem.write_word(off as usize, value);
        } else {
            warn!(target: "ar7", addr, value, "write to unassigned address");
        }
    }

    pub fn read16(&mut self, addr: u32) -> u16 {
        let word = self.read32(addr & !3);
        if addr & 2 != 0 {
            (word >> 16) as u16
        } else {
            word as u16
        }
    }

    /// Half-word writes are not something the SoC's register fabric
    /// supports; log and store the value through the word path.
    pub fn write16(&mut self, addr: u32, value: u16) {
        warn!(target: "ar7", addr, value, "unexpected 16-bit write");
        self.write32(addr & !3, u32::from(value));
    }

    pub fn read8(&mut self, addr: u32) -> u8 {
        if let Some(off) = window(addr, UART0_BASE, UART0_LEN) {
            return self.uart_read(0, off);
        }
        if let Some(off) = window(addr, UART1_BASE, UART1_LEN) {
            return self.uart_read(1, off);
        }
        warn!(target: "ar7", addr, "unexpected 8-bit read outside the UARTs");
        let word = self.read32(addr & !3);
        (word >> (8 * (addr & 3))) as u8
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        if let Some(off) = window(addr, UART0_BASE, UART0_LEN) {
            return self.uart_write(0, off, value);
        }
        if let Some(off) = window(addr, UART1_BASE, UART1_LEN) {
            return self.uart_write(1, off, value);
        }
        warn!(target: "ar7", addr, value, "unexpected 8-bit write outside the UARTs");
        self.write32(addr & !3, u32::from(value));
    }

    /// Width-dispatching entry point for hosts that route whole windows
    /// through one handler.
    pub fn mmio_read(&mut self, addr: u32, size: usize) -> u32 {
        match size {
            1 => u32::from(self.read8(addr)),
            2 => u32::from(self.read16(addr)),
            _ => self.read32(addr),
        }
    }

    pub fn mmio_write(&mut self, addr: u32, size: usize, value: u32) {
        match size {
            1 => self.write8(addr, value as u8),
            2 => self.write16(addr, value as u16),
            _ => self.write32(addr, value),
        }
    }

    // UART bridge: one I/O port per register word.

    fn uart_read(&mut self, index: usize, offset: u32) -> u8 {
        let port_index = (offset / 4) as u16;
        let base = [UART0_IO_BASE, UART1_IO_BASE][index];
        if self.io.is_mapped(base) {
            self.io.read_u8(base + port_index)
        } else {
            self.uart_shadow[index].read_word(port_index as usize * 4) as u8
        }
    }

    fn uart_write(&mut self, index: usize, offset: u32, value: u8) {
        let port_index = (offset / 4) as u16;
        let base = [UART0_IO_BASE, UART1_IO_BASE][index];
        if self.io.is_mapped(base) {
            self.io.write_u8(base + port_index, value);
        } else {
            self.uart_shadow[index].write_word(port_index as usize * 4, u32::from(value));
        }
    }
}

fn window(addr: u32, base: u32, len: u32) -> Option<u32> {
    if addr >= base && addr - base < len {
        Some(addr - base)
    } else {
        None
    }
}

// Whole-platform snapshot: one container wrapping each block's own blob.

const TAG_CPMAC0: u16 = 1;
const TAG_CPMAC1: u16 = 2;
const TAG_INTC: u16 = 3;
const TAG_MDIO: u16 = 4;
const TAG_VLYNQ0: u16 = 5;
const TAG_VLYNQ1: u16 = 6;
const TAG_WATCHDOG: u16 = 7;
const TAG_RESET: u16 = 8;
const TAG_CLOCK: u16 = 9;

const TAG_EMIF: u16 = 20;
const TAG_GPIO: u16 = 21;
const TAG_TIMER0: u16 = 22;
const TAG_TIMER1: u16 = 23;
const TAG_USB: u16 = 24;
const TAG_DCL: u16 = 25;
const TAG_OHIO_WDT: u16 = 26;
const TAG_UART0_SHADOW: u16 = 27;
const TAG_UART1_SHADOW: u16 = 28;

const TAG_ADSL: u16 = 30;
const TAG_BBIF: u16 = 31;
const TAG_ATM_SAR: u16 = 32;
const TAG_USB_MEM: u16 = 33;
const TAG_VLYNQ0_MEM: u16 = 34;

impl Ar7Platform {
    fn storage_blocks(&mut self) -> [(u16, &mut RegisterWindow, &'static str); 14] {
        let [uart0_shadow, uart1_shadow] = &mut self.uart_shadow;
        [
            (TAG_EMIF, &mut self.emif, "emif"),
            (TAG_GPIO, &mut self.gpio, "gpio"),
            (TAG_TIMER0, &mut self.timer0, "timer0"),
            (TAG_TIMER1, &mut self.timer1, "timer1"),
            (TAG_USB, &mut self.usb, "usb"),
            (TAG_DCL, &mut self.dcl, "dcl"),
            (TAG_OHIO_WDT, &mut self.ohio_wdt, "ohio wdt"),
            (TAG_UART0_SHADOW, uart0_shadow, "uart0 shadow"),
            (TAG_UART1_SHADOW, uart1_shadow, "uart1 shadow"),
            (TAG_ADSL, &mut self.adsl, "adsl"),
            (TAG_BBIF, &mut self.bbif, "bbif"),
            (TAG_ATM_SAR, &mut self.atm_sar, "atm sar"),
            (TAG_USB_MEM, &mut self.usb_mem, "usb mem"),
            (TAG_VLYNQ0_MEM, &mut self.vlynq0_mem, "vlynq0 window"),
        ]
    }
}

impl IoSnapshot for Ar7Platform {
    const DEVICE_ID: [u8; 4] = *b"AR7P";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(TAG_CPMAC0, self.cpmac[0].save_state());
        w.field_bytes(TAG_CPMAC1, self.cpmac[1].save_state());
        w.field_bytes(TAG_INTC, self.interrupts.borrow().save_state());
        w.field_bytes(TAG_MDIO, self.mdio.save_state());
        w.field_bytes(TAG_VLYNQ0, self.vlynq[0].save_state());
        w.field_bytes(TAG_VLYNQ1, self.vlynq[1].save_state());
        w.field_bytes(TAG_WATCHDOG, self.watchdog.save_state());
        w.field_bytes(TAG_RESET, self.reset_ctrl.save_state());
        w.field_bytes(TAG_CLOCK, self.clock.save_state());

        for (tag, window) in [
            (TAG_EMIF, &self.emif),
            (TAG_GPIO, &self.gpio),
            (TAG_TIMER0, &self.timer0),
            (TAG_TIMER1, &self.timer1),
            (TAG_USB, &self.usb),
            (TAG_DCL, &self.dcl),
            (TAG_OHIO_WDT, &self.ohio_wdt),
            (TAG_UART0_SHADOW, &self.uart_shadow[0]),
            (TAG_UART1_SHADOW, &self.uart_shadow[1]),
            (TAG_ADSL, &self.adsl),
            (TAG_BBIF, &self.bbif),
            (TAG_ATM_SAR, &self.atm_sar),
            (TAG_USB_MEM, &self.usb_mem),
            (TAG_VLYNQ0_MEM, &self.vlynq0_mem),
        ] {
            w.field_bytes(tag, window.as_bytes().to_vec());
        }
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID, Self::DEVICE_VERSION)?;

        if let Some(b) = r.field_bytes(TAG_CPMAC0) {
            self.cpmac[0].load_state(b)?;
        }
        if let Some(b) = r.field_bytes(TAG_CPMAC1) {
            self.cpmac[1].load_state(b)?;
        }
        if let Some(b) = r.field_bytes(TAG_INTC) {
            self.interrupts.borrow_mut().load_state(b)?;
        }
        if let Some(b) = r.field_bytes(TAG_MDIO) {
            self.mdio.load_state(b)?;
        }
        if let Some(b) = r.field_bytes(TAG_VLYNQ0) {
            self.vlynq[0].load_state(b)?;
        }
        if let Some(b) = r.field_bytes(TAG_VLYNQ1) {
            self.vlynq[1].load_state(b)?;
        }
        if let Some(b) = r.field_bytes(TAG_WATCHDOG) {
            self.watchdog.load_state(b)?;
        }
        if let Some(b) = r.field_bytes(TAG_RESET) {
            self.reset_ctrl.load_state(b)?;
        }
        if let Some(b) = r.field_bytes(TAG_CLOCK) {
            self.clock.load_state(b)?;
        }

        for (tag, window, name) in self.storage_blocks() {
            if let Some(b) = r.field_bytes(tag) {
                if !window.load_bytes(b) {
                    warn!(target: "ar7", name, "snapshot storage block has wrong size");
                    return Err(SnapshotError::InvalidFieldEncoding("storage block size"));
                }
            }
        }
        Ok(())
    }
}
