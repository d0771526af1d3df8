//! Interrupt plumbing between device models, the interrupt controller, and
//! the host CPU model.

use std::cell::RefCell;
use std::rc::Rc;

use crate::intc::Ar7Intc;

/// Peripheral interrupt numbers the controller accepts.
pub const IRQ_UART0: u32 = 15;
pub const IRQ_UART1: u32 = 16;
pub const IRQ_CPMAC0: u32 = 27;
pub const IRQ_CPMAC1: u32 = 41;

/// One device-side interrupt line. Devices hold a boxed line and never know
/// what is on the other end.
pub trait IrqLine {
    fn set_level(&mut self, level: bool);

    fn raise(&mut self) {
        self.set_level(true);
    }

    fn lower(&mut self) {
        self.set_level(false);
    }
}

/// The CPU-facing side of the interrupt controller: hardware interrupt
/// line 0 together with the matching `Cause` bit ([`CP0_CAUSE_HW0`]). The
/// host CPU model implements this.
pub trait CpuIrqSink {
    fn set_irq_pending(&mut self, pending: bool);
}

/// CP0 `Cause` bit that mirrors hardware interrupt line 0.
pub const CP0_CAUSE_HW0: u32 = 0x0000_0400;

/// Device handle onto one numbered input of the shared interrupt
/// controller.
pub struct PlatformIrqLine {
    intc: Rc<RefCell<Ar7Intc>>,
    irq: u32,
}

impl PlatformIrqLine {
    pub fn new(intc: Rc<RefCell<Ar7Intc>>, irq: u32) -> Self {
        Self { intc, irq }
    }
}

impl IrqLine for PlatformIrqLine {
    fn set_level(&mut self, level: bool) {
        self.intc.borrow_mut().set_line(self.irq, level);
    }
}
