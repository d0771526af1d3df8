//! Guest physical address map of the peripheral complex.
//!
//! Two windows cover the whole device space and route to the same
//! dispatcher; the individual block bases below are absolute guest
//! physical addresses.

/// Low window: everything from just above the exception vectors up to RAM.
pub const MMIO_WINDOW0_BASE: u32 = 0x0000_1000;
pub const MMIO_WINDOW0_LEN: u32 = 0x0fff_f000;
/// High window alias used by some firmwares.
pub const MMIO_WINDOW1_BASE: u32 = 0x1e00_0000;
pub const MMIO_WINDOW1_LEN: u32 = 0x01c0_0000;

// Wide memory-like regions.
pub const ADSL_BASE: u32 = 0x0100_0000;
pub const ADSL_LEN: u32 = 0x0002_0000;
pub const BBIF_BASE: u32 = 0x0200_0000;
pub const BBIF_LEN: u32 = 0x4;
pub const ATM_SAR_BASE: u32 = 0x0300_0000;
pub const ATM_SAR_LEN: u32 = 0x9000;
pub const USB_MEM_BASE: u32 = 0x0340_0000;
pub const USB_MEM_LEN: u32 = 0x2000;
pub const VLYNQ0_MEM_BASE: u32 = 0x0400_0000;
pub const VLYNQ0_MEM_LEN: u32 = 0x4_2000;

/// Inside the VLYNQ0 memory window; reads answer with a fixed PCI device
/// id so probing firmware believes a card is present.
pub const VLYNQ0_MEM_PCI_ID_ADDR: u32 = 0x0404_1000;
pub const VLYNQ0_MEM_PCI_ID: u32 = 0x9066_104c;

// Register blocks.
pub const CPMAC0_BASE: u32 = 0x0861_0000;
pub const CPMAC0_LEN: u32 = 0x800;
pub const EMIF_BASE: u32 = 0x0861_0800;
pub const EMIF_LEN: u32 = 0x100;
pub const GPIO_BASE: u32 = 0x0861_0900;
pub const GPIO_LEN: u32 = 0x20;
pub const CLOCK_BASE: u32 = 0x0861_0a00;
pub const CLOCK_LEN: u32 = 0x100;
pub const WATCHDOG_BASE: u32 = 0x0861_0b00;
pub const WATCHDOG_LEN: u32 = 0x80;
pub const TIMER0_BASE: u32 = 0x0861_0c00;
pub const TIMER0_LEN: u32 = 0x8;
pub const TIMER1_BASE: u32 = 0x0861_0d00;
pub const TIMER1_LEN: u32 = 0x8;
pub const UART0_BASE: u32 = 0x0861_0e00;
pub const UART0_LEN: u32 = 0x20;
pub const UART1_BASE: u32 = 0x0861_0f00;
pub const UART1_LEN: u32 = 0x20;
pub const USB_BASE: u32 = 0x0861_1200;
pub const USB_LEN: u32 = 0x50;
pub const RESET_BASE: u32 = 0x0861_1600;
pub const RESET_LEN: u32 = 0x200;
pub const VLYNQ0_BASE: u32 = 0x0861_1800;
pub const VLYNQ0_LEN: u32 = 0x100;
pub const DCL_BASE: u32 = 0x0861_1a00;
pub const DCL_LEN: u32 = 0x14;
pub const VLYNQ1_BASE: u32 = 0x0861_1c00;
pub const VLYNQ1_LEN: u32 = 0x100;
pub const MDIO_BASE: u32 = 0x0861_1e00;
pub const MDIO_LEN: u32 = 0x88;
pub const OHIO_WDT_BASE: u32 = 0x0861_1f00;
pub const OHIO_WDT_LEN: u32 = 0x20;
pub const INTC_BASE: u32 = 0x0861_2400;
pub const INTC_LEN: u32 = 0x300;
pub const CPMAC1_BASE: u32 = 0x0861_2800;
pub const CPMAC1_LEN: u32 = 0x800;

/// Host-side I/O ports the UART bridges forward to.
pub const UART0_IO_BASE: u16 = 0x3f8;
pub const UART1_IO_BASE: u16 = 0x2f8;
