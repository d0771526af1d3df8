//! Device emulation for the TI AR7 ("Avalanche") system-on-chip peripheral
//! complex: the memory-mapped register fabric a MIPS guest kernel talks to,
//! including the CPMAC Ethernet MACs with their DMA descriptor engines, the
//! interrupt controller, the MDIO/PHY management interface, the VLYNQ remote
//! bus windows, the multi-stage locked watchdog, and the reset/clock/GPIO
//! miscellany.
//!
//! The host emulator supplies the MIPS CPU, the 16450 UART models, and the
//! packet backend; this workspace supplies everything between the guest's
//! physical address space and those collaborators. Start at
//! [`avalanche_platform::Ar7Platform`].

pub use avalanche_devices as devices;
pub use avalanche_io_snapshot as io_snapshot;
pub use avalanche_net_cpmac as cpmac;
pub use avalanche_platform as platform;
pub use memory;
