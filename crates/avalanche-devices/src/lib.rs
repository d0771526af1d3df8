//! Device models for the AR7 ("Avalanche") on-chip peripheral complex.
//!
//! Each module emulates one register block of the SoC as seen by the guest
//! kernel driver. Blocks that are pure backing memory live in the platform
//! crate; only blocks with behavior get a model here.

pub mod clock;
pub mod intc;
pub mod irq;
pub mod mdio;
pub mod regs;
pub mod reset_ctrl;
pub mod vlynq;
pub mod watchdog;
