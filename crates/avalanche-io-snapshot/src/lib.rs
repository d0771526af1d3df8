//! Versioned device-snapshot container.
//!
//! Every device serializes to a self-describing blob: a fixed header
//! (magic, container format version, device id, device version) followed
//! by tagged little-endian fields. Readers must tolerate unknown tags
//! (forward-compatible minor bumps) and must reject anything that smells
//! corrupt rather than guess: duplicate tags, truncated fields, absurd
//! counts. Restore is all-or-nothing; a device must not partially apply a
//! blob that fails validation halfway through.

pub mod io;
