//! Versioned, deterministic save/restore records for emulated I/O devices.
#![forbid(unsafe_code)]

pub mod io;
