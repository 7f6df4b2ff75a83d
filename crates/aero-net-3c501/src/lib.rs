//! 3Com 3C501 "EtherLink" ISA Ethernet adapter.
//!
//! The card is a 16-byte I/O window in front of a single 2 KiB packet buffer shared between
//! transmit and receive. Software (or ISA DMA) fills the buffer through an auto-incrementing
//! general purpose pointer, hands it to the adapter by flipping the buffer control bits of the
//! auxiliary command register, and reads it back the same way once a frame has arrived.
//!
//! The model is host agnostic:
//! - interrupts, ISA DMA and the link restore timer go through [`Platform`];
//! - frames leave through an [`aero_net_backend::NetworkBackend`];
//! - host → guest frames arrive through [`aero_net_backend::NetworkDown`] on [`SharedEl3c501`].
#![forbid(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod platform;
pub mod regs;
pub mod stats;

mod device;
mod dma;
mod info;
mod link;
mod rx;
mod shared;
#[cfg(feature = "io-snapshot")]
mod snapshot;
mod tx;

pub use config::{ConfigError, El3c501Config};
pub use device::{El3c501, El3c501Error, IoError, IoStatus};
pub use link::{MAX_LINKDOWN_REPORTED, MAX_LINKRST_POSTPONED};
pub use platform::{
    IsaDmaController, IsaIrqSink, Platform, PlatformError, RestoreTimer, VmState, VmStateQuery,
};
pub use rx::RxSignal;
pub use shared::SharedEl3c501;
#[cfg(feature = "io-snapshot")]
pub use snapshot::LoadContext;
pub use stats::{Counter, Stats, StatsSink};
