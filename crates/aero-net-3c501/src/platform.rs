//! Services the card needs from the machine it is plugged into.
//!
//! The device never touches interrupt controllers, the ISA DMA controller or timers directly;
//! it goes through these traits so the same model runs under a full machine or a unit-test
//! double.

use thiserror::Error;

/// Run state of the virtual machine, as far as frame delivery cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmState {
    Running,
    /// Running while a live snapshot is being taken.
    RunningLiveSave,
    Suspended,
    PoweredOff,
}

impl VmState {
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::RunningLiveSave)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The operation cannot be performed from the current execution context. The caller should
    /// retry the whole access from a context where it can.
    #[error("operation must be retried from a safe execution context")]
    WrongContext,
    #[error("platform service unavailable")]
    Unavailable,
}

pub trait IsaIrqSink {
    fn set_irq_level(&mut self, irq: u8, level: bool);
}

/// The host's 8237-style DMA controller.
pub trait IsaDmaController {
    fn register_channel(&mut self, channel: u8) -> Result<(), PlatformError>;

    /// Raise or drop the DMA request line of `channel`.
    fn set_dreq(&mut self, channel: u8, level: bool) -> Result<(), PlatformError>;

    /// Ask the controller to run pending transfers soon.
    fn schedule(&mut self);

    /// Current mode register of `channel`. Bits 2-3 hold the transfer type.
    fn channel_mode(&mut self, channel: u8) -> u8;

    /// Copy guest memory at `pos` in the channel's window into `buf`. Returns bytes copied.
    fn read_memory(&mut self, channel: u8, buf: &mut [u8], pos: u32) -> usize;

    /// Copy `buf` into guest memory at `pos` in the channel's window. Returns bytes copied.
    fn write_memory(&mut self, channel: u8, buf: &[u8], pos: u32) -> usize;
}

/// One-shot timer used to bring the link back after a temporary outage.
pub trait RestoreTimer {
    fn arm_millis(&mut self, millis: u32) -> Result<(), PlatformError>;
    fn cancel(&mut self);
}

pub trait VmStateQuery {
    fn vm_state(&self) -> VmState;
}

/// Everything the card needs from its machine.
pub trait Platform: IsaIrqSink + IsaDmaController + RestoreTimer + VmStateQuery + Send {}

impl<T> Platform for T where T: IsaIrqSink + IsaDmaController + RestoreTimer + VmStateQuery + Send {}

/// 8237 transfer type for a mode-register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaTransferType {
    Verify,
    /// Device to memory.
    Write,
    /// Memory to device.
    Read,
    Illegal,
}

impl DmaTransferType {
    pub const fn from_mode(mode: u8) -> Self {
        match (mode & 0x0C) >> 2 {
            0 => Self::Verify,
            1 => Self::Write,
            2 => Self::Read,
            _ => Self::Illegal,
        }
    }
}
