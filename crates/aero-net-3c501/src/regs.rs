//! Register layouts of the 16-byte EtherLink I/O window.
//!
//! Every register is a single byte. The flag types below are built with
//! `from_bits_retain`, so bits without a name (such as the undefined bit of the
//! receive status) survive a write/read cycle unchanged.

use bitflags::bitflags;

/// Size of the I/O port window.
pub const EL3C501_IO_SIZE: u16 = 16;

/// Station address bytes 0..=5 (write-only).
pub const REG_STATION_ADDR: u16 = 0x0;
/// Receive command (write) / receive status (read). Reads alias at 0x0, 0x2, 0x4.
pub const REG_RCV: u16 = 0x6;
/// Transmit command (write) / transmit status (read). Reads alias at 0x1, 0x3, 0x5.
pub const REG_XMIT: u16 = 0x7;
pub const REG_GP_LO: u16 = 0x8;
pub const REG_GP_HI: u16 = 0x9;
/// RCV pointer low byte on read; any write clears the pointer.
pub const REG_RCV_PTR_LO: u16 = 0xA;
pub const REG_RCV_PTR_HI: u16 = 0xB;
/// PROM window, indexed by the low three bits of the GP pointer. 0xD is an alias.
pub const REG_PROM: u16 = 0xC;
pub const REG_PROM_ALIAS: u16 = 0xD;
/// Auxiliary command (write) / auxiliary status (read).
pub const REG_AUX: u16 = 0xE;
/// Packet buffer window at the GP pointer, auto-incrementing.
pub const REG_BUF_WINDOW: u16 = 0xF;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct XmitCmd: u8 {
        const DET_UFLOW = 1 << 0;
        const DET_COLL = 1 << 1;
        const DET_COLL16 = 1 << 2;
        const DET_SUCCESS = 1 << 3;
    }
}

bitflags! {
    /// Shares its bit layout with [`XmitCmd`]; `cmd & stat` yields the conditions that should
    /// interrupt.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct XmitStat: u8 {
        const UFLOW = 1 << 0;
        const COLL = 1 << 1;
        const COLL16 = 1 << 2;
        const READY = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct RecvCmd: u8 {
        const DET_OFLOW = 1 << 0;
        const DET_FCS = 1 << 1;
        const DET_DRIBBLE = 1 << 2;
        const DET_RUNT = 1 << 3;
        const DET_EOF = 1 << 4;
        const ACCEPT_GOOD = 1 << 5;
        const ADDR_MATCH = 0b11 << 6;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct RecvStat: u8 {
        const OFLOW = 1 << 0;
        const FCS = 1 << 1;
        const DRIBBLE = 1 << 2;
        const RUNT = 1 << 3;
        const NO_OFLOW = 1 << 4;
        const GOOD = 1 << 5;
        const UNDEF = 1 << 6;
        /// The guest has read the status of the last frame; reception may continue.
        const STALE = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct AuxCmd: u8 {
        /// Interrupt request enable. Not mirrored into the status register.
        const IRE = 1 << 0;
        const XMIT_BAD_FCS = 1 << 1;
        const BUF_CTL = 0b11 << 2;
        const UNUSED = 1 << 4;
        const DMA_REQ = 1 << 5;
        /// Request interrupt and DMA enable.
        const RIDE = 1 << 6;
        const RESET = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct AuxStat: u8 {
        const RECV_BUSY = 1 << 0;
        const XMIT_BAD_FCS = 1 << 1;
        const BUF_CTL = 0b11 << 2;
        const DMA_DONE = 1 << 4;
        const DMA_REQ = 1 << 5;
        const RIDE = 1 << 6;
        const XMIT_BUSY = 1 << 7;
    }
}

bitflags! {
    /// Internal interrupt latches. Not directly guest-visible.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct IntrState: u8 {
        const RECV = 1 << 0;
        const XMIT = 1 << 1;
        const DMA = 1 << 2;
    }
}

const ADDR_MATCH_SHIFT: u8 = 6;
const BUF_CTL_SHIFT: u8 = 2;

/// Address filter mode, bits 6-7 of the receive command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddrMatch {
    Disabled = 0,
    Promiscuous = 1,
    /// Station address plus broadcast.
    Broadcast = 2,
    /// Station address plus multicast.
    Multicast = 3,
}

impl AddrMatch {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Disabled,
            1 => Self::Promiscuous,
            2 => Self::Broadcast,
            _ => Self::Multicast,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Promiscuous => "Promiscuous",
            Self::Broadcast => "Broadcast",
            Self::Multicast => "Multicast",
        }
    }
}

/// Owner of the shared packet buffer, bits 2-3 of the aux command/status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferControl {
    System = 0,
    XmitRcv = 1,
    Receive = 2,
    Loopback = 3,
}

impl BufferControl {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::System,
            1 => Self::XmitRcv,
            2 => Self::Receive,
            _ => Self::Loopback,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::XmitRcv => "Xmit then Recv",
            Self::Receive => "Receive",
            Self::Loopback => "Loopback",
        }
    }
}

impl RecvCmd {
    pub fn addr_match(self) -> AddrMatch {
        AddrMatch::from_bits(self.bits() >> ADDR_MATCH_SHIFT)
    }
}

impl AuxCmd {
    pub fn buf_ctl(self) -> BufferControl {
        BufferControl::from_bits(self.bits() >> BUF_CTL_SHIFT)
    }

    pub fn set_buf_ctl(&mut self, ctl: BufferControl) {
        *self = Self::from_bits_retain(
            (self.bits() & !Self::BUF_CTL.bits()) | ((ctl as u8) << BUF_CTL_SHIFT),
        );
    }
}

impl AuxStat {
    pub fn buf_ctl(self) -> BufferControl {
        BufferControl::from_bits(self.bits() >> BUF_CTL_SHIFT)
    }

    pub fn set_buf_ctl(&mut self, ctl: BufferControl) {
        *self = Self::from_bits_retain(
            (self.bits() & !Self::BUF_CTL.bits()) | ((ctl as u8) << BUF_CTL_SHIFT),
        );
    }
}
