//! Packet buffer addressing.
//!
//! The GP and RCV pointers count modulo 4096 but only their low 11 bits address the
//! 2048-byte buffer. Diagnostics rely on the mismatch: after a transmit the GP pointer reads
//! back as 0x800 while addressing offset 0.

/// Size of the shared packet buffer.
pub const BUF_SIZE: usize = 2048;
/// Mask applied to a pointer to address the buffer.
pub const BUF_ADDR_MASK: u16 = 0x07FF;
/// Width of the pointer counters.
pub const PTR_MASK: u16 = 0x0FFF;

/// Ethernet minimum frame length without FCS.
pub const MIN_FRAME_LEN: usize = 60;
/// Largest frame the adapter will put on the wire.
pub const MAX_FRAME_LEN: usize = 1536;
pub const RUNT_PAD_SIZE: usize = 64;

#[inline]
pub const fn address_for(ptr: u16) -> usize {
    (ptr & BUF_ADDR_MASK) as usize
}

#[inline]
pub const fn advance(ptr: u16, n: usize) -> u16 {
    ((ptr as usize).wrapping_add(n) & PTR_MASK as usize) as u16
}

/// Bytes between the addressed position and the end of the buffer.
#[inline]
pub const fn room_at(ptr: u16) -> usize {
    BUF_SIZE - address_for(ptr)
}

/// The adapter's single shared 2 KiB buffer. Copies never wrap: they stop at the end.
#[derive(Clone)]
pub struct PacketBuffer {
    bytes: Box<[u8; BUF_SIZE]>,
}

impl std::fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketBuffer").finish_non_exhaustive()
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self {
            bytes: Box::new([0; BUF_SIZE]),
        }
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    pub fn read(&self, ptr: u16) -> u8 {
        self.bytes[address_for(ptr)]
    }

    pub fn write(&mut self, ptr: u16, value: u8) {
        self.bytes[address_for(ptr)] = value;
    }

    /// Copy as much of `src` as fits at `ptr`. Returns the number of bytes copied.
    pub fn copy_in(&mut self, ptr: u16, src: &[u8]) -> usize {
        let at = address_for(ptr);
        let len = src.len().min(BUF_SIZE - at);
        self.bytes[at..at + len].copy_from_slice(&src[..len]);
        len
    }

    /// Contiguous view starting at `ptr`, at most `len` bytes long.
    pub fn window(&self, ptr: u16, len: usize) -> &[u8] {
        let at = address_for(ptr);
        let len = len.min(BUF_SIZE - at);
        &self.bytes[at..at + len]
    }

    pub fn window_mut(&mut self, ptr: u16, len: usize) -> &mut [u8] {
        let at = address_for(ptr);
        let len = len.min(BUF_SIZE - at);
        &mut self.bytes[at..at + len]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..]
    }
}
