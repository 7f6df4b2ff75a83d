//! Deterministic snapshot encoding for I/O devices.
//!
//! The snapshot format uses a small tag-length-value (TLV) encoding to provide:
//! - deterministic byte output (canonical tag ordering)
//! - forward compatibility (unknown tags are skipped)
//! - explicit versioning (major/minor) at both format and device level

mod version;

pub use version::{
    SnapshotError, SnapshotHeader, SnapshotReader, SnapshotResult, SnapshotVersion, SnapshotWriter,
    FORMAT_VERSION,
};

/// Save/restore contract for a device record.
///
/// `DEVICE_ID` never changes once published. Within one major version only new TLV tags may be
/// added; `load_state` leaves fields it does not find untouched.
pub trait IoSnapshot {
    const DEVICE_ID: [u8; 4];
    const DEVICE_VERSION: SnapshotVersion;

    fn save_state(&self) -> Vec<u8>;
    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()>;
}
