//! ISA DMA access to the packet buffer.
//!
//! DMA is an alternative to the buffer window port: both move data at the GP pointer. The
//! 8237 transfer type is named from memory's point of view, so a "write" transfer reads the
//! packet buffer.

use crate::buffer::{address_for, advance, BUF_SIZE};
use crate::device::El3c501;
use crate::platform::{DmaTransferType, IsaDmaController, PlatformError};
use crate::regs::{AuxStat, IntrState};
use crate::stats::Counter;

impl El3c501 {
    /// Raise or drop the DMA request line. Without a usable channel only the internal state
    /// changes.
    pub(crate) fn set_dma_request(&mut self, active: bool) -> Result<(), PlatformError> {
        if self.config.dma_enabled() {
            self.platform.set_dreq(self.config.dma_channel, active)?;
            tracing::debug!(channel = self.config.dma_channel, active, "DMA request");
        }
        self.dma_active = active;
        if active && self.config.dma_enabled() {
            self.platform.schedule();
        }
        Ok(())
    }

    /// Service one pass of the DMA controller.
    ///
    /// `pos` and `len` describe the controller's view of the transfer. Returns the updated
    /// transfer position.
    pub fn dma_transfer(&mut self, channel: u8, pos: u32, len: u32) -> u32 {
        let mode = self.platform.channel_mode(channel);
        let xfer = DmaTransferType::from_mode(mode);

        let start = self.gp_buf_ptr;
        let at = address_for(start);
        let want = (len as usize).min(BUF_SIZE - at);
        let (moved, last) = if xfer == DmaTransferType::Write {
            let window = self.buf.window(start, want);
            (self.platform.write_memory(channel, window, pos), self.rcv_buf_ptr)
        } else {
            // Read and verify transfers both fill the buffer; stop once the address wraps.
            let window = self.buf.window_mut(start, want);
            (self.platform.read_memory(channel, window, pos), 0)
        };
        let moved = moved.min(want);
        self.gp_buf_ptr = advance(start, moved);
        self.stats.inc(Counter::DmaPasses);
        tracing::trace!(?xfer, pos, len, moved, gp = self.gp_buf_ptr, "DMA pass");

        if address_for(self.gp_buf_ptr) == address_for(last) {
            tracing::debug!(gp = self.gp_buf_ptr, "DMA complete");
            if let Err(err) = self.platform.set_dreq(channel, false) {
                tracing::error!(%err, channel, "failed to drop DMA request");
            }
            self.intr.insert(IntrState::DMA);
            self.aux_stat.insert(AuxStat::DMA_DONE);
            self.update_irq();
        } else {
            self.platform.schedule();
        }

        pos + moved as u32
    }
}
