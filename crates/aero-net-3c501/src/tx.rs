//! Transmit path: the tail of the packet buffer onto the wire (or back into the receiver).

use aero_net_backend::{NetError, NetworkBackend};

use crate::buffer::{room_at, BUF_SIZE, MAX_FRAME_LEN};
use crate::device::El3c501;
use crate::link::MAX_LINKDOWN_REPORTED;
use crate::regs::{AuxStat, BufferControl, IntrState, XmitStat};
use crate::stats::Counter;

impl El3c501 {
    /// The backend can take frames again; complete a transmit it deferred.
    pub fn xmit_pending(&mut self) {
        self.transmit();
    }

    /// Send the frame between the GP pointer and the end of the buffer.
    ///
    /// No-op unless a transmit is outstanding and the adapter owns the buffer for transmit.
    pub(crate) fn transmit(&mut self) {
        if !self.aux_stat.contains(AuxStat::XMIT_BUSY) {
            tracing::trace!("no transmit outstanding");
            return;
        }
        let loopback = match self.aux_cmd.buf_ctl() {
            BufferControl::XmitRcv => false,
            BufferControl::Loopback => true,
            other => {
                tracing::trace!(buf_ctl = other.name(), "buffer not owned for transmit");
                return;
            }
        };

        if let Err(err) = self.backend.begin_xmit() {
            tracing::debug!(%err, "backend busy, transmit deferred");
            return;
        }
        self.transmit_frame(loopback);
        self.backend.end_xmit();
    }

    fn transmit_frame(&mut self, loopback: bool) {
        let link_up = self.is_effectively_up();
        if !link_up && !loopback {
            if self.link_down_reported > MAX_LINKDOWN_REPORTED {
                tracing::trace!("link down, frame discarded");
                self.xmit_stat = XmitStat::empty();
            } else {
                // No notion of link state on this card; a collision is the closest thing.
                self.link_down_reported += 1;
                self.xmit_stat = XmitStat::COLL;
            }
            self.finish_transmit(loopback);
            return;
        }

        let len = room_at(self.gp_buf_ptr);
        if len > MAX_FRAME_LEN {
            tracing::warn!(len, gp = self.gp_buf_ptr, "illegal giant frame, not transmitted");
            self.stats.inc(Counter::GiantFrames);
            self.xmit_stat = XmitStat::empty();
            self.aux_stat.remove(AuxStat::XMIT_BUSY);
            self.latch_xmit_intr();
            self.update_irq();
            return;
        }

        let result = if loopback {
            let mut frame = std::mem::take(&mut self.loop_buf);
            frame.clear();
            frame.extend_from_slice(self.buf.window(self.gp_buf_ptr, len));
            self.receive_frame(&frame, true);
            self.loop_buf = frame;
            Ok(())
        } else {
            match self.backend.alloc_buf(len) {
                Err(NetError::TryAgain) => {
                    tracing::debug!(len, "no transmit buffer, transmit deferred");
                    return;
                }
                Err(err) => Err(err),
                Ok(mut frame) => {
                    frame.extend_from_slice(self.buf.window(self.gp_buf_ptr, len));
                    self.backend.send_buf(frame)
                }
            }
        };

        match result {
            Ok(()) => {
                tracing::trace!(len, loopback, "frame transmitted");
                self.stats.add(Counter::TransmitBytes, len as u64);
                self.xmit_stat = XmitStat::READY;
            }
            Err(err) => {
                tracing::debug!(%err, len, "transmit failed, reporting collision");
                self.xmit_stat = XmitStat::COLL;
            }
        }
        self.finish_transmit(loopback);
    }

    fn finish_transmit(&mut self, loopback: bool) {
        self.aux_stat.remove(AuxStat::XMIT_BUSY);
        self.latch_xmit_intr();
        // Diagnostics expect the GP pointer just past the end of the buffer.
        self.gp_buf_ptr = BUF_SIZE as u16;
        // Buffer control is left alone; the receiver simply goes busy.
        if !loopback {
            self.aux_stat.insert(AuxStat::RECV_BUSY);
            self.kick_receive();
        }
        self.update_irq();
    }

    fn latch_xmit_intr(&mut self) {
        let hit = self.xmit_cmd.bits() & self.xmit_stat.bits() != 0;
        self.intr.set(IntrState::XMIT, hit);
    }
}
