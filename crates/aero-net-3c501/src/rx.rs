//! Receive path: host frames into the shared packet buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, MutexGuard};
use std::time::Duration;

use crate::buffer::{advance, BUF_SIZE, MIN_FRAME_LEN, RUNT_PAD_SIZE};
use crate::device::El3c501;
use crate::regs::{AddrMatch, AuxCmd, AuxStat, IntrState, RecvCmd, RecvStat};
use crate::stats::Counter;

/// Wakeup channel between the receive path and a backend blocked in `wait_receive_avail`.
#[derive(Debug, Default)]
pub struct RxSignal {
    /// A waiter exists and must be woken when the receiver frees up.
    maybe_out_of_space: AtomicBool,
    cond: Condvar,
}

impl RxSignal {
    pub(crate) fn set_waiting(&self, waiting: bool) {
        self.maybe_out_of_space.store(waiting, Ordering::SeqCst);
    }

    pub(crate) fn waiting(&self) -> bool {
        self.maybe_out_of_space.load(Ordering::SeqCst)
    }

    pub(crate) fn wake(&self) {
        self.cond.notify_all();
    }

    /// Release `guard` while waiting for a wakeup or the timeout.
    pub(crate) fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> MutexGuard<'a, T> {
        match self.cond.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }
}

impl El3c501 {
    /// Whether a frame delivered now could make progress.
    pub fn can_receive(&self) -> bool {
        self.rcv_cmd.addr_match() != AddrMatch::Disabled
            && self.aux_stat.contains(AuxStat::RECV_BUSY)
    }

    /// Wake a blocked receive waiter if reception just became possible.
    pub(crate) fn kick_receive(&mut self) {
        if self.can_receive() && self.rx_signal.waiting() {
            tracing::trace!("waking receive waiter");
            self.stats.inc(Counter::RxOverflowWakeup);
            self.rx_signal.wake();
        }
    }

    /// Deliver one frame from the wire. Frames the adapter cannot take are dropped.
    pub fn receive(&mut self, frame: &[u8]) {
        self.receive_frame(frame, false);
    }

    pub(crate) fn receive_frame(&mut self, frame: &[u8], loopback: bool) {
        if !self.vm_running() {
            self.stats.inc(Counter::DropPktVmNotRunning);
            return;
        }
        let mode = self.rcv_cmd.addr_match();
        if mode == AddrMatch::Disabled {
            self.stats.inc(Counter::DropPktAdrmDis);
            return;
        }
        if frame.is_empty() {
            self.stats.inc(Counter::DropPktZeroLen);
            return;
        }
        if !self.is_effectively_up() && !loopback {
            self.stats.inc(Counter::DropPktNoLink);
            return;
        }
        // One frame at a time: the guest must read the last status first.
        if !self.rcv_stat.contains(RecvStat::STALE) {
            self.stats.inc(Counter::DropPktStaleRcv);
            return;
        }

        if !self.passes_address_filter(mode, frame) {
            tracing::trace!(len = frame.len(), "frame rejected by address filter");
            return;
        }

        let mut status = RecvStat::STALE;
        let mut runt_buf = [0u8; RUNT_PAD_SIZE];
        let mut src = frame;
        if src.len() < MIN_FRAME_LEN {
            if loopback {
                tracing::debug!(len = src.len(), "loopback runt");
                status.insert(RecvStat::RUNT);
            } else {
                runt_buf[..src.len()].copy_from_slice(src);
                src = &runt_buf[..MIN_FRAME_LEN];
            }
        }

        // A small frame still overflows when the pointer starts near the end of the buffer.
        if usize::from(self.rcv_buf_ptr) + src.len() <= BUF_SIZE {
            status.insert(RecvStat::NO_OFLOW);
        } else {
            tracing::debug!(len = src.len(), rcv_ptr = self.rcv_buf_ptr, "receive overflow");
            status.insert(RecvStat::OFLOW);
        }

        if loopback && self.aux_cmd.contains(AuxCmd::XMIT_BAD_FCS) {
            status.insert(RecvStat::FCS);
        }

        if status.contains(RecvStat::NO_OFLOW) && !status.intersects(RecvStat::FCS | RecvStat::RUNT)
        {
            status.insert(RecvStat::GOOD);
        }

        // Never wraps; whatever does not fit before the end of the buffer is lost.
        let copied = self.buf.copy_in(self.rcv_buf_ptr, src);
        self.stats.add(Counter::ReceiveBytes, copied as u64);
        self.rcv_buf_ptr = advance(self.rcv_buf_ptr, copied);
        tracing::trace!(len = copied, rcv_ptr = self.rcv_buf_ptr, "frame received");

        let cmd = self.rcv_cmd;
        let interesting = (status.contains(RecvStat::GOOD) && cmd.contains(RecvCmd::ACCEPT_GOOD))
            || (status.contains(RecvStat::NO_OFLOW) && cmd.contains(RecvCmd::DET_EOF))
            || (status.contains(RecvStat::RUNT) && cmd.contains(RecvCmd::DET_RUNT))
            || (status.contains(RecvStat::DRIBBLE) && cmd.contains(RecvCmd::DET_DRIBBLE))
            || (status.contains(RecvStat::FCS) && cmd.contains(RecvCmd::DET_FCS))
            || (status.contains(RecvStat::OFLOW) && cmd.contains(RecvCmd::DET_OFLOW));
        if interesting {
            self.aux_stat.remove(AuxStat::RECV_BUSY);
            self.intr.insert(IntrState::RECV);
            status.remove(RecvStat::STALE);
        }

        self.rcv_stat = status;
        self.update_irq();
    }

    fn passes_address_filter(&self, mode: AddrMatch, frame: &[u8]) -> bool {
        if mode == AddrMatch::Promiscuous {
            return true;
        }
        let Some(dest) = frame.get(..6) else {
            return false;
        };
        (mode >= AddrMatch::Broadcast && dest == self.station_addr)
            || (mode == AddrMatch::Broadcast && dest == [0xFF; 6])
            || (mode == AddrMatch::Multicast && dest[0] & 1 != 0)
    }
}
