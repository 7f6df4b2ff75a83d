//! Glue logic for pumping Ethernet frames between emulated NICs and host backends.
//!
//! Integration layers call [`TickPump::tick`] once per emulation slice:
//! 1. Drain guest TX frames queued by a [`QueueBackend`] into a host sink, with a bounded budget.
//! 2. If anything was drained, tell the NIC (`xmit_pending`) so a deferred transmit can go out.
//! 3. Deliver staged host RX frames into the NIC, with a bounded budget.
//!
//! RX delivery honours the NIC's flow control. Before each frame the pump asks
//! [`NetworkDown::wait_receive_avail`]; when the NIC is busy the frame stays at the head of its
//! queue and the tick ends.
#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aero_net_backend::{NetworkDown, QueueBackend, RxWaitError};

/// Default frame budget for each direction per tick.
pub const DEFAULT_MAX_FRAMES_PER_TICK: usize = 256;

/// Staged host → guest frames.
pub trait FrameSource {
    fn has_frame(&mut self) -> bool;
    fn pop_frame(&mut self) -> Option<Vec<u8>>;
}

impl FrameSource for VecDeque<Vec<u8>> {
    fn has_frame(&mut self) -> bool {
        !self.is_empty()
    }

    fn pop_frame(&mut self) -> Option<Vec<u8>> {
        self.pop_front()
    }
}

impl FrameSource for QueueBackend {
    fn has_frame(&mut self) -> bool {
        !self.rx_queue().is_empty()
    }

    fn pop_frame(&mut self) -> Option<Vec<u8>> {
        self.rx_queue_mut().pop_front()
    }
}

impl<T: FrameSource + ?Sized> FrameSource for &mut T {
    fn has_frame(&mut self) -> bool {
        (**self).has_frame()
    }

    fn pop_frame(&mut self) -> Option<Vec<u8>> {
        (**self).pop_frame()
    }
}

/// The lock is only held for the queue operation itself, never across a call into the NIC.
impl<T: FrameSource + ?Sized> FrameSource for Arc<Mutex<T>> {
    fn has_frame(&mut self) -> bool {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .has_frame()
    }

    fn pop_frame(&mut self) -> Option<Vec<u8>> {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_frame()
    }
}

/// Why RX delivery stopped before the source ran dry or the budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxStop {
    /// The NIC could not take another frame within the wait budget.
    ReceiverBusy,
    /// The VM stopped running.
    Interrupted,
}

/// Number of frames pumped in each direction during a tick.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpCounts {
    /// Guest → host frames handed to the sink.
    pub tx_frames: usize,
    /// Host → guest frames delivered to the NIC.
    pub rx_frames: usize,
    pub rx_stop: Option<RxStop>,
}

/// Deliver up to `max_frames` frames from `source` into `nic`.
///
/// Each frame waits at most `wait` for the receiver; a zero `wait` only polls.
pub fn deliver_rx_frames<N, S>(
    nic: &N,
    source: &mut S,
    max_frames: usize,
    wait: Duration,
) -> PumpCounts
where
    N: NetworkDown + ?Sized,
    S: FrameSource + ?Sized,
{
    let mut counts = PumpCounts::default();
    for _ in 0..max_frames {
        if !source.has_frame() {
            break;
        }
        match nic.wait_receive_avail(wait) {
            Ok(()) => {}
            Err(err) => {
                tracing::trace!(%err, delivered = counts.rx_frames, "rx delivery paused");
                counts.rx_stop = Some(match err {
                    RxWaitError::NoBufferSpace => RxStop::ReceiverBusy,
                    RxWaitError::Interrupted => RxStop::Interrupted,
                });
                break;
            }
        }
        let Some(frame) = source.pop_frame() else {
            break;
        };
        nic.receive(&frame);
        counts.rx_frames += 1;
    }
    counts
}

/// Forward up to `max_frames` queued guest frames to `sink`, then let the NIC retry a
/// transmit it deferred while the queue was full.
pub fn drain_tx_frames<N, F>(
    nic: &N,
    backend: &Mutex<QueueBackend>,
    max_frames: usize,
    mut sink: F,
) -> usize
where
    N: NetworkDown + ?Sized,
    F: FnMut(Vec<u8>),
{
    let mut drained = 0;
    for _ in 0..max_frames {
        // The NIC locks the backend while transmitting; release it before calling out.
        let frame = backend
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_tx_frame();
        let Some(frame) = frame else {
            break;
        };
        sink(frame);
        drained += 1;
    }
    if drained > 0 {
        nic.xmit_pending();
    }
    drained
}

/// Budget-only pump for integration layers that borrow the NIC and backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPump {
    pub max_tx_frames_per_tick: usize,
    pub max_rx_frames_per_tick: usize,
    /// How long each RX frame may wait for the receiver.
    pub rx_wait: Duration,
}

impl Default for TickPump {
    fn default() -> Self {
        Self {
            max_tx_frames_per_tick: DEFAULT_MAX_FRAMES_PER_TICK,
            max_rx_frames_per_tick: DEFAULT_MAX_FRAMES_PER_TICK,
            rx_wait: Duration::ZERO,
        }
    }
}

impl TickPump {
    pub fn new(max_tx_frames_per_tick: usize, max_rx_frames_per_tick: usize) -> Self {
        Self {
            max_tx_frames_per_tick,
            max_rx_frames_per_tick,
            ..Self::default()
        }
    }

    pub fn with_rx_wait(mut self, rx_wait: Duration) -> Self {
        self.rx_wait = rx_wait;
        self
    }

    /// One slice: TX drain first, then RX delivery out of the backend's staged queue.
    pub fn tick<N, F>(
        &mut self,
        nic: &N,
        backend: &Arc<Mutex<QueueBackend>>,
        sink: F,
    ) -> PumpCounts
    where
        N: NetworkDown + ?Sized,
        F: FnMut(Vec<u8>),
    {
        let tx_frames = drain_tx_frames(nic, backend, self.max_tx_frames_per_tick, sink);
        let mut source = backend.clone();
        let rx = deliver_rx_frames(nic, &mut source, self.max_rx_frames_per_tick, self.rx_wait);
        PumpCounts { tx_frames, ..rx }
    }
}
