use std::collections::VecDeque;

use crate::{LinkState, NetError, NetworkBackend};

/// Default bound on frames a [`QueueBackend`] holds before it starts refusing transmits.
pub const DEFAULT_TX_QUEUE_CAPACITY: usize = 64;

/// Largest frame the queue backend will allocate a buffer for.
pub const MAX_QUEUED_FRAME_LEN: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueBackendStats {
    pub tx_frames: u64,
    pub tx_bytes: u64,
    /// Transmits refused with [`NetError::TryAgain`] because the TX queue was full.
    pub tx_try_again: u64,
    pub tx_net_down: u64,
    pub rx_queued_frames: u64,
    pub rx_dropped_full: u64,
}

/// Bounded in-memory backend.
///
/// Guest → host frames land in a TX queue that host glue drains with
/// [`QueueBackend::drain_tx_frames`]. When the queue is full, [`NetworkBackend::begin_xmit`]
/// reports [`NetError::TryAgain`]; after draining, the host should call the NIC's
/// `xmit_pending()`.
///
/// Host → guest frames are staged in an RX queue (see [`QueueBackend::push_rx_frame`]) for a
/// pump to deliver.
#[derive(Debug)]
pub struct QueueBackend {
    tx: VecDeque<Vec<u8>>,
    tx_capacity: usize,
    rx: VecDeque<Vec<u8>>,
    rx_capacity: usize,
    net_down: bool,
    promiscuous: bool,
    link_events: Vec<LinkState>,
    stats: QueueBackendStats,
}

impl Default for QueueBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueBackend {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TX_QUEUE_CAPACITY, DEFAULT_TX_QUEUE_CAPACITY)
    }

    pub fn with_capacity(tx_capacity: usize, rx_capacity: usize) -> Self {
        Self {
            tx: VecDeque::new(),
            tx_capacity,
            rx: VecDeque::new(),
            rx_capacity,
            net_down: false,
            promiscuous: false,
            link_events: Vec::new(),
            stats: QueueBackendStats::default(),
        }
    }

    /// Simulate the host side of the link going away. Allocations fail with
    /// [`NetError::NetDown`] while set.
    pub fn set_net_down(&mut self, down: bool) {
        self.net_down = down;
    }

    pub fn drain_tx_frames(&mut self) -> Vec<Vec<u8>> {
        self.tx.drain(..).collect()
    }

    pub fn pop_tx_frame(&mut self) -> Option<Vec<u8>> {
        self.tx.pop_front()
    }

    pub fn tx_len(&self) -> usize {
        self.tx.len()
    }

    /// Stage a host → guest frame. Returns `false` (and drops the frame) if the RX queue is full.
    pub fn push_rx_frame(&mut self, frame: Vec<u8>) -> bool {
        if self.rx.len() >= self.rx_capacity {
            self.stats.rx_dropped_full += 1;
            return false;
        }
        self.stats.rx_queued_frames += 1;
        self.rx.push_back(frame);
        true
    }

    pub fn rx_queue(&self) -> &VecDeque<Vec<u8>> {
        &self.rx
    }

    pub fn rx_queue_mut(&mut self) -> &mut VecDeque<Vec<u8>> {
        &mut self.rx
    }

    pub fn promiscuous(&self) -> bool {
        self.promiscuous
    }

    pub fn link_events(&self) -> &[LinkState] {
        &self.link_events
    }

    pub fn stats(&self) -> QueueBackendStats {
        self.stats
    }
}

impl NetworkBackend for QueueBackend {
    fn begin_xmit(&mut self) -> Result<(), NetError> {
        if self.tx.len() >= self.tx_capacity {
            self.stats.tx_try_again += 1;
            return Err(NetError::TryAgain);
        }
        Ok(())
    }

    fn alloc_buf(&mut self, len: usize) -> Result<Vec<u8>, NetError> {
        if self.net_down {
            self.stats.tx_net_down += 1;
            return Err(NetError::NetDown);
        }
        if len > MAX_QUEUED_FRAME_LEN {
            return Err(NetError::NoBufferSpace);
        }
        Ok(Vec::with_capacity(len))
    }

    fn send_buf(&mut self, frame: Vec<u8>) -> Result<(), NetError> {
        if self.net_down {
            self.stats.tx_net_down += 1;
            return Err(NetError::NetDown);
        }
        self.stats.tx_frames += 1;
        self.stats.tx_bytes += frame.len() as u64;
        self.tx.push_back(frame);
        Ok(())
    }

    fn set_promiscuous_mode(&mut self, enabled: bool) {
        self.promiscuous = enabled;
    }

    fn notify_link_changed(&mut self, state: LinkState) {
        self.link_events.push(state);
    }
}
