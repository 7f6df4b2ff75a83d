use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use aero_net_backend::{LinkState, MacAddr, NetworkConfig, NetworkDown, RxWaitError};

use crate::device::{El3c501, IoError, IoStatus};
use crate::rx::RxSignal;

/// Thread-safe handle to an adapter.
///
/// Every entry point runs under one device-wide lock: vCPU port I/O, DMA passes, the restore
/// timer and backend frame delivery all serialize here. Receive waiters release the lock while
/// they block.
#[derive(Clone)]
pub struct SharedEl3c501 {
    dev: Arc<Mutex<El3c501>>,
    rx_signal: Arc<RxSignal>,
}

impl std::fmt::Debug for SharedEl3c501 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEl3c501").finish_non_exhaustive()
    }
}

impl SharedEl3c501 {
    pub fn new(dev: El3c501) -> Self {
        let rx_signal = dev.rx_signal();
        Self {
            dev: Arc::new(Mutex::new(dev)),
            rx_signal,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, El3c501> {
        self.dev.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn io_read(&self, port: u16, size: usize) -> Result<u32, IoError> {
        self.lock().io_read(port, size)
    }

    pub fn io_write(&self, port: u16, size: usize, value: u32) -> Result<IoStatus, IoError> {
        self.lock().io_write(port, size, value)
    }

    pub fn dma_transfer(&self, channel: u8, pos: u32, len: u32) -> u32 {
        self.lock().dma_transfer(channel, pos, len)
    }

    pub fn restore_timer_expired(&self) {
        self.lock().restore_timer_expired();
    }

    /// The VM was suspended, powered off or resumed. Blocked receive waiters re-check.
    pub fn notify_vm_state_changed(&self) {
        let _dev = self.lock();
        self.rx_signal.wake();
    }
}

impl NetworkDown for SharedEl3c501 {
    fn wait_receive_avail(&self, timeout: Duration) -> Result<(), RxWaitError> {
        let mut dev = self.lock();
        if dev.can_receive() {
            return Ok(());
        }
        if timeout.is_zero() {
            return Err(RxWaitError::NoBufferSpace);
        }

        // `None` means the timeout is too large to represent: wait indefinitely.
        let deadline = Instant::now().checked_add(timeout);
        self.rx_signal.set_waiting(true);
        let result = loop {
            if !dev.vm_running() {
                break Err(RxWaitError::Interrupted);
            }
            if dev.can_receive() {
                break Ok(());
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Err(RxWaitError::NoBufferSpace);
                    }
                    deadline - now
                }
                None => timeout,
            };
            dev = self.rx_signal.wait_timeout(dev, slice);
        };
        self.rx_signal.set_waiting(false);
        result
    }

    fn receive(&self, frame: &[u8]) {
        self.lock().receive(frame);
    }

    fn xmit_pending(&self) {
        self.lock().xmit_pending();
    }
}

impl NetworkConfig for SharedEl3c501 {
    fn mac(&self) -> MacAddr {
        self.lock().mac()
    }

    fn link_state(&self) -> LinkState {
        self.lock().link_state()
    }

    fn set_link_state(&self, state: LinkState) {
        self.lock().set_link_state(state);
    }
}
