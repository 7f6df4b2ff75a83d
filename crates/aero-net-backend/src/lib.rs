//! Network backend primitives shared between emulated NIC models and host glue.
//!
//! The contract is split by direction:
//! - [`NetworkBackend`] is implemented by the host side and consumed by a NIC for guest → host
//!   frames (`begin_xmit` / `alloc_buf` / `send_buf` / `end_xmit`).
//! - [`NetworkDown`] and [`NetworkConfig`] are implemented by a NIC and consumed by the host side
//!   for host → guest frames and configuration-plane queries.
//!
//! Frames are raw Ethernet frames without FCS.
#![forbid(unsafe_code)]

pub mod queue_backend;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

pub use queue_backend::{QueueBackend, QueueBackendStats};

/// Errors reported by a backend on the transmit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NetError {
    /// The backend is momentarily busy; the whole transmit should be retried later.
    #[error("backend busy, try again")]
    TryAgain,
    /// No backend is attached or the host side is down.
    #[error("network is down")]
    NetDown,
    /// The backend refused to hand out a buffer of the requested size.
    #[error("no buffer space available")]
    NoBufferSpace,
}

/// Outcomes of [`NetworkDown::wait_receive_avail`] that are not "ready".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RxWaitError {
    #[error("receiver not ready before the timeout expired")]
    NoBufferSpace,
    #[error("wait aborted because the VM stopped running")]
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Up,
    Down,
    /// Down for now, coming back up on its own after a restore delay.
    DownResume,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address {0:?}")]
pub struct MacParseError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    pub const fn octets(self) -> [u8; 6] {
        self.0
    }

    pub fn is_multicast(self) -> bool {
        self.0[0] & 1 != 0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(value: [u8; 6]) -> Self {
        Self(value)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = MacParseError;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` or twelve bare hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MacParseError(s.to_string());
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if digits.len() != 12 || !digits.is_ascii() {
            return Err(err());
        }
        let mut out = [0u8; 6];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
        }
        Ok(Self(out))
    }
}

/// Host side of a NIC's transmit path.
///
/// `begin_xmit`/`end_xmit` bracket a transmit so backends with their own transmit lock can
/// serialize against other senders. A backend that cannot make progress right now returns
/// [`NetError::TryAgain`] and later calls [`NetworkDown::xmit_pending`] on the NIC.
pub trait NetworkBackend: Send {
    fn begin_xmit(&mut self) -> Result<(), NetError> {
        Ok(())
    }

    /// Hand out an empty buffer with room for at least `len` bytes.
    fn alloc_buf(&mut self, len: usize) -> Result<Vec<u8>, NetError> {
        Ok(Vec::with_capacity(len))
    }

    /// Transmit a guest → host Ethernet frame.
    fn send_buf(&mut self, frame: Vec<u8>) -> Result<(), NetError>;

    fn end_xmit(&mut self) {}

    fn set_promiscuous_mode(&mut self, _enabled: bool) {}

    fn notify_link_changed(&mut self, _state: LinkState) {}
}

/// Inbound (host → guest) interface implemented by a NIC.
pub trait NetworkDown {
    /// Block until the NIC can take a frame, for at most `timeout`.
    ///
    /// A zero timeout never blocks.
    fn wait_receive_avail(&self, timeout: Duration) -> Result<(), RxWaitError>;

    /// Deliver one frame. Frames the NIC cannot accept are dropped.
    fn receive(&self, frame: &[u8]);

    /// The backend can accept frames again after refusing one with [`NetError::TryAgain`].
    fn xmit_pending(&self);
}

/// Configuration-plane queries implemented by a NIC.
pub trait NetworkConfig {
    fn mac(&self) -> MacAddr;
    fn link_state(&self) -> LinkState;
    fn set_link_state(&self, state: LinkState);
}

impl<T: NetworkBackend + ?Sized> NetworkBackend for Box<T> {
    fn begin_xmit(&mut self) -> Result<(), NetError> {
        (**self).begin_xmit()
    }

    fn alloc_buf(&mut self, len: usize) -> Result<Vec<u8>, NetError> {
        (**self).alloc_buf(len)
    }

    fn send_buf(&mut self, frame: Vec<u8>) -> Result<(), NetError> {
        (**self).send_buf(frame)
    }

    fn end_xmit(&mut self) {
        (**self).end_xmit()
    }

    fn set_promiscuous_mode(&mut self, enabled: bool) {
        (**self).set_promiscuous_mode(enabled)
    }

    fn notify_link_changed(&mut self, state: LinkState) {
        (**self).notify_link_changed(state)
    }
}

impl<T: NetworkBackend + ?Sized> NetworkBackend for &mut T {
    fn begin_xmit(&mut self) -> Result<(), NetError> {
        (**self).begin_xmit()
    }

    fn alloc_buf(&mut self, len: usize) -> Result<Vec<u8>, NetError> {
        (**self).alloc_buf(len)
    }

    fn send_buf(&mut self, frame: Vec<u8>) -> Result<(), NetError> {
        (**self).send_buf(frame)
    }

    fn end_xmit(&mut self) {
        (**self).end_xmit()
    }

    fn set_promiscuous_mode(&mut self, enabled: bool) {
        (**self).set_promiscuous_mode(enabled)
    }

    fn notify_link_changed(&mut self, state: LinkState) {
        (**self).notify_link_changed(state)
    }
}

/// A detached backend: every transmit fails with [`NetError::NetDown`].
impl NetworkBackend for () {
    fn alloc_buf(&mut self, _len: usize) -> Result<Vec<u8>, NetError> {
        Err(NetError::NetDown)
    }

    fn send_buf(&mut self, _frame: Vec<u8>) -> Result<(), NetError> {
        Err(NetError::NetDown)
    }
}

impl<B: NetworkBackend> NetworkBackend for Option<B> {
    fn begin_xmit(&mut self) -> Result<(), NetError> {
        match self {
            Some(backend) => backend.begin_xmit(),
            None => Ok(()),
        }
    }

    fn alloc_buf(&mut self, len: usize) -> Result<Vec<u8>, NetError> {
        match self {
            Some(backend) => backend.alloc_buf(len),
            None => Err(NetError::NetDown),
        }
    }

    fn send_buf(&mut self, frame: Vec<u8>) -> Result<(), NetError> {
        match self {
            Some(backend) => backend.send_buf(frame),
            None => Err(NetError::NetDown),
        }
    }

    fn end_xmit(&mut self) {
        if let Some(backend) = self.as_mut() {
            backend.end_xmit();
        }
    }

    fn set_promiscuous_mode(&mut self, enabled: bool) {
        if let Some(backend) = self.as_mut() {
            backend.set_promiscuous_mode(enabled);
        }
    }

    fn notify_link_changed(&mut self, state: LinkState) {
        if let Some(backend) = self.as_mut() {
            backend.notify_link_changed(state);
        }
    }
}

impl<T: NetworkBackend + ?Sized> NetworkBackend for Mutex<T> {
    fn begin_xmit(&mut self) -> Result<(), NetError> {
        self.get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .begin_xmit()
    }

    fn alloc_buf(&mut self, len: usize) -> Result<Vec<u8>, NetError> {
        self.get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .alloc_buf(len)
    }

    fn send_buf(&mut self, frame: Vec<u8>) -> Result<(), NetError> {
        self.get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .send_buf(frame)
    }

    fn end_xmit(&mut self) {
        self.get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .end_xmit()
    }

    fn set_promiscuous_mode(&mut self, enabled: bool) {
        self.get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .set_promiscuous_mode(enabled)
    }

    fn notify_link_changed(&mut self, state: LinkState) {
        self.get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .notify_link_changed(state)
    }
}

impl<T: NetworkBackend + ?Sized> NetworkBackend for Arc<Mutex<T>> {
    fn begin_xmit(&mut self) -> Result<(), NetError> {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .begin_xmit()
    }

    fn alloc_buf(&mut self, len: usize) -> Result<Vec<u8>, NetError> {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .alloc_buf(len)
    }

    fn send_buf(&mut self, frame: Vec<u8>) -> Result<(), NetError> {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .send_buf(frame)
    }

    fn end_xmit(&mut self) {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .end_xmit()
    }

    fn set_promiscuous_mode(&mut self, enabled: bool) {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .set_promiscuous_mode(enabled)
    }

    fn notify_link_changed(&mut self, state: LinkState) {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .notify_link_changed(state)
    }
}

impl<T: NetworkDown + ?Sized> NetworkDown for Arc<T> {
    fn wait_receive_avail(&self, timeout: Duration) -> Result<(), RxWaitError> {
        (**self).wait_receive_avail(timeout)
    }

    fn receive(&self, frame: &[u8]) {
        (**self).receive(frame)
    }

    fn xmit_pending(&self) {
        (**self).xmit_pending()
    }
}

impl<T: NetworkDown + ?Sized> NetworkDown for &T {
    fn wait_receive_avail(&self, timeout: Duration) -> Result<(), RxWaitError> {
        (**self).wait_receive_avail(timeout)
    }

    fn receive(&self, frame: &[u8]) {
        (**self).receive(frame)
    }

    fn xmit_pending(&self) {
        (**self).xmit_pending()
    }
}

impl<T: NetworkConfig + ?Sized> NetworkConfig for Arc<T> {
    fn mac(&self) -> MacAddr {
        (**self).mac()
    }

    fn link_state(&self) -> LinkState {
        (**self).link_state()
    }

    fn set_link_state(&self, state: LinkState) {
        (**self).set_link_state(state)
    }
}
