//! Named device counters.
//!
//! The device only ever increments counters through a [`StatsSink`]; hosts decide where they
//! go. [`Stats`] is a ready-made atomic table.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Counter {
    ReceiveBytes,
    TransmitBytes,
    /// Frames lost because the guest reset the card before reading their status.
    PktsLostReset,
    Resets,
    DropPktAdrmDis,
    DropPktZeroLen,
    DropPktVmNotRunning,
    DropPktNoLink,
    DropPktStaleRcv,
    RxOverflowWakeup,
    GiantFrames,
    DmaPasses,
}

impl Counter {
    pub const COUNT: usize = 12;

    pub const ALL: [Counter; Self::COUNT] = [
        Counter::ReceiveBytes,
        Counter::TransmitBytes,
        Counter::PktsLostReset,
        Counter::Resets,
        Counter::DropPktAdrmDis,
        Counter::DropPktZeroLen,
        Counter::DropPktVmNotRunning,
        Counter::DropPktNoLink,
        Counter::DropPktStaleRcv,
        Counter::RxOverflowWakeup,
        Counter::GiantFrames,
        Counter::DmaPasses,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Counter::ReceiveBytes => "ReceiveBytes",
            Counter::TransmitBytes => "TransmitBytes",
            Counter::PktsLostReset => "PktsLostReset",
            Counter::Resets => "Resets",
            Counter::DropPktAdrmDis => "DropPktAdrmDis",
            Counter::DropPktZeroLen => "DropPktZeroLen",
            Counter::DropPktVmNotRunning => "DropPktVMNotRunning",
            Counter::DropPktNoLink => "DropPktNoLink",
            Counter::DropPktStaleRcv => "DropPktStaleRcv",
            Counter::RxOverflowWakeup => "RxOverflowWakeup",
            Counter::GiantFrames => "GiantFrames",
            Counter::DmaPasses => "DmaPasses",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

pub trait StatsSink: Send + Sync {
    fn add(&self, counter: Counter, n: u64);

    fn inc(&self, counter: Counter) {
        self.add(counter, 1);
    }
}

impl StatsSink for () {
    fn add(&self, _counter: Counter, _n: u64) {}
}

impl<T: StatsSink + ?Sized> StatsSink for Arc<T> {
    fn add(&self, counter: Counter, n: u64) {
        (**self).add(counter, n)
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    counters: [AtomicU64; Counter::COUNT],
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Current value of every counter, in [`Counter::ALL`] order.
    pub fn snapshot(&self) -> Vec<(Counter, u64)> {
        Counter::ALL.iter().map(|&c| (c, self.get(c))).collect()
    }
}

impl StatsSink for Stats {
    fn add(&self, counter: Counter, n: u64) {
        self.counters[counter.index()].fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let stats = Stats::new();
        stats.inc(Counter::Resets);
        stats.add(Counter::ReceiveBytes, 60);
        stats.add(Counter::ReceiveBytes, 40);

        assert_eq!(stats.get(Counter::Resets), 1);
        assert_eq!(stats.get(Counter::ReceiveBytes), 100);
        assert_eq!(stats.get(Counter::TransmitBytes), 0);
    }

    #[test]
    fn all_lists_every_counter_in_index_order() {
        for (i, c) in Counter::ALL.iter().enumerate() {
            assert_eq!(c.index(), i, "{}", c.name());
        }
    }
}
