//! Shared harness for `aero-net-3c501` integration tests: a recording platform double and
//! port-I/O helpers.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use aero_net_3c501::regs::{
    REG_AUX, REG_BUF_WINDOW, REG_GP_HI, REG_GP_LO, REG_RCV, REG_STATION_ADDR, REG_XMIT,
};
use aero_net_3c501::{
    El3c501, El3c501Config, IoStatus, IsaDmaController, IsaIrqSink, PlatformError, RestoreTimer,
    Stats, VmState, VmStateQuery,
};
use aero_net_backend::{MacAddr, QueueBackend};

pub const MAC: [u8; 6] = [0x02, 0x60, 0x8C, 0x12, 0x34, 0x56];
pub const BASE: u16 = 0x300;
pub const IRQ: u8 = 3;
pub const DMA: u8 = 1;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Debug)]
pub struct PlatformState {
    pub vm_state: VmState,
    pub irq_level: bool,
    pub irq_events: Vec<(u8, bool)>,
    pub registered_channels: Vec<u8>,
    pub register_error: Option<PlatformError>,
    pub dreq_events: Vec<(u8, bool)>,
    /// Returned (once) by the next `set_dreq`.
    pub dreq_error: Option<PlatformError>,
    pub schedules: usize,
    pub dma_mode: u8,
    pub memory: Vec<u8>,
    pub timer_armed: Option<u32>,
    pub timer_arms: Vec<u32>,
    pub timer_cancels: usize,
}

impl Default for PlatformState {
    fn default() -> Self {
        Self {
            vm_state: VmState::Running,
            irq_level: false,
            irq_events: Vec::new(),
            registered_channels: Vec::new(),
            register_error: None,
            dreq_events: Vec::new(),
            dreq_error: None,
            schedules: 0,
            dma_mode: 0,
            memory: vec![0; 0x1_0000],
            timer_armed: None,
            timer_arms: Vec::new(),
            timer_cancels: 0,
        }
    }
}

/// Platform double. Clones share state, so a test keeps one handle while the device owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform(pub Arc<Mutex<PlatformState>>);

impl MockPlatform {
    pub fn state(&self) -> MutexGuard<'_, PlatformState> {
        self.0.lock().unwrap()
    }

    /// Pretend the armed timer fired: disarm it and return whether it was armed.
    pub fn take_timer(&self) -> bool {
        self.state().timer_armed.take().is_some()
    }
}

impl IsaIrqSink for MockPlatform {
    fn set_irq_level(&mut self, irq: u8, level: bool) {
        let mut s = self.state();
        s.irq_level = level;
        s.irq_events.push((irq, level));
    }
}

impl IsaDmaController for MockPlatform {
    fn register_channel(&mut self, channel: u8) -> Result<(), PlatformError> {
        let mut s = self.state();
        if let Some(err) = s.register_error {
            return Err(err);
        }
        s.registered_channels.push(channel);
        Ok(())
    }

    fn set_dreq(&mut self, channel: u8, level: bool) -> Result<(), PlatformError> {
        let mut s = self.state();
        if let Some(err) = s.dreq_error.take() {
            return Err(err);
        }
        s.dreq_events.push((channel, level));
        Ok(())
    }

    fn schedule(&mut self) {
        self.state().schedules += 1;
    }

    fn channel_mode(&mut self, _channel: u8) -> u8 {
        self.state().dma_mode
    }

    fn read_memory(&mut self, _channel: u8, buf: &mut [u8], pos: u32) -> usize {
        let s = self.state();
        let pos = pos as usize;
        let len = buf.len().min(s.memory.len().saturating_sub(pos));
        buf[..len].copy_from_slice(&s.memory[pos..pos + len]);
        len
    }

    fn write_memory(&mut self, _channel: u8, buf: &[u8], pos: u32) -> usize {
        let mut s = self.state();
        let pos = pos as usize;
        let len = buf.len().min(s.memory.len().saturating_sub(pos));
        s.memory[pos..pos + len].copy_from_slice(&buf[..len]);
        len
    }
}

impl RestoreTimer for MockPlatform {
    fn arm_millis(&mut self, millis: u32) -> Result<(), PlatformError> {
        let mut s = self.state();
        s.timer_armed = Some(millis);
        s.timer_arms.push(millis);
        Ok(())
    }

    fn cancel(&mut self) {
        let mut s = self.state();
        s.timer_armed = None;
        s.timer_cancels += 1;
    }
}

impl VmStateQuery for MockPlatform {
    fn vm_state(&self) -> VmState {
        self.state().vm_state
    }
}

pub struct Harness {
    pub nic: El3c501,
    pub platform: MockPlatform,
    pub backend: Arc<Mutex<QueueBackend>>,
    pub stats: Arc<Stats>,
}

impl Harness {
    pub fn backend(&self) -> MutexGuard<'_, QueueBackend> {
        self.backend.lock().unwrap()
    }
}

pub fn config() -> El3c501Config {
    El3c501Config::new(MacAddr(MAC))
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: El3c501Config) -> Harness {
    harness_with_backend(config, QueueBackend::new())
}

pub fn harness_with_backend(config: El3c501Config, backend: QueueBackend) -> Harness {
    init_tracing();
    let platform = MockPlatform::default();
    let backend = Arc::new(Mutex::new(backend));
    let stats = Arc::new(Stats::new());
    let mut nic = El3c501::new(
        config,
        Box::new(platform.clone()),
        Some(Box::new(backend.clone())),
    )
    .unwrap();
    nic.set_stats_sink(stats.clone());
    Harness {
        nic,
        platform,
        backend,
        stats,
    }
}

pub fn outb(nic: &mut El3c501, reg: u16, value: u8) {
    assert_eq!(
        nic.io_write(BASE + reg, 1, u32::from(value)),
        Ok(IoStatus::Done),
        "write {value:#04x} to register {reg:#x}"
    );
}

pub fn inb(nic: &mut El3c501, reg: u16) -> u8 {
    nic.io_read(BASE + reg, 1).unwrap() as u8
}

pub fn set_gp(nic: &mut El3c501, ptr: u16) {
    outb(nic, REG_GP_LO, ptr as u8);
    outb(nic, REG_GP_HI, (ptr >> 8) as u8);
}

/// Copy `bytes` into the packet buffer through the buffer window. Needs System buffer control.
pub fn fill_buffer(nic: &mut El3c501, at: u16, bytes: &[u8]) {
    set_gp(nic, at);
    for &b in bytes {
        outb(nic, REG_BUF_WINDOW, b);
    }
}

pub fn set_station_addr(nic: &mut El3c501, mac: [u8; 6]) {
    for (i, b) in mac.into_iter().enumerate() {
        outb(nic, REG_STATION_ADDR + i as u16, b);
    }
}

pub fn write_rcv_cmd(nic: &mut El3c501, value: u8) {
    outb(nic, REG_RCV, value);
}

pub fn write_xmit_cmd(nic: &mut El3c501, value: u8) {
    outb(nic, REG_XMIT, value);
}

pub fn write_aux(nic: &mut El3c501, value: u8) {
    outb(nic, REG_AUX, value);
}

/// `len`-byte frame addressed to `dest`, with a recognizable payload.
pub fn frame_to(dest: [u8; 6], len: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(len);
    frame.extend_from_slice(&dest[..len.min(6)]);
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x99][..len.saturating_sub(6).min(6)]);
    while frame.len() < len {
        frame.push(frame.len() as u8);
    }
    frame
}
