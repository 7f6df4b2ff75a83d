use std::sync::{Arc, Mutex};

use aero_net_3c501::{
    El3c501, El3c501Config, IoStatus, IsaDmaController, IsaIrqSink, PlatformError, RestoreTimer,
    SharedEl3c501, VmState, VmStateQuery,
};
use aero_net_backend::{MacAddr, QueueBackend};
use aero_net_pump::{RxStop, TickPump};

const BASE: u16 = 0x300;

struct IdlePlatform;

impl IsaIrqSink for IdlePlatform {
    fn set_irq_level(&mut self, _irq: u8, _level: bool) {}
}

impl IsaDmaController for IdlePlatform {
    fn register_channel(&mut self, _channel: u8) -> Result<(), PlatformError> {
        Ok(())
    }
    fn set_dreq(&mut self, _channel: u8, _level: bool) -> Result<(), PlatformError> {
        Ok(())
    }
    fn schedule(&mut self) {}
    fn channel_mode(&mut self, _channel: u8) -> u8 {
        0
    }
    fn read_memory(&mut self, _channel: u8, _buf: &mut [u8], _pos: u32) -> usize {
        0
    }
    fn write_memory(&mut self, _channel: u8, _buf: &[u8], _pos: u32) -> usize {
        0
    }
}

impl RestoreTimer for IdlePlatform {
    fn arm_millis(&mut self, _millis: u32) -> Result<(), PlatformError> {
        Ok(())
    }
    fn cancel(&mut self) {}
}

impl VmStateQuery for IdlePlatform {
    fn vm_state(&self) -> VmState {
        VmState::Running
    }
}

fn setup(backend: QueueBackend) -> (SharedEl3c501, Arc<Mutex<QueueBackend>>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let backend = Arc::new(Mutex::new(backend));
    let config = El3c501Config::new(MacAddr([0x02, 0x60, 0x8C, 0x00, 0x00, 0x01]));
    let nic = El3c501::new(config, Box::new(IdlePlatform), Some(Box::new(backend.clone())))
        .unwrap();
    (SharedEl3c501::new(nic), backend)
}

fn outb(nic: &SharedEl3c501, reg: u16, value: u8) {
    assert_eq!(
        nic.io_write(BASE + reg, 1, u32::from(value)),
        Ok(IoStatus::Done)
    );
}

fn inb(nic: &SharedEl3c501, reg: u16) -> u8 {
    nic.io_read(BASE + reg, 1).unwrap() as u8
}

/// Guest side: stage `frame` at the tail of the buffer and start xmit-then-receive.
fn guest_transmit(nic: &SharedEl3c501, frame: &[u8]) {
    outb(nic, 0xE, 0x00);
    let start = 2048 - frame.len() as u16;
    outb(nic, 0x8, start as u8);
    outb(nic, 0x9, (start >> 8) as u8);
    for &b in frame {
        outb(nic, 0xF, b);
    }
    outb(nic, 0x8, start as u8);
    outb(nic, 0x9, (start >> 8) as u8);
    outb(nic, 0xE, 0x04);
}

/// Guest side: acknowledge the last frame and rearm the receiver.
fn guest_rearm_receive(nic: &SharedEl3c501) {
    let _ = inb(nic, 0x6);
    outb(nic, 0xA, 0);
    outb(nic, 0xE, 0x00);
    outb(nic, 0xE, 0x08);
}

#[test]
fn rx_frames_wait_at_the_head_until_the_guest_rearms() {
    let (nic, backend) = setup(QueueBackend::new());
    {
        let mut b = backend.lock().unwrap();
        assert!(b.push_rx_frame(vec![0x11; 64]));
        assert!(b.push_rx_frame(vec![0x22; 64]));
    }
    let mut pump = TickPump::default();

    let counts = pump.tick(&nic, &backend, |_| {});
    assert_eq!(counts.rx_frames, 0);
    assert_eq!(counts.rx_stop, Some(RxStop::ReceiverBusy));

    outb(&nic, 0x6, 0x60);
    outb(&nic, 0xE, 0x08);
    let counts = pump.tick(&nic, &backend, |_| {});
    assert_eq!(counts.rx_frames, 1);
    assert_eq!(counts.rx_stop, Some(RxStop::ReceiverBusy));
    assert_eq!(backend.lock().unwrap().rx_queue().len(), 1);
    assert_eq!(nic.lock().packet_buffer().window(0, 64), &[0x11; 64]);

    guest_rearm_receive(&nic);
    let counts = pump.tick(&nic, &backend, |_| {});
    assert_eq!(counts.rx_frames, 1);
    assert_eq!(counts.rx_stop, None);
    assert!(backend.lock().unwrap().rx_queue().is_empty());
    assert_eq!(nic.lock().packet_buffer().window(0, 64), &[0x22; 64]);
}

#[test]
fn draining_a_full_tx_queue_releases_the_deferred_transmit() {
    let (nic, backend) = setup(QueueBackend::with_capacity(1, 8));
    let mut pump = TickPump::new(1, 16);
    let mut wire = Vec::new();

    guest_transmit(&nic, &[0xA1; 60]);
    guest_transmit(&nic, &[0xB2; 60]);
    assert_eq!(backend.lock().unwrap().stats().tx_try_again, 1);
    assert_eq!(inb(&nic, 0xE) & 0x80, 0x80, "second transmit still pending");

    let counts = pump.tick(&nic, &backend, |f| wire.push(f));
    assert_eq!(counts.tx_frames, 1);
    assert_eq!(backend.lock().unwrap().tx_len(), 1);
    assert_eq!(inb(&nic, 0xE) & 0x80, 0);

    let counts = pump.tick(&nic, &backend, |f| wire.push(f));
    assert_eq!(counts.tx_frames, 1);
    assert_eq!(wire, vec![vec![0xA1; 60], vec![0xB2; 60]]);
}
