mod common;

use aero_net_3c501::regs::{
    AuxCmd, AuxStat, IntrState, RecvCmd, RecvStat, XmitCmd, XmitStat, REG_AUX, REG_BUF_WINDOW,
    REG_GP_HI, REG_GP_LO, REG_PROM, REG_RCV_PTR_HI, REG_RCV_PTR_LO,
};
use aero_net_3c501::{Counter, IoStatus, PlatformError};
use common::*;
use proptest::prelude::*;

const RCV_PROMISC_ACCEPT_GOOD: u8 = 0x40 | 0x20;
const AUX_RECEIVE: u8 = 0x08;

/// Put a received frame in the buffer so the RCV pointer and receive status are non-trivial.
fn receive_one(h: &mut Harness, len: usize) -> Vec<u8> {
    write_rcv_cmd(&mut h.nic, RCV_PROMISC_ACCEPT_GOOD);
    write_aux(&mut h.nic, AUX_RECEIVE);
    let frame = frame_to([0x02, 0, 0, 0, 0, 0x42], len);
    h.nic.receive(&frame);
    frame
}

#[test]
fn soft_reset_clears_registers_but_keeps_buffer_and_pointers() {
    let mut h = harness();
    set_station_addr(&mut h.nic, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    receive_one(&mut h, 64);
    assert_eq!(h.nic.rcv_buf_ptr(), 64);

    write_aux(&mut h.nic, 0x00);
    fill_buffer(&mut h.nic, 0x100, &[0x5A; 32]);
    set_gp(&mut h.nic, 0x123);
    write_xmit_cmd(&mut h.nic, 0x0F);

    let buf_before = h.nic.packet_buffer().as_slice().to_vec();
    let station_before = h.nic.station_addr();

    write_aux(&mut h.nic, AuxCmd::RESET.bits());
    assert!(h.nic.in_reset());
    write_aux(&mut h.nic, 0x00);
    assert!(!h.nic.in_reset());

    assert_eq!(h.nic.xmit_cmd(), XmitCmd::empty());
    assert_eq!(h.nic.xmit_stat(), XmitStat::empty());
    assert_eq!(h.nic.rcv_cmd(), RecvCmd::empty());
    assert_eq!(h.nic.rcv_stat(), RecvStat::STALE);
    assert_eq!(h.nic.aux_cmd(), AuxCmd::empty());
    assert_eq!(h.nic.aux_stat(), AuxStat::XMIT_BUSY);
    assert_eq!(h.nic.intr_state(), IntrState::empty());

    assert_eq!(h.nic.packet_buffer().as_slice(), &buf_before[..]);
    assert_eq!(h.nic.station_addr(), station_before);
    assert_eq!(h.nic.gp_buf_ptr(), 0x123);
    assert_eq!(h.nic.rcv_buf_ptr(), 64);

    assert_eq!(h.stats.get(Counter::Resets), 1);
    // The frame's status was never read before the reset.
    assert_eq!(h.stats.get(Counter::PktsLostReset), 1);
}

#[test]
fn hard_reset_loads_prom_from_configured_mac() {
    let mut h = harness();
    set_station_addr(&mut h.nic, [1, 2, 3, 4, 5, 6]);
    fill_buffer(&mut h.nic, 0, &[0xFF; 16]);
    receive_one(&mut h, 60);

    h.nic.hard_reset();

    let prom: Vec<u8> = (0..8u16)
        .map(|i| {
            set_gp(&mut h.nic, i);
            inb(&mut h.nic, REG_PROM)
        })
        .collect();
    assert_eq!(prom, [&MAC[..], &[0, 0]].concat());
    assert_eq!(h.nic.prom(), [MAC[0], MAC[1], MAC[2], MAC[3], MAC[4], MAC[5], 0, 0]);
    assert_eq!(h.nic.mac().octets(), MAC);

    assert!(h.nic.packet_buffer().as_slice().iter().all(|&b| b == 0));
    assert_eq!(h.nic.station_addr().octets(), [0; 6]);
    assert_eq!(h.nic.rcv_buf_ptr(), 0);
}

#[test]
fn pointers_read_back_through_their_ports() {
    let mut h = harness();
    set_gp(&mut h.nic, 0x7FE);
    outb(&mut h.nic, REG_BUF_WINDOW, 0x11);
    outb(&mut h.nic, REG_BUF_WINDOW, 0x22);
    // The counter carries into bit 11, which reads back but does not address the buffer.
    assert_eq!(inb(&mut h.nic, REG_GP_LO), 0x00);
    assert_eq!(inb(&mut h.nic, REG_GP_HI), 0x08);
    assert_eq!(inb(&mut h.nic, REG_BUF_WINDOW), h.nic.packet_buffer().read(0));
    assert_eq!(h.nic.gp_buf_ptr(), 0x801);

    set_gp(&mut h.nic, 0x7FE);
    assert_eq!(inb(&mut h.nic, REG_BUF_WINDOW), 0x11);
    assert_eq!(inb(&mut h.nic, REG_BUF_WINDOW), 0x22);

    // Only three bits of the high byte are writable.
    set_gp(&mut h.nic, 0x800);
    assert_eq!(h.nic.gp_buf_ptr(), 0x000);

    receive_one(&mut h, 0x123);
    assert_eq!(inb(&mut h.nic, REG_RCV_PTR_LO), 0x23);
    assert_eq!(inb(&mut h.nic, REG_RCV_PTR_HI), 0x01);
}

#[test]
fn buffer_window_writes_outside_system_mode_are_dropped_without_advancing() {
    let mut h = harness();
    write_aux(&mut h.nic, AUX_RECEIVE);
    set_gp(&mut h.nic, 0x40);
    outb(&mut h.nic, REG_BUF_WINDOW, 0x77);
    assert_eq!(h.nic.gp_buf_ptr(), 0x40);
    assert_eq!(h.nic.packet_buffer().read(0x40), 0);

    // Reads are always allowed and always advance.
    assert_eq!(inb(&mut h.nic, REG_BUF_WINDOW), 0);
    assert_eq!(h.nic.gp_buf_ptr(), 0x41);
}

#[test]
fn aux_status_mirrors_buffer_control_and_ride_but_not_ire() {
    let mut h = harness();
    let value = (AuxCmd::RIDE | AuxCmd::IRE | AuxCmd::XMIT_BAD_FCS).bits() | AUX_RECEIVE;
    write_aux(&mut h.nic, value);

    let stat = AuxStat::from_bits_retain(inb(&mut h.nic, REG_AUX));
    assert!(stat.contains(AuxStat::RIDE));
    assert!(stat.contains(AuxStat::XMIT_BAD_FCS));
    assert!(stat.contains(AuxStat::RECV_BUSY));
    assert_eq!(stat.buf_ctl(), h.nic.aux_cmd().buf_ctl());
    assert!(h.nic.aux_cmd().contains(AuxCmd::IRE));
    // Bit 0 of the status register is receive busy, not IRE.
    write_aux(&mut h.nic, AuxCmd::IRE.bits());
    assert!(!h.nic.aux_stat().contains(AuxStat::RECV_BUSY));
}

#[test]
fn receive_mode_after_a_received_frame_keeps_it() {
    let mut h = harness();
    receive_one(&mut h, 100);
    // Back to System and then Receive again: the frame must not be discarded.
    write_aux(&mut h.nic, 0x00);
    write_aux(&mut h.nic, AUX_RECEIVE);
    assert!(!h.nic.aux_stat().contains(AuxStat::RECV_BUSY));

    outb(&mut h.nic, REG_RCV_PTR_LO, 0);
    write_aux(&mut h.nic, 0x00);
    write_aux(&mut h.nic, AUX_RECEIVE);
    assert!(h.nic.aux_stat().contains(AuxStat::RECV_BUSY));
}

#[test]
fn irq_follows_latches_and_enables_and_only_reports_edges() {
    let mut h = harness();
    write_aux(&mut h.nic, AuxCmd::IRE.bits() | AUX_RECEIVE);
    write_rcv_cmd(&mut h.nic, RCV_PROMISC_ACCEPT_GOOD);
    h.nic.receive(&frame_to([0xFF; 6], 64));
    assert!(h.nic.irq_asserted());

    // Masking interrupts drops the line but keeps the latch.
    write_aux(&mut h.nic, 0x00);
    assert!(!h.nic.irq_asserted());
    assert!(h.nic.intr_state().contains(IntrState::RECV));
    write_aux(&mut h.nic, AuxCmd::RIDE.bits());
    assert!(h.nic.irq_asserted());

    // Reading the status clears the latch.
    let _ = inb(&mut h.nic, 0x0);
    assert!(!h.nic.irq_asserted());

    let events = h.platform.state().irq_events.clone();
    assert_eq!(events, vec![(IRQ, true), (IRQ, false), (IRQ, true), (IRQ, false)]);
}

#[test]
fn aux_write_retries_when_dma_cannot_be_started_here() {
    let mut h = harness();
    h.platform.state().dreq_error = Some(PlatformError::WrongContext);

    let value = u32::from((AuxCmd::DMA_REQ | AuxCmd::RIDE).bits());
    assert_eq!(h.nic.io_write(BASE + REG_AUX, 1, value), Ok(IoStatus::RetryInSafeContext));
    assert!(!h.nic.dma_active());
    assert!(!h.nic.aux_cmd().contains(AuxCmd::RIDE));

    assert_eq!(h.nic.io_write(BASE + REG_AUX, 1, value), Ok(IoStatus::Done));
    assert!(h.nic.dma_active());
    assert!(h.nic.aux_stat().contains(AuxStat::DMA_REQ | AuxStat::RIDE));
}

#[test]
fn word_write_stops_when_the_first_byte_must_be_retried() {
    let mut h = harness();
    h.platform.state().dreq_error = Some(PlatformError::WrongContext);
    set_gp(&mut h.nic, 0x010);

    // Offset 0xE then wraps to 0xF; the buffer byte must not be written.
    let value = u32::from((AuxCmd::DMA_REQ | AuxCmd::RIDE).bits()) | 0x9900;
    assert_eq!(h.nic.io_write(BASE + REG_AUX, 2, value), Ok(IoStatus::RetryInSafeContext));
    assert_eq!(h.nic.gp_buf_ptr(), 0x010);
    assert_eq!(h.nic.packet_buffer().read(0x010), 0);
}

#[test]
fn info_dump_reports_registers_and_requested_buffers() {
    let mut h = harness();
    set_station_addr(&mut h.nic, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    fill_buffer(&mut h.nic, 0x7F0, &[0xC3; 16]);
    set_gp(&mut h.nic, 0x7F0);

    let plain = h.nic.info("");
    assert!(plain.contains("port=0x300 IRQ=3 DMA=1"), "{plain}");
    assert!(plain.contains("GP Buf Ptr : 2032 (masked 2032)"), "{plain}");
    assert!(plain.contains("Aux  Command: 00  Aux  Status: 80"), "{plain}");
    assert!(plain.contains("Buffer control  : System"), "{plain}");
    assert!(!plain.contains("Station address"));

    let full = h.nic.info("addr sendbuf recvbuf");
    assert!(full.contains("Station address : aa:bb:cc:dd:ee:ff"), "{full}");
    assert!(full.contains("Send buffer (start at 2032):"), "{full}");
    assert!(full.contains("  07F0: c3 c3"), "{full}");
    assert!(full.contains("Receive buffer (start at 0):"), "{full}");
}

proptest! {
    #[test]
    fn receive_status_reads_converge(offsets in prop::collection::vec(prop::sample::select(vec![0u16, 2, 4, 6]), 1..8)) {
        let mut h = harness();
        receive_one(&mut h, 80);
        write_aux(&mut h.nic, AuxCmd::IRE.bits());
        prop_assert!(h.nic.irq_asserted());

        let mut reads = Vec::new();
        for offset in offsets {
            reads.push(inb(&mut h.nic, offset));
            prop_assert!(!h.nic.intr_state().contains(IntrState::RECV));
            prop_assert!(h.nic.rcv_stat().contains(RecvStat::STALE));
            prop_assert!(!h.nic.irq_asserted());
        }
        prop_assert_eq!(reads[0] & RecvStat::STALE.bits(), 0);
        let settled = reads[0] | RecvStat::STALE.bits();
        for &value in &reads[1..] {
            prop_assert_eq!(value, settled);
        }
    }
}
