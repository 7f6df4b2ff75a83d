use std::sync::Arc;

use aero_net_backend::{MacAddr, NetworkBackend};
use thiserror::Error;

use crate::buffer::{advance, PacketBuffer, BUF_SIZE};
use crate::config::{ConfigError, El3c501Config};
use crate::platform::{
    IsaDmaController, IsaIrqSink, Platform, PlatformError, RestoreTimer, VmStateQuery,
};
use crate::regs::{
    AddrMatch, AuxCmd, AuxStat, BufferControl, IntrState, RecvCmd, RecvStat, XmitCmd, XmitStat,
    EL3C501_IO_SIZE, REG_AUX, REG_BUF_WINDOW, REG_GP_HI, REG_GP_LO, REG_PROM, REG_PROM_ALIAS,
    REG_RCV, REG_RCV_PTR_HI, REG_RCV_PTR_LO, REG_XMIT,
};
use crate::rx::RxSignal;
use crate::stats::{Counter, StatsSink};

/// Outcome of a port write that did not fail outright.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStatus {
    Done,
    /// Nothing observable happened; repeat the access from a context where the platform can
    /// service DMA requests.
    RetryInSafeContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IoError {
    #[error("unsupported I/O access size {0}")]
    UnsupportedSize(usize),
    #[error("port {0:#x} is outside the adapter's I/O window")]
    PortOutOfRange(u16),
}

#[derive(Debug, Error)]
pub enum El3c501Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("platform setup failed: {0}")]
    Platform(#[from] PlatformError),
}

/// 3Com 3C501 EtherLink ISA adapter.
///
/// One instance owns the whole adapter state. Callers serialize access (see
/// [`crate::SharedEl3c501`]); every method runs to completion against a consistent register
/// bank.
pub struct El3c501 {
    pub(crate) config: El3c501Config,
    pub(crate) platform: Box<dyn Platform>,
    pub(crate) backend: Option<Box<dyn NetworkBackend>>,
    pub(crate) stats: Arc<dyn StatsSink>,
    pub(crate) rx_signal: Arc<RxSignal>,

    pub(crate) xmit_cmd: XmitCmd,
    pub(crate) xmit_stat: XmitStat,
    pub(crate) rcv_cmd: RecvCmd,
    pub(crate) rcv_stat: RecvStat,
    pub(crate) aux_cmd: AuxCmd,
    pub(crate) aux_stat: AuxStat,
    pub(crate) intr: IntrState,

    pub(crate) gp_buf_ptr: u16,
    pub(crate) rcv_buf_ptr: u16,
    pub(crate) station_addr: [u8; 6],
    pub(crate) prom: [u8; 8],
    pub(crate) buf: PacketBuffer,
    /// Scratch frame for loopback transmits; never guest visible.
    pub(crate) loop_buf: Vec<u8>,

    pub(crate) in_reset: bool,
    pub(crate) irq_asserted: bool,
    pub(crate) dma_active: bool,

    pub(crate) driver_attached: bool,
    pub(crate) link_up: bool,
    pub(crate) link_temp_down: bool,
    pub(crate) link_down_reported: u32,
    pub(crate) link_restore_postponed: u32,
}

impl std::fmt::Debug for El3c501 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("El3c501")
            .field("config", &self.config)
            .field("xmit_cmd", &self.xmit_cmd)
            .field("xmit_stat", &self.xmit_stat)
            .field("rcv_cmd", &self.rcv_cmd)
            .field("rcv_stat", &self.rcv_stat)
            .field("aux_cmd", &self.aux_cmd)
            .field("aux_stat", &self.aux_stat)
            .field("intr", &self.intr)
            .field("gp_buf_ptr", &self.gp_buf_ptr)
            .field("rcv_buf_ptr", &self.rcv_buf_ptr)
            .field("in_reset", &self.in_reset)
            .field("link_up", &self.link_up)
            .field("link_temp_down", &self.link_temp_down)
            .finish_non_exhaustive()
    }
}

impl El3c501 {
    /// Build a powered-on adapter.
    ///
    /// The DMA channel is registered with the platform when one is configured; failing to do so
    /// is fatal. A `Some` backend counts as an attached driver.
    pub fn new(
        config: El3c501Config,
        mut platform: Box<dyn Platform>,
        backend: Option<Box<dyn NetworkBackend>>,
    ) -> Result<Self, El3c501Error> {
        config.validate()?;
        if config.dma_enabled() {
            platform.register_channel(config.dma_channel)?;
        }

        let mut dev = Self {
            link_up: config.cable_connected,
            driver_attached: backend.is_some(),
            config,
            platform,
            backend,
            stats: Arc::new(()),
            rx_signal: Arc::new(RxSignal::default()),
            xmit_cmd: XmitCmd::empty(),
            xmit_stat: XmitStat::empty(),
            rcv_cmd: RecvCmd::empty(),
            rcv_stat: RecvStat::empty(),
            aux_cmd: AuxCmd::empty(),
            aux_stat: AuxStat::empty(),
            intr: IntrState::empty(),
            gp_buf_ptr: 0,
            rcv_buf_ptr: 0,
            station_addr: [0; 6],
            prom: [0; 8],
            buf: PacketBuffer::new(),
            loop_buf: Vec::with_capacity(BUF_SIZE),
            in_reset: false,
            irq_asserted: false,
            dma_active: false,
            link_temp_down: false,
            link_down_reported: 0,
            link_restore_postponed: 0,
        };
        dev.hard_reset();
        Ok(dev)
    }

    pub fn config(&self) -> &El3c501Config {
        &self.config
    }

    pub fn set_stats_sink(&mut self, stats: Arc<dyn StatsSink>) {
        self.stats = stats;
    }

    pub(crate) fn vm_running(&self) -> bool {
        self.platform.vm_state().is_running()
    }

    pub(crate) fn rx_signal(&self) -> Arc<RxSignal> {
        self.rx_signal.clone()
    }

    /// Connect a network backend. The guest sees a short link outage.
    pub fn attach_backend(&mut self, backend: Box<dyn NetworkBackend>) {
        self.backend = Some(backend);
        self.driver_attached = true;
        self.temp_link_down();
    }

    pub fn detach_backend(&mut self) -> Option<Box<dyn NetworkBackend>> {
        self.driver_attached = false;
        self.backend.take()
    }

    /// Power-on / machine reset.
    pub fn hard_reset(&mut self) {
        if self.link_temp_down {
            // Saturate the counters so the restore callback brings the link straight up.
            self.link_down_reported = 0x1000;
            self.link_restore_postponed = 0x1000;
            self.platform.cancel();
            self.restore_timer_expired();
        }

        let mac = self.config.mac.octets();
        self.prom[..6].copy_from_slice(&mac);
        self.prom[6..].fill(0);
        self.buf.clear();
        self.station_addr = [0; 6];
        self.gp_buf_ptr = 0;
        self.rcv_buf_ptr = 0;
        self.soft_reset();
    }

    /// Reset triggered by the guest releasing the reset bit. Leaves the packet buffer, the
    /// station address and both buffer pointers alone.
    pub(crate) fn soft_reset(&mut self) {
        self.xmit_cmd = XmitCmd::empty();
        self.xmit_stat = XmitStat::empty();
        self.rcv_cmd = RecvCmd::empty();
        self.rcv_stat = RecvStat::STALE;
        self.aux_cmd = AuxCmd::empty();
        // Buffer control is back to System, which always means transmit busy.
        self.aux_stat = AuxStat::XMIT_BUSY;
        self.intr = IntrState::empty();
        self.in_reset = false;
        self.update_irq();
    }

    pub(crate) fn update_irq(&mut self) {
        let enabled = self.aux_cmd.intersects(AuxCmd::RIDE | AuxCmd::IRE);
        let level = enabled && !self.intr.is_empty();
        if level != self.irq_asserted {
            tracing::trace!(irq = self.config.irq, level, "irq line change");
            self.platform.set_irq_level(self.config.irq, level);
            self.irq_asserted = level;
        }
    }

    /// Read one register. `offset` is relative to the I/O base.
    pub fn read_port(&mut self, offset: u16) -> u8 {
        let value = match offset & 0xF {
            0x0 | 0x2 | 0x4 | REG_RCV => {
                let value = self.rcv_stat.bits();
                self.rcv_stat.insert(RecvStat::STALE);
                self.intr.remove(IntrState::RECV);
                value
            }
            0x1 | 0x3 | 0x5 | REG_XMIT => {
                let value = self.xmit_stat.bits();
                self.intr.remove(IntrState::XMIT);
                value
            }
            REG_GP_LO => self.gp_buf_ptr as u8,
            REG_GP_HI => (self.gp_buf_ptr >> 8) as u8,
            REG_RCV_PTR_LO => self.rcv_buf_ptr as u8,
            REG_RCV_PTR_HI => (self.rcv_buf_ptr >> 8) as u8,
            REG_PROM | REG_PROM_ALIAS => self.prom[usize::from(self.gp_buf_ptr & 7)],
            REG_AUX => self.aux_stat.bits(),
            _ => {
                let value = self.buf.read(self.gp_buf_ptr);
                self.gp_buf_ptr = advance(self.gp_buf_ptr, 1);
                value
            }
        };
        self.update_irq();
        value
    }

    /// Write one register. `offset` is relative to the I/O base.
    pub fn write_port(&mut self, offset: u16, value: u8) -> IoStatus {
        let offset = offset & 0xF;
        match offset {
            0x0..=0x5 => self.station_addr[usize::from(offset)] = value,
            REG_RCV => {
                let was = self.rcv_cmd.addr_match();
                self.rcv_cmd = RecvCmd::from_bits_retain(value);
                let now = self.rcv_cmd.addr_match();
                if was != now {
                    tracing::debug!(from = was.name(), to = now.name(), "address match mode");
                }
                if was == AddrMatch::Disabled && now != AddrMatch::Disabled {
                    self.kick_receive();
                }
            }
            REG_XMIT => self.xmit_cmd = XmitCmd::from_bits_retain(value),
            REG_GP_LO => self.gp_buf_ptr = (self.gp_buf_ptr & 0xFF00) | u16::from(value),
            // Only 11 bits plus the counting bit exist; the top 5 bits of the write are lost.
            REG_GP_HI => {
                self.gp_buf_ptr = (self.gp_buf_ptr & 0x00FF) | (u16::from(value & 0x07) << 8)
            }
            REG_RCV_PTR_LO => self.rcv_buf_ptr = 0,
            REG_AUX => return self.aux_write(value),
            REG_BUF_WINDOW => {
                if self.aux_cmd.buf_ctl() == BufferControl::System {
                    self.buf.write(self.gp_buf_ptr, value);
                    self.gp_buf_ptr = advance(self.gp_buf_ptr, 1);
                } else {
                    tracing::warn!(
                        buf_ctl = self.aux_cmd.buf_ctl().name(),
                        gp = self.gp_buf_ptr,
                        "buffer window write while the adapter owns the buffer, dropped"
                    );
                }
            }
            _ => tracing::debug!(offset, value, "write to read-only register ignored"),
        }
        IoStatus::Done
    }

    fn aux_write(&mut self, value: u8) -> IoStatus {
        let new = AuxCmd::from_bits_retain(value);

        let reset = new.contains(AuxCmd::RESET);
        if reset != self.aux_cmd.contains(AuxCmd::RESET) {
            if reset {
                tracing::debug!("entering reset");
                self.in_reset = true;
                if !self.rcv_stat.contains(RecvStat::STALE) {
                    self.stats.inc(Counter::PktsLostReset);
                }
            } else {
                tracing::debug!("leaving reset");
                self.stats.inc(Counter::Resets);
                self.soft_reset();
            }
            self.aux_cmd.set(AuxCmd::RESET, reset);
        }
        // Other fields written while in reset are discarded.
        if self.in_reset {
            return IoStatus::Done;
        }

        let dma_request = new.contains(AuxCmd::DMA_REQ | AuxCmd::RIDE);
        if dma_request != self.dma_active {
            match self.set_dma_request(dma_request) {
                Ok(()) => {}
                Err(PlatformError::WrongContext) => return IoStatus::RetryInSafeContext,
                Err(err) => tracing::error!(%err, dma_request, "failed to change DMA request"),
            }
        }

        let ride = new.contains(AuxCmd::RIDE);
        self.aux_cmd.set(AuxCmd::RIDE, ride);
        self.aux_stat.set(AuxStat::RIDE, ride);
        self.aux_cmd.set(AuxCmd::IRE, new.contains(AuxCmd::IRE));

        let dma_req = new.contains(AuxCmd::DMA_REQ);
        if dma_req != self.aux_cmd.contains(AuxCmd::DMA_REQ) {
            self.aux_cmd.set(AuxCmd::DMA_REQ, dma_req);
            self.aux_stat.set(AuxStat::DMA_REQ, dma_req);
            if !dma_req {
                self.aux_stat.remove(AuxStat::DMA_DONE);
                self.intr.remove(IntrState::DMA);
            }
        }

        let mut transmit = false;
        let mut receive = false;
        let buf_ctl = new.buf_ctl();
        if buf_ctl != self.aux_cmd.buf_ctl() {
            tracing::debug!(
                from = self.aux_cmd.buf_ctl().name(),
                to = buf_ctl.name(),
                "packet buffer control"
            );
            match buf_ctl {
                BufferControl::XmitRcv => {
                    transmit = true;
                    self.aux_stat.remove(AuxStat::RECV_BUSY);
                }
                BufferControl::System => {
                    // Cleared again once a transmit completes.
                    self.aux_stat.insert(AuxStat::XMIT_BUSY);
                    self.aux_stat.remove(AuxStat::RECV_BUSY);
                }
                BufferControl::Receive => {
                    // Coming from xmit-then-receive with a frame already in the buffer: keep it.
                    receive = self.rcv_buf_ptr == 0;
                }
                BufferControl::Loopback => {
                    transmit = true;
                    self.aux_stat.insert(AuxStat::RECV_BUSY);
                }
            }
            self.aux_cmd.set_buf_ctl(buf_ctl);
            self.aux_stat.set_buf_ctl(buf_ctl);
        }

        let bad_fcs = new.contains(AuxCmd::XMIT_BAD_FCS);
        self.aux_cmd.set(AuxCmd::XMIT_BAD_FCS, bad_fcs);
        self.aux_stat.set(AuxStat::XMIT_BAD_FCS, bad_fcs);

        self.update_irq();

        if transmit {
            self.transmit();
        } else if receive {
            self.aux_stat.insert(AuxStat::RECV_BUSY);
            self.kick_receive();
        }
        IoStatus::Done
    }

    fn port_offset(&self, port: u16) -> Result<u16, IoError> {
        let offset = port.wrapping_sub(self.config.io_base);
        if offset >= EL3C501_IO_SIZE {
            return Err(IoError::PortOutOfRange(port));
        }
        Ok(offset)
    }

    /// Port read at an absolute I/O address. Word reads are two byte reads, low byte first.
    pub fn io_read(&mut self, port: u16, size: usize) -> Result<u32, IoError> {
        let offset = self.port_offset(port)?;
        match size {
            1 => Ok(u32::from(self.read_port(offset))),
            2 => {
                let lo = self.read_port(offset);
                let hi = self.read_port((offset + 1) & 0xF);
                Ok(u32::from(u16::from_le_bytes([lo, hi])))
            }
            _ => Err(IoError::UnsupportedSize(size)),
        }
    }

    /// Port write at an absolute I/O address. A word write stops after the first byte unless
    /// that byte completed.
    pub fn io_write(&mut self, port: u16, size: usize, value: u32) -> Result<IoStatus, IoError> {
        let offset = self.port_offset(port)?;
        match size {
            1 => Ok(self.write_port(offset, value as u8)),
            2 => {
                let [lo, hi] = (value as u16).to_le_bytes();
                match self.write_port(offset, lo) {
                    IoStatus::Done => Ok(self.write_port((offset + 1) & 0xF, hi)),
                    retry => Ok(retry),
                }
            }
            _ => Err(IoError::UnsupportedSize(size)),
        }
    }

    pub fn gp_buf_ptr(&self) -> u16 {
        self.gp_buf_ptr
    }

    pub fn rcv_buf_ptr(&self) -> u16 {
        self.rcv_buf_ptr
    }

    pub fn xmit_cmd(&self) -> XmitCmd {
        self.xmit_cmd
    }

    pub fn xmit_stat(&self) -> XmitStat {
        self.xmit_stat
    }

    pub fn rcv_cmd(&self) -> RecvCmd {
        self.rcv_cmd
    }

    /// Receive status without the read side effects of the status port.
    pub fn rcv_stat(&self) -> RecvStat {
        self.rcv_stat
    }

    pub fn aux_cmd(&self) -> AuxCmd {
        self.aux_cmd
    }

    pub fn aux_stat(&self) -> AuxStat {
        self.aux_stat
    }

    pub fn intr_state(&self) -> IntrState {
        self.intr
    }

    pub fn irq_asserted(&self) -> bool {
        self.irq_asserted
    }

    pub fn in_reset(&self) -> bool {
        self.in_reset
    }

    pub fn prom(&self) -> [u8; 8] {
        self.prom
    }

    pub fn station_addr(&self) -> MacAddr {
        MacAddr(self.station_addr)
    }

    pub fn packet_buffer(&self) -> &PacketBuffer {
        &self.buf
    }

    pub fn dma_active(&self) -> bool {
        self.dma_active
    }
}
