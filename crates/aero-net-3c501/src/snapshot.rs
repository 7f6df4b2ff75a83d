use aero_io_snapshot::io::net::state::El3c501DeviceState;
use aero_io_snapshot::io::state::{IoSnapshot, SnapshotResult, SnapshotVersion};
use aero_net_backend::NetworkBackend;

use crate::device::El3c501;
use crate::platform::IsaIrqSink;
use crate::regs::{AuxCmd, AuxStat, IntrState, RecvCmd, RecvStat, XmitCmd, XmitStat};

/// How the VM got here when loading a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadContext {
    /// Live migration: the guest's connections are still valid, so the link stays up.
    pub teleported: bool,
}

impl El3c501 {
    pub fn snapshot_state(&self) -> El3c501DeviceState {
        El3c501DeviceState {
            gp_buf_ptr: self.gp_buf_ptr,
            rcv_buf_ptr: self.rcv_buf_ptr,
            xmit_cmd: self.xmit_cmd.bits(),
            xmit_stat: self.xmit_stat.bits(),
            rcv_cmd: self.rcv_cmd.bits(),
            rcv_stat: self.rcv_stat.bits(),
            aux_cmd: self.aux_cmd.bits(),
            aux_stat: self.aux_stat.bits(),
            intr_state: self.intr.bits(),
            in_reset: self.in_reset,
            link_up: self.link_up,
            irq_asserted: self.irq_asserted,
            station_addr: self.station_addr,
            configured_mac: self.config.mac.octets(),
        }
    }

    pub fn restore_state(&mut self, state: &El3c501DeviceState, ctx: LoadContext) {
        self.gp_buf_ptr = state.gp_buf_ptr;
        self.rcv_buf_ptr = state.rcv_buf_ptr;
        self.xmit_cmd = XmitCmd::from_bits_retain(state.xmit_cmd);
        self.xmit_stat = XmitStat::from_bits_retain(state.xmit_stat);
        self.rcv_cmd = RecvCmd::from_bits_retain(state.rcv_cmd);
        self.rcv_stat = RecvStat::from_bits_retain(state.rcv_stat);
        self.aux_cmd = AuxCmd::from_bits_retain(state.aux_cmd);
        self.aux_stat = AuxStat::from_bits_retain(state.aux_stat);
        self.intr = IntrState::from_bits_truncate(state.intr_state);
        self.in_reset = state.in_reset;
        self.link_up = state.link_up;
        self.station_addr = state.station_addr;

        if state.configured_mac != self.config.mac.octets() {
            tracing::warn!(
                config = %self.config.mac,
                saved = %aero_net_backend::MacAddr(state.configured_mac),
                "the MAC address differs from the saved state"
            );
        }

        // The interrupt controller was restored separately; make sure it agrees with us.
        self.irq_asserted = state.irq_asserted;
        self.platform.set_irq_level(self.config.irq, state.irq_asserted);

        self.backend.set_promiscuous_mode(false);

        // Tell the guest its connections are gone, unless it never really stopped.
        if !ctx.teleported {
            self.temp_link_down();
        }
    }

    pub fn save_state(&self) -> Vec<u8> {
        self.snapshot_state().save_state()
    }

    pub fn load_state(&mut self, bytes: &[u8], ctx: LoadContext) -> SnapshotResult<()> {
        // Fields missing from an older minor version keep their current values.
        let mut state = self.snapshot_state();
        state.load_state(bytes)?;
        self.restore_state(&state, ctx);
        Ok(())
    }
}

impl IoSnapshot for El3c501 {
    const DEVICE_ID: [u8; 4] = <El3c501DeviceState as IoSnapshot>::DEVICE_ID;
    const DEVICE_VERSION: SnapshotVersion = <El3c501DeviceState as IoSnapshot>::DEVICE_VERSION;

    fn save_state(&self) -> Vec<u8> {
        El3c501::save_state(self)
    }

    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()> {
        El3c501::load_state(self, bytes, LoadContext::default())
    }
}
