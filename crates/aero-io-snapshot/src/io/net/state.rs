use crate::io::state::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotResult, SnapshotVersion, SnapshotWriter,
};

const TAG_GP_BUF_PTR: u16 = 1;
const TAG_RCV_BUF_PTR: u16 = 2;

const TAG_XMIT_CMD: u16 = 10;
const TAG_XMIT_STAT: u16 = 11;
const TAG_RCV_CMD: u16 = 12;
const TAG_RCV_STAT: u16 = 13;
const TAG_AUX_CMD: u16 = 14;
const TAG_AUX_STAT: u16 = 15;

const TAG_INTR_STATE: u16 = 20;
const TAG_IN_RESET: u16 = 21;
const TAG_LINK_UP: u16 = 22;
const TAG_IRQ_ASSERTED: u16 = 23;

const TAG_STATION_ADDR: u16 = 30;
const TAG_CONFIGURED_MAC: u16 = 31;

// Pointers are 12-bit counters; anything wider can only come from a corrupted blob.
const MAX_BUF_PTR: u16 = 0x0FFF;

/// Persisted register state of a 3C501 EtherLink adapter.
///
/// The packet buffer itself is not part of the record. `configured_mac` is stored so a restore
/// can detect that the VM configuration changed underneath the snapshot; it is never applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct El3c501DeviceState {
    pub gp_buf_ptr: u16,
    pub rcv_buf_ptr: u16,

    pub xmit_cmd: u8,
    pub xmit_stat: u8,
    pub rcv_cmd: u8,
    pub rcv_stat: u8,
    pub aux_cmd: u8,
    pub aux_stat: u8,

    pub intr_state: u8,
    pub in_reset: bool,
    pub link_up: bool,
    pub irq_asserted: bool,

    pub station_addr: [u8; 6],
    pub configured_mac: [u8; 6],
}

impl IoSnapshot for El3c501DeviceState {
    const DEVICE_ID: [u8; 4] = *b"ELNK";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);

        w.field_u16(TAG_GP_BUF_PTR, self.gp_buf_ptr);
        w.field_u16(TAG_RCV_BUF_PTR, self.rcv_buf_ptr);

        w.field_u8(TAG_XMIT_CMD, self.xmit_cmd);
        w.field_u8(TAG_XMIT_STAT, self.xmit_stat);
        w.field_u8(TAG_RCV_CMD, self.rcv_cmd);
        w.field_u8(TAG_RCV_STAT, self.rcv_stat);
        w.field_u8(TAG_AUX_CMD, self.aux_cmd);
        w.field_u8(TAG_AUX_STAT, self.aux_stat);

        w.field_u8(TAG_INTR_STATE, self.intr_state);
        w.field_bool(TAG_IN_RESET, self.in_reset);
        w.field_bool(TAG_LINK_UP, self.link_up);
        w.field_bool(TAG_IRQ_ASSERTED, self.irq_asserted);

        w.field_bytes(TAG_STATION_ADDR, self.station_addr.to_vec());
        w.field_bytes(TAG_CONFIGURED_MAC, self.configured_mac.to_vec());

        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        r.ensure_device_major(Self::DEVICE_VERSION.major)?;

        // The configured MAC is the one field every version carries.
        let configured_mac = r
            .bytes(TAG_CONFIGURED_MAC)
            .ok_or(SnapshotError::Corrupt("3c501 configured mac missing"))?;
        self.configured_mac = mac_field(configured_mac, "3c501 configured mac")?;

        if let Some(addr) = r.bytes(TAG_STATION_ADDR) {
            self.station_addr = mac_field(addr, "3c501 station address")?;
        }

        let gp = r.u16(TAG_GP_BUF_PTR)?.unwrap_or(self.gp_buf_ptr);
        let rcv = r.u16(TAG_RCV_BUF_PTR)?.unwrap_or(self.rcv_buf_ptr);
        if gp > MAX_BUF_PTR {
            return Err(SnapshotError::InvalidFieldEncoding("3c501 gp buffer pointer"));
        }
        if rcv > MAX_BUF_PTR {
            return Err(SnapshotError::InvalidFieldEncoding("3c501 rcv buffer pointer"));
        }
        self.gp_buf_ptr = gp;
        self.rcv_buf_ptr = rcv;

        self.xmit_cmd = r.u8(TAG_XMIT_CMD)?.unwrap_or(self.xmit_cmd);
        self.xmit_stat = r.u8(TAG_XMIT_STAT)?.unwrap_or(self.xmit_stat);
        self.rcv_cmd = r.u8(TAG_RCV_CMD)?.unwrap_or(self.rcv_cmd);
        self.rcv_stat = r.u8(TAG_RCV_STAT)?.unwrap_or(self.rcv_stat);
        self.aux_cmd = r.u8(TAG_AUX_CMD)?.unwrap_or(self.aux_cmd);
        self.aux_stat = r.u8(TAG_AUX_STAT)?.unwrap_or(self.aux_stat);

        let intr_state = r.u8(TAG_INTR_STATE)?.unwrap_or(self.intr_state);
        if intr_state & !0x07 != 0 {
            return Err(SnapshotError::InvalidFieldEncoding("3c501 interrupt state"));
        }
        self.intr_state = intr_state;
        self.in_reset = r.bool(TAG_IN_RESET)?.unwrap_or(self.in_reset);
        self.link_up = r.bool(TAG_LINK_UP)?.unwrap_or(self.link_up);
        self.irq_asserted = r.bool(TAG_IRQ_ASSERTED)?.unwrap_or(self.irq_asserted);

        Ok(())
    }
}

fn mac_field(raw: &[u8], what: &'static str) -> SnapshotResult<[u8; 6]> {
    raw.try_into()
        .map_err(|_| SnapshotError::InvalidFieldEncoding(what))
}
