use std::fmt::Write as _;

use crate::buffer::{address_for, BUF_SIZE};
use crate::device::El3c501;
use crate::regs::IntrState;

const DUMP_LEN: usize = 64;
const ROW_LEN: usize = 16;

impl El3c501 {
    /// Human-readable register dump for debuggers.
    ///
    /// `args` is a whitespace separated list of extras: `addr` (or `verbose`) adds the station
    /// address, `sendbuf` and `recvbuf` add hex dumps of the transmit and receive areas.
    pub fn info(&self, args: &str) -> String {
        let mut want_addr = false;
        let mut want_send = false;
        let mut want_recv = false;
        for arg in args.split_whitespace() {
            match arg {
                "addr" | "verbose" => want_addr = true,
                "sendbuf" => want_send = true,
                "recvbuf" => want_recv = true,
                _ => {}
            }
        }

        let mut out = String::new();
        let cfg = &self.config;
        let dma = if cfg.dma_enabled() {
            cfg.dma_channel.to_string()
        } else {
            "disabled".to_string()
        };
        let _ = writeln!(
            out,
            "3C501 EtherLink: port={:#x} IRQ={} DMA={} mac-cfg={}{}",
            cfg.io_base,
            cfg.irq,
            dma,
            cfg.mac,
            if self.driver_attached { "" } else { " (no driver)" }
        );
        let _ = writeln!(
            out,
            "  GP Buf Ptr : {} (masked {})",
            self.gp_buf_ptr,
            address_for(self.gp_buf_ptr)
        );
        let _ = writeln!(out, "  RCV Buf Ptr: {}", self.rcv_buf_ptr);
        let _ = writeln!(
            out,
            "  Recv Command: {:02X}  Recv Status: {:02X}",
            self.rcv_cmd.bits(),
            self.rcv_stat.bits()
        );
        let _ = writeln!(
            out,
            "  Xmit Command: {:02X}  Xmit Status: {:02X}",
            self.xmit_cmd.bits(),
            self.xmit_stat.bits()
        );
        let _ = writeln!(
            out,
            "  Aux  Command: {:02X}  Aux  Status: {:02X}",
            self.aux_cmd.bits(),
            self.aux_stat.bits()
        );
        let _ = writeln!(out, "  Address matching: {}", self.rcv_cmd.addr_match().name());
        let _ = writeln!(out, "  Buffer control  : {}", self.aux_cmd.buf_ctl().name());
        let _ = writeln!(
            out,
            "  Interrupt state : xmit={} recv={} dma={}",
            u8::from(self.intr.contains(IntrState::XMIT)),
            u8::from(self.intr.contains(IntrState::RECV)),
            u8::from(self.intr.contains(IntrState::DMA))
        );
        if self.link_temp_down {
            let _ = writeln!(out, "  Link down count : {}", self.link_down_reported);
            let _ = writeln!(out, "  Postpone count  : {}", self.link_restore_postponed);
        }

        if want_addr {
            let _ = writeln!(out, "  Station address : {}", self.station_addr());
        }
        if want_send {
            let start = address_for(self.gp_buf_ptr);
            let _ = writeln!(out, "Send buffer (start at {start}):");
            let len = DUMP_LEN.min(BUF_SIZE - start);
            hex_rows(&mut out, start, self.buf.window(self.gp_buf_ptr, len));
        }
        if want_recv {
            let _ = writeln!(out, "Receive buffer (start at 0):");
            let len = DUMP_LEN.min(usize::from(self.rcv_buf_ptr)).min(BUF_SIZE);
            hex_rows(&mut out, 0, self.buf.window(0, len));
        }
        out
    }
}

fn hex_rows(out: &mut String, base: usize, bytes: &[u8]) {
    for (i, row) in bytes.chunks(ROW_LEN).enumerate() {
        let _ = write!(out, "  {:04X}:", base + i * ROW_LEN);
        for byte in row {
            let _ = write!(out, " {byte:02x}");
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_rows_are_sixteen_bytes_wide() {
        let mut out = String::new();
        hex_rows(&mut out, 0x7F0, &[0xAB; 20]);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  07F0: ab ab"));
        assert_eq!(lines[1], "  0800: ab ab ab ab");
    }
}
