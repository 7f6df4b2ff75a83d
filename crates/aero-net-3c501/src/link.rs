//! Emulated link state.
//!
//! The real card has no link indication (AUI and BNC cables were assumed attached), so a
//! downed link is reported to the guest as transmit collisions. After a restore or a backend
//! reattach the link goes down for a while so the guest drops stale connections; it comes back
//! on its own once the guest has noticed, or after a few postponements regardless.

use aero_net_backend::{LinkState, MacAddr, NetworkBackend};

use crate::device::El3c501;
use crate::platform::RestoreTimer;

/// Collisions reported for a downed link before transmits are silently discarded.
pub const MAX_LINKDOWN_REPORTED: u32 = 3;
/// Times the restore timer waits for the guest to notice the outage.
pub const MAX_LINKRST_POSTPONED: u32 = 3;

impl El3c501 {
    pub fn is_effectively_up(&self) -> bool {
        self.driver_attached && !self.link_temp_down && self.link_up
    }

    /// Burned-in address from the PROM.
    pub fn mac(&self) -> MacAddr {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.prom[..6]);
        MacAddr(mac)
    }

    pub fn link_state(&self) -> LinkState {
        match (self.link_up, self.link_temp_down) {
            (true, false) => LinkState::Up,
            (false, _) => LinkState::Down,
            (true, true) => LinkState::DownResume,
        }
    }

    pub fn set_link_state(&mut self, state: LinkState) {
        let up = match state {
            LinkState::DownResume => {
                // Internal outage: the backend is not told.
                self.temp_link_down();
                return;
            }
            LinkState::Up => true,
            LinkState::Down => false,
        };
        if self.link_up == up {
            return;
        }

        self.link_up = up;
        self.link_down_reported = 0;
        self.link_restore_postponed = 0;
        if up {
            // Come up only after the configured delay.
            self.link_temp_down = true;
            self.arm_restore_timer();
        }
        tracing::info!(?state, "link state changed");
        self.backend.notify_link_changed(state);
    }

    /// Take the link down until the restore timer brings it back. No-op while unplugged.
    pub fn temp_link_down(&mut self) {
        if !self.link_up {
            return;
        }
        self.link_temp_down = true;
        self.link_down_reported = 0;
        self.link_restore_postponed = 0;
        self.arm_restore_timer();
    }

    fn arm_restore_timer(&mut self) {
        if let Err(err) = self.platform.arm_millis(self.config.link_up_delay_ms) {
            tracing::error!(%err, "failed to arm link restore timer");
        }
    }

    /// Restore timer callback.
    pub fn restore_timer_expired(&mut self) {
        let postpone = self.link_down_reported <= MAX_LINKDOWN_REPORTED
            && self.link_restore_postponed <= MAX_LINKRST_POSTPONED;
        if postpone && self.platform.arm_millis(self.config.link_up_delay_ms).is_ok() {
            self.link_restore_postponed += 1;
            tracing::debug!(
                reported = self.link_down_reported,
                postponed = self.link_restore_postponed,
                "guest has not noticed the outage yet, link restore postponed"
            );
            return;
        }

        self.link_temp_down = false;
        if self.link_up {
            tracing::info!(reported = self.link_down_reported, "link is back up");
        }
    }
}
