use aero_net_backend::{MacAddr, MacParseError};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const DEFAULT_IO_BASE: u16 = 0x300;
pub const DEFAULT_IRQ: u8 = 3;
pub const DEFAULT_DMA_CHANNEL: u8 = 1;
pub const DEFAULT_LINK_UP_DELAY_MS: u32 = 5000;

/// Highest ISA DMA channel the card can be wired to. Anything above disables DMA.
pub const MAX_VALID_DMA: u8 = 3;

/// Link-up delays outside this range are accepted but logged.
pub const LINK_UP_DELAY_SANE_MS: std::ops::RangeInclusive<u32> = 100..=5000;
pub const MAX_LINK_UP_DELAY_MS: u32 = 300_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidMac(#[from] MacParseError),
    #[error("link up delay {delay_ms} ms exceeds the maximum of {max_ms} ms")]
    LinkUpDelayTooLong { delay_ms: u32, max_ms: u32 },
}

/// Per-instance settings of an EtherLink card.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct El3c501Config {
    #[serde(rename = "MAC", deserialize_with = "deserialize_mac")]
    pub mac: MacAddr,
    #[serde(rename = "CableConnected", default = "default_cable_connected")]
    pub cable_connected: bool,
    #[serde(rename = "Port", default = "default_io_base")]
    pub io_base: u16,
    #[serde(rename = "IRQ", default = "default_irq")]
    pub irq: u8,
    #[serde(rename = "DMA", default = "default_dma_channel")]
    pub dma_channel: u8,
    /// Delay before a temporarily downed link comes back, in milliseconds.
    #[serde(rename = "LinkUpDelay", default = "default_link_up_delay_ms")]
    pub link_up_delay_ms: u32,
    /// Accepted for compatibility; the card always runs at 10 Mbit/s.
    #[serde(rename = "LineSpeed", default)]
    pub line_speed: Option<u32>,
}

fn default_cable_connected() -> bool {
    true
}

fn default_io_base() -> u16 {
    DEFAULT_IO_BASE
}

fn default_irq() -> u8 {
    DEFAULT_IRQ
}

fn default_dma_channel() -> u8 {
    DEFAULT_DMA_CHANNEL
}

fn default_link_up_delay_ms() -> u32 {
    DEFAULT_LINK_UP_DELAY_MS
}

fn deserialize_mac<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MacAddr, D::Error> {
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
}

impl El3c501Config {
    pub fn new(mac: MacAddr) -> Self {
        Self {
            mac,
            cable_connected: default_cable_connected(),
            io_base: DEFAULT_IO_BASE,
            irq: DEFAULT_IRQ,
            dma_channel: DEFAULT_DMA_CHANNEL,
            link_up_delay_ms: DEFAULT_LINK_UP_DELAY_MS,
            line_speed: None,
        }
    }

    /// Parse and validate a JSON configuration object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link_up_delay_ms > MAX_LINK_UP_DELAY_MS {
            return Err(ConfigError::LinkUpDelayTooLong {
                delay_ms: self.link_up_delay_ms,
                max_ms: MAX_LINK_UP_DELAY_MS,
            });
        }
        if !LINK_UP_DELAY_SANE_MS.contains(&self.link_up_delay_ms) {
            tracing::warn!(
                delay_ms = self.link_up_delay_ms,
                "link up delay outside the usual 100..=5000 ms range"
            );
        }
        if !self.dma_enabled() {
            tracing::info!(channel = self.dma_channel, "DMA channel out of range, DMA disabled");
        }
        Ok(())
    }

    pub fn dma_enabled(&self) -> bool {
        self.dma_channel <= MAX_VALID_DMA
    }
}
