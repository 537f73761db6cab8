// ── Runtime configuration ──
//
// Built by lockbridge-config from TOML/env, or directly by embedders.

use std::time::Duration;

use crate::transport::DEFAULT_FRAME_PAYLOAD;

/// Timing and framing knobs for the orchestrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Upper bound on a whole pairing session.
    pub pairing_timeout: Duration,
    /// Used when a WiFi request carries no timeout of its own.
    pub wifi_timeout: Duration,
    /// Key payload fragment size; further capped by the transport.
    pub key_chunk_size: usize,
    /// How long to wait for the lock to confirm a fully sent key.
    pub key_confirmation_timeout: Duration,
    /// Bound on a single request/acknowledgment exchange: one key chunk,
    /// one journal page or one lock command.
    pub ack_timeout: Duration,
    /// Chip type passed to the add-device exchange when the caller omits it.
    pub chip_type: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            pairing_timeout: Duration::from_secs(30),
            wifi_timeout: Duration::from_secs(60),
            key_chunk_size: DEFAULT_FRAME_PAYLOAD,
            key_confirmation_timeout: Duration::from_secs(15),
            ack_timeout: Duration::from_secs(10),
            chip_type: 0,
        }
    }
}
