//! Signaling engine configuration: transport buffers, presence pacing, liveness.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Outbound buffer size per connection.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// Maximum accepted inbound frame size in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Maximum size of a relayed negotiation payload in bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: default_channel_buffer(),
            max_message_bytes: default_max_message_bytes(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

/// Presence broadcast pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Pause between paced admission stages in milliseconds (0 disables pacing).
    #[serde(default = "default_stage_delay")]
    pub stage_delay_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            stage_delay_ms: default_stage_delay(),
        }
    }
}

impl PresenceConfig {
    /// Stage delay as a [`Duration`].
    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }
}

/// Stale participant reclamation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// Interval between sweeps in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Inactivity after which a participant is presumed disconnected.
    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold_seconds: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval(),
            staleness_threshold_seconds: default_staleness_threshold(),
        }
    }
}

impl LivenessConfig {
    /// Sweep interval as a [`Duration`], never shorter than one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }

    /// Staleness threshold as a [`Duration`].
    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_seconds)
    }
}

fn default_channel_buffer() -> usize {
    256
}

fn default_max_message_bytes() -> usize {
    65_536
}

fn default_max_payload_bytes() -> usize {
    32_768
}

fn default_stage_delay() -> u64 {
    500
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_staleness_threshold() -> u64 {
    60
}
