use std::time::Duration;

use promptlink_frame::ProtocolConfig;
use serde::Deserialize;

use crate::backoff::BackoffConfig;

/// Command execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Per-attempt response timeout when the caller gives none.
    #[serde(rename = "default_timeout_ms", with = "millis")]
    pub default_timeout: Duration,
    /// Attempts per command, each followed by a resync on timeout.
    pub max_attempts: u32,
    /// Commands that may wait in the queue before submitters block.
    pub queue_depth: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(10),
            max_attempts: 3,
            queue_depth: 64,
        }
    }
}

/// Resynchronization settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Probe rounds before giving up.
    pub attempts: u32,
    /// Response timeout for each probe.
    #[serde(rename = "probe_timeout_ms", with = "millis")]
    pub probe_timeout: Duration,
    /// Pause between failed rounds.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            probe_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Everything a session needs besides the connector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub protocol: ProtocolConfig,
    pub executor: ExecutorConfig,
    pub sync: SyncConfig,
    pub backoff: BackoffConfig,
}

/// Durations as integer milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
