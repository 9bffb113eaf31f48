//! Interception queue configuration (`queue.*`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bytes of each packet copied to userspace (whole packet).
const DEFAULT_COPY_RANGE: u16 = 0xffff;

/// Default receive timeout; bounds how long shutdown waits for the loop.
const DEFAULT_RECV_TIMEOUT_MS: u64 = 500;

/// NFQUEUE settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Queue number (`queue.num`), as in `ip6tables -j NFQUEUE --queue-num N`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num: Option<u16>,

    /// Bytes of each packet copied to userspace (`queue.copy_range`).
    /// Defaults to 65535.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_range: Option<u16>,

    /// Receive timeout in milliseconds (`queue.recv_timeout_ms`).
    /// Defaults to 500.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recv_timeout_ms: Option<u64>,
}

impl QueueConfig {
    /// Get the copy range, using default if not configured.
    pub fn copy_range(&self) -> u16 {
        self.copy_range.unwrap_or(DEFAULT_COPY_RANGE)
    }

    /// Get the receive timeout, using default if not configured.
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms.unwrap_or(DEFAULT_RECV_TIMEOUT_MS))
    }

    pub(super) fn merge(&mut self, other: QueueConfig) {
        if other.num.is_some() {
            self.num = other.num;
        }
        if other.copy_range.is_some() {
            self.copy_range = other.copy_range;
        }
        if other.recv_timeout_ms.is_some() {
            self.recv_timeout_ms = other.recv_timeout_ms;
        }
    }
}
