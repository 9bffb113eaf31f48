//! Reply transmission configuration (`link.*`).

use crate::wire::MacAddr;
use serde::{Deserialize, Serialize};

/// How synthesized replies leave the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    /// Send synthesized replies (`link.transmit`). Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmit: Option<bool>,

    /// Source MAC for replies (`link.source_mac`). Defaults to the
    /// interface's own address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_mac: Option<MacAddr>,
}

impl LinkConfig {
    /// Whether replies are transmitted, using default if not configured.
    pub fn transmit(&self) -> bool {
        self.transmit.unwrap_or(true)
    }

    pub(super) fn merge(&mut self, other: LinkConfig) {
        if other.transmit.is_some() {
            self.transmit = other.transmit;
        }
        if other.source_mac.is_some() {
            self.source_mac = other.source_mac;
        }
    }
}
