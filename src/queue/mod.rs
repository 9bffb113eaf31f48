//! Packet Interception Boundary
//!
//! Traits and types for the kernel subsystem that delivers intercepted
//! packets and takes a verdict for each one. The Linux implementation
//! speaks nfnetlink_queue over a `netlink-sys` socket (`nfqueue`); tests
//! drive the enforcer through in-memory queues implementing [`PacketQueue`].

pub mod netlink;
pub mod nfqueue;

use crate::verdict::Verdict;
use std::io;
use thiserror::Error;

pub use nfqueue::NfQueue;

/// Errors from the interception subsystem.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("{op} failed: {source}")]
    Os {
        op: &'static str,
        source: io::Error,
    },

    #[error("{op} rejected by kernel: {source}")]
    Netlink {
        op: &'static str,
        source: io::Error,
    },
}

impl QueueError {
    pub(crate) fn os(op: &'static str, source: io::Error) -> Self {
        QueueError::Os { op, source }
    }
}

/// One intercepted packet with the metadata the kernel attached to it.
///
/// Every field except the payload is optional on the wire; absent fields
/// stay `None` and are defaulted by the intake adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMessage {
    /// Queue-assigned packet id, required for the verdict.
    pub packet_id: Option<u32>,
    /// Link-layer protocol (EtherType) of the frame the packet arrived in.
    pub hw_protocol: Option<u16>,
    /// Netfilter hook the packet was queued from.
    pub hook: Option<u8>,
    /// Firewall mark.
    pub mark: Option<u32>,
    /// Ingress interface index.
    pub indev: Option<u32>,
    /// Egress interface index.
    pub outdev: Option<u32>,
    /// Physical ingress port, when the packet crossed a bridge.
    pub physindev: Option<u32>,
    /// Physical egress port, when the packet crossed a bridge.
    pub physoutdev: Option<u32>,
    /// Link-layer source address, as long as the kernel reported it.
    pub hw_addr: Option<Vec<u8>>,
    /// Network-layer packet, starting at the IPv6 header.
    pub payload: Vec<u8>,
}

/// Source of intercepted packets and sink for their verdicts.
///
/// Each packet delivered by `recv` must get exactly one `set_verdict`,
/// otherwise the kernel queue eventually stalls.
pub trait PacketQueue {
    /// Wait for the next packet.
    ///
    /// Returns `Ok(None)` when the wait timed out or was interrupted, so
    /// the caller can check for shutdown.
    fn recv(&mut self) -> Result<Option<QueueMessage>, QueueError>;

    /// Report the verdict for a previously received packet.
    fn set_verdict(&mut self, verdict: Verdict) -> Result<(), QueueError>;
}
