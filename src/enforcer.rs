//! Packet enforcement loop.
//!
//! Pulls intercepted packets off a [`PacketQueue`] one at a time, drops
//! each of them, and answers the sender with a Packet Too Big frame on a
//! [`FrameSink`]. The verdict is issued before the reply is transmitted
//! and never depends on it.

use crate::diag::trace_dump;
use crate::intake::InterceptedPacket;
use crate::policy::{suppression, Suppression};
use crate::queue::{PacketQueue, QueueError, QueueMessage};
use crate::synth::{ReplyFrame, ReplySynthesizer};
use crate::transmit::FrameSink;
use crate::verdict::decide;
use crate::wire::Ipv6View;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that stop the enforcement loop.
#[derive(Debug, Error)]
pub enum EnforcerError {
    #[error("queue receive failed: {0}")]
    Queue(#[from] QueueError),
}

/// What happened to one packet, besides being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A reply of `len` bytes was handed to the sink for `ifindex`.
    Replied { ifindex: u32, len: usize },
    /// A reply was built but could not be sent.
    TransmitFailed { ifindex: u32 },
    /// No reply is sent for this kind of packet.
    Suppressed(Suppression),
    /// Not an IPv6 packet, or too short to be one.
    Malformed,
}

/// Drives one queue and one sink until shutdown.
pub struct Enforcer<Q, S> {
    queue: Q,
    sink: S,
    synth: ReplySynthesizer,
    /// Configured interface. The reply source MAC belongs to it, and it is
    /// the egress for packets without an ingress index.
    link_ifindex: u32,
    /// Set once a packet arrived on some other interface.
    foreign_ingress_seen: bool,
    shutdown: Arc<AtomicBool>,
}

impl<Q: PacketQueue, S: FrameSink> Enforcer<Q, S> {
    pub fn new(
        queue: Q,
        sink: S,
        synth: ReplySynthesizer,
        link_ifindex: u32,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            queue,
            sink,
            synth,
            link_ifindex,
            foreign_ingress_seen: false,
            shutdown,
        }
    }

    /// Process packets until the shutdown flag is set.
    ///
    /// Per-packet failures are logged and skipped. A receive error other
    /// than a timeout ends the loop.
    pub fn run(&mut self) -> Result<(), EnforcerError> {
        info!(
            mtu = self.synth.mtu().get(),
            link_ifindex = self.link_ifindex,
            "Enforcer starting"
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.queue.recv() {
                Ok(Some(msg)) => {
                    self.handle(&msg);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "Queue receive failed, enforcer stopping");
                    return Err(e.into());
                }
            }
        }

        info!("Enforcer stopped");
        Ok(())
    }

    /// Drop one packet and reply to it if appropriate.
    pub fn handle(&mut self, msg: &QueueMessage) -> Disposition {
        let packet = InterceptedPacket::from_message(msg);
        let id = packet.id();
        let copy_len = packet.len().min(self.synth.mtu().max_payload());

        debug!(
            id = %id,
            hw_protocol = ?packet.hw_protocol(),
            hook = ?packet.hook(),
            payload_len = packet.len(),
            copy_len,
            hw_src_addr = ?packet.link_source().map(hex::encode),
            indev = ?packet.indev(),
            outdev = ?packet.outdev(),
            physindev = ?packet.physindev(),
            physoutdev = ?packet.physoutdev(),
            mark = ?packet.mark(),
            "Intercepted packet"
        );
        if id.is_unknown() {
            debug!("Packet carries no id, verdict is best-effort");
        }
        if packet.link_source_mac().is_none() {
            debug!(id = %id, "No link source address, reply destination zeroed");
        }

        let reply = self.build_reply(&packet);

        let verdict = decide(id);
        if let Err(e) = self.queue.set_verdict(verdict) {
            warn!(id = %id, outcome = %verdict.outcome, error = %e, "Failed to issue verdict");
        }

        let frame = match reply {
            Ok(frame) => frame,
            Err(disposition) => return disposition,
        };

        let ifindex = packet.indev().unwrap_or(self.link_ifindex);
        if ifindex != self.link_ifindex {
            self.note_foreign_ingress(ifindex);
        }
        match self.sink.send(frame.as_bytes(), ifindex) {
            Ok(_) => {
                debug!(id = %id, ifindex, len = frame.len(), "Sent Packet Too Big");
                Disposition::Replied {
                    ifindex,
                    len: frame.len(),
                }
            }
            Err(e) => {
                warn!(id = %id, ifindex, error = %e, "Failed to send Packet Too Big");
                Disposition::TransmitFailed { ifindex }
            }
        }
    }

    /// Replies leave through the ingress interface but carry the configured
    /// interface's MAC as their source. Warn the first time they differ.
    fn note_foreign_ingress(&mut self, ifindex: u32) {
        if self.foreign_ingress_seen {
            debug!(ifindex, link_ifindex = self.link_ifindex, "Reply leaves a foreign interface");
            return;
        }
        self.foreign_ingress_seen = true;
        warn!(
            ifindex,
            link_ifindex = self.link_ifindex,
            "Packet arrived on another interface, its reply carries the configured interface's source MAC"
        );
    }

    fn build_reply(&self, packet: &InterceptedPacket<'_>) -> Result<ReplyFrame, Disposition> {
        let view = match Ipv6View::new(packet.bytes()) {
            Ok(view) => view,
            Err(e) => {
                warn!(id = %packet.id(), len = packet.len(), error = %e, "Malformed packet, dropping without reply");
                return Err(Disposition::Malformed);
            }
        };

        if let Some(reason) = suppression(&view) {
            debug!(id = %packet.id(), %reason, "Reply suppressed");
            return Err(Disposition::Suppressed(reason));
        }

        match self.synth.synthesize(packet) {
            Ok(frame) => {
                trace_dump("link header", frame.link_header());
                trace_dump("IPv6 header", frame.ipv6_header());
                trace_dump("ICMPv6", frame.icmpv6_segment());
                Ok(frame)
            }
            Err(e) => {
                warn!(id = %packet.id(), error = %e, "Failed to build reply");
                Err(Disposition::Malformed)
            }
        }
    }

    /// Tear down, returning the queue and sink.
    pub fn into_parts(self) -> (Q, S) {
        (self.queue, self.sink)
    }
}
