//! Intake adapter: turns a queued message into an [`InterceptedPacket`].

use crate::queue::QueueMessage;
use crate::verdict::PacketId;
use crate::wire::MacAddr;

/// An intercepted IPv6 packet and its ingress metadata.
///
/// Borrows from the queue message, so it cannot outlive the handling of
/// that one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptedPacket<'a> {
    id: PacketId,
    bytes: &'a [u8],
    link_source: Option<&'a [u8]>,
    indev: Option<u32>,
    outdev: Option<u32>,
    physindev: Option<u32>,
    physoutdev: Option<u32>,
    hw_protocol: Option<u16>,
    hook: Option<u8>,
    mark: Option<u32>,
}

impl<'a> InterceptedPacket<'a> {
    /// A packet with no metadata beyond its id.
    pub fn new(id: PacketId, bytes: &'a [u8]) -> Self {
        Self {
            id,
            bytes,
            link_source: None,
            indev: None,
            outdev: None,
            physindev: None,
            physoutdev: None,
            hw_protocol: None,
            hook: None,
            mark: None,
        }
    }

    /// Adapt a queued message.
    ///
    /// A missing packet id becomes [`PacketId::UNKNOWN`]; a missing or
    /// empty hardware address leaves the link source unset.
    pub fn from_message(msg: &'a QueueMessage) -> Self {
        Self {
            id: msg.packet_id.map(PacketId::new).unwrap_or(PacketId::UNKNOWN),
            bytes: &msg.payload,
            link_source: msg.hw_addr.as_deref().filter(|addr| !addr.is_empty()),
            indev: msg.indev.filter(|&i| i != 0),
            outdev: msg.outdev.filter(|&i| i != 0),
            physindev: msg.physindev.filter(|&i| i != 0),
            physoutdev: msg.physoutdev.filter(|&i| i != 0),
            hw_protocol: msg.hw_protocol,
            hook: msg.hook,
            mark: msg.mark,
        }
    }

    pub fn with_link_source(mut self, addr: &'a [u8]) -> Self {
        self.link_source = Some(addr);
        self
    }

    pub fn with_indev(mut self, ifindex: u32) -> Self {
        self.indev = Some(ifindex);
        self
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    /// Raw packet bytes, starting at the IPv6 header.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Link-layer source address as reported, of any length.
    pub fn link_source(&self) -> Option<&'a [u8]> {
        self.link_source
    }

    /// Link-layer source as a MAC address, if at least six bytes were reported.
    pub fn link_source_mac(&self) -> Option<MacAddr> {
        self.link_source.and_then(MacAddr::from_slice)
    }

    /// Ingress interface index.
    pub fn indev(&self) -> Option<u32> {
        self.indev
    }

    pub fn outdev(&self) -> Option<u32> {
        self.outdev
    }

    /// Bridge port the packet entered on.
    pub fn physindev(&self) -> Option<u32> {
        self.physindev
    }

    pub fn physoutdev(&self) -> Option<u32> {
        self.physoutdev
    }

    pub fn hw_protocol(&self) -> Option<u16> {
        self.hw_protocol
    }

    pub fn hook(&self) -> Option<u8> {
        self.hook
    }

    pub fn mark(&self) -> Option<u32> {
        self.mark
    }
}
