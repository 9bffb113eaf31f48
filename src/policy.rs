//! Reply suppression rules (RFC 4443 §2.4(e)).
//!
//! The original packet is dropped either way; these rules only decide
//! whether a Packet Too Big reply is sent for it.

use crate::wire::icmpv6::is_error_type;
use crate::wire::{Ipv6View, IPPROTO_ICMPV6};
use std::fmt;

/// Why no reply is sent for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// Source is `::`; there is nobody to notify.
    UnspecifiedSource,
    /// Source is a multicast address.
    MulticastSource,
    /// Destination is a multicast address.
    MulticastDestination,
    /// The packet is itself an ICMPv6 error message.
    IcmpError,
}

impl fmt::Display for Suppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suppression::UnspecifiedSource => write!(f, "unspecified source"),
            Suppression::MulticastSource => write!(f, "multicast source"),
            Suppression::MulticastDestination => write!(f, "multicast destination"),
            Suppression::IcmpError => write!(f, "ICMPv6 error message"),
        }
    }
}

/// Check whether a reply to this packet must be suppressed.
///
/// Only the fixed header is inspected; extension headers before an ICMPv6
/// header are not walked.
pub fn suppression(packet: &Ipv6View<'_>) -> Option<Suppression> {
    let src = packet.src_addr();
    if src.is_unspecified() {
        return Some(Suppression::UnspecifiedSource);
    }
    if src.is_multicast() {
        return Some(Suppression::MulticastSource);
    }

    // e.g. ff02::2 (all-routers) from Router Solicitation
    if packet.dst_addr().is_multicast() {
        return Some(Suppression::MulticastDestination);
    }

    if packet.next_header() == IPPROTO_ICMPV6 {
        if let Some(&icmp_type) = packet.payload().first() {
            if is_error_type(icmp_type) {
                return Some(Suppression::IcmpError);
            }
        }
    }

    None
}
