//! Packet builders shared by unit tests.

use crate::wire::IPV6_HEADER_LEN;
use std::net::Ipv6Addr;

pub(crate) fn make_ipv6_packet(src: Ipv6Addr, dst: Ipv6Addr, next_header: u8, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![0u8; IPV6_HEADER_LEN + payload.len()];

    // Version + TC + Flow Label
    packet[0] = 0x60;

    // Payload length
    let len = payload.len() as u16;
    packet[4..6].copy_from_slice(&len.to_be_bytes());

    // Next header
    packet[6] = next_header;

    // Hop limit
    packet[7] = 64;

    packet[8..24].copy_from_slice(&src.octets());
    packet[24..40].copy_from_slice(&dst.octets());
    packet[IPV6_HEADER_LEN..].copy_from_slice(payload);

    packet
}
