//! Internet checksum (RFC 1071) and the IPv6 pseudo-header (RFC 8200 §8.1).

use super::IPPROTO_ICMPV6;
use std::net::Ipv6Addr;

fn propagate_carries(word: u32) -> u16 {
    let mut sum = word;
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

/// One's-complement sum of `data` as big-endian 16-bit words, without the
/// final complement. An odd trailing byte is padded with zero.
pub fn data(data: &[u8]) -> u16 {
    let mut accum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        accum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
        // Fold early so very long inputs cannot overflow the accumulator
        if accum > 0xffff_0000 {
            accum = propagate_carries(accum) as u32;
        }
    }
    if let [last] = chunks.remainder() {
        accum += (*last as u32) << 8;
    }
    propagate_carries(accum)
}

/// Combine partial sums produced by [`data`].
pub fn combine(sums: &[u16]) -> u16 {
    let accum: u32 = sums.iter().map(|&s| s as u32).sum();
    propagate_carries(accum)
}

/// Partial sum of the IPv6 pseudo-header.
pub fn pseudo_header(src: &Ipv6Addr, dst: &Ipv6Addr, next_header: u8, length: u32) -> u16 {
    let mut trailer = [0u8; 8];
    trailer[0..4].copy_from_slice(&length.to_be_bytes());
    trailer[7] = next_header;

    combine(&[data(&src.octets()), data(&dst.octets()), data(&trailer)])
}

/// Checksum value for an ICMPv6 message whose checksum field is zero.
pub fn icmpv6(src: &Ipv6Addr, dst: &Ipv6Addr, message: &[u8]) -> u16 {
    let sum = combine(&[
        pseudo_header(src, dst, IPPROTO_ICMPV6, message.len() as u32),
        data(message),
    ]);
    !sum
}

/// Check an ICMPv6 message that carries its checksum.
///
/// Summing the pseudo-header and the message including a correct checksum
/// yields 0xffff, whose complement is zero.
pub fn verify_icmpv6(src: &Ipv6Addr, dst: &Ipv6Addr, message: &[u8]) -> bool {
    icmpv6(src, dst, message) == 0
}
