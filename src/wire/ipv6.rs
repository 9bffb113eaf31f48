//! IPv6 fixed header.

use super::{FrameWriter, WireError};
use std::net::Ipv6Addr;

/// IPv6 fixed header length.
pub const IPV6_HEADER_LEN: usize = 40;

/// IPv6 next-header value for ICMPv6.
pub const IPPROTO_ICMPV6: u8 = 58;

mod field {
    use std::ops::Range;

    pub const PAYLOAD_LEN: Range<usize> = 4..6;
    pub const NEXT_HEADER: usize = 6;
    pub const HOP_LIMIT: usize = 7;
    pub const SRC_ADDR: Range<usize> = 8..24;
    pub const DST_ADDR: Range<usize> = 24..40;
}

/// Read-only view of a packet that starts with a valid IPv6 fixed header.
///
/// Construction checks the length and version, so the accessors never
/// index past the end of the buffer.
#[derive(Debug, Clone, Copy)]
pub struct Ipv6View<'a> {
    bytes: &'a [u8],
}

impl<'a> Ipv6View<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, WireError> {
        if bytes.len() < IPV6_HEADER_LEN {
            return Err(WireError::Truncated {
                expected: IPV6_HEADER_LEN,
                got: bytes.len(),
            });
        }
        let version = bytes[0] >> 4;
        if version != 6 {
            return Err(WireError::BadVersion(version));
        }
        Ok(Self { bytes })
    }

    /// Whole packet, header included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn payload_len(&self) -> u16 {
        u16::from_be_bytes([self.bytes[field::PAYLOAD_LEN.start], self.bytes[field::PAYLOAD_LEN.start + 1]])
    }

    pub fn next_header(&self) -> u8 {
        self.bytes[field::NEXT_HEADER]
    }

    pub fn hop_limit(&self) -> u8 {
        self.bytes[field::HOP_LIMIT]
    }

    pub fn src_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(addr_octets(&self.bytes[field::SRC_ADDR]))
    }

    pub fn dst_addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(addr_octets(&self.bytes[field::DST_ADDR]))
    }

    /// Bytes following the fixed header.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[IPV6_HEADER_LEN..]
    }
}

fn addr_octets(slice: &[u8]) -> [u8; 16] {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(slice);
    octets
}

/// IPv6 fixed header to emit. Traffic class and flow label are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    pub payload_len: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
}

impl Ipv6Header {
    pub fn emit(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        // Version 6, traffic class 0, flow label 0
        w.put_u32(0x6000_0000)?;
        w.put_u16(self.payload_len)?;
        w.put_u8(self.next_header)?;
        w.put_u8(self.hop_limit)?;
        w.put_slice(&self.src_addr.octets())?;
        w.put_slice(&self.dst_addr.octets())
    }
}
