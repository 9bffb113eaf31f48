//! ICMPv6 message types and the Packet Too Big header (RFC 4443).

use super::{FrameWriter, WireError};

/// Type + code + checksum + 32-bit message-specific field.
pub const ICMPV6_HEADER_LEN: usize = 8;

/// Offset of the checksum field within the ICMPv6 header.
pub const CHECKSUM_OFFSET: usize = 2;

/// ICMPv6 message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Icmpv6Type {
    /// Destination Unreachable (error).
    DestinationUnreachable = 1,
    /// Packet Too Big (error).
    PacketTooBig = 2,
    /// Time Exceeded (error).
    TimeExceeded = 3,
    /// Parameter Problem (error).
    ParameterProblem = 4,
    /// Echo Request.
    EchoRequest = 128,
    /// Echo Reply.
    EchoReply = 129,
}

/// ICMPv6 error messages occupy types 0-127.
pub fn is_error_type(icmp_type: u8) -> bool {
    icmp_type < 128
}

/// Packet Too Big header.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Type=2    |     Code=0    |          Checksum             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             MTU                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                    As much of invoking packet                 |
/// +               as possible without exceeding the MTU           +
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketTooBigHeader {
    pub mtu: u32,
    pub checksum: u16,
}

impl PacketTooBigHeader {
    /// Header with a zero checksum, to be patched once the payload is in place.
    pub fn new(mtu: u32) -> Self {
        Self { mtu, checksum: 0 }
    }

    pub fn emit(&self, w: &mut FrameWriter) -> Result<(), WireError> {
        w.put_u8(Icmpv6Type::PacketTooBig as u8)?;
        w.put_u8(0)?;
        w.put_u16(self.checksum)?;
        w.put_u32(self.mtu)
    }
}
