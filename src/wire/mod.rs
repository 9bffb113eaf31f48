//! Wire Formats
//!
//! Typed header structs for the reply frame (Ethernet, IPv6, ICMPv6) and
//! the bounded writer they are emitted through. Every write is checked
//! against the writer's fixed capacity, so a header or payload that does
//! not fit is an error rather than a buffer overrun.

pub mod checksum;
pub mod ethernet;
pub mod icmpv6;
pub mod ipv6;

use thiserror::Error;

pub use ethernet::{EthernetHeader, MacAddr, ETHERNET_HEADER_LEN, ETHERNET_TRAILER_LEN, ETHERTYPE_IPV6};
pub use icmpv6::{Icmpv6Type, PacketTooBigHeader, ICMPV6_HEADER_LEN};
pub use ipv6::{Ipv6Header, Ipv6View, IPPROTO_ICMPV6, IPV6_HEADER_LEN};

/// Errors from building or reading wire formats.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("write of {needed} bytes exceeds remaining capacity {remaining}")]
    Overflow { needed: usize, remaining: usize },

    #[error("patch at offset {offset} (len {len}) is outside the {written} bytes written")]
    PatchOutOfRange {
        offset: usize,
        len: usize,
        written: usize,
    },

    #[error("packet too short: expected at least {expected}, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("unsupported IP version: {0}")]
    BadVersion(u8),

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
}

/// Append-only byte writer with a hard capacity limit.
///
/// Multi-byte integers are written in network byte order.
#[derive(Debug, Clone)]
pub struct FrameWriter {
    buf: Vec<u8>,
    capacity: usize,
}

impl FrameWriter {
    /// Create a writer that refuses to grow beyond `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Bytes that can still be written.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Maximum number of bytes this writer accepts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn reserve(&self, needed: usize) -> Result<(), WireError> {
        if needed > self.remaining() {
            return Err(WireError::Overflow {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), WireError> {
        self.reserve(1)?;
        self.buf.push(value);
        Ok(())
    }

    pub fn put_u16(&mut self, value: u16) -> Result<(), WireError> {
        self.put_slice(&value.to_be_bytes())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<(), WireError> {
        self.put_slice(&value.to_be_bytes())
    }

    pub fn put_slice(&mut self, data: &[u8]) -> Result<(), WireError> {
        self.reserve(data.len())?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Overwrite a 16-bit field that has already been written.
    pub fn patch_u16(&mut self, offset: usize, value: u16) -> Result<(), WireError> {
        let written = self.buf.len();
        let field = offset
            .checked_add(2)
            .and_then(|end| self.buf.get_mut(offset..end))
            .ok_or(WireError::PatchOutOfRange {
                offset,
                len: 2,
                written,
            })?;
        field.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning the written bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
