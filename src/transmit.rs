//! Frame transmission.
//!
//! Synthesized replies are complete Ethernet frames, so they go out
//! through an `AF_PACKET` raw socket on a chosen interface. The NIC
//! appends the frame check sequence.

use crate::wire::{MacAddr, ETHERNET_HEADER_LEN};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use thiserror::Error;
use tracing::debug;

/// Errors from sending frames.
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("failed to open packet socket: {0}")]
    Open(io::Error),

    #[error("send on ifindex {ifindex} failed: {source}")]
    Send { ifindex: u32, source: io::Error },

    #[error("frame of {0} bytes is shorter than an Ethernet header")]
    ShortFrame(usize),
}

/// Destination for synthesized frames.
pub trait FrameSink {
    /// Put a complete link-layer frame on the wire of interface `ifindex`.
    ///
    /// Returns the number of bytes handed to the kernel.
    fn send(&mut self, frame: &[u8], ifindex: u32) -> Result<usize, TransmitError>;
}

/// `AF_PACKET` raw socket used for sending only.
pub struct PacketSocket {
    fd: OwnedFd,
}

impl PacketSocket {
    /// Open the socket. Requires CAP_NET_RAW.
    pub fn open() -> Result<Self, TransmitError> {
        // Protocol 0: the socket receives nothing, it only sends
        let raw = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW | libc::SOCK_CLOEXEC, 0) };
        if raw < 0 {
            return Err(TransmitError::Open(io::Error::last_os_error()));
        }
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(raw) },
        })
    }
}

impl FrameSink for PacketSocket {
    fn send(&mut self, frame: &[u8], ifindex: u32) -> Result<usize, TransmitError> {
        let addr = link_addr(frame, ifindex)?;
        let ret = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(TransmitError::Send {
                ifindex,
                source: io::Error::last_os_error(),
            });
        }
        Ok(ret as usize)
    }
}

impl AsRawFd for PacketSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl std::fmt::Debug for PacketSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketSocket")
            .field("fd", &self.fd.as_raw_fd())
            .finish()
    }
}

/// Link-layer address for `sendto`, taken from the frame's own header.
fn link_addr(frame: &[u8], ifindex: u32) -> Result<libc::sockaddr_ll, TransmitError> {
    if frame.len() < ETHERNET_HEADER_LEN {
        return Err(TransmitError::ShortFrame(frame.len()));
    }
    let destination = MacAddr::from_slice(frame).ok_or(TransmitError::ShortFrame(frame.len()))?;
    let ethertype = u16::from_be_bytes([frame[12], frame[13]]);

    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = ethertype.to_be();
    addr.sll_ifindex = ifindex as libc::c_int;
    addr.sll_halen = 6;
    addr.sll_addr[..6].copy_from_slice(&destination.octets());
    Ok(addr)
}

/// Sink that discards frames, for running without transmission.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn send(&mut self, frame: &[u8], ifindex: u32) -> Result<usize, TransmitError> {
        debug!(len = frame.len(), ifindex, "Transmission disabled, frame discarded");
        Ok(0)
    }
}
