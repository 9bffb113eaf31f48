//! NFQUEUE client over a NETLINK_NETFILTER socket.

use super::netlink::{self, ConfigCommand, Incoming};
use super::{PacketQueue, QueueError, QueueMessage};
use crate::verdict::{decide, PacketId, Verdict};
use netlink_sys::{protocols::NETLINK_NETFILTER, Socket, SocketAddr};
use std::collections::VecDeque;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receive buffer: largest copy range plus netlink and attribute overhead.
const RECV_BUF_LEN: usize = 0x10000 + 4096;

/// A bound netfilter queue.
///
/// Dropping the queue unbinds it from the kernel.
pub struct NfQueue {
    socket: Socket,
    queue_num: u16,
    seq: u32,
    buf: Vec<u8>,
    /// Packets that arrived in the same datagram as an earlier one, or
    /// while waiting for a config acknowledgement.
    pending: VecDeque<QueueMessage>,
}

impl NfQueue {
    /// Open a netlink socket and bind it to `queue_num` for IPv6.
    ///
    /// Requires CAP_NET_ADMIN. Every step is acknowledged by the kernel;
    /// the first failing step is returned as the error.
    pub fn open(queue_num: u16, copy_range: u16, recv_timeout: Duration) -> Result<Self, QueueError> {
        let mut socket =
            Socket::new(NETLINK_NETFILTER).map_err(|e| QueueError::os("netlink socket", e))?;
        socket
            .bind_auto()
            .map_err(|e| QueueError::os("netlink bind", e))?;

        set_recv_timeout(&socket, recv_timeout)?;
        if let Err(e) = socket.set_no_enobufs(true) {
            debug!(error = %e, "NETLINK_NO_ENOBUFS not available");
        }

        let mut queue = Self {
            socket,
            queue_num,
            seq: 0,
            buf: Vec::with_capacity(RECV_BUF_LEN),
            pending: VecDeque::new(),
        };

        let pf = libc::AF_INET6 as u16;

        debug!("Unbinding existing nf_queue handler for AF_INET6");
        let seq = queue.next_seq();
        queue.configure(
            "unbind AF_INET6",
            &netlink::config_command(seq, 0, ConfigCommand::PfUnbind, pf),
        )?;

        debug!("Binding nfnetlink_queue as nf_queue handler for AF_INET6");
        let seq = queue.next_seq();
        queue.configure(
            "bind AF_INET6",
            &netlink::config_command(seq, 0, ConfigCommand::PfBind, pf),
        )?;

        debug!(queue = queue_num, "Binding socket to queue");
        let seq = queue.next_seq();
        queue.configure(
            "bind queue",
            &netlink::config_command(seq, queue_num, ConfigCommand::Bind, 0),
        )?;

        debug!(copy_range, "Setting copy_packet mode");
        let seq = queue.next_seq();
        queue.configure(
            "set copy_packet mode",
            &netlink::config_copy_packet(seq, queue_num, copy_range as u32),
        )?;

        info!(queue = queue_num, copy_range, "NFQUEUE bound");
        Ok(queue)
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    fn send(&self, op: &'static str, msg: &[u8]) -> Result<(), QueueError> {
        self.socket
            .send_to(msg, &SocketAddr::new(0, 0), 0)
            .map_err(|e| QueueError::os(op, e))?;
        Ok(())
    }

    /// Receive one datagram. Returns None on timeout or interruption.
    fn recv_datagram(&mut self, op: &'static str) -> Result<Option<Vec<Incoming>>, QueueError> {
        self.buf.clear();
        match self.socket.recv(&mut self.buf, 0) {
            Ok(_) => Ok(Some(netlink::parse_datagram(&self.buf))),
            Err(err) => match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EINTR) => Ok(None),
                Some(libc::ENOBUFS) => {
                    warn!("Netlink receive buffer overrun, packets were lost");
                    Ok(None)
                }
                _ => Err(QueueError::os(op, err)),
            },
        }
    }

    /// Send a config request and wait for its acknowledgement.
    fn configure(&mut self, op: &'static str, msg: &[u8]) -> Result<(), QueueError> {
        let seq = netlink::sequence_number(msg).unwrap_or(0);
        self.send(op, msg)?;

        loop {
            let Some(incoming) = self.recv_datagram(op)? else {
                return Err(QueueError::Os {
                    op,
                    source: io::Error::new(io::ErrorKind::TimedOut, "no acknowledgement"),
                });
            };

            let mut answer = None;
            let mut rest = Vec::new();
            for item in incoming {
                match item {
                    Incoming::Ack { seq: s } if s == seq => answer = Some(Ok(())),
                    Incoming::Error { seq: s, errno } if s == seq => {
                        answer = Some(Err(QueueError::Netlink {
                            op,
                            source: io::Error::from_raw_os_error(errno),
                        }));
                    }
                    other => rest.push(other),
                }
            }
            let damaged = absorb(rest, &mut self.pending);
            self.reject(damaged);

            if let Some(answer) = answer {
                return answer;
            }
        }
    }

    /// Drop packets whose messages could not be decoded, so they do not
    /// sit in the kernel queue.
    fn reject(&mut self, ids: Vec<PacketId>) {
        for id in ids {
            if let Err(e) = self.set_verdict(decide(id)) {
                warn!(id = %id, error = %e, "Failed to drop undecodable packet");
            }
        }
    }
}

/// Queue decoded packets for delivery and log everything else.
///
/// Returns the ids of packets that arrived damaged but still need a verdict.
fn absorb(incoming: Vec<Incoming>, pending: &mut VecDeque<QueueMessage>) -> Vec<PacketId> {
    let mut damaged = Vec::new();
    for item in incoming {
        match item {
            Incoming::Packet(msg) => pending.push_back(msg),
            Incoming::Malformed { id, reason } => {
                warn!(id = ?id, %reason, "Undecodable queue message");
                if let Some(id) = id {
                    damaged.push(PacketId::new(id));
                }
            }
            Incoming::Error { seq, errno } => {
                warn!(
                    seq,
                    error = %io::Error::from_raw_os_error(errno),
                    "Kernel rejected netlink request"
                );
            }
            other => debug!(?other, "Ignoring netlink message"),
        }
    }
    damaged
}

impl PacketQueue for NfQueue {
    fn recv(&mut self) -> Result<Option<QueueMessage>, QueueError> {
        if let Some(msg) = self.pending.pop_front() {
            return Ok(Some(msg));
        }

        let Some(incoming) = self.recv_datagram("netlink recv")? else {
            return Ok(None);
        };
        let damaged = absorb(incoming, &mut self.pending);
        self.reject(damaged);

        Ok(self.pending.pop_front())
    }

    fn set_verdict(&mut self, verdict: Verdict) -> Result<(), QueueError> {
        let seq = self.next_seq();
        let msg = netlink::verdict_message(seq, self.queue_num, &verdict);
        self.send("set verdict", &msg)
    }
}

impl AsRawFd for NfQueue {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl Drop for NfQueue {
    fn drop(&mut self) {
        // The protocol family binding is left alone: unbinding it would
        // detach every other NFQUEUE consumer of AF_INET6 as well.
        info!(queue = self.queue_num, "Unbinding from queue");
        let seq = self.next_seq();
        let msg = netlink::config_command(seq, self.queue_num, ConfigCommand::Unbind, 0);
        if let Err(e) = self.send("unbind queue", &msg) {
            warn!(error = %e, "Failed to unbind queue");
        }
    }
}

impl std::fmt::Debug for NfQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NfQueue")
            .field("fd", &self.socket.as_raw_fd())
            .field("queue_num", &self.queue_num)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// SO_RCVTIMEO, so the receive loop wakes up to check for shutdown.
fn set_recv_timeout(socket: &Socket, timeout: Duration) -> Result<(), QueueError> {
    let tv = libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    };
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_RCVTIMEO,
            &tv as *const libc::timeval as *const libc::c_void,
            mem::size_of::<libc::timeval>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(QueueError::os("set receive timeout", io::Error::last_os_error()));
    }
    Ok(())
}
