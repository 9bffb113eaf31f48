//! nfnetlink_queue messages.
//!
//! Netlink framing and attribute walking come from `netlink-packet-core`
//! and `netlink-packet-utils`; this module only knows the nfqueue layout
//! on top of them. Netlink and attribute headers are host byte order;
//! everything inside nfnetlink payloads (queue number, packet id, verdict,
//! interface indices) is network byte order.

use super::QueueMessage;
use crate::verdict::{Outcome, Verdict};
use netlink_packet_core::{
    ErrorBuffer, NetlinkBuffer, NetlinkHeader, NetlinkMessage, NetlinkPayload,
    NetlinkSerializable, NLMSG_ERROR, NLM_F_ACK, NLM_F_REQUEST,
};
use netlink_packet_utils::nla::{Nla, NlasIterator};
use netlink_packet_utils::Emitable;

/// `struct nfgenmsg`.
pub const NFGENMSG_LEN: usize = 4;

const NFNL_SUBSYS_QUEUE: u16 = 3;
pub const NFQNL_MSG_PACKET: u16 = NFNL_SUBSYS_QUEUE << 8;
pub const NFQNL_MSG_VERDICT: u16 = (NFNL_SUBSYS_QUEUE << 8) | 1;
pub const NFQNL_MSG_CONFIG: u16 = (NFNL_SUBSYS_QUEUE << 8) | 2;

const NFNETLINK_V0: u8 = 0;
const AF_UNSPEC: u8 = 0;

/// Packet message attributes (`enum nfqnl_attr_type`).
mod attr {
    pub const PACKET_HDR: u16 = 1;
    pub const VERDICT_HDR: u16 = 2;
    pub const MARK: u16 = 3;
    pub const IFINDEX_INDEV: u16 = 5;
    pub const IFINDEX_OUTDEV: u16 = 6;
    pub const IFINDEX_PHYSINDEV: u16 = 7;
    pub const IFINDEX_PHYSOUTDEV: u16 = 8;
    pub const HWADDR: u16 = 9;
    pub const PAYLOAD: u16 = 10;
}

/// Config message attributes.
mod cfg {
    pub const CMD: u16 = 1;
    pub const PARAMS: u16 = 2;
}

/// `enum nfqnl_msg_config_cmds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfigCommand {
    Bind = 1,
    Unbind = 2,
    PfBind = 3,
    PfUnbind = 4,
}

/// Copy whole packets to userspace.
pub const NFQNL_COPY_PACKET: u8 = 2;

const NF_DROP: u32 = 0;
const NF_ACCEPT: u32 = 1;

/// Maximum hardware address length carried by NFQA_HWADDR.
const HWADDR_MAX: usize = 8;

/// Length of `struct nfqnl_msg_packet_hdr` without its padding.
const PACKET_HDR_LEN: usize = 7;

/// Round up to the 4-byte netlink alignment.
fn align(len: usize) -> usize {
    (len + 3) & !3
}

fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Attributes userspace sends to the queue subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAttr {
    /// NFQA_CFG_CMD: `{ command, pad, pf (be16) }`.
    Command { command: ConfigCommand, pf: u16 },
    /// NFQA_CFG_PARAMS: `{ copy_range (be32), copy_mode }`.
    Params { copy_range: u32, mode: u8 },
    /// NFQA_VERDICT_HDR: `{ verdict (be32), id (be32) }`.
    Verdict { code: u32, id: u32 },
}

impl Nla for RequestAttr {
    fn value_len(&self) -> usize {
        match self {
            RequestAttr::Command { .. } => 4,
            RequestAttr::Params { .. } => 5,
            RequestAttr::Verdict { .. } => 8,
        }
    }

    fn kind(&self) -> u16 {
        match self {
            RequestAttr::Command { .. } => cfg::CMD,
            RequestAttr::Params { .. } => cfg::PARAMS,
            RequestAttr::Verdict { .. } => attr::VERDICT_HDR,
        }
    }

    fn emit_value(&self, buffer: &mut [u8]) {
        match *self {
            RequestAttr::Command { command, pf } => {
                buffer[0] = command as u8;
                buffer[1] = 0;
                buffer[2..4].copy_from_slice(&pf.to_be_bytes());
            }
            RequestAttr::Params { copy_range, mode } => {
                buffer[0..4].copy_from_slice(&copy_range.to_be_bytes());
                buffer[4] = mode;
            }
            RequestAttr::Verdict { code, id } => {
                buffer[0..4].copy_from_slice(&code.to_be_bytes());
                buffer[4..8].copy_from_slice(&id.to_be_bytes());
            }
        }
    }
}

/// An nfnetlink request body: nfgenmsg followed by attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    message_type: u16,
    queue_num: u16,
    attrs: Vec<RequestAttr>,
}

impl NetlinkSerializable for Request {
    fn message_type(&self) -> u16 {
        self.message_type
    }

    fn buffer_len(&self) -> usize {
        NFGENMSG_LEN + self.attrs.iter().map(|a| a.buffer_len()).sum::<usize>()
    }

    fn serialize(&self, buffer: &mut [u8]) {
        buffer[0] = AF_UNSPEC;
        buffer[1] = NFNETLINK_V0;
        buffer[2..4].copy_from_slice(&self.queue_num.to_be_bytes());

        let mut offset = NFGENMSG_LEN;
        for a in &self.attrs {
            let len = a.buffer_len();
            a.emit(&mut buffer[offset..offset + len]);
            offset += len;
        }
    }
}

fn encode(seq: u32, flags: u16, request: Request) -> Vec<u8> {
    let mut header = NetlinkHeader::default();
    header.flags = flags;
    header.sequence_number = seq;

    let mut msg = NetlinkMessage::new(header, NetlinkPayload::InnerMessage(request));
    msg.finalize();

    let mut buf = vec![0u8; msg.buffer_len()];
    msg.serialize(&mut buf);
    buf
}

/// NFQNL_MSG_CONFIG carrying a command, acknowledged by the kernel.
///
/// `pf` is only meaningful for the protocol-family commands.
pub fn config_command(seq: u32, queue_num: u16, command: ConfigCommand, pf: u16) -> Vec<u8> {
    encode(
        seq,
        NLM_F_REQUEST | NLM_F_ACK,
        Request {
            message_type: NFQNL_MSG_CONFIG,
            queue_num,
            attrs: vec![RequestAttr::Command { command, pf }],
        },
    )
}

/// NFQNL_MSG_CONFIG selecting packet copy mode with `copy_range` bytes.
pub fn config_copy_packet(seq: u32, queue_num: u16, copy_range: u32) -> Vec<u8> {
    encode(
        seq,
        NLM_F_REQUEST | NLM_F_ACK,
        Request {
            message_type: NFQNL_MSG_CONFIG,
            queue_num,
            attrs: vec![RequestAttr::Params {
                copy_range,
                mode: NFQNL_COPY_PACKET,
            }],
        },
    )
}

/// NFQNL_MSG_VERDICT for one packet.
pub fn verdict_message(seq: u32, queue_num: u16, verdict: &Verdict) -> Vec<u8> {
    let code = match verdict.outcome {
        Outcome::Accept => NF_ACCEPT,
        Outcome::Drop => NF_DROP,
    };
    encode(
        seq,
        NLM_F_REQUEST,
        Request {
            message_type: NFQNL_MSG_VERDICT,
            queue_num,
            attrs: vec![RequestAttr::Verdict {
                code,
                id: verdict.id.as_u32(),
            }],
        },
    )
}

/// Sequence number of an encoded request.
pub fn sequence_number(msg: &[u8]) -> Option<u32> {
    NetlinkBuffer::new_checked(msg)
        .ok()
        .map(|buf| buf.sequence_number())
}

/// A decoded message from the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// An intercepted packet.
    Packet(QueueMessage),
    /// A message that could not be decoded. `id` is set when it was a
    /// packet whose id was read before the damage.
    Malformed { id: Option<u32>, reason: String },
    /// Positive acknowledgement of request `seq`.
    Ack { seq: u32 },
    /// Request `seq` failed with `errno`.
    Error { seq: u32, errno: i32 },
    /// Anything else (NOOP, DONE, unknown types).
    Other { kind: u16 },
}

/// Decode every message in a datagram.
///
/// Each message is decoded on its own, so one damaged packet does not
/// take its neighbours with it. Broken framing ends the walk, since the
/// next message boundary is no longer known.
pub fn parse_datagram(buf: &[u8]) -> Vec<Incoming> {
    let mut out = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let frame = match NetlinkBuffer::new_checked(&buf[offset..]) {
            Ok(frame) => frame,
            Err(e) => {
                out.push(Incoming::Malformed {
                    id: None,
                    reason: e.to_string(),
                });
                break;
            }
        };
        out.push(parse_message(&frame));
        offset += align(frame.length() as usize);
    }
    out
}

fn parse_message(frame: &NetlinkBuffer<&[u8]>) -> Incoming {
    let seq = frame.sequence_number();
    match frame.message_type() {
        NLMSG_ERROR => match ErrorBuffer::new_checked(frame.payload()) {
            Ok(err) => match err.code() {
                None => Incoming::Ack { seq },
                Some(code) => Incoming::Error {
                    seq,
                    errno: -code.get(),
                },
            },
            Err(e) => Incoming::Malformed {
                id: None,
                reason: e.to_string(),
            },
        },
        NFQNL_MSG_PACKET => match parse_packet(frame.payload()) {
            Ok(msg) => Incoming::Packet(msg),
            Err(bad) => Incoming::Malformed {
                id: bad.id,
                reason: bad.reason,
            },
        },
        kind => Incoming::Other { kind },
    }
}

/// A packet message that failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadPacket {
    pub id: Option<u32>,
    pub reason: String,
}

/// Decode an NFQNL_MSG_PACKET payload (nfgenmsg followed by attributes).
pub fn parse_packet(payload: &[u8]) -> Result<QueueMessage, BadPacket> {
    let Some(attrs) = payload.get(NFGENMSG_LEN..) else {
        return Err(BadPacket {
            id: None,
            reason: format!("packet message of {} bytes", payload.len()),
        });
    };

    let mut msg = QueueMessage::default();
    for nla in NlasIterator::new(attrs) {
        let nla = match nla {
            Ok(nla) => nla,
            Err(e) => {
                return Err(BadPacket {
                    id: msg.packet_id,
                    reason: e.to_string(),
                })
            }
        };
        let value = nla.value();
        match nla.kind() {
            attr::PACKET_HDR => {
                if value.len() < PACKET_HDR_LEN {
                    return Err(BadPacket {
                        id: msg.packet_id,
                        reason: format!("packet header of {} bytes", value.len()),
                    });
                }
                msg.packet_id = Some(be_u32(&value[0..4]));
                msg.hw_protocol = Some(be_u16(&value[4..6]));
                msg.hook = Some(value[6]);
            }
            attr::MARK if value.len() >= 4 => msg.mark = Some(be_u32(value)),
            attr::IFINDEX_INDEV if value.len() >= 4 => msg.indev = Some(be_u32(value)),
            attr::IFINDEX_OUTDEV if value.len() >= 4 => msg.outdev = Some(be_u32(value)),
            attr::IFINDEX_PHYSINDEV if value.len() >= 4 => msg.physindev = Some(be_u32(value)),
            attr::IFINDEX_PHYSOUTDEV if value.len() >= 4 => msg.physoutdev = Some(be_u32(value)),
            attr::HWADDR if value.len() >= 4 => {
                let addr_len = (be_u16(&value[0..2]) as usize)
                    .min(HWADDR_MAX)
                    .min(value.len() - 4);
                msg.hw_addr = Some(value[4..4 + addr_len].to_vec());
            }
            attr::PAYLOAD => msg.payload = value.to_vec(),
            _ => {}
        }
    }
    Ok(msg)
}
