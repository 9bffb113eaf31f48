//! Reply Frame Synthesizer
//!
//! Builds the Ethernet frame carrying an ICMPv6 Packet Too Big message
//! (RFC 4443 §3.2) in answer to an intercepted packet:
//!
//! ```text
//! +----------+-------------+--------------+---------------------------+
//! | Ethernet | IPv6 (40)   | ICMPv6 (8)   | original packet, truncated|
//! | (14)     | src<->dst   | type 2, MTU  | to MTU - 48 bytes         |
//! +----------+-------------+--------------+---------------------------+
//! ```
//!
//! The frame is assembled from typed headers through a [`FrameWriter`]
//! whose capacity is fixed by the target MTU, so no input can push the
//! reply past MTU + link header + link trailer.

use crate::intake::InterceptedPacket;
use crate::wire::icmpv6::CHECKSUM_OFFSET;
use crate::wire::{
    checksum, EthernetHeader, FrameWriter, Ipv6Header, Ipv6View, MacAddr, PacketTooBigHeader,
    WireError, ETHERNET_HEADER_LEN, ETHERNET_TRAILER_LEN, ETHERTYPE_IPV6, ICMPV6_HEADER_LEN,
    IPPROTO_ICMPV6, IPV6_HEADER_LEN,
};
use std::net::Ipv6Addr;
use thiserror::Error;

/// Smallest MTU that still fits the IPv6 and ICMPv6 headers.
pub const MIN_TARGET_MTU: u16 = (IPV6_HEADER_LEN + ICMPV6_HEADER_LEN) as u16;

/// Default advertised MTU: the IPv6 minimum link MTU.
pub const DEFAULT_TARGET_MTU: u16 = 1280;

/// Hop limit of the generated reply.
const REPLY_HOP_LIMIT: u8 = 255;

/// Offset of the ICMPv6 header within the frame.
const ICMPV6_OFFSET: usize = ETHERNET_HEADER_LEN + IPV6_HEADER_LEN;

/// Offset of the copied original packet within the frame.
const PAYLOAD_OFFSET: usize = ICMPV6_OFFSET + ICMPV6_HEADER_LEN;

/// Errors from reply synthesis.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthError {
    #[error("MTU {mtu} is too small: must be at least {min}")]
    MtuTooSmall { mtu: u16, min: u16 },

    #[error("malformed packet: {0}")]
    Malformed(WireError),

    #[error("frame assembly failed: {0}")]
    Build(#[from] WireError),
}

/// The MTU advertised in Packet Too Big replies.
///
/// Validated on construction, so a too-small MTU is caught once at
/// startup rather than on every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetMtu(u16);

impl TargetMtu {
    pub fn new(mtu: u16) -> Result<Self, SynthError> {
        if mtu < MIN_TARGET_MTU {
            return Err(SynthError::MtuTooSmall {
                mtu,
                min: MIN_TARGET_MTU,
            });
        }
        Ok(Self(mtu))
    }

    pub fn get(&self) -> u16 {
        self.0
    }

    /// Most bytes of the original packet a reply can carry.
    pub fn max_payload(&self) -> usize {
        self.0 as usize - IPV6_HEADER_LEN - ICMPV6_HEADER_LEN
    }

    /// Buffer size of a reply frame: link header, MTU, link trailer.
    pub fn frame_capacity(&self) -> usize {
        ETHERNET_HEADER_LEN + self.0 as usize + ETHERNET_TRAILER_LEN
    }
}

impl Default for TargetMtu {
    fn default() -> Self {
        Self(DEFAULT_TARGET_MTU)
    }
}

/// A synthesized Packet Too Big frame, ready for transmission.
///
/// Holds the Ethernet header through the end of the copied payload. The
/// trailer (FCS) is reserved in the capacity but appended by the NIC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    bytes: Vec<u8>,
    copy_len: usize,
    capacity: usize,
}

impl ReplyFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Frame length: 14 + 40 + 8 + copied bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Buffer capacity the frame was built against, trailer included.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes of the original packet carried in the reply.
    pub fn copy_len(&self) -> usize {
        self.copy_len
    }

    pub fn link_header(&self) -> &[u8] {
        &self.bytes[..ETHERNET_HEADER_LEN]
    }

    pub fn destination_mac(&self) -> MacAddr {
        MacAddr::from_slice(&self.bytes[0..6]).unwrap_or(MacAddr::ZERO)
    }

    pub fn source_mac(&self) -> MacAddr {
        MacAddr::from_slice(&self.bytes[6..12]).unwrap_or(MacAddr::ZERO)
    }

    pub fn ipv6_header(&self) -> &[u8] {
        &self.bytes[ETHERNET_HEADER_LEN..ICMPV6_OFFSET]
    }

    /// IPv6 payload length field.
    pub fn payload_length_field(&self) -> u16 {
        let h = self.ipv6_header();
        u16::from_be_bytes([h[4], h[5]])
    }

    pub fn ipv6_source(&self) -> Ipv6Addr {
        ipv6_at(self.ipv6_header(), 8)
    }

    pub fn ipv6_destination(&self) -> Ipv6Addr {
        ipv6_at(self.ipv6_header(), 24)
    }

    /// ICMPv6 header plus payload: the checksummed segment.
    pub fn icmpv6_segment(&self) -> &[u8] {
        &self.bytes[ICMPV6_OFFSET..]
    }

    pub fn icmp_type(&self) -> u8 {
        self.bytes[ICMPV6_OFFSET]
    }

    pub fn icmp_code(&self) -> u8 {
        self.bytes[ICMPV6_OFFSET + 1]
    }

    pub fn checksum(&self) -> u16 {
        let at = ICMPV6_OFFSET + CHECKSUM_OFFSET;
        u16::from_be_bytes([self.bytes[at], self.bytes[at + 1]])
    }

    /// MTU advertised in the ICMPv6 header.
    pub fn mtu_field(&self) -> u32 {
        let at = ICMPV6_OFFSET + 4;
        u32::from_be_bytes([
            self.bytes[at],
            self.bytes[at + 1],
            self.bytes[at + 2],
            self.bytes[at + 3],
        ])
    }

    /// The copied prefix of the original packet.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[PAYLOAD_OFFSET..]
    }

    /// Recompute the checksum over pseudo-header and ICMPv6 segment.
    pub fn checksum_valid(&self) -> bool {
        checksum::verify_icmpv6(
            &self.ipv6_source(),
            &self.ipv6_destination(),
            self.icmpv6_segment(),
        )
    }
}

fn ipv6_at(header: &[u8], offset: usize) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&header[offset..offset + 16]);
    Ipv6Addr::from(octets)
}

/// Builds Packet Too Big replies for one configured MTU and local link address.
#[derive(Debug, Clone, Copy)]
pub struct ReplySynthesizer {
    mtu: TargetMtu,
    local_mac: MacAddr,
}

impl ReplySynthesizer {
    pub fn new(mtu: TargetMtu, local_mac: MacAddr) -> Self {
        Self { mtu, local_mac }
    }

    pub fn mtu(&self) -> TargetMtu {
        self.mtu
    }

    pub fn local_mac(&self) -> MacAddr {
        self.local_mac
    }

    /// Build the reply frame for `original`.
    ///
    /// The reply goes from the original destination to the original source
    /// and carries as much of the original packet as fits in the MTU.
    /// Packets shorter than an IPv6 header, or not IPv6, are rejected.
    pub fn synthesize(&self, original: &InterceptedPacket<'_>) -> Result<ReplyFrame, SynthError> {
        let view = Ipv6View::new(original.bytes()).map_err(SynthError::Malformed)?;

        let copy_len = original.len().min(self.mtu.max_payload());
        // copy_len <= mtu - 48, so the ICMPv6 length always fits in 16 bits
        let icmp_len = (ICMPV6_HEADER_LEN + copy_len) as u16;
        let src_addr = view.dst_addr();
        let dst_addr = view.src_addr();

        let mut w = FrameWriter::with_capacity(self.mtu.frame_capacity());

        EthernetHeader {
            destination: original.link_source_mac().unwrap_or(MacAddr::ZERO),
            source: self.local_mac,
            ethertype: ETHERTYPE_IPV6,
        }
        .emit(&mut w)?;

        Ipv6Header {
            payload_len: icmp_len,
            next_header: IPPROTO_ICMPV6,
            hop_limit: REPLY_HOP_LIMIT,
            src_addr,
            dst_addr,
        }
        .emit(&mut w)?;

        let icmp_start = w.position();
        PacketTooBigHeader::new(self.mtu.get() as u32).emit(&mut w)?;
        w.put_slice(&view.as_bytes()[..copy_len])?;

        let sum = checksum::icmpv6(&src_addr, &dst_addr, &w.as_slice()[icmp_start..]);
        w.patch_u16(icmp_start + CHECKSUM_OFFSET, sum)?;

        Ok(ReplyFrame {
            capacity: w.capacity(),
            bytes: w.into_inner(),
            copy_len,
        })
    }
}

/// Build a reply for `original` advertising `configured_mtu`, with a zero
/// link source address.
pub fn synthesize(original: &InterceptedPacket<'_>, configured_mtu: u16) -> Result<ReplyFrame, SynthError> {
    let mtu = TargetMtu::new(configured_mtu)?;
    ReplySynthesizer::new(mtu, MacAddr::ZERO).synthesize(original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::make_ipv6_packet;
    use crate::verdict::PacketId;
    use crate::wire::Icmpv6Type;

    fn packet_of_len(len: usize) -> Vec<u8> {
        let src = "2001:db8::1".parse().unwrap();
        let dst = "2001:db8::2".parse().unwrap();
        let payload: Vec<u8> = (0..len - IPV6_HEADER_LEN).map(|i| i as u8).collect();
        make_ipv6_packet(src, dst, 17, &payload)
    }

    #[test]
    fn test_end_to_end_scenario() {
        let original = packet_of_len(1500);
        let mac = [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee];
        let packet = InterceptedPacket::new(PacketId::new(1), &original).with_link_source(&mac);

        let frame = synthesize(&packet, 1280).unwrap();

        assert_eq!(frame.ipv6_source(), "2001:db8::2".parse::<Ipv6Addr>().unwrap());
        assert_eq!(frame.ipv6_destination(), "2001:db8::1".parse::<Ipv6Addr>().unwrap());
        assert_eq!(frame.icmp_type(), Icmpv6Type::PacketTooBig as u8);
        assert_eq!(frame.icmp_code(), 0);
        assert_eq!(frame.mtu_field(), 1280);
        assert_eq!(frame.copy_len(), 1232);
        assert_eq!(frame.payload_length_field(), 1240);
        assert_eq!(frame.len(), 1294);
        assert!(frame.checksum_valid());

        // Link header
        assert_eq!(frame.destination_mac(), MacAddr::new(mac));
        assert_eq!(frame.source_mac(), MacAddr::ZERO);
        assert_eq!(&frame.link_header()[12..14], &[0x86, 0xdd]);

        // IPv6 fixed fields
        let ip = frame.ipv6_header();
        assert_eq!(&ip[0..4], &[0x60, 0, 0, 0]);
        assert_eq!(ip[6], IPPROTO_ICMPV6);
        assert_eq!(ip[7], 255);
    }

    #[test]
    fn test_payload_length_field_property() {
        for mtu in [48u16, 49, 1280, 1500, 9000, u16::MAX] {
            for len in [40usize, 41, 47, 48, 100, 1231, 1232, 1233, 1280, 1500, 2000, 9000, 65535] {
                let original = packet_of_len(len);
                let packet = InterceptedPacket::new(PacketId::new(1), &original);
                let frame = synthesize(&packet, mtu).unwrap();

                let expected = len.min(mtu as usize - 48);
                assert_eq!(frame.copy_len(), expected, "mtu={mtu} len={len}");
                assert_eq!(frame.payload_length_field() as usize, expected + 8, "mtu={mtu} len={len}");
                assert_eq!(frame.len(), ETHERNET_HEADER_LEN + 48 + expected);
                assert!(frame.len() + ETHERNET_TRAILER_LEN <= frame.capacity());
                assert!(frame.len() <= mtu as usize + ETHERNET_HEADER_LEN);
            }
        }
    }

    #[test]
    fn test_address_swap() {
        let src: Ipv6Addr = "fe80::1234".parse().unwrap();
        let dst: Ipv6Addr = "2001:db8:ffff::9".parse().unwrap();
        let original = make_ipv6_packet(src, dst, 6, &[0u8; 64]);
        let packet = InterceptedPacket::new(PacketId::new(1), &original);

        let frame = synthesize(&packet, 1280).unwrap();
        assert_eq!(&frame.ipv6_header()[8..24], &original[24..40]);
        assert_eq!(&frame.ipv6_header()[24..40], &original[8..24]);

        // Swapping the reply's addressing again restores the original
        let reply_ip = frame.ipv6_header().to_vec();
        let mut echoed = reply_ip.clone();
        echoed[8..24].copy_from_slice(&reply_ip[24..40]);
        echoed[24..40].copy_from_slice(&reply_ip[8..24]);
        assert_eq!(&echoed[8..40], &original[8..40]);
    }

    #[test]
    fn test_checksum_self_verifies() {
        for len in [40usize, 41, 77, 1000, 1500, 4000] {
            let original = packet_of_len(len);
            let packet = InterceptedPacket::new(PacketId::new(9), &original);
            let frame = synthesize(&packet, 1280).unwrap();

            assert!(frame.checksum_valid(), "len={len}");
        }
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let original = packet_of_len(300);
        let packet = InterceptedPacket::new(PacketId::new(9), &original);
        let frame = synthesize(&packet, 1280).unwrap();

        let mut bytes = frame.as_bytes().to_vec();
        bytes[PAYLOAD_OFFSET + 50] ^= 0xff;
        let src = frame.ipv6_source();
        let dst = frame.ipv6_destination();
        assert!(!checksum::verify_icmpv6(&src, &dst, &bytes[ICMPV6_OFFSET..]));
    }

    #[test]
    fn test_truncation_boundaries() {
        let large = packet_of_len(2000);
        let frame = synthesize(&InterceptedPacket::new(PacketId::new(1), &large), 1280).unwrap();
        assert_eq!(frame.copy_len(), 1232);
        assert_eq!(frame.payload(), &large[..1232]);

        let small = packet_of_len(100);
        let frame = synthesize(&InterceptedPacket::new(PacketId::new(1), &small), 1280).unwrap();
        assert_eq!(frame.copy_len(), 100);
        assert_eq!(frame.payload(), &small[..]);
        assert_eq!(frame.len(), 14 + 40 + 8 + 100);
    }

    #[test]
    fn test_short_packet_is_malformed() {
        let short = vec![0x60u8; 20];
        let packet = InterceptedPacket::new(PacketId::new(1), &short);
        assert_eq!(
            synthesize(&packet, 1280).unwrap_err(),
            SynthError::Malformed(WireError::Truncated {
                expected: 40,
                got: 20
            })
        );

        let empty: Vec<u8> = Vec::new();
        let packet = InterceptedPacket::new(PacketId::new(1), &empty);
        assert!(matches!(synthesize(&packet, 1280), Err(SynthError::Malformed(_))));
    }

    #[test]
    fn test_non_ipv6_is_malformed() {
        let mut v4 = vec![0u8; 60];
        v4[0] = 0x45;
        let packet = InterceptedPacket::new(PacketId::new(1), &v4);
        assert_eq!(
            synthesize(&packet, 1280).unwrap_err(),
            SynthError::Malformed(WireError::BadVersion(4))
        );
    }

    #[test]
    fn test_mtu_too_small() {
        assert_eq!(
            TargetMtu::new(47).unwrap_err(),
            SynthError::MtuTooSmall { mtu: 47, min: 48 }
        );
        assert!(TargetMtu::new(0).is_err());

        let original = packet_of_len(100);
        let packet = InterceptedPacket::new(PacketId::new(1), &original);
        assert!(matches!(
            synthesize(&packet, 47),
            Err(SynthError::MtuTooSmall { .. })
        ));
    }

    #[test]
    fn test_minimum_mtu_carries_no_payload() {
        let original = packet_of_len(100);
        let packet = InterceptedPacket::new(PacketId::new(1), &original);
        let frame = synthesize(&packet, 48).unwrap();

        assert_eq!(frame.copy_len(), 0);
        assert!(frame.payload().is_empty());
        assert_eq!(frame.payload_length_field(), 8);
        assert_eq!(frame.len(), 62);
        assert!(frame.checksum_valid());
    }

    #[test]
    fn test_link_addresses() {
        let original = packet_of_len(100);
        let local = MacAddr::new([0x02, 0, 0, 0, 0, 0x01]);
        let synth = ReplySynthesizer::new(TargetMtu::default(), local);

        // Missing link source leaves the destination zeroed
        let frame = synth
            .synthesize(&InterceptedPacket::new(PacketId::new(1), &original))
            .unwrap();
        assert_eq!(frame.destination_mac(), MacAddr::ZERO);
        assert_eq!(frame.source_mac(), local);

        // Only the first six bytes of a longer hardware address are used
        let long = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let frame = synth
            .synthesize(&InterceptedPacket::new(PacketId::new(1), &original).with_link_source(&long))
            .unwrap();
        assert_eq!(frame.destination_mac(), MacAddr::new([1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let original = packet_of_len(1500);
        let packet = InterceptedPacket::new(PacketId::new(3), &original);
        let synth = ReplySynthesizer::new(TargetMtu::default(), MacAddr::new([2, 0, 0, 0, 0, 2]));

        assert_eq!(synth.synthesize(&packet).unwrap(), synth.synthesize(&packet).unwrap());
    }

    #[test]
    fn test_target_mtu_sizes() {
        let mtu = TargetMtu::default();
        assert_eq!(mtu.get(), 1280);
        assert_eq!(mtu.max_payload(), 1232);
        assert_eq!(mtu.frame_capacity(), 1280 + 14 + 4);
    }
}
