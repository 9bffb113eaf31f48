//! Benchmarks for reply synthesis and the ICMPv6 checksum.
//!
//! Run with: cargo bench --bench synth

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mtu1280::wire::checksum;
use mtu1280::{InterceptedPacket, MacAddr, PacketId, ReplySynthesizer, TargetMtu};
use std::net::Ipv6Addr;

fn make_packet(len: usize) -> Vec<u8> {
    let src: Ipv6Addr = "2001:db8::1".parse().unwrap();
    let dst: Ipv6Addr = "2001:db8::2".parse().unwrap();

    let mut packet = vec![0u8; len];
    packet[0] = 0x60;
    packet[4..6].copy_from_slice(&((len - 40) as u16).to_be_bytes());
    packet[6] = 17;
    packet[7] = 64;
    packet[8..24].copy_from_slice(&src.octets());
    packet[24..40].copy_from_slice(&dst.octets());
    for (i, byte) in packet[40..].iter_mut().enumerate() {
        *byte = i as u8;
    }
    packet
}

// ===== Synthesis Benchmarks =====

fn bench_synthesize(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesize");

    let synth = ReplySynthesizer::new(TargetMtu::default(), MacAddr::new([2, 0, 0, 0, 0, 1]));
    let mac = [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee];

    // Below, at and above the 1232-byte copy limit
    for &len in &[100usize, 1280, 1500, 9000] {
        let original = make_packet(len);
        group.bench_with_input(BenchmarkId::new("len", len), &original, |b, original| {
            let packet = InterceptedPacket::new(PacketId::new(1), original).with_link_source(&mac);
            b.iter(|| synth.synthesize(black_box(&packet)))
        });
    }

    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("icmpv6_checksum");

    let src: Ipv6Addr = "2001:db8::2".parse().unwrap();
    let dst: Ipv6Addr = "2001:db8::1".parse().unwrap();

    for &len in &[8usize, 512, 1240] {
        let segment = vec![0x5au8; len];
        group.bench_with_input(BenchmarkId::new("len", len), &segment, |b, segment| {
            b.iter(|| checksum::icmpv6(black_box(&src), black_box(&dst), black_box(segment)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_synthesize, bench_checksum);
criterion_main!(benches);
