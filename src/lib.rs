//! mtu1280: Packet Too Big enforcer
//!
//! Takes oversized IPv6 packets from a netfilter queue, drops them, and
//! answers each sender with an ICMPv6 Packet Too Big message advertising
//! a fixed MTU (1280 by default), so path MTU discovery settles below it.

pub mod config;
pub mod diag;
pub mod enforcer;
pub mod intake;
pub mod link;
pub mod policy;
pub mod queue;
pub mod synth;
pub mod transmit;
pub mod verdict;
pub mod wire;

#[cfg(test)]
mod testutil;

// Re-export config types
pub use config::{Config, ConfigError, LinkConfig, QueueConfig, Settings};

// Re-export pipeline types
pub use enforcer::{Disposition, Enforcer, EnforcerError};
pub use intake::InterceptedPacket;
pub use policy::Suppression;
pub use synth::{synthesize, ReplyFrame, ReplySynthesizer, SynthError, TargetMtu};
pub use verdict::{decide, Outcome, PacketId, Verdict};

// Re-export boundary types
pub use link::{resolve_interface, LinkError, LinkInfo};
pub use queue::{NfQueue, PacketQueue, QueueError, QueueMessage};
pub use transmit::{FrameSink, NullSink, PacketSocket, TransmitError};
pub use wire::{MacAddr, WireError};
