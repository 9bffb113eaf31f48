//! Enforcement decision.
//!
//! Every intercepted packet is dropped. The decision carries the packet
//! identifier the interception subsystem assigned, so it can be handed
//! straight back as the verdict for that packet.

use std::fmt;

/// Identifier the interception subsystem assigned to a queued packet.
///
/// Zero is used when the subsystem supplied no identifier; verdicts for
/// id 0 are still issued but are best-effort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PacketId(u32);

impl PacketId {
    pub const UNKNOWN: PacketId = PacketId(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the interception subsystem should do with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accept,
    Drop,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Accept => write!(f, "accept"),
            Outcome::Drop => write!(f, "drop"),
        }
    }
}

/// Outcome for one specific packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub id: PacketId,
    pub outcome: Outcome,
}

/// Decide the fate of an intercepted packet: always drop it.
pub fn decide(id: PacketId) -> Verdict {
    Verdict {
        id,
        outcome: Outcome::Drop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_always_drops() {
        for raw in [0u32, 1, 42, u32::MAX] {
            let verdict = decide(PacketId::new(raw));
            assert_eq!(verdict.outcome, Outcome::Drop);
            assert_eq!(verdict.id.as_u32(), raw);
        }
    }

    #[test]
    fn test_decide_is_idempotent() {
        let id = PacketId::new(7);
        let first = decide(id);
        for _ in 0..1000 {
            assert_eq!(decide(id), first);
        }
    }

    #[test]
    fn test_unknown_id() {
        assert!(PacketId::default().is_unknown());
        assert_eq!(PacketId::UNKNOWN, PacketId::new(0));
        assert!(!PacketId::new(3).is_unknown());
    }

    #[test]
    fn test_display() {
        assert_eq!(Outcome::Drop.to_string(), "drop");
        assert_eq!(Outcome::Accept.to_string(), "accept");
        assert_eq!(PacketId::new(12).to_string(), "12");
    }
}
