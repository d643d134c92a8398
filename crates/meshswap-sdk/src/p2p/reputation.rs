/// Concrete reputation thresholds (DESIGN.md Open Question (c)): the
/// ban-on-threshold mechanism is fixed, but the exact numbers are
/// implementation defaults, not externally mandated, and are
/// deliberately overridable via `ReputationConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReputationConfig {
    pub ban_threshold: i64,
    pub malformed_packet: i64,
    pub invalid_order: i64,
    pub handshake_failure: i64,
    pub swap_misbehavior: i64,
    pub successful_swap: i64,
    pub good_gossip: i64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            ban_threshold: -100,
            malformed_packet: -50,
            invalid_order: -10,
            handshake_failure: -20,
            swap_misbehavior: -40,
            successful_swap: 5,
            good_gossip: 1,
        }
    }
}

/// Events that move a peer's reputation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReputationEvent {
    MalformedPacket,
    InvalidOrder,
    HandshakeFailure,
    SwapMisbehavior,
    SuccessfulSwap,
    GoodGossip,
}

impl ReputationEvent {
    pub fn delta(&self, config: &ReputationConfig) -> i64 {
        match self {
            ReputationEvent::MalformedPacket => config.malformed_packet,
            ReputationEvent::InvalidOrder => config.invalid_order,
            ReputationEvent::HandshakeFailure => config.handshake_failure,
            ReputationEvent::SwapMisbehavior => config.swap_misbehavior,
            ReputationEvent::SuccessfulSwap => config.successful_swap,
            ReputationEvent::GoodGossip => config.good_gossip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_malformed_packets_crosses_default_ban_threshold() {
        let config = ReputationConfig::default();
        let mut score: i64 = 0;
        for _ in 0..3 {
            score += ReputationEvent::MalformedPacket.delta(&config);
        }
        assert!(score <= config.ban_threshold);
    }

    #[test]
    fn good_gossip_never_crosses_ban_threshold_alone() {
        let config = ReputationConfig::default();
        let score = ReputationEvent::GoodGossip.delta(&config);
        assert!(score > config.ban_threshold);
    }
}
