use crate::error::{ChallengeError, Result};
use arca_economics::Amount;
use arca_types::{AccountId, OrderId};
use serde::{Deserialize, Serialize};

/// Challenge slot configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    /// Number of independent challenge slots
    pub num_slots: usize,

    /// Heights a target has to answer a challenge
    pub challenge_window: u64,

    /// Hash-derived probes into the eligible index per advance
    pub probe_limit: u32,

    /// Expired orders evicted inline per call, shared by every advance in the call
    pub eviction_limit: u32,

    /// Entries examined by the deterministic fallback scan per advance
    pub fallback_scan_limit: u32,

    /// Expired slots processed per call
    pub max_sweeps_per_call: u32,

    /// Collateral slashed for an unanswered challenge
    pub slash_amount: Amount,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            num_slots: 4,
            challenge_window: 100,
            probe_limit: 8,
            eviction_limit: 50,
            fallback_scan_limit: 128,
            max_sweeps_per_call: 4,
            slash_amount: Amount::from_base_units(1_000),
        }
    }
}

impl ChallengeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_slots == 0 {
            return Err(ChallengeError::InvalidConfiguration(
                "num_slots must be > 0".to_string(),
            ));
        }
        if self.challenge_window == 0 {
            return Err(ChallengeError::InvalidConfiguration(
                "challenge_window must be > 0".to_string(),
            ));
        }
        if self.probe_limit == 0 || self.fallback_scan_limit == 0 {
            return Err(ChallengeError::InvalidConfiguration(
                "probe and fallback budgets must be > 0".to_string(),
            ));
        }
        if self.max_sweeps_per_call == 0 {
            return Err(ChallengeError::InvalidConfiguration(
                "max_sweeps_per_call must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// The (order, node, deadline) a slot currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeTarget {
    pub order: OrderId,
    pub node: AccountId,
    pub deadline: u64,
}

/// One challenge slot. `randomness` is the seed the current target must
/// prove against and the source of the next rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSlot {
    pub target: Option<ChallengeTarget>,
    #[serde(with = "hex::serde")]
    pub randomness: [u8; 32],
}

impl ChallengeSlot {
    pub fn idle() -> Self {
        Self {
            target: None,
            randomness: [0u8; 32],
        }
    }

    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_expired(&self, height: u64) -> bool {
        matches!(self.target, Some(target) if height > target.deadline)
    }

    pub fn status(&self, height: u64) -> SlotStatus {
        match self.target {
            None => SlotStatus::Idle,
            Some(target) if height > target.deadline => SlotStatus::Expired,
            Some(_) => SlotStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Idle,
    Active,
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_status() {
        let mut slot = ChallengeSlot::idle();
        assert_eq!(slot.status(10), SlotStatus::Idle);

        slot.target = Some(ChallengeTarget {
            order: OrderId(1),
            node: AccountId::derive(b"n"),
            deadline: 20,
        });
        assert_eq!(slot.status(20), SlotStatus::Active);
        assert!(!slot.is_expired(20));
        assert_eq!(slot.status(21), SlotStatus::Expired);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ChallengeConfig::default().validate().is_ok());
        let config = ChallengeConfig {
            num_slots: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
