//! Seam to the collateral / capacity registry.
//!
//! The registry owns node stake, capacity and identity keys. The market only
//! reads them, reports used capacity and asks for slashes. `MemoryRegistry`
//! is the in-process implementation used by the CLI and the tests.

use crate::error::{MarketError, Result};
use arca_challenges::ObligationOracle;
use arca_economics::Amount;
use arca_types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub stake: Amount,
    pub capacity: u64,
    pub used: u64,
    #[serde(with = "hex::serde")]
    pub identity_key: [u8; 32],
    #[serde(with = "hex::serde")]
    pub identity_aux: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashOutcome {
    /// Remaining stake no longer backs the node's used capacity
    pub forced_exit: bool,
    pub slashed: Amount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub node_count: usize,
    pub total_capacity: u64,
    pub total_used: u64,
}

pub trait CollateralRegistry: Send + Sync {
    fn is_valid_node(&self, node: AccountId) -> bool;

    fn has_capacity(&self, node: AccountId, size: u64) -> bool;

    fn node_info(&self, node: AccountId) -> Option<NodeInfo>;

    fn update_node_used(&mut self, node: AccountId, used: u64) -> Result<()>;

    /// Lowers used capacity after a forced exit. Never fails.
    fn force_reduce_used(&mut self, node: AccountId, used: u64);

    /// Slashes up to `amount`, clamped to the node's stake.
    fn slash_node(&mut self, node: AccountId, amount: Amount) -> SlashOutcome;

    fn network_stats(&self) -> NetworkStats;

    /// Collateral required per byte of used capacity.
    fn stake_per_byte(&self) -> Amount;

    fn decrease_capacity(
        &mut self,
        node: AccountId,
        amount: u64,
        obligations: &dyn ObligationOracle,
    ) -> Result<()>;

    /// Removes the node and returns its released stake.
    fn unstake(&mut self, node: AccountId, obligations: &dyn ObligationOracle) -> Result<Amount>;
}

#[derive(Debug, Clone)]
struct NodeRecord {
    stake: Amount,
    capacity: u64,
    used: u64,
    identity_key: [u8; 32],
    identity_aux: [u8; 32],
}

/// In-memory collateral registry
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    nodes: HashMap<AccountId, NodeRecord>,
    stake_per_byte: Amount,
}

impl MemoryRegistry {
    pub fn new(stake_per_byte: Amount) -> Self {
        Self {
            nodes: HashMap::new(),
            stake_per_byte,
        }
    }

    /// Registers (or re-registers) a node. Identity keys are derived from
    /// the account id.
    pub fn register(&mut self, node: AccountId, stake: Amount, capacity: u64) {
        let identity_key = identity_part(node, b"key");
        let identity_aux = identity_part(node, b"aux");
        self.nodes.insert(
            node,
            NodeRecord {
                stake,
                capacity,
                used: 0,
                identity_key,
                identity_aux,
            },
        );
        info!(node = %node, stake = stake.to_base_units(), capacity, "📝 Node registered");
    }

    fn required_stake(&self, used: u64) -> Amount {
        self.stake_per_byte
            .checked_mul(used)
            .unwrap_or(Amount::from_base_units(u64::MAX))
    }

    fn record(&self, node: AccountId) -> Result<&NodeRecord> {
        self.nodes.get(&node).ok_or(MarketError::UnknownNode(node))
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new(Amount::from_base_units(1))
    }
}

impl CollateralRegistry for MemoryRegistry {
    fn is_valid_node(&self, node: AccountId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn has_capacity(&self, node: AccountId, size: u64) -> bool {
        let Some(record) = self.nodes.get(&node) else {
            return false;
        };
        let Some(used) = record.used.checked_add(size) else {
            return false;
        };
        used <= record.capacity && record.stake >= self.required_stake(used)
    }

    fn node_info(&self, node: AccountId) -> Option<NodeInfo> {
        self.nodes.get(&node).map(|record| NodeInfo {
            stake: record.stake,
            capacity: record.capacity,
            used: record.used,
            identity_key: record.identity_key,
            identity_aux: record.identity_aux,
        })
    }

    fn update_node_used(&mut self, node: AccountId, used: u64) -> Result<()> {
        let record = self
            .nodes
            .get_mut(&node)
            .ok_or(MarketError::UnknownNode(node))?;
        if used > record.capacity {
            return Err(MarketError::InsufficientCapacity {
                node,
                size: used.saturating_sub(record.capacity),
            });
        }
        record.used = used;
        Ok(())
    }

    fn force_reduce_used(&mut self, node: AccountId, used: u64) {
        if let Some(record) = self.nodes.get_mut(&node) {
            record.used = record.used.min(used);
        }
    }

    fn slash_node(&mut self, node: AccountId, amount: Amount) -> SlashOutcome {
        let required_per_byte = self.stake_per_byte;
        let Some(record) = self.nodes.get_mut(&node) else {
            return SlashOutcome {
                forced_exit: false,
                slashed: Amount::ZERO,
            };
        };

        let slashed = amount.min(record.stake);
        record.stake = record.stake.saturating_sub(slashed);
        let required = required_per_byte
            .checked_mul(record.used)
            .unwrap_or(Amount::from_base_units(u64::MAX));
        let forced_exit = record.used > 0 && record.stake < required;

        warn!(
            node = %node,
            slashed = slashed.to_base_units(),
            remaining_stake = record.stake.to_base_units(),
            forced_exit,
            "⚔️ Collateral slashed"
        );
        SlashOutcome {
            forced_exit,
            slashed,
        }
    }

    fn network_stats(&self) -> NetworkStats {
        self.nodes.values().fold(
            NetworkStats {
                node_count: self.nodes.len(),
                ..Default::default()
            },
            |mut stats, record| {
                stats.total_capacity = stats.total_capacity.saturating_add(record.capacity);
                stats.total_used = stats.total_used.saturating_add(record.used);
                stats
            },
        )
    }

    fn stake_per_byte(&self) -> Amount {
        self.stake_per_byte
    }

    fn decrease_capacity(
        &mut self,
        node: AccountId,
        amount: u64,
        obligations: &dyn ObligationOracle,
    ) -> Result<()> {
        if obligations.has_unresolved_obligation(node) {
            return Err(MarketError::UnresolvedObligation(node));
        }
        let record = self.record(node)?;
        let capacity = record.capacity.saturating_sub(amount);
        if capacity < record.used {
            return Err(MarketError::InsufficientCapacity { node, size: amount });
        }

        if let Some(record) = self.nodes.get_mut(&node) {
            record.capacity = capacity;
        }
        info!(node = %node, capacity, "📉 Capacity decreased");
        Ok(())
    }

    fn unstake(&mut self, node: AccountId, obligations: &dyn ObligationOracle) -> Result<Amount> {
        if obligations.has_unresolved_obligation(node) {
            return Err(MarketError::UnresolvedObligation(node));
        }
        if self.record(node)?.used > 0 {
            return Err(MarketError::InvalidParameter(format!(
                "node {} still stores data",
                node
            )));
        }

        let stake = self
            .nodes
            .remove(&node)
            .map(|record| record.stake)
            .unwrap_or(Amount::ZERO);
        info!(node = %node, stake = stake.to_base_units(), "👋 Node unstaked");
        Ok(stake)
    }
}

fn identity_part(node: AccountId, tag: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(node.as_bytes());
    hasher.update(tag);
    hasher.finalize().into()
}
