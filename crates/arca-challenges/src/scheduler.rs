//! Parallel challenge slots.
//!
//! Each slot moves Idle -> Active -> (proved | expired and slashed) -> Active
//! again, or back to Idle when nothing is eligible. Advancing a slot samples
//! the challenge-eligible index with a fixed probe budget, evicts expired
//! entries inline under a per-call eviction budget, and falls back to a
//! bounded linear scan so that a live order hidden behind an expired backlog
//! is still found.
//!
//! The per-order and per-node counters always equal the number of slots
//! currently referencing that order / node.

use crate::error::{ChallengeError, Result};
use crate::randomness::sample_index;
use crate::types::{ChallengeConfig, ChallengeSlot, ChallengeTarget};
use arca_economics::Amount;
use arca_types::{AccountId, OrderId};
use std::collections::HashMap;
use tracing::{debug, info};

/// Salt used when picking a node inside the selected order.
const NODE_SALT: u64 = u64::MAX;

/// Read/evict view of the challenge-eligible orders.
pub trait ChallengeTargets {
    fn eligible_len(&self) -> usize;

    fn eligible_at(&self, position: usize) -> Option<OrderId>;

    fn is_expired(&self, order: OrderId) -> bool;

    /// Nodes currently assigned to `order`.
    fn nodes_of(&self, order: OrderId) -> &[AccountId];

    /// Drops an expired order from the eligible index (swap-and-pop).
    fn evict(&mut self, order: OrderId);
}

/// Answers whether a node still has a challenge it has not been judged on.
pub trait ObligationOracle {
    fn has_unresolved_obligation(&self, node: AccountId) -> bool;
}

/// Work budget shared by every slot transition within one call.
#[derive(Debug, Clone)]
pub struct CallBudget {
    evictions_left: u32,
    sweeps_left: u32,
    evicted: u32,
}

impl CallBudget {
    pub fn new(config: &ChallengeConfig) -> Self {
        Self {
            evictions_left: config.eviction_limit,
            sweeps_left: config.max_sweeps_per_call,
            evicted: 0,
        }
    }

    pub fn try_evict(&mut self) -> bool {
        if self.evictions_left == 0 {
            return false;
        }
        self.evictions_left -= 1;
        self.evicted += 1;
        true
    }

    pub fn try_sweep(&mut self) -> bool {
        if self.sweeps_left == 0 {
            return false;
        }
        self.sweeps_left -= 1;
        true
    }

    pub fn evicted(&self) -> u32 {
        self.evicted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Issued(ChallengeTarget),
    Idle,
}

#[derive(Debug, Clone)]
pub struct ChallengeScheduler {
    config: ChallengeConfig,
    slots: Vec<ChallengeSlot>,
    order_challenges: HashMap<OrderId, u32>,
    node_challenges: HashMap<AccountId, u32>,
}

impl ChallengeScheduler {
    pub fn new(config: ChallengeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            slots: vec![ChallengeSlot::idle(); config.num_slots],
            config,
            order_challenges: HashMap::new(),
            node_challenges: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ChallengeConfig {
        &self.config
    }

    pub fn set_challenge_window(&mut self, window: u64) -> Result<()> {
        if window == 0 {
            return Err(ChallengeError::InvalidConfiguration(
                "challenge_window must be > 0".to_string(),
            ));
        }
        self.config.challenge_window = window;
        Ok(())
    }

    pub fn set_slash_amount(&mut self, amount: Amount) {
        self.config.slash_amount = amount;
    }

    pub fn slots(&self) -> &[ChallengeSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Result<&ChallengeSlot> {
        self.slots
            .get(index)
            .ok_or(ChallengeError::SlotOutOfRange(index))
    }

    pub fn order_challenge_count(&self, order: OrderId) -> u32 {
        self.order_challenges.get(&order).copied().unwrap_or(0)
    }

    pub fn node_challenge_count(&self, node: AccountId) -> u32 {
        self.node_challenges.get(&node).copied().unwrap_or(0)
    }

    pub fn is_order_challenged(&self, order: OrderId) -> bool {
        self.order_challenge_count(order) > 0
    }

    /// Active slots whose deadline has passed, in slot order.
    pub fn expired_slots(&self, height: u64) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_expired(height))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn idle_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_active())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn slots_targeting(&self, node: AccountId) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot.target, Some(target) if target.node == node))
            .map(|(index, _)| index)
            .collect()
    }

    /// Clears a slot's target and its counter contributions. The seed is kept.
    pub fn release(&mut self, index: usize) -> Result<Option<ChallengeTarget>> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(ChallengeError::SlotOutOfRange(index))?;
        let Some(target) = slot.target.take() else {
            return Ok(None);
        };

        decrement(&mut self.order_challenges, target.order);
        decrement(&mut self.node_challenges, target.node);
        Ok(Some(target))
    }

    /// Moves slot `index` to a fresh target drawn with `randomness`.
    pub fn advance<T>(
        &mut self,
        index: usize,
        randomness: [u8; 32],
        height: u64,
        targets: &mut T,
        budget: &mut CallBudget,
    ) -> Result<AdvanceOutcome>
    where
        T: ChallengeTargets + ?Sized,
    {
        self.release(index)?;
        self.slots[index].randomness = randomness;

        if targets.eligible_len() == 0 {
            debug!(slot = index, "💤 No eligible orders, slot idle");
            return Ok(AdvanceOutcome::Idle);
        }

        for probe in 0..self.config.probe_limit {
            let len = targets.eligible_len();
            if len == 0 {
                break;
            }
            let Some(order) = targets.eligible_at(sample_index(&randomness, probe as u64, len))
            else {
                continue;
            };

            if targets.is_expired(order) {
                if !self.is_order_challenged(order) && budget.try_evict() {
                    targets.evict(order);
                    debug!(slot = index, order_id = order.0, "🧹 Evicted expired order");
                }
                continue;
            }
            if targets.nodes_of(order).is_empty() {
                continue;
            }
            return Ok(self.activate(index, order, randomness, height, targets));
        }

        // Random probes missed; scan linearly so a live order cannot hide.
        let mut position = 0usize;
        let mut scanned = 0u32;
        while scanned < self.config.fallback_scan_limit {
            let Some(order) = targets.eligible_at(position) else {
                break;
            };
            scanned += 1;

            if targets.is_expired(order) {
                if !self.is_order_challenged(order) && budget.try_evict() {
                    // The last entry now occupies `position`.
                    targets.evict(order);
                    debug!(slot = index, order_id = order.0, "🧹 Evicted expired order");
                } else {
                    position += 1;
                }
                continue;
            }
            if targets.nodes_of(order).is_empty() {
                position += 1;
                continue;
            }
            debug!(slot = index, scanned, "🔍 Fallback scan found a live order");
            return Ok(self.activate(index, order, randomness, height, targets));
        }

        debug!(
            slot = index,
            scanned,
            evicted = budget.evicted(),
            "⏸️ Advance budget exhausted, slot idle"
        );
        Ok(AdvanceOutcome::Idle)
    }

    fn activate<T>(
        &mut self,
        index: usize,
        order: OrderId,
        randomness: [u8; 32],
        height: u64,
        targets: &T,
    ) -> AdvanceOutcome
    where
        T: ChallengeTargets + ?Sized,
    {
        let nodes = targets.nodes_of(order);
        let node = nodes[sample_index(&randomness, NODE_SALT, nodes.len())];
        let target = ChallengeTarget {
            order,
            node,
            deadline: height.saturating_add(self.config.challenge_window),
        };

        self.slots[index].target = Some(target);
        *self.order_challenges.entry(order).or_insert(0) += 1;
        *self.node_challenges.entry(node).or_insert(0) += 1;

        info!(
            slot = index,
            order_id = order.0,
            node = %node,
            deadline = target.deadline,
            "🎯 Challenge issued"
        );
        AdvanceOutcome::Issued(target)
    }

    /// Recounts slot references and compares them with the counters.
    pub fn counters_consistent(&self) -> bool {
        let mut orders: HashMap<OrderId, u32> = HashMap::new();
        let mut nodes: HashMap<AccountId, u32> = HashMap::new();
        for target in self.slots.iter().filter_map(|slot| slot.target) {
            *orders.entry(target.order).or_insert(0) += 1;
            *nodes.entry(target.node).or_insert(0) += 1;
        }
        orders == self.order_challenges && nodes == self.node_challenges
    }
}

impl ObligationOracle for ChallengeScheduler {
    fn has_unresolved_obligation(&self, node: AccountId) -> bool {
        self.node_challenge_count(node) > 0
    }
}

fn decrement<K: std::hash::Hash + Eq>(counters: &mut HashMap<K, u32>, key: K) {
    if let Some(count) = counters.get_mut(&key) {
        *count -= 1;
        if *count == 0 {
            counters.remove(&key);
        }
    }
}
