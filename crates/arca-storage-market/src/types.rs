use arca_economics::Amount;
use arca_types::{AccountId, FileDescriptor, OrderId};
use serde::{Deserialize, Serialize};

/// A payer's request to keep one file stored by `replicas` nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: AccountId,
    pub file: FileDescriptor,
    /// Bytes reserved on every assigned node
    pub max_size: u64,
    pub periods: u64,
    pub replicas: u32,
    /// Price per byte per period
    pub price: Amount,
    /// Nodes currently assigned, never above `replicas`
    pub filled: u32,
    pub start_period: u64,
    /// `max_size * periods * price * replicas`, fixed at placement
    pub escrow: Amount,
    /// Part of `escrow` already credited to nodes
    pub paid_out: Amount,
}

impl Order {
    /// First period the order no longer covers.
    pub fn end_period(&self) -> u64 {
        self.start_period.saturating_add(self.periods)
    }

    pub fn is_expired(&self, current_period: u64) -> bool {
        current_period >= self.end_period()
    }

    pub fn is_fully_replicated(&self) -> bool {
        self.filled >= self.replicas
    }

    pub fn remaining_escrow(&self) -> Amount {
        self.escrow.saturating_sub(self.paid_out)
    }

    /// Value of storing one replica for `periods` periods.
    pub fn service_value(&self, periods: u64) -> Amount {
        let units = u128::from(self.max_size)
            * u128::from(self.price.to_base_units())
            * u128::from(periods);
        Amount::from_base_units(u64::try_from(units).unwrap_or(u64::MAX))
    }
}

/// One node serving one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Exact logical instant the node joined
    pub joined_at: u64,
    /// Amount already credited for this stint; starts at zero on every join
    pub earned: Amount,
}

impl Assignment {
    pub fn new(joined_at: u64) -> Self {
        Self {
            joined_at,
            earned: Amount::ZERO,
        }
    }
}
