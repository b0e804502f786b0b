use crate::types::Amount;
use serde::{Deserialize, Serialize};

/// Incrementally maintained market aggregates.
///
/// `escrow_locked` and `escrow_withdrawn` describe live orders only and shrink
/// when an order is cleared. Every `lifetime_*` counter is monotonic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketTotals {
    /// Escrow of all live orders.
    pub escrow_locked: Amount,
    /// Part of `escrow_locked` already paid out to nodes.
    pub escrow_withdrawn: Amount,
    pub lifetime_escrow_deposited: Amount,
    pub lifetime_rewards_paid: Amount,
    pub lifetime_refunds: Amount,
    pub lifetime_slash_received: Amount,
    pub lifetime_slash_burned: Amount,
    pub lifetime_slash_rewarded: Amount,
}

impl MarketTotals {
    pub fn record_deposit(&mut self, escrow: Amount) {
        self.escrow_locked = self.escrow_locked.saturating_add(escrow);
        self.lifetime_escrow_deposited = self.lifetime_escrow_deposited.saturating_add(escrow);
    }

    pub fn record_payout(&mut self, amount: Amount) {
        self.escrow_withdrawn = self.escrow_withdrawn.saturating_add(amount);
        self.lifetime_rewards_paid = self.lifetime_rewards_paid.saturating_add(amount);
    }

    pub fn record_refund(&mut self, amount: Amount) {
        self.lifetime_refunds = self.lifetime_refunds.saturating_add(amount);
    }

    /// Drops a destroyed order's escrow from the live aggregates.
    pub fn record_cleared(&mut self, escrow: Amount, paid_out: Amount) {
        self.escrow_locked = self.escrow_locked.saturating_sub(escrow);
        self.escrow_withdrawn = self.escrow_withdrawn.saturating_sub(paid_out);
    }

    pub fn record_slash(&mut self, received: Amount, rewarded: Amount, burned: Amount) {
        self.lifetime_slash_received = self.lifetime_slash_received.saturating_add(received);
        self.lifetime_slash_rewarded = self.lifetime_slash_rewarded.saturating_add(rewarded);
        self.lifetime_slash_burned = self.lifetime_slash_burned.saturating_add(burned);
    }

    /// Escrow of live orders not yet paid out.
    pub fn escrow_outstanding(&self) -> Amount {
        self.escrow_locked.saturating_sub(self.escrow_withdrawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifetime_counters_survive_clearing() {
        let mut totals = MarketTotals::default();
        totals.record_deposit(Amount::from_base_units(100));
        totals.record_payout(Amount::from_base_units(30));
        assert_eq!(totals.escrow_outstanding(), Amount::from_base_units(70));

        totals.record_cleared(Amount::from_base_units(100), Amount::from_base_units(30));
        assert_eq!(totals.escrow_locked, Amount::ZERO);
        assert_eq!(totals.escrow_withdrawn, Amount::ZERO);
        assert_eq!(totals.lifetime_escrow_deposited, Amount::from_base_units(100));
        assert_eq!(totals.lifetime_rewards_paid, Amount::from_base_units(30));
    }
}
