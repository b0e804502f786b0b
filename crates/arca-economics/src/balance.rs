//! Pull-payment balances.
//!
//! The ledger only ever credits these balances. A balance is zeroed only by
//! an explicit withdrawal of the full amount, and only after the value sink
//! accepted the transfer, so a recipient that refuses value blocks nobody
//! but itself.

use crate::error::{EconomicsError, Result};
use crate::sink::ValueSink;
use crate::types::Amount;
use arca_types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutKind {
    /// Unspent escrow owed back to a payer.
    Refund,
    /// Storage rewards and cancellation penalties owed to a node.
    Reward,
    /// Share of slash proceeds owed to whoever triggered the slash.
    ReporterReward,
}

impl fmt::Display for PayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayoutKind::Refund => write!(f, "refund"),
            PayoutKind::Reward => write!(f, "reward"),
            PayoutKind::ReporterReward => write!(f, "reporter reward"),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct PayoutLedger {
    refunds: HashMap<AccountId, Amount>,
    rewards: HashMap<AccountId, Amount>,
    reporter_rewards: HashMap<AccountId, Amount>,
    outstanding: HashMap<PayoutKind, Amount>,
}

impl PayoutLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self, kind: PayoutKind) -> &HashMap<AccountId, Amount> {
        match kind {
            PayoutKind::Refund => &self.refunds,
            PayoutKind::Reward => &self.rewards,
            PayoutKind::ReporterReward => &self.reporter_rewards,
        }
    }

    fn book_mut(&mut self, kind: PayoutKind) -> &mut HashMap<AccountId, Amount> {
        match kind {
            PayoutKind::Refund => &mut self.refunds,
            PayoutKind::Reward => &mut self.rewards,
            PayoutKind::ReporterReward => &mut self.reporter_rewards,
        }
    }

    pub fn pending(&self, kind: PayoutKind, account: AccountId) -> Amount {
        self.book(kind).get(&account).copied().unwrap_or(Amount::ZERO)
    }

    /// Sum of every pending balance of `kind`.
    pub fn outstanding(&self, kind: PayoutKind) -> Amount {
        self.outstanding.get(&kind).copied().unwrap_or(Amount::ZERO)
    }

    pub fn credit(&mut self, kind: PayoutKind, account: AccountId, amount: Amount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }

        let current = self.pending(kind, account);
        let updated = current.checked_add(amount).ok_or_else(|| {
            EconomicsError::Overflow(format!("{} balance of {}", kind, account))
        })?;
        let outstanding = self.outstanding(kind).checked_add(amount).ok_or_else(|| {
            EconomicsError::Overflow(format!("outstanding {} total", kind))
        })?;

        self.book_mut(kind).insert(account, updated);
        self.outstanding.insert(kind, outstanding);

        debug!(
            account = %account,
            kind = %kind,
            amount = amount.to_base_units(),
            pending = updated.to_base_units(),
            "💰 Pending balance credited"
        );
        Ok(())
    }

    /// Transfers the full pending balance through `sink`, then zeroes it.
    pub fn withdraw(
        &mut self,
        kind: PayoutKind,
        account: AccountId,
        sink: &mut dyn ValueSink,
    ) -> Result<Amount> {
        self.withdraw_with_extra(kind, account, Amount::ZERO, sink)
    }

    /// Like [`withdraw`](Self::withdraw) but also pays `extra`, an amount the
    /// caller has computed but not yet credited. Nothing is recorded unless
    /// the transfer succeeds.
    pub fn withdraw_with_extra(
        &mut self,
        kind: PayoutKind,
        account: AccountId,
        extra: Amount,
        sink: &mut dyn ValueSink,
    ) -> Result<Amount> {
        let pending = self.pending(kind, account);
        let total = pending
            .checked_add(extra)
            .ok_or_else(|| EconomicsError::Overflow(format!("{} withdrawal", kind)))?;
        if total.is_zero() {
            return Err(EconomicsError::NothingToWithdraw { kind, account });
        }

        sink.transfer(account, total, kind)?;

        self.book_mut(kind).remove(&account);
        let outstanding = self.outstanding(kind).saturating_sub(pending);
        self.outstanding.insert(kind, outstanding);

        info!(
            account = %account,
            kind = %kind,
            amount = total.to_base_units(),
            "💸 Pending balance withdrawn"
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn test_credit_and_withdraw() {
        let mut ledger = PayoutLedger::new();
        let mut sink = MemorySink::new();
        let alice = AccountId::derive(b"alice");

        ledger
            .credit(PayoutKind::Refund, alice, Amount::from_base_units(40))
            .unwrap();
        ledger
            .credit(PayoutKind::Refund, alice, Amount::from_base_units(2))
            .unwrap();
        assert_eq!(
            ledger.pending(PayoutKind::Refund, alice),
            Amount::from_base_units(42)
        );
        assert_eq!(ledger.pending(PayoutKind::Reward, alice), Amount::ZERO);

        let paid = ledger
            .withdraw(PayoutKind::Refund, alice, &mut sink)
            .unwrap();
        assert_eq!(paid, Amount::from_base_units(42));
        assert_eq!(ledger.pending(PayoutKind::Refund, alice), Amount::ZERO);
        assert_eq!(ledger.outstanding(PayoutKind::Refund), Amount::ZERO);
        assert_eq!(sink.received(alice), Amount::from_base_units(42));
    }

    #[test]
    fn test_empty_withdrawal_fails() {
        let mut ledger = PayoutLedger::new();
        let mut sink = MemorySink::new();
        let bob = AccountId::derive(b"bob");

        let err = ledger
            .withdraw(PayoutKind::ReporterReward, bob, &mut sink)
            .unwrap_err();
        assert!(matches!(err, EconomicsError::NothingToWithdraw { .. }));
    }

    #[test]
    fn test_rejected_transfer_keeps_balance() {
        let mut ledger = PayoutLedger::new();
        let mut sink = MemorySink::new();
        let carol = AccountId::derive(b"carol");
        let dave = AccountId::derive(b"dave");
        sink.reject_from(carol);

        ledger
            .credit(PayoutKind::Reward, carol, Amount::from_base_units(10))
            .unwrap();
        ledger
            .credit(PayoutKind::Reward, dave, Amount::from_base_units(7))
            .unwrap();

        let err = ledger
            .withdraw(PayoutKind::Reward, carol, &mut sink)
            .unwrap_err();
        assert!(matches!(err, EconomicsError::TransferRejected { .. }));
        assert_eq!(
            ledger.pending(PayoutKind::Reward, carol),
            Amount::from_base_units(10)
        );

        // Other recipients are unaffected.
        ledger
            .withdraw(PayoutKind::Reward, dave, &mut sink)
            .unwrap();
        assert_eq!(
            ledger.outstanding(PayoutKind::Reward),
            Amount::from_base_units(10)
        );
    }

    #[test]
    fn test_withdraw_with_extra() {
        let mut ledger = PayoutLedger::new();
        let mut sink = MemorySink::new();
        let node = AccountId::derive(b"node");

        ledger
            .credit(PayoutKind::Reward, node, Amount::from_base_units(3))
            .unwrap();
        let paid = ledger
            .withdraw_with_extra(
                PayoutKind::Reward,
                node,
                Amount::from_base_units(4),
                &mut sink,
            )
            .unwrap();
        assert_eq!(paid, Amount::from_base_units(7));
        assert_eq!(ledger.outstanding(PayoutKind::Reward), Amount::ZERO);
    }
}
