use crate::balance::PayoutKind;
use crate::error::{EconomicsError, Result};
use crate::types::Amount;
use arca_types::AccountId;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Destination of value leaving the ledger.
///
/// Only withdrawals call [`transfer`](ValueSink::transfer); ordinary
/// accounting never pushes value to a recipient.
pub trait ValueSink: Send + Sync {
    fn transfer(&mut self, to: AccountId, amount: Amount, kind: PayoutKind) -> Result<()>;

    /// Sends slash proceeds to the unrecoverable void.
    fn burn(&mut self, amount: Amount);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub to: AccountId,
    pub amount: Amount,
    pub kind: PayoutKind,
}

/// In-memory sink recording every transfer. Recipients registered with
/// [`reject_from`](MemorySink::reject_from) refuse incoming value.
#[derive(Debug, Default)]
pub struct MemorySink {
    transfers: Vec<TransferRecord>,
    received: HashMap<AccountId, Amount>,
    rejecting: HashSet<AccountId>,
    burned: Amount,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_from(&mut self, account: AccountId) {
        self.rejecting.insert(account);
    }

    pub fn accept_from(&mut self, account: AccountId) {
        self.rejecting.remove(&account);
    }

    pub fn received(&self, account: AccountId) -> Amount {
        self.received.get(&account).copied().unwrap_or(Amount::ZERO)
    }

    pub fn burned(&self) -> Amount {
        self.burned
    }

    pub fn transfers(&self) -> &[TransferRecord] {
        &self.transfers
    }
}

impl ValueSink for MemorySink {
    fn transfer(&mut self, to: AccountId, amount: Amount, kind: PayoutKind) -> Result<()> {
        if self.rejecting.contains(&to) {
            warn!(to = %to, amount = amount.to_base_units(), "❌ Recipient rejected transfer");
            return Err(EconomicsError::TransferRejected {
                to,
                amount: amount.to_string(),
                reason: "recipient does not accept value".to_string(),
            });
        }

        let entry = self.received.entry(to).or_insert(Amount::ZERO);
        *entry = entry.saturating_add(amount);
        self.transfers.push(TransferRecord { to, amount, kind });
        Ok(())
    }

    fn burn(&mut self, amount: Amount) {
        self.burned = self.burned.saturating_add(amount);
    }
}
