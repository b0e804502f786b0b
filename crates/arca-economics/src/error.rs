use crate::balance::PayoutKind;
use arca_types::AccountId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomicsError {
    #[error("Nothing to withdraw: no pending {kind} balance for {account}")]
    NothingToWithdraw { kind: PayoutKind, account: AccountId },

    #[error("Transfer of {amount} to {to} rejected: {reason}")]
    TransferRejected {
        to: AccountId,
        amount: String,
        reason: String,
    },

    #[error("Re-entrant call rejected")]
    Reentrant,

    #[error("Amount overflow: {0}")]
    Overflow(String),
}

pub type Result<T> = std::result::Result<T, EconomicsError>;
