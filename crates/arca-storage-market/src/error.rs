use arca_challenges::ChallengeError;
use arca_economics::{EconomicsError, PayoutKind};
use arca_types::{AccountId, OrderId, TypesError};
use thiserror::Error;

/// Storage market error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Order does not exist (never placed or already destroyed)
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order {0} has expired")]
    OrderExpired(OrderId),

    #[error("Order {order} runs until period {end_period}, current period is {current}")]
    OrderNotExpired {
        order: OrderId,
        end_period: u64,
        current: u64,
    },

    /// Every replica slot of the order is taken
    #[error("Order {0} is fully replicated")]
    OrderFilled(OrderId),

    #[error("Node {node} already serves order {order}")]
    AlreadyAssigned { order: OrderId, node: AccountId },

    #[error("Node {node} does not serve order {order}")]
    NotAssigned { order: OrderId, node: AccountId },

    #[error("Node {node} already holds the maximum of {limit} assignments")]
    NodeOrderLimit { node: AccountId, limit: usize },

    #[error("Node {0} is not registered in the collateral registry")]
    UnknownNode(AccountId),

    #[error("Insufficient capacity: node {node} cannot take {size} bytes")]
    InsufficientCapacity { node: AccountId, size: u64 },

    #[error("Caller {caller} does not own order {order}")]
    NotOrderOwner { order: OrderId, caller: AccountId },

    /// An active challenge slot references the order
    #[error("Order {0} is under active challenge")]
    UnderChallenge(OrderId),

    /// The node is the target of an unresolved challenge
    #[error("Node {0} has an unresolved challenge obligation")]
    UnresolvedObligation(AccountId),

    #[error("Insufficient payment: required {required}, provided {provided}")]
    InsufficientPayment { required: String, provided: String },

    #[error("File fingerprint {0} is outside the proof field")]
    FingerprintOutOfField(String),

    #[error("Nothing to claim: no {kind} balance for {account}")]
    NothingToClaim { kind: PayoutKind, account: AccountId },

    #[error("Re-entrant call rejected")]
    Reentrant,

    #[error("Transfer rejected: {0}")]
    TransferRejected(String),

    #[error("Proof rejected: {0}")]
    ProofRejected(String),

    #[error("Caller {caller} is not the target of challenge slot {slot}")]
    NotChallengeTarget { slot: usize, caller: AccountId },

    #[error("Challenge slot {slot} deadline {deadline} passed (height {height})")]
    ChallengeDeadlinePassed { slot: usize, deadline: u64, height: u64 },

    #[error("Challenge slot {0} is idle")]
    SlotIdle(usize),

    #[error("Challenge slot {0} does not exist")]
    SlotOutOfRange(usize),

    /// Caller lacks the owner role
    #[error("Unauthorized: {0} is not the market owner")]
    Unauthorized(AccountId),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Amount overflow: {0}")]
    AmountOverflow(String),
}

impl From<EconomicsError> for MarketError {
    fn from(err: EconomicsError) -> Self {
        match err {
            EconomicsError::NothingToWithdraw { kind, account } => {
                MarketError::NothingToClaim { kind, account }
            }
            EconomicsError::TransferRejected { .. } => MarketError::TransferRejected(err.to_string()),
            EconomicsError::Reentrant => MarketError::Reentrant,
            EconomicsError::Overflow(what) => MarketError::AmountOverflow(what),
        }
    }
}

impl From<ChallengeError> for MarketError {
    fn from(err: ChallengeError) -> Self {
        match err {
            ChallengeError::SlotOutOfRange(slot) => MarketError::SlotOutOfRange(slot),
            ChallengeError::SlotIdle(slot) => MarketError::SlotIdle(slot),
            ChallengeError::NotTarget { slot, caller } => {
                MarketError::NotChallengeTarget { slot, caller }
            }
            ChallengeError::DeadlinePassed {
                slot,
                deadline,
                height,
            } => MarketError::ChallengeDeadlinePassed {
                slot,
                deadline,
                height,
            },
            ChallengeError::ProofRejected(reason) => MarketError::ProofRejected(reason),
            ChallengeError::InvalidConfiguration(reason) => MarketError::InvalidParameter(reason),
        }
    }
}

impl From<TypesError> for MarketError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::FingerprintOutOfField(fingerprint) => {
                MarketError::FingerprintOutOfField(fingerprint)
            }
            other => MarketError::InvalidParameter(other.to_string()),
        }
    }
}

/// Result type for storage market operations
pub type Result<T> = std::result::Result<T, MarketError>;
