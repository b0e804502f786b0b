//! Caller-facing command surface.

use crate::maintenance::MaintenanceReport;
use arca_challenges::ChallengeTarget;
use arca_economics::{Amount, PayoutKind};
use arca_types::{AccountId, FileDescriptor, OrderId};
use serde::{Deserialize, Serialize};

/// Ambient values of one call: who, when, and what was attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub caller: AccountId,
    /// Logical clock used for period accounting
    pub timestamp: u64,
    /// Logical height used for challenge deadlines
    pub height: u64,
    /// Public entropy mixed into fallback randomness
    #[serde(with = "hex::serde", default = "zero_entropy")]
    pub entropy: [u8; 32],
    /// Value attached to the call
    #[serde(default)]
    pub value: Amount,
}

fn zero_entropy() -> [u8; 32] {
    [0u8; 32]
}

impl CallContext {
    pub fn new(caller: AccountId, timestamp: u64, height: u64) -> Self {
        Self {
            caller,
            timestamp,
            height,
            entropy: zero_entropy(),
            value: Amount::ZERO,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }

    pub fn with_entropy(mut self, entropy: [u8; 32]) -> Self {
        self.entropy = entropy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    PlaceOrder {
        file: FileDescriptor,
        max_size: u64,
        periods: u64,
        replicas: u32,
        price: Amount,
    },
    Assign {
        order_id: OrderId,
    },
    Cancel {
        order_id: OrderId,
    },
    CompleteExpired {
        order_id: OrderId,
    },
    AdminComplete {
        order_id: OrderId,
    },
    Quit {
        order_id: OrderId,
    },
    ClaimRewards,
    ClaimReporterRewards,
    WithdrawRefund,
    AuthoritySlash {
        node: AccountId,
        amount: Amount,
        reason: String,
    },
    SubmitProof {
        slot: usize,
        #[serde(with = "hex::serde")]
        proof: Vec<u8>,
        #[serde(with = "hex::serde")]
        commitment: [u8; 32],
    },
    TriggerMaintenance,
    TransferOwnership {
        new_owner: AccountId,
    },
    SetReporterBps {
        bps: u64,
    },
    SetChallengeWindow {
        window: u64,
    },
    SetChallengeSlashAmount {
        amount: Amount,
    },
    SetQuitSlashPeriods {
        periods: u64,
    },
    DecreaseCapacity {
        amount: u64,
    },
    Unstake,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    OrderPlaced {
        order_id: OrderId,
        escrow: Amount,
        refund: Amount,
    },
    Assigned {
        order_id: OrderId,
    },
    Cancelled {
        order_id: OrderId,
        penalty: Amount,
        refund: Amount,
    },
    Completed {
        order_id: OrderId,
        refund: Amount,
    },
    Quit {
        order_id: OrderId,
        slashed: Amount,
    },
    Withdrawn {
        kind: PayoutKind,
        amount: Amount,
    },
    Slashed {
        node: AccountId,
        slashed: Amount,
        forced_exit: bool,
    },
    ProofAccepted {
        slot: usize,
        next: Option<ChallengeTarget>,
    },
    Maintenance(MaintenanceReport),
    Unstaked {
        stake: Amount,
    },
    Updated,
}
