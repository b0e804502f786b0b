use arca_economics::{Amount, PayoutKind};
use arca_types::{AccountId, OrderId};
use serde::{Deserialize, Serialize};

/// State transitions recorded by the market, drained by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MarketEvent {
    OrderPlaced {
        order_id: OrderId,
        owner: AccountId,
        escrow: Amount,
        refund: Amount,
    },
    NodeAssigned {
        order_id: OrderId,
        node: AccountId,
        joined_at: u64,
    },
    RewardSettled {
        order_id: OrderId,
        node: AccountId,
        amount: Amount,
    },
    OrderCancelled {
        order_id: OrderId,
        penalty: Amount,
        refund: Amount,
    },
    OrderCompleted {
        order_id: OrderId,
        refund: Amount,
    },
    NodeQuit {
        order_id: OrderId,
        node: AccountId,
        slashed: Amount,
    },
    NodeSlashed {
        node: AccountId,
        slashed: Amount,
        reporter: Option<AccountId>,
        reporter_reward: Amount,
        burned: Amount,
    },
    ForcedExit {
        node: AccountId,
        orders: Vec<OrderId>,
    },
    UnderReplicated {
        order_id: OrderId,
        filled: u32,
        replicas: u32,
    },
    ChallengeIssued {
        slot: usize,
        order_id: OrderId,
        node: AccountId,
        deadline: u64,
    },
    ChallengeProved {
        slot: usize,
        order_id: OrderId,
        node: AccountId,
    },
    ChallengeExpired {
        slot: usize,
        order_id: OrderId,
        node: AccountId,
    },
    SlotIdle {
        slot: usize,
    },
    Withdrawal {
        account: AccountId,
        kind: PayoutKind,
        amount: Amount,
    },
}
