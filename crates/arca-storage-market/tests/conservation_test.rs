//! Property tests: random command sequences never create or lose value and
//! never leave the indexes out of sync.

use arca_challenges::{ChallengeConfig, DigestVerifier, PublicInputs};
use arca_economics::{Amount, MemorySink, PayoutKind};
use arca_storage_market::*;
use arca_types::{AccountId, FileDescriptor, OrderId, TimeConfig};
use proptest::prelude::*;

const PERIOD: u64 = 100;
const NODES: [&str; 3] = ["node-a", "node-b", "node-c"];

#[derive(Debug, Clone)]
enum Op {
    Place {
        size: u64,
        periods: u64,
        replicas: u32,
        price: u64,
    },
    Assign {
        order: usize,
        node: usize,
    },
    Cancel {
        order: usize,
    },
    Quit {
        order: usize,
        node: usize,
    },
    Complete {
        order: usize,
    },
    Claim {
        node: usize,
    },
    ClaimReporter {
        node: usize,
    },
    WithdrawRefund,
    Prove {
        slot: usize,
    },
    Maintenance {
        node: usize,
    },
    Advance {
        dt: u64,
    },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u64..50, 1u64..5, 1u32..3, 1u64..5).prop_map(|(size, periods, replicas, price)| {
            Op::Place { size, periods, replicas, price }
        }),
        4 => (0usize..16, 0usize..3).prop_map(|(order, node)| Op::Assign { order, node }),
        1 => (0usize..16).prop_map(|order| Op::Cancel { order }),
        1 => (0usize..16, 0usize..3).prop_map(|(order, node)| Op::Quit { order, node }),
        1 => (0usize..16).prop_map(|order| Op::Complete { order }),
        2 => (0usize..3).prop_map(|node| Op::Claim { node }),
        1 => (0usize..4).prop_map(|node| Op::ClaimReporter { node }),
        1 => Just(Op::WithdrawRefund),
        2 => (0usize..2).prop_map(|slot| Op::Prove { slot }),
        2 => (0usize..4).prop_map(|node| Op::Maintenance { node }),
        3 => (1u64..150).prop_map(|dt| Op::Advance { dt }),
    ]
}

fn account(index: usize) -> AccountId {
    match NODES.get(index) {
        Some(name) => AccountId::derive(name.as_bytes()),
        None => AccountId::derive(b"keeper"),
    }
}

/// Drives a market while tracking everything that left it.
struct Harness {
    market: Market,
    payer: AccountId,
    orders: Vec<OrderId>,
    now: u64,
    withdrawn_refunds: Amount,
    withdrawn_rewards: Amount,
    withdrawn_reporter: Amount,
}

impl Harness {
    fn new() -> Self {
        let config = MarketConfig {
            time: TimeConfig {
                genesis: 0,
                period_length: PERIOD,
                epoch_length: 10,
                step_length: 1,
            },
            challenge: ChallengeConfig {
                num_slots: 2,
                challenge_window: 120,
                slash_amount: Amount::from_base_units(50),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut registry = MemoryRegistry::new(Amount::from_base_units(1));
        for (index, _) in NODES.iter().enumerate() {
            registry.register(account(index), Amount::from_base_units(2_000), 10_000);
        }
        let market = Market::new(
            config,
            AccountId::derive(b"owner"),
            Box::new(registry),
            Box::new(DigestVerifier),
            Box::new(MemorySink::new()),
        )
        .unwrap();

        Self {
            market,
            payer: AccountId::derive(b"payer"),
            orders: Vec::new(),
            now: 0,
            withdrawn_refunds: Amount::ZERO,
            withdrawn_rewards: Amount::ZERO,
            withdrawn_reporter: Amount::ZERO,
        }
    }

    fn call(&self, caller: AccountId) -> CallContext {
        CallContext::new(caller, self.now, self.now)
    }

    fn order(&self, index: usize) -> Option<OrderId> {
        if self.orders.is_empty() {
            return None;
        }
        Some(self.orders[index % self.orders.len()])
    }

    fn apply(&mut self, op: &Op) -> Option<Result<Outcome>> {
        let result = match *op {
            Op::Place {
                size,
                periods,
                replicas,
                price,
            } => {
                let cost = size * periods * u64::from(replicas) * price;
                let ctx = self.call(self.payer).with_value(Amount::from_base_units(cost));
                let salt = (self.orders.len() as u64).to_le_bytes();
                let file = FileDescriptor::from_content(&salt, "ipfs://prop");
                self.market.place_order(
                    &ctx,
                    file,
                    size,
                    periods,
                    replicas,
                    Amount::from_base_units(price),
                )
            }
            Op::Assign { order, node } => {
                let order = self.order(order)?;
                self.market.assign(&self.call(account(node)), order)
            }
            Op::Cancel { order } => {
                let order = self.order(order)?;
                self.market.cancel(&self.call(self.payer), order)
            }
            Op::Quit { order, node } => {
                let order = self.order(order)?;
                self.market.quit(&self.call(account(node)), order)
            }
            Op::Complete { order } => {
                let order = self.order(order)?;
                self.market.complete_expired(&self.call(self.payer), order)
            }
            Op::Claim { node } => self.market.claim_rewards(&self.call(account(node))),
            Op::ClaimReporter { node } => {
                self.market.claim_reporter_rewards(&self.call(account(node)))
            }
            Op::WithdrawRefund => self.market.withdraw_refund(&self.call(self.payer)),
            Op::Prove { slot } => {
                let challenge = self.market.slot(slot).ok()?;
                let target = challenge.target?;
                let info = self.market.node_info(target.node)?;
                let fingerprint = self.market.order(target.order)?.file.fingerprint;
                let commitment = [slot as u8; 32];
                let inputs = PublicInputs {
                    commitment,
                    randomness: challenge.randomness,
                    identity_key: info.identity_key,
                    identity_aux: info.identity_aux,
                    fingerprint,
                };
                let proof = DigestVerifier::prove(&inputs.to_array());
                self.market
                    .submit_proof(&self.call(target.node), slot, &proof, commitment)
            }
            Op::Maintenance { node } => self
                .market
                .trigger_maintenance(&self.call(account(node)))
                .map(Outcome::Maintenance),
            Op::Advance { dt } => {
                self.now += dt;
                return None;
            }
        };

        match &result {
            Ok(Outcome::OrderPlaced { order_id, .. }) => self.orders.push(*order_id),
            Ok(Outcome::Withdrawn { kind, amount }) => {
                let total = match kind {
                    PayoutKind::Refund => &mut self.withdrawn_refunds,
                    PayoutKind::Reward => &mut self.withdrawn_rewards,
                    PayoutKind::ReporterReward => &mut self.withdrawn_reporter,
                };
                *total = total.saturating_add(*amount);
            }
            _ => {}
        }
        Some(result)
    }

    fn check(&self) -> std::result::Result<(), TestCaseError> {
        let totals = self.market.totals();
        let payouts = self.market.payouts();

        prop_assert!(self.market.is_consistent());
        prop_assert_eq!(
            totals.lifetime_escrow_deposited,
            totals
                .escrow_outstanding()
                .saturating_add(totals.lifetime_refunds)
                .saturating_add(totals.lifetime_rewards_paid)
        );
        prop_assert!(totals.escrow_withdrawn <= totals.escrow_locked);
        prop_assert_eq!(
            payouts
                .outstanding(PayoutKind::Refund)
                .saturating_add(self.withdrawn_refunds),
            totals.lifetime_refunds
        );
        prop_assert_eq!(
            payouts
                .outstanding(PayoutKind::Reward)
                .saturating_add(self.withdrawn_rewards),
            totals.lifetime_rewards_paid
        );
        prop_assert_eq!(
            payouts
                .outstanding(PayoutKind::ReporterReward)
                .saturating_add(self.withdrawn_reporter),
            totals.lifetime_slash_rewarded
        );
        prop_assert_eq!(
            totals.lifetime_slash_received,
            totals
                .lifetime_slash_rewarded
                .saturating_add(totals.lifetime_slash_burned)
        );

        let live_escrow = self
            .market
            .ledger()
            .orders()
            .fold(Amount::ZERO, |total, order| total.saturating_add(order.escrow));
        prop_assert_eq!(live_escrow, totals.escrow_locked);
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_value_is_conserved(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let mut harness = Harness::new();
        for op in &ops {
            let before = harness.market.totals().clone();
            if let Some(Err(_)) = harness.apply(op) {
                // Rejected commands leave no trace.
                prop_assert_eq!(harness.market.totals(), &before);
            }
            harness.check()?;
        }
    }

    #[test]
    fn prop_orders_drain_after_expiry(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut harness = Harness::new();
        for op in &ops {
            harness.apply(op);
        }

        // Far past every order end; repeated maintenance finishes the backlog.
        harness.now += 10 * PERIOD;
        for _ in 0..16 {
            harness.apply(&Op::Maintenance { node: 3 });
            harness.now += 200;
        }
        prop_assert_eq!(harness.market.active_order_count(), 0);
        prop_assert_eq!(harness.market.eligible_order_count(), 0);
        prop_assert_eq!(harness.market.totals().escrow_locked, Amount::ZERO);
        harness.check()?;
    }
}
