//! The storage market state machine.
//!
//! `Market` is the single ledger every command is applied to, one at a time,
//! through `&mut self`. Each command checks all of its preconditions before
//! touching state, so a rejected command leaves no partial effects.

use crate::command::{CallContext, Command, Outcome};
use crate::config::MarketConfig;
use crate::distribution::{split_penalty, split_slash};
use crate::error::{MarketError, Result};
use crate::events::MarketEvent;
use crate::ledger::{EligibleView, Ledger};
use crate::registry::{CollateralRegistry, NetworkStats, NodeInfo, SlashOutcome};
use crate::types::{Assignment, Order};
use arca_challenges::{
    AdvanceOutcome, Blake3Randomness, CallBudget, ChallengeScheduler, ChallengeSlot,
    ChallengeTarget, ObligationOracle, ProofVerifier, PublicInputs, RandomnessSource,
};
use arca_economics::{
    Amount, MarketTotals, PayoutKind, PayoutLedger, ReentrancyGuard, ValueSink,
};
use arca_types::{AccountId, FileDescriptor, OrderId};
use tracing::{debug, info, warn};

pub struct Market {
    pub(crate) config: MarketConfig,
    pub(crate) owner: AccountId,
    pub(crate) ledger: Ledger,
    pub(crate) scheduler: ChallengeScheduler,
    pub(crate) payouts: PayoutLedger,
    pub(crate) totals: MarketTotals,
    pub(crate) guard: ReentrancyGuard,
    pub(crate) events: Vec<MarketEvent>,
    pub(crate) nonce: u64,
    pub(crate) registry: Box<dyn CollateralRegistry>,
    pub(crate) verifier: Box<dyn ProofVerifier>,
    pub(crate) sink: Box<dyn ValueSink>,
    pub(crate) randomness: Box<dyn RandomnessSource>,
}

impl Market {
    pub fn new(
        config: MarketConfig,
        owner: AccountId,
        registry: Box<dyn CollateralRegistry>,
        verifier: Box<dyn ProofVerifier>,
        sink: Box<dyn ValueSink>,
    ) -> Result<Self> {
        config.validate()?;
        let scheduler = ChallengeScheduler::new(config.challenge.clone())?;

        info!(
            owner = %owner,
            num_slots = config.challenge.num_slots,
            period_length = config.time.period_length,
            "🏪 Storage market initialized"
        );

        Ok(Self {
            config,
            owner,
            ledger: Ledger::new(),
            scheduler,
            payouts: PayoutLedger::new(),
            totals: MarketTotals::default(),
            guard: ReentrancyGuard::new(),
            events: Vec::new(),
            nonce: 0,
            registry,
            verifier,
            sink,
            randomness: Box::new(Blake3Randomness),
        })
    }

    pub fn with_randomness(mut self, randomness: Box<dyn RandomnessSource>) -> Self {
        self.randomness = randomness;
        self
    }

    /// Applies one command.
    pub fn execute(&mut self, ctx: &CallContext, command: Command) -> Result<Outcome> {
        debug!(caller = %ctx.caller, timestamp = ctx.timestamp, height = ctx.height, ?command, "Executing command");

        match command {
            Command::PlaceOrder {
                file,
                max_size,
                periods,
                replicas,
                price,
            } => self.place_order(ctx, file, max_size, periods, replicas, price),
            Command::Assign { order_id } => self.assign(ctx, order_id),
            Command::Cancel { order_id } => self.cancel(ctx, order_id),
            Command::CompleteExpired { order_id } => self.complete_expired(ctx, order_id),
            Command::AdminComplete { order_id } => self.admin_complete(ctx, order_id),
            Command::Quit { order_id } => self.quit(ctx, order_id),
            Command::ClaimRewards => self.claim_rewards(ctx),
            Command::ClaimReporterRewards => self.claim_reporter_rewards(ctx),
            Command::WithdrawRefund => self.withdraw_refund(ctx),
            Command::AuthoritySlash {
                node,
                amount,
                reason,
            } => self.authority_slash(ctx, node, amount, &reason),
            Command::SubmitProof {
                slot,
                proof,
                commitment,
            } => self.submit_proof(ctx, slot, &proof, commitment),
            Command::TriggerMaintenance => self.trigger_maintenance(ctx).map(Outcome::Maintenance),
            Command::TransferOwnership { new_owner } => self.transfer_ownership(ctx, new_owner),
            Command::SetReporterBps { bps } => self.set_reporter_bps(ctx, bps),
            Command::SetChallengeWindow { window } => self.set_challenge_window(ctx, window),
            Command::SetChallengeSlashAmount { amount } => {
                self.set_challenge_slash_amount(ctx, amount)
            }
            Command::SetQuitSlashPeriods { periods } => self.set_quit_slash_periods(ctx, periods),
            Command::DecreaseCapacity { amount } => self.decrease_capacity(ctx, amount),
            Command::Unstake => self.unstake(ctx),
        }
    }

    // ---------------------------------------------------------------------
    // Orders
    // ---------------------------------------------------------------------

    /// Creates an order funded by `ctx.value`. Escrow is the computed cost;
    /// any overpayment is queued as a refund right away.
    pub fn place_order(
        &mut self,
        ctx: &CallContext,
        file: FileDescriptor,
        max_size: u64,
        periods: u64,
        replicas: u32,
        price: Amount,
    ) -> Result<Outcome> {
        file.validate()?;
        if max_size == 0 || periods == 0 || price.is_zero() {
            return Err(MarketError::InvalidParameter(
                "size, periods and price must be non-zero".to_string(),
            ));
        }
        if replicas == 0 || replicas > self.config.limits.max_replicas {
            return Err(MarketError::InvalidParameter(format!(
                "replicas must be within 1..={}",
                self.config.limits.max_replicas
            )));
        }

        let cost = price
            .checked_mul(max_size)
            .and_then(|cost| cost.checked_mul(periods))
            .and_then(|cost| cost.checked_mul(u64::from(replicas)))
            .ok_or_else(|| MarketError::AmountOverflow("order cost".to_string()))?;
        if ctx.value < cost {
            return Err(MarketError::InsufficientPayment {
                required: cost.to_string(),
                provided: ctx.value.to_string(),
            });
        }

        let refund = ctx.value.saturating_sub(cost);
        self.payouts.credit(PayoutKind::Refund, ctx.caller, refund)?;

        let order_id = self.ledger.next_order_id();
        let start_period = self.current_period(ctx.timestamp);
        self.ledger.insert_order(Order {
            id: order_id,
            owner: ctx.caller,
            file,
            max_size,
            periods,
            replicas,
            price,
            filled: 0,
            start_period,
            escrow: cost,
            paid_out: Amount::ZERO,
        });
        self.totals.record_deposit(cost);

        info!(
            order_id = order_id.0,
            owner = %ctx.caller,
            max_size,
            periods,
            replicas,
            escrow = cost.to_base_units(),
            "📦 Order placed"
        );
        self.events.push(MarketEvent::OrderPlaced {
            order_id,
            owner: ctx.caller,
            escrow: cost,
            refund,
        });

        Ok(Outcome::OrderPlaced {
            order_id,
            escrow: cost,
            refund,
        })
    }

    /// Caller takes one replica slot of `order_id`.
    pub fn assign(&mut self, ctx: &CallContext, order_id: OrderId) -> Result<Outcome> {
        let node = ctx.caller;
        let period = self.current_period(ctx.timestamp);
        let order = self.order_or_err(order_id)?;

        if order.is_expired(period) {
            return Err(MarketError::OrderExpired(order_id));
        }
        if order.is_fully_replicated() {
            return Err(MarketError::OrderFilled(order_id));
        }
        if self.ledger.assignment(order_id, node).is_some() {
            return Err(MarketError::AlreadyAssigned {
                order: order_id,
                node,
            });
        }
        let limit = self.config.limits.max_orders_per_node;
        if self.ledger.orders_of(node).len() >= limit {
            return Err(MarketError::NodeOrderLimit { node, limit });
        }
        if !self.registry.is_valid_node(node) {
            return Err(MarketError::UnknownNode(node));
        }
        let size = order.max_size;
        if !self.registry.has_capacity(node, size) {
            return Err(MarketError::InsufficientCapacity { node, size });
        }
        let info = self
            .registry
            .node_info(node)
            .ok_or(MarketError::UnknownNode(node))?;

        self.registry
            .update_node_used(node, info.used.saturating_add(size))?;
        self.ledger.add_assignment(order_id, node, ctx.timestamp);

        info!(order_id = order_id.0, node = %node, joined_at = ctx.timestamp, "🤝 Node assigned");
        self.events.push(MarketEvent::NodeAssigned {
            order_id,
            node,
            joined_at: ctx.timestamp,
        });
        Ok(Outcome::Assigned { order_id })
    }

    /// Owner cancels a live order. Nodes that served at least one full
    /// period share the cancellation penalty.
    pub fn cancel(&mut self, ctx: &CallContext, order_id: OrderId) -> Result<Outcome> {
        let period = self.current_period(ctx.timestamp);
        let order = self.order_or_err(order_id)?;

        if order.owner != ctx.caller {
            return Err(MarketError::NotOrderOwner {
                order: order_id,
                caller: ctx.caller,
            });
        }
        if order.is_expired(period) {
            return Err(MarketError::OrderExpired(order_id));
        }
        self.ensure_not_challenged(order_id)?;

        let nodes = self.ledger.nodes_of(order_id).to_vec();
        for node in &nodes {
            self.settle(order_id, *node, period)?;
        }

        let served: Vec<AccountId> = nodes
            .iter()
            .copied()
            .filter(|node| {
                self.ledger
                    .assignment(order_id, *node)
                    .is_some_and(|assignment| self.effective_start(assignment) < period)
            })
            .collect();
        let remaining = self
            .ledger
            .order(order_id)
            .map_or(Amount::ZERO, Order::remaining_escrow);
        let penalty = if served.is_empty() {
            Amount::ZERO
        } else {
            remaining.mul_bps(self.config.limits.cancel_penalty_bps)
        };

        for (node, share) in split_penalty(penalty, &served) {
            self.payouts.credit(PayoutKind::Reward, node, share)?;
            self.totals.record_payout(share);
            self.events.push(MarketEvent::RewardSettled {
                order_id,
                node,
                amount: share,
            });
        }
        self.ledger.apply_penalty(order_id, penalty);

        let refund = self.destroy_order(order_id)?;

        info!(
            order_id = order_id.0,
            penalty = penalty.to_base_units(),
            refund = refund.to_base_units(),
            shared_by = served.len(),
            "🚫 Order cancelled"
        );
        self.events.push(MarketEvent::OrderCancelled {
            order_id,
            penalty,
            refund,
        });
        Ok(Outcome::Cancelled {
            order_id,
            penalty,
            refund,
        })
    }

    /// Closes an order whose last period has passed. Anyone may call.
    pub fn complete_expired(&mut self, ctx: &CallContext, order_id: OrderId) -> Result<Outcome> {
        let period = self.current_period(ctx.timestamp);
        let order = self.order_or_err(order_id)?;

        if !order.is_expired(period) {
            return Err(MarketError::OrderNotExpired {
                order: order_id,
                end_period: order.end_period(),
                current: period,
            });
        }
        let end = order.end_period();
        self.ensure_not_challenged(order_id)?;

        let refund = self.complete_order(order_id, end)?;
        Ok(Outcome::Completed { order_id, refund })
    }

    /// Owner closes an order early; nodes are paid through the current period.
    pub fn admin_complete(&mut self, ctx: &CallContext, order_id: OrderId) -> Result<Outcome> {
        self.require_owner(ctx)?;
        let period = self.current_period(ctx.timestamp);
        self.order_or_err(order_id)?;
        self.ensure_not_challenged(order_id)?;

        let refund = self.complete_order(order_id, period)?;
        Ok(Outcome::Completed { order_id, refund })
    }

    /// Caller leaves `order_id`, forfeiting up to `quit_slash_periods` of
    /// service value from its collateral.
    pub fn quit(&mut self, ctx: &CallContext, order_id: OrderId) -> Result<Outcome> {
        let node = ctx.caller;
        let period = self.current_period(ctx.timestamp);
        let order = self.order_or_err(order_id)?;

        if self.ledger.assignment(order_id, node).is_none() {
            return Err(MarketError::NotAssigned {
                order: order_id,
                node,
            });
        }
        if self.scheduler.has_unresolved_obligation(node) {
            return Err(MarketError::UnresolvedObligation(node));
        }

        let size = order.max_size;
        let remaining_periods = order.end_period().saturating_sub(period);
        let penalty =
            order.service_value(self.config.limits.quit_slash_periods.min(remaining_periods));
        let slash = match self.registry.node_info(node) {
            Some(info) => {
                // Keep enough stake to back every other assignment.
                let reserved = self
                    .registry
                    .stake_per_byte()
                    .checked_mul(info.used.saturating_sub(size))
                    .unwrap_or(info.stake);
                penalty.min(info.stake.saturating_sub(reserved))
            }
            None => Amount::ZERO,
        };

        self.settle(order_id, node, period)?;
        self.ledger.remove_assignment(order_id, node);
        self.release_capacity(node, size);

        let slashed = if slash.is_zero() {
            Amount::ZERO
        } else {
            self.apply_slash(node, slash, None, period)?.slashed
        };
        self.signal_under_replication(order_id);

        info!(
            order_id = order_id.0,
            node = %node,
            slashed = slashed.to_base_units(),
            "🚪 Node quit order"
        );
        self.events.push(MarketEvent::NodeQuit {
            order_id,
            node,
            slashed,
        });
        Ok(Outcome::Quit { order_id, slashed })
    }

    // ---------------------------------------------------------------------
    // Withdrawals
    // ---------------------------------------------------------------------

    /// Settles every assignment of the caller through the current period
    /// and transfers the whole reward balance.
    pub fn claim_rewards(&mut self, ctx: &CallContext) -> Result<Outcome> {
        self.guard.enter()?;
        let result = self.claim_rewards_locked(ctx);
        self.guard.exit();
        result
    }

    fn claim_rewards_locked(&mut self, ctx: &CallContext) -> Result<Outcome> {
        let node = ctx.caller;
        let period = self.current_period(ctx.timestamp);
        let dues = self.settlement_preview(node, period);
        let extra = dues
            .iter()
            .try_fold(Amount::ZERO, |total, (_, due)| total.checked_add(*due))
            .ok_or_else(|| MarketError::AmountOverflow("reward claim".to_string()))?;

        // Settlements are booked only once the transfer went through.
        let amount = self.payouts.withdraw_with_extra(
            PayoutKind::Reward,
            node,
            extra,
            self.sink.as_mut(),
        )?;
        for (order_id, due) in dues {
            self.ledger.apply_settlement(order_id, node, due);
            self.totals.record_payout(due);
            self.events.push(MarketEvent::RewardSettled {
                order_id,
                node,
                amount: due,
            });
        }

        self.events.push(MarketEvent::Withdrawal {
            account: node,
            kind: PayoutKind::Reward,
            amount,
        });
        Ok(Outcome::Withdrawn {
            kind: PayoutKind::Reward,
            amount,
        })
    }

    pub fn claim_reporter_rewards(&mut self, ctx: &CallContext) -> Result<Outcome> {
        self.withdraw(ctx, PayoutKind::ReporterReward)
    }

    pub fn withdraw_refund(&mut self, ctx: &CallContext) -> Result<Outcome> {
        self.withdraw(ctx, PayoutKind::Refund)
    }

    fn withdraw(&mut self, ctx: &CallContext, kind: PayoutKind) -> Result<Outcome> {
        self.guard.enter()?;
        let result = self
            .payouts
            .withdraw(kind, ctx.caller, self.sink.as_mut())
            .map_err(MarketError::from);
        self.guard.exit();

        let amount = result?;
        self.events.push(MarketEvent::Withdrawal {
            account: ctx.caller,
            kind,
            amount,
        });
        Ok(Outcome::Withdrawn { kind, amount })
    }

    // ---------------------------------------------------------------------
    // Slashing
    // ---------------------------------------------------------------------

    /// Owner-initiated slash. Proceeds are burned in full.
    pub fn authority_slash(
        &mut self,
        ctx: &CallContext,
        node: AccountId,
        amount: Amount,
        reason: &str,
    ) -> Result<Outcome> {
        self.require_owner(ctx)?;
        if !self.registry.is_valid_node(node) {
            return Err(MarketError::UnknownNode(node));
        }
        if amount.is_zero() {
            return Err(MarketError::InvalidParameter(
                "slash amount must be non-zero".to_string(),
            ));
        }

        warn!(node = %node, amount = amount.to_base_units(), reason, "⚖️ Authority slash");
        let period = self.current_period(ctx.timestamp);
        let outcome = self.apply_slash(node, amount, None, period)?;
        Ok(Outcome::Slashed {
            node,
            slashed: outcome.slashed,
            forced_exit: outcome.forced_exit,
        })
    }

    /// Slashes through the registry, splits the proceeds and runs the
    /// forced exit when the remaining stake no longer backs used capacity.
    pub(crate) fn apply_slash(
        &mut self,
        node: AccountId,
        amount: Amount,
        reporter: Option<AccountId>,
        period: u64,
    ) -> Result<SlashOutcome> {
        let outcome = self.registry.slash_node(node, amount);
        let split = split_slash(outcome.slashed, reporter, node, self.config.reporter_bps);

        if let Some(reporter) = split.reporter {
            self.payouts
                .credit(PayoutKind::ReporterReward, reporter, split.reporter_reward)?;
        }
        if !split.burned.is_zero() {
            self.sink.burn(split.burned);
        }
        self.totals
            .record_slash(outcome.slashed, split.reporter_reward, split.burned);
        self.events.push(MarketEvent::NodeSlashed {
            node,
            slashed: outcome.slashed,
            reporter: split.reporter,
            reporter_reward: split.reporter_reward,
            burned: split.burned,
        });

        if outcome.forced_exit {
            self.force_exit(node, period)?;
        }
        Ok(outcome)
    }

    // ---------------------------------------------------------------------
    // Challenges
    // ---------------------------------------------------------------------

    /// Caller answers the challenge in `slot`. An accepted proof also pays
    /// for a sweep of expired slots and rotates the slot to a new target.
    pub fn submit_proof(
        &mut self,
        ctx: &CallContext,
        slot: usize,
        proof: &[u8],
        commitment: [u8; 32],
    ) -> Result<Outcome> {
        let challenge = self.scheduler.slot(slot)?;
        let randomness = challenge.randomness;
        let target = challenge.target.ok_or(MarketError::SlotIdle(slot))?;

        if target.node != ctx.caller {
            return Err(MarketError::NotChallengeTarget {
                slot,
                caller: ctx.caller,
            });
        }
        if ctx.height > target.deadline {
            return Err(MarketError::ChallengeDeadlinePassed {
                slot,
                deadline: target.deadline,
                height: ctx.height,
            });
        }
        let fingerprint = self.order_or_err(target.order)?.file.fingerprint;
        let info = self
            .registry
            .node_info(target.node)
            .ok_or(MarketError::UnknownNode(target.node))?;

        let inputs = PublicInputs {
            commitment,
            randomness,
            identity_key: info.identity_key,
            identity_aux: info.identity_aux,
            fingerprint,
        };
        if let Err(rejection) = self.verifier.verify(proof, &inputs.to_array()) {
            warn!(slot, node = %ctx.caller, reason = %rejection, "❌ Proof rejected");
            return Err(MarketError::ProofRejected(rejection.0));
        }

        info!(slot, order_id = target.order.0, node = %target.node, "✅ Challenge proved");
        self.events.push(MarketEvent::ChallengeProved {
            slot,
            order_id: target.order,
            node: target.node,
        });

        let mut budget = CallBudget::new(self.scheduler.config());
        self.sweep_expired_slots(ctx, &mut budget)?;

        let slot_bytes = (slot as u64).to_le_bytes();
        let seed = self.derive_randomness("arca/proof", &[&commitment[..], &slot_bytes[..]]);
        let next = self.advance_slot(slot, seed, ctx, &mut budget)?;
        Ok(Outcome::ProofAccepted { slot, next })
    }

    /// Rotates `slot` to a fresh target and records the resulting event.
    pub(crate) fn advance_slot(
        &mut self,
        slot: usize,
        seed: [u8; 32],
        ctx: &CallContext,
        budget: &mut CallBudget,
    ) -> Result<Option<ChallengeTarget>> {
        let period = self.current_period(ctx.timestamp);
        let mut view = EligibleView::new(&mut self.ledger, period);
        let outcome = self
            .scheduler
            .advance(slot, seed, ctx.height, &mut view, budget)?;

        match outcome {
            AdvanceOutcome::Issued(target) => {
                self.events.push(MarketEvent::ChallengeIssued {
                    slot,
                    order_id: target.order,
                    node: target.node,
                    deadline: target.deadline,
                });
                Ok(Some(target))
            }
            AdvanceOutcome::Idle => {
                self.events.push(MarketEvent::SlotIdle { slot });
                Ok(None)
            }
        }
    }

    pub(crate) fn derive_randomness(&mut self, domain: &str, parts: &[&[u8]]) -> [u8; 32] {
        self.nonce += 1;
        let nonce = self.nonce.to_le_bytes();
        let mut inputs: Vec<&[u8]> = parts.to_vec();
        inputs.push(&nonce);
        self.randomness.derive(domain, &inputs)
    }

    // ---------------------------------------------------------------------
    // Registry passthrough
    // ---------------------------------------------------------------------

    pub fn decrease_capacity(&mut self, ctx: &CallContext, amount: u64) -> Result<Outcome> {
        if self.scheduler.has_unresolved_obligation(ctx.caller) {
            return Err(MarketError::UnresolvedObligation(ctx.caller));
        }
        self.registry
            .decrease_capacity(ctx.caller, amount, &self.scheduler)?;
        Ok(Outcome::Updated)
    }

    pub fn unstake(&mut self, ctx: &CallContext) -> Result<Outcome> {
        if self.scheduler.has_unresolved_obligation(ctx.caller) {
            return Err(MarketError::UnresolvedObligation(ctx.caller));
        }
        self.guard.enter()?;
        let result = self.registry.unstake(ctx.caller, &self.scheduler);
        self.guard.exit();
        Ok(Outcome::Unstaked { stake: result? })
    }

    // ---------------------------------------------------------------------
    // Owner setters
    // ---------------------------------------------------------------------

    pub fn transfer_ownership(&mut self, ctx: &CallContext, new_owner: AccountId) -> Result<Outcome> {
        self.require_owner(ctx)?;
        info!(from = %self.owner, to = %new_owner, "👑 Ownership transferred");
        self.owner = new_owner;
        Ok(Outcome::Updated)
    }

    pub fn set_reporter_bps(&mut self, ctx: &CallContext, bps: u64) -> Result<Outcome> {
        self.require_owner(ctx)?;
        if bps > self.config.max_reporter_bps {
            return Err(MarketError::InvalidParameter(format!(
                "reporter_bps {} exceeds maximum {}",
                bps, self.config.max_reporter_bps
            )));
        }
        self.config.reporter_bps = bps;
        info!(bps, "🔧 Reporter share updated");
        Ok(Outcome::Updated)
    }

    pub fn set_challenge_window(&mut self, ctx: &CallContext, window: u64) -> Result<Outcome> {
        self.require_owner(ctx)?;
        self.scheduler.set_challenge_window(window)?;
        self.config.challenge.challenge_window = window;
        info!(window, "🔧 Challenge window updated");
        Ok(Outcome::Updated)
    }

    pub fn set_challenge_slash_amount(
        &mut self,
        ctx: &CallContext,
        amount: Amount,
    ) -> Result<Outcome> {
        self.require_owner(ctx)?;
        self.scheduler.set_slash_amount(amount);
        self.config.challenge.slash_amount = amount;
        info!(amount = amount.to_base_units(), "🔧 Challenge slash amount updated");
        Ok(Outcome::Updated)
    }

    pub fn set_quit_slash_periods(&mut self, ctx: &CallContext, periods: u64) -> Result<Outcome> {
        self.require_owner(ctx)?;
        self.config.limits.quit_slash_periods = periods;
        info!(periods, "🔧 Quit slash periods updated");
        Ok(Outcome::Updated)
    }

    // ---------------------------------------------------------------------
    // Internal bookkeeping
    // ---------------------------------------------------------------------

    fn require_owner(&self, ctx: &CallContext) -> Result<()> {
        if ctx.caller != self.owner {
            return Err(MarketError::Unauthorized(ctx.caller));
        }
        Ok(())
    }

    fn order_or_err(&self, order_id: OrderId) -> Result<&Order> {
        self.ledger
            .order(order_id)
            .ok_or(MarketError::OrderNotFound(order_id))
    }

    fn ensure_not_challenged(&self, order_id: OrderId) -> Result<()> {
        if self.scheduler.is_order_challenged(order_id) {
            return Err(MarketError::UnderChallenge(order_id));
        }
        Ok(())
    }

    fn effective_start(&self, assignment: &Assignment) -> u64 {
        self.config.time.first_full_period(assignment.joined_at)
    }

    /// Credits `node` with whatever it earned on `order_id` through
    /// `until_period` and has not yet been credited.
    pub(crate) fn settle(
        &mut self,
        order_id: OrderId,
        node: AccountId,
        until_period: u64,
    ) -> Result<Amount> {
        let due = self
            .ledger
            .settlement_due(order_id, node, until_period, &self.config.time);
        if due.is_zero() {
            return Ok(Amount::ZERO);
        }

        self.payouts.credit(PayoutKind::Reward, node, due)?;
        self.ledger.apply_settlement(order_id, node, due);
        self.totals.record_payout(due);
        self.events.push(MarketEvent::RewardSettled {
            order_id,
            node,
            amount: due,
        });
        Ok(due)
    }

    fn settlement_preview(&self, node: AccountId, period: u64) -> Vec<(OrderId, Amount)> {
        self.ledger
            .orders_of(node)
            .iter()
            .map(|order_id| {
                (
                    *order_id,
                    self.ledger
                        .settlement_due(*order_id, node, period, &self.config.time),
                )
            })
            .filter(|(_, due)| !due.is_zero())
            .collect()
    }

    /// Settles every node through `until_period`, then destroys the order.
    pub(crate) fn complete_order(&mut self, order_id: OrderId, until_period: u64) -> Result<Amount> {
        let nodes = self.ledger.nodes_of(order_id).to_vec();
        for node in nodes {
            self.settle(order_id, node, until_period)?;
        }
        let refund = self.destroy_order(order_id)?;

        info!(order_id = order_id.0, refund = refund.to_base_units(), "🏁 Order completed");
        self.events
            .push(MarketEvent::OrderCompleted { order_id, refund });
        Ok(refund)
    }

    /// Queues the unpaid remainder for the owner and removes the order.
    fn destroy_order(&mut self, order_id: OrderId) -> Result<Amount> {
        let order = self.order_or_err(order_id)?;
        let owner = order.owner;
        let refund = order.remaining_escrow();

        self.payouts.credit(PayoutKind::Refund, owner, refund)?;
        let Some((order, nodes)) = self.ledger.remove_order(order_id) else {
            return Err(MarketError::OrderNotFound(order_id));
        };
        for node in nodes {
            self.release_capacity(node, order.max_size);
        }
        self.totals.record_refund(refund);
        self.totals.record_cleared(order.escrow, order.paid_out);
        Ok(refund)
    }

    pub(crate) fn release_capacity(&mut self, node: AccountId, size: u64) {
        let Some(info) = self.registry.node_info(node) else {
            return;
        };
        if let Err(err) = self
            .registry
            .update_node_used(node, info.used.saturating_sub(size))
        {
            warn!(node = %node, error = %err, "Failed to release node capacity");
        }
    }

    pub(crate) fn signal_under_replication(&mut self, order_id: OrderId) {
        let Some(order) = self.ledger.order(order_id) else {
            return;
        };
        if order.filled < order.replicas {
            debug!(order_id = order_id.0, filled = order.filled, replicas = order.replicas, "Order under-replicated");
            self.events.push(MarketEvent::UnderReplicated {
                order_id,
                filled: order.filled,
                replicas: order.replicas,
            });
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn current_period(&self, timestamp: u64) -> u64 {
        self.config.time.period_at(timestamp)
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.ledger.order(order_id)
    }

    pub fn nodes_of(&self, order_id: OrderId) -> &[AccountId] {
        self.ledger.nodes_of(order_id)
    }

    pub fn orders_of(&self, node: AccountId) -> &[OrderId] {
        self.ledger.orders_of(node)
    }

    pub fn assignment(&self, order_id: OrderId, node: AccountId) -> Option<&Assignment> {
        self.ledger.assignment(order_id, node)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn slot(&self, index: usize) -> Result<&ChallengeSlot> {
        Ok(self.scheduler.slot(index)?)
    }

    pub fn slots(&self) -> &[ChallengeSlot] {
        self.scheduler.slots()
    }

    pub fn scheduler(&self) -> &ChallengeScheduler {
        &self.scheduler
    }

    pub fn pending_refund(&self, account: AccountId) -> Amount {
        self.payouts.pending(PayoutKind::Refund, account)
    }

    pub fn pending_reward(&self, account: AccountId) -> Amount {
        self.payouts.pending(PayoutKind::Reward, account)
    }

    pub fn pending_reporter_reward(&self, account: AccountId) -> Amount {
        self.payouts.pending(PayoutKind::ReporterReward, account)
    }

    pub fn payouts(&self) -> &PayoutLedger {
        &self.payouts
    }

    pub fn totals(&self) -> &MarketTotals {
        &self.totals
    }

    pub fn active_order_count(&self) -> usize {
        self.ledger.active().len()
    }

    pub fn eligible_order_count(&self) -> usize {
        self.ledger.eligible().len()
    }

    pub fn has_unresolved_obligation(&self, node: AccountId) -> bool {
        self.scheduler.has_unresolved_obligation(node)
    }

    /// Reward `node` would receive by claiming at `timestamp`. Read-only.
    pub fn claimable_rewards(&self, node: AccountId, timestamp: u64) -> Amount {
        let period = self.current_period(timestamp);
        self.settlement_preview(node, period)
            .into_iter()
            .fold(self.pending_reward(node), |total, (_, due)| {
                total.saturating_add(due)
            })
    }

    /// Up to `count` distinct challenge-eligible orders in seed-dependent
    /// order.
    pub fn sample_eligible(&self, seed: &[u8; 32], count: usize) -> Vec<OrderId> {
        self.ledger.eligible().sample(seed, count)
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.registry.network_stats()
    }

    pub fn node_info(&self, node: AccountId) -> Option<NodeInfo> {
        self.registry.node_info(node)
    }

    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<MarketEvent> {
        std::mem::take(&mut self.events)
    }

    /// Cross-checks indexes, slot references and challenge counters.
    pub fn is_consistent(&self) -> bool {
        let slots_ok = self
            .scheduler
            .slots()
            .iter()
            .filter_map(|slot| slot.target)
            .all(|target| {
                self.ledger.eligible().contains(&target.order)
                    && self.ledger.nodes_of(target.order).contains(&target.node)
            });
        slots_ok && self.scheduler.counters_consistent() && self.ledger.is_consistent()
    }
}
