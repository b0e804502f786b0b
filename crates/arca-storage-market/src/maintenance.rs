//! Bounded maintenance passes.
//!
//! Every pass is capped by a per-call budget and leaves leftover work for the
//! next call: expired challenge slots are swept (and slashed) at most
//! `max_sweeps_per_call` at a time, idle slots are re-activated, and the
//! active index is walked from a persisted cursor by the cleanup pass.

use crate::command::CallContext;
use crate::error::Result;
use crate::events::MarketEvent;
use crate::market::Market;
use arca_challenges::CallBudget;
use arca_economics::Amount;
use arca_types::{AccountId, OrderId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What one maintenance call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    /// Expired slots processed
    pub swept: u32,
    /// Collateral slashed by this call
    pub slashed: Amount,
    /// Idle slots that received a target
    pub activated: u32,
    /// Expired orders dropped from the eligible index
    pub evicted: u32,
    /// Expired orders destroyed by the cleanup pass
    pub cleaned: u32,
    pub eligible_remaining: usize,
    pub active_remaining: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SweepSummary {
    pub swept: u32,
    pub slashed: Amount,
}

impl Market {
    /// Sweeps expired slots, refills idle slots and runs one cleanup pass.
    /// The caller is credited as reporter for every slash.
    pub fn trigger_maintenance(&mut self, ctx: &CallContext) -> Result<MaintenanceReport> {
        let mut budget = CallBudget::new(self.scheduler.config());

        let sweep = self.sweep_expired_slots(ctx, &mut budget)?;
        let activated = self.activate_idle_slots(ctx, &mut budget)?;
        let cleaned = self.cleanup_expired_orders(ctx)?;

        let report = MaintenanceReport {
            swept: sweep.swept,
            slashed: sweep.slashed,
            activated,
            evicted: budget.evicted(),
            cleaned,
            eligible_remaining: self.ledger.eligible().len(),
            active_remaining: self.ledger.active().len(),
        };
        info!(
            reporter = %ctx.caller,
            swept = report.swept,
            activated = report.activated,
            evicted = report.evicted,
            cleaned = report.cleaned,
            eligible_remaining = report.eligible_remaining,
            "🔧 Maintenance complete"
        );
        Ok(report)
    }

    /// Slashes the target of every expired slot (within budget) and rotates
    /// the slot with randomness derived from its prior seed.
    pub(crate) fn sweep_expired_slots(
        &mut self,
        ctx: &CallContext,
        budget: &mut CallBudget,
    ) -> Result<SweepSummary> {
        let period = self.current_period(ctx.timestamp);
        let mut summary = SweepSummary::default();

        for slot in self.scheduler.expired_slots(ctx.height) {
            // A forced exit earlier in this loop may have released the slot.
            let prior = self.scheduler.slot(slot)?;
            if !prior.is_expired(ctx.height) {
                continue;
            }
            let prior_seed = prior.randomness;
            if !budget.try_sweep() {
                debug!(slot, "⏸️ Sweep budget exhausted");
                break;
            }

            // Released before slashing so the obligation is judged once.
            let Some(target) = self.scheduler.release(slot)? else {
                continue;
            };
            warn!(
                slot,
                order_id = target.order.0,
                node = %target.node,
                deadline = target.deadline,
                height = ctx.height,
                "⏰ Challenge expired"
            );
            self.events.push(MarketEvent::ChallengeExpired {
                slot,
                order_id: target.order,
                node: target.node,
            });

            let mut amount = self.scheduler.config().slash_amount;
            if let Some(info) = self.registry.node_info(target.node) {
                amount = amount.min(info.stake);
            }
            let outcome = self.apply_slash(target.node, amount, Some(ctx.caller), period)?;
            summary.swept += 1;
            summary.slashed = summary.slashed.saturating_add(outcome.slashed);

            let slot_bytes = (slot as u64).to_le_bytes();
            let seed = self.derive_randomness(
                "arca/expiry",
                &[&prior_seed[..], &ctx.entropy[..], &slot_bytes[..]],
            );
            self.advance_slot(slot, seed, ctx, budget)?;
        }
        Ok(summary)
    }

    fn activate_idle_slots(&mut self, ctx: &CallContext, budget: &mut CallBudget) -> Result<u32> {
        let mut activated = 0;
        for slot in self.scheduler.idle_slots() {
            if self.ledger.eligible().is_empty() {
                break;
            }
            let prior_seed = self.scheduler.slot(slot)?.randomness;
            let slot_bytes = (slot as u64).to_le_bytes();
            let seed = self.derive_randomness(
                "arca/activate",
                &[&prior_seed[..], &ctx.entropy[..], &ctx.caller.as_bytes()[..], &slot_bytes[..]],
            );
            if self.advance_slot(slot, seed, ctx, budget)?.is_some() {
                activated += 1;
            }
        }
        Ok(activated)
    }

    /// Walks the active index from the saved cursor and destroys expired,
    /// unchallenged orders, settling their nodes through the order end.
    fn cleanup_expired_orders(&mut self, ctx: &CallContext) -> Result<u32> {
        let period = self.current_period(ctx.timestamp);
        let scan_limit = self.config.limits.cleanup_scan_limit;
        let batch = self.config.limits.cleanup_batch;

        let mut cursor = self.ledger.cleanup_cursor();
        let mut scanned = 0u32;
        let mut cleaned = 0u32;

        while scanned < scan_limit && cleaned < batch {
            let len = self.ledger.active().len();
            if len == 0 {
                cursor = 0;
                break;
            }
            if cursor >= len {
                cursor = 0;
            }
            let Some(order_id) = self.ledger.active().get(cursor) else {
                break;
            };
            scanned += 1;

            let end = match self.ledger.order(order_id) {
                Some(order) if order.is_expired(period) => Some(order.end_period()),
                _ => None,
            };
            match end {
                Some(end) if !self.scheduler.is_order_challenged(order_id) => {
                    // The last active entry now sits at `cursor`.
                    self.complete_order(order_id, end)?;
                    cleaned += 1;
                }
                _ => cursor += 1,
            }
        }

        self.ledger.set_cleanup_cursor(cursor);
        if cleaned > 0 {
            debug!(scanned, cleaned, cursor, "🧹 Cleanup pass");
        }
        Ok(cleaned)
    }

    /// Removes every assignment of `node` after a slash left it
    /// under-collateralized, and frees the slots that targeted it.
    pub(crate) fn force_exit(&mut self, node: AccountId, period: u64) -> Result<()> {
        let orders: Vec<OrderId> = self.ledger.orders_of(node).to_vec();
        let mut released = 0u64;

        for order_id in &orders {
            self.settle(*order_id, node, period)?;
            if let Some(order) = self.ledger.order(*order_id) {
                released = released.saturating_add(order.max_size);
            }
            self.ledger.remove_assignment(*order_id, node);
            self.signal_under_replication(*order_id);
        }

        for slot in self.scheduler.slots_targeting(node) {
            self.scheduler.release(slot)?;
            self.events.push(MarketEvent::SlotIdle { slot });
        }

        if let Some(info) = self.registry.node_info(node) {
            self.registry
                .force_reduce_used(node, info.used.saturating_sub(released));
        }

        warn!(node = %node, orders = orders.len(), released, "🚨 Forced exit");
        self.events.push(MarketEvent::ForcedExit { node, orders });
        Ok(())
    }
}
