//! Order table, node assignments and the two order indexes.
//!
//! The ledger is pure bookkeeping: it never talks to the registry, the payout
//! balances or the scheduler. `Market` composes those around it.

use crate::index::SwapIndex;
use crate::types::{Assignment, Order};
use arca_challenges::ChallengeTargets;
use arca_economics::Amount;
use arca_types::{AccountId, OrderId, TimeConfig};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Ledger {
    orders: HashMap<OrderId, Order>,
    assignments: HashMap<(OrderId, AccountId), Assignment>,
    order_nodes: HashMap<OrderId, SwapIndex<AccountId>>,
    node_orders: HashMap<AccountId, SwapIndex<OrderId>>,
    /// Every live order
    active: SwapIndex<OrderId>,
    /// Live orders with at least one assigned node
    eligible: SwapIndex<OrderId>,
    /// Expired orders the scheduler dropped from `eligible` that still await
    /// destruction
    evicted: HashSet<OrderId>,
    next_id: OrderId,
    cleanup_cursor: usize,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            orders: HashMap::new(),
            assignments: HashMap::new(),
            order_nodes: HashMap::new(),
            node_orders: HashMap::new(),
            active: SwapIndex::new(),
            eligible: SwapIndex::new(),
            evicted: HashSet::new(),
            next_id: OrderId::FIRST,
            cleanup_cursor: 0,
        }
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_order_id(&self) -> OrderId {
        self.next_id
    }

    /// Stores a freshly placed order and puts it in the active index.
    pub fn insert_order(&mut self, order: Order) {
        let id = order.id;
        if id >= self.next_id {
            self.next_id = id.next();
        }
        self.orders.insert(id, order);
        self.active.insert(id);
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn assignment(&self, order: OrderId, node: AccountId) -> Option<&Assignment> {
        self.assignments.get(&(order, node))
    }

    pub fn nodes_of(&self, order: OrderId) -> &[AccountId] {
        self.order_nodes
            .get(&order)
            .map(SwapIndex::as_slice)
            .unwrap_or(&[])
    }

    pub fn orders_of(&self, node: AccountId) -> &[OrderId] {
        self.node_orders
            .get(&node)
            .map(SwapIndex::as_slice)
            .unwrap_or(&[])
    }

    pub fn active(&self) -> &SwapIndex<OrderId> {
        &self.active
    }

    pub fn eligible(&self) -> &SwapIndex<OrderId> {
        &self.eligible
    }

    pub fn is_evicted(&self, id: OrderId) -> bool {
        self.evicted.contains(&id)
    }

    /// Records `node` joining `order` at `joined_at`. The first assignment
    /// makes the order challenge-eligible.
    pub fn add_assignment(&mut self, order: OrderId, node: AccountId, joined_at: u64) {
        let Some(entry) = self.orders.get_mut(&order) else {
            return;
        };
        entry.filled += 1;
        if entry.filled == 1 {
            self.eligible.insert(order);
        }

        self.assignments
            .insert((order, node), Assignment::new(joined_at));
        self.order_nodes.entry(order).or_default().insert(node);
        self.node_orders.entry(node).or_default().insert(order);
    }

    /// Drops one assignment. The order leaves the eligible index when its
    /// last node leaves.
    pub fn remove_assignment(&mut self, order: OrderId, node: AccountId) -> Option<Assignment> {
        let assignment = self.assignments.remove(&(order, node))?;

        if let Some(nodes) = self.order_nodes.get_mut(&order) {
            nodes.remove(&node);
            if nodes.is_empty() {
                self.order_nodes.remove(&order);
            }
        }
        if let Some(orders) = self.node_orders.get_mut(&node) {
            orders.remove(&order);
            if orders.is_empty() {
                self.node_orders.remove(&node);
            }
        }
        if let Some(entry) = self.orders.get_mut(&order) {
            entry.filled = entry.filled.saturating_sub(1);
            if entry.filled == 0 && self.eligible.contains(&order) {
                self.eligible.remove(&order);
            }
        }
        Some(assignment)
    }

    /// Amount `node` has earned on `order` through `until_period` and not
    /// yet been credited.
    ///
    /// Service starts at the first period boundary at or after the join
    /// instant, so a partially served period never pays.
    pub fn settlement_due(
        &self,
        order: OrderId,
        node: AccountId,
        until_period: u64,
        time: &TimeConfig,
    ) -> Amount {
        let (Some(entry), Some(assignment)) = (self.orders.get(&order), self.assignment(order, node))
        else {
            return Amount::ZERO;
        };

        let start = time
            .first_full_period(assignment.joined_at)
            .max(entry.start_period);
        let end = until_period.min(entry.end_period());
        let gross = entry.service_value(end.saturating_sub(start));

        gross
            .saturating_sub(assignment.earned)
            .min(entry.remaining_escrow())
    }

    /// Books `amount` as paid to `node` out of `order`'s escrow.
    pub fn apply_settlement(&mut self, order: OrderId, node: AccountId, amount: Amount) {
        if amount.is_zero() {
            return;
        }
        if let Some(assignment) = self.assignments.get_mut(&(order, node)) {
            assignment.earned = assignment.earned.saturating_add(amount);
        }
        if let Some(entry) = self.orders.get_mut(&order) {
            entry.paid_out = entry.paid_out.saturating_add(amount);
        }
    }

    /// Moves `amount` of escrow to paid-out without an assignment, used for
    /// cancellation penalties.
    pub fn apply_penalty(&mut self, order: OrderId, amount: Amount) {
        if let Some(entry) = self.orders.get_mut(&order) {
            entry.paid_out = entry.paid_out.saturating_add(amount);
        }
    }

    /// Deletes an order together with its remaining assignments and index
    /// entries. Returns the order and the nodes that were still serving it.
    pub fn remove_order(&mut self, id: OrderId) -> Option<(Order, Vec<AccountId>)> {
        let nodes = self.nodes_of(id).to_vec();
        for node in &nodes {
            self.remove_assignment(id, *node);
        }

        let order = self.orders.remove(&id)?;
        self.active.remove(&id);
        if self.eligible.contains(&id) {
            self.eligible.remove(&id);
        }
        self.evicted.remove(&id);
        debug!(order_id = id.0, "🗑️ Order removed from ledger");
        Some((order, nodes))
    }

    pub fn cleanup_cursor(&self) -> usize {
        self.cleanup_cursor
    }

    pub fn set_cleanup_cursor(&mut self, cursor: usize) {
        self.cleanup_cursor = cursor;
    }

    /// Index bookkeeping check used by tests. Bidirectional maps must agree
    /// and every order must respect its escrow bounds. The eligible index
    /// holds exactly the orders with nodes that were not evicted after
    /// expiring.
    pub fn is_consistent(&self) -> bool {
        let filled_ok = self.orders.values().all(|order| {
            order.filled as usize == self.nodes_of(order.id).len()
                && order.filled <= order.replicas
                && order.paid_out <= order.escrow
                && self.eligible.contains(&order.id)
                    == (order.filled > 0 && !self.evicted.contains(&order.id))
                && self.active.contains(&order.id)
        });
        let reverse_ok = self.assignments.keys().all(|(order, node)| {
            self.nodes_of(*order).contains(node) && self.orders_of(*node).contains(order)
        });
        filled_ok
            && reverse_ok
            && self.active.len() == self.orders.len()
            && self.eligible.iter().all(|id| self.orders.contains_key(id))
            && self
                .evicted
                .iter()
                .all(|id| self.orders.contains_key(id) && !self.eligible.contains(id))
    }
}

/// The ledger seen by the challenge scheduler at a given period.
pub struct EligibleView<'a> {
    ledger: &'a mut Ledger,
    current_period: u64,
}

impl<'a> EligibleView<'a> {
    pub fn new(ledger: &'a mut Ledger, current_period: u64) -> Self {
        Self {
            ledger,
            current_period,
        }
    }
}

impl ChallengeTargets for EligibleView<'_> {
    fn eligible_len(&self) -> usize {
        self.ledger.eligible.len()
    }

    fn eligible_at(&self, position: usize) -> Option<OrderId> {
        self.ledger.eligible.get(position)
    }

    fn is_expired(&self, order: OrderId) -> bool {
        self.ledger
            .order(order)
            .map_or(true, |entry| entry.is_expired(self.current_period))
    }

    fn nodes_of(&self, order: OrderId) -> &[AccountId] {
        self.ledger.nodes_of(order)
    }

    fn evict(&mut self, order: OrderId) {
        if self.ledger.eligible.remove(&order) {
            self.ledger.evicted.insert(order);
            debug!(order_id = order.0, "🧹 Expired order evicted from eligible index");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_types::FileDescriptor;

    fn order(id: u64, replicas: u32) -> Order {
        Order {
            id: OrderId(id),
            owner: AccountId::derive(b"payer"),
            file: FileDescriptor::from_content(b"data", "ipfs://data"),
            max_size: 10,
            periods: 2,
            replicas,
            price: Amount::from_base_units(1),
            filled: 0,
            start_period: 0,
            escrow: Amount::from_base_units(20 * u64::from(replicas)),
            paid_out: Amount::ZERO,
        }
    }

    fn time() -> TimeConfig {
        TimeConfig {
            genesis: 0,
            period_length: 100,
            epoch_length: 10,
            step_length: 1,
        }
    }

    #[test]
    fn test_eligibility_follows_assignments() {
        let mut ledger = Ledger::new();
        let (a, b) = (AccountId::derive(b"a"), AccountId::derive(b"b"));
        ledger.insert_order(order(1, 2));
        assert!(!ledger.eligible().contains(&OrderId(1)));

        ledger.add_assignment(OrderId(1), a, 0);
        ledger.add_assignment(OrderId(1), b, 0);
        assert!(ledger.eligible().contains(&OrderId(1)));
        assert_eq!(ledger.nodes_of(OrderId(1)).len(), 2);

        ledger.remove_assignment(OrderId(1), a);
        assert!(ledger.eligible().contains(&OrderId(1)));
        ledger.remove_assignment(OrderId(1), b);
        assert!(!ledger.eligible().contains(&OrderId(1)));
        assert!(ledger.is_consistent());
    }

    #[test]
    fn test_remove_order_after_eviction() {
        let mut ledger = Ledger::new();
        let node = AccountId::derive(b"a");
        ledger.insert_order(order(1, 1));
        ledger.add_assignment(OrderId(1), node, 0);

        EligibleView::new(&mut ledger, 5).evict(OrderId(1));
        assert!(!ledger.eligible().contains(&OrderId(1)));
        assert!(ledger.is_evicted(OrderId(1)));
        assert!(ledger.is_consistent());

        let (removed, nodes) = ledger.remove_order(OrderId(1)).unwrap();
        assert_eq!(removed.id, OrderId(1));
        assert_eq!(nodes, vec![node]);
        assert!(ledger.orders_of(node).is_empty());
        assert!(ledger.active().is_empty());
        assert!(!ledger.is_evicted(OrderId(1)));
        assert!(ledger.is_consistent());
    }

    #[test]
    fn test_settlement_skips_partial_period() {
        let mut ledger = Ledger::new();
        let node = AccountId::derive(b"a");
        ledger.insert_order(order(1, 1));
        ledger.add_assignment(OrderId(1), node, 99);

        assert_eq!(
            ledger.settlement_due(OrderId(1), node, 2, &time()),
            Amount::from_base_units(10)
        );

        ledger.apply_settlement(OrderId(1), node, Amount::from_base_units(10));
        assert_eq!(ledger.settlement_due(OrderId(1), node, 2, &time()), Amount::ZERO);
        assert_eq!(ledger.order(OrderId(1)).unwrap().paid_out, Amount::from_base_units(10));
    }
}
