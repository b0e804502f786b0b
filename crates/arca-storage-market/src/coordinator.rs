//! Async front for the market.
//!
//! Callers on any task submit commands here; the write lock serializes them
//! into the single writer the market expects.

use crate::command::{CallContext, Command, Outcome};
use crate::error::Result;
use crate::events::MarketEvent;
use crate::market::Market;
use crate::registry::NetworkStats;
use crate::types::Order;
use arca_economics::{Amount, MarketTotals};
use arca_types::{AccountId, OrderId};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Clone)]
pub struct MarketCoordinator {
    market: Arc<RwLock<Market>>,
}

impl MarketCoordinator {
    pub fn new(market: Market) -> Self {
        Self {
            market: Arc::new(RwLock::new(market)),
        }
    }

    /// Applies `command` under the write lock.
    pub async fn execute(&self, ctx: CallContext, command: Command) -> Result<Outcome> {
        let mut market = self.market.write().await;
        let result = market.execute(&ctx, command);
        if let Err(err) = &result {
            warn!(caller = %ctx.caller, error = %err, "Command rejected");
        }
        result
    }

    pub async fn drain_events(&self) -> Vec<MarketEvent> {
        self.market.write().await.drain_events()
    }

    pub async fn order(&self, order_id: OrderId) -> Option<Order> {
        self.market.read().await.order(order_id).cloned()
    }

    pub async fn totals(&self) -> MarketTotals {
        self.market.read().await.totals().clone()
    }

    pub async fn claimable_rewards(&self, node: AccountId, timestamp: u64) -> Amount {
        self.market.read().await.claimable_rewards(node, timestamp)
    }

    pub async fn network_stats(&self) -> NetworkStats {
        self.market.read().await.network_stats()
    }

    /// Runs a read-only query against the current state.
    pub async fn with_market<T>(&self, query: impl FnOnce(&Market) -> T) -> T {
        let market = self.market.read().await;
        query(&market)
    }
}
