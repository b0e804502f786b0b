//! # Arca Storage Market
//!
//! Payers escrow funds to have files stored by `replicas` nodes. Nodes are
//! paid out of escrow for every full period they serve, and a fixed set of
//! challenge slots keeps randomly chosen nodes proving possession within a
//! deadline. Unanswered challenges slash collateral through the registry.
//!
//! ## Architecture
//!
//! - **Ledger**: orders, bidirectional node assignments and the active /
//!   challenge-eligible swap-and-pop indexes
//! - **Market**: the command state machine composing the ledger with the
//!   challenge scheduler, the pull-payment balances and the registry
//! - **Maintenance**: bounded expiry sweeps, slot refills and cleanup
//! - **Coordinator**: async wrapper serializing callers into one writer
//!
//! Every value leaving the market goes through a pull-payment balance, so a
//! recipient that refuses value only blocks its own withdrawal.

pub mod command;
pub mod config;
pub mod coordinator;
pub mod distribution;
pub mod error;
pub mod events;
pub mod index;
pub mod ledger;
pub mod maintenance;
pub mod market;
pub mod registry;
pub mod types;

pub use command::{CallContext, Command, Outcome};
pub use config::{LedgerLimits, MarketConfig};
pub use coordinator::MarketCoordinator;
pub use distribution::{split_penalty, split_slash, SlashSplit};
pub use error::{MarketError, Result};
pub use events::MarketEvent;
pub use index::SwapIndex;
pub use ledger::{EligibleView, Ledger};
pub use maintenance::MaintenanceReport;
pub use market::Market;
pub use registry::{CollateralRegistry, MemoryRegistry, NetworkStats, NodeInfo, SlashOutcome};
pub use types::{Assignment, Order};
