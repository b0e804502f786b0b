use crate::error::{MarketError, Result};
use arca_challenges::ChallengeConfig;
use arca_economics::BPS_DENOMINATOR;
use arca_types::TimeConfig;
use serde::{Deserialize, Serialize};

/// Bounds on the order ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerLimits {
    /// Maximum replicas a single order may request
    pub max_replicas: u32,

    /// Maximum simultaneous assignments per node. Caps every walk over a
    /// node's order list (mass exit, reward claims).
    pub max_orders_per_node: usize,

    /// Periods of service forfeited by a voluntary quit
    pub quit_slash_periods: u64,

    /// Share of the remaining escrow paid to served nodes on cancellation
    pub cancel_penalty_bps: u64,

    /// Active-index entries examined by one cleanup pass
    pub cleanup_scan_limit: u32,

    /// Expired orders destroyed by one cleanup pass
    pub cleanup_batch: u32,
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self {
            max_replicas: 10,
            max_orders_per_node: 100,
            quit_slash_periods: 3,
            cancel_penalty_bps: 1_000, // 10%
            cleanup_scan_limit: 64,
            cleanup_batch: 8,
        }
    }
}

/// Storage market configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Share of slash proceeds credited to the reporter
    pub reporter_bps: u64,

    /// Upper bound for `reporter_bps`, fixed at construction
    pub max_reporter_bps: u64,

    pub time: TimeConfig,
    pub challenge: ChallengeConfig,
    pub limits: LedgerLimits,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            reporter_bps: 1_000,
            max_reporter_bps: 5_000,
            time: TimeConfig::default(),
            challenge: ChallengeConfig::default(),
            limits: LedgerLimits::default(),
        }
    }
}

impl MarketConfig {
    pub fn validate(&self) -> Result<()> {
        self.time.validate()?;
        self.challenge.validate()?;

        if self.max_reporter_bps > BPS_DENOMINATOR {
            return Err(MarketError::InvalidParameter(format!(
                "max_reporter_bps {} exceeds {}",
                self.max_reporter_bps, BPS_DENOMINATOR
            )));
        }
        if self.reporter_bps > self.max_reporter_bps {
            return Err(MarketError::InvalidParameter(format!(
                "reporter_bps {} exceeds max_reporter_bps {}",
                self.reporter_bps, self.max_reporter_bps
            )));
        }
        if self.limits.cancel_penalty_bps > BPS_DENOMINATOR {
            return Err(MarketError::InvalidParameter(
                "cancel_penalty_bps exceeds 100%".to_string(),
            ));
        }
        if self.limits.max_replicas == 0 || self.limits.max_orders_per_node == 0 {
            return Err(MarketError::InvalidParameter(
                "replica and per-node assignment limits must be > 0".to_string(),
            ));
        }
        if self.limits.cleanup_scan_limit == 0 || self.limits.cleanup_batch == 0 {
            return Err(MarketError::InvalidParameter(
                "cleanup budgets must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
