//! Period / epoch / step clock.
//!
//! All indices are fixed-length integer divisions of the logical time elapsed
//! since genesis. Instants before genesis map to index 0.

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Logical instant at which period 0 starts.
    pub genesis: u64,
    /// Length of a billing period.
    pub period_length: u64,
    /// Length of an epoch.
    pub epoch_length: u64,
    /// Length of a step.
    pub step_length: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            genesis: 0,
            period_length: 86_400, // one day
            epoch_length: 3_600,   // one hour
            step_length: 60,       // one minute
        }
    }
}

impl TimeConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("period_length", self.period_length),
            ("epoch_length", self.epoch_length),
            ("step_length", self.step_length),
        ] {
            if value == 0 {
                return Err(TypesError::InvalidTimeConfig(format!("{} must be > 0", name)));
            }
        }
        Ok(())
    }

    fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.genesis)
    }

    pub fn period_at(&self, now: u64) -> u64 {
        self.elapsed(now) / self.period_length
    }

    pub fn epoch_at(&self, now: u64) -> u64 {
        self.elapsed(now) / self.epoch_length
    }

    pub fn step_at(&self, now: u64) -> u64 {
        self.elapsed(now) / self.step_length
    }

    /// First period fully covered by someone present from `instant` on.
    ///
    /// Rounds up: an instant one unit before a boundary yields the next period.
    pub fn first_full_period(&self, instant: u64) -> u64 {
        self.elapsed(instant).div_ceil(self.period_length)
    }

    /// Logical instant at which `period` begins.
    pub fn period_start(&self, period: u64) -> u64 {
        self.genesis
            .saturating_add(period.saturating_mul(self.period_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TimeConfig {
        TimeConfig {
            genesis: 1_000,
            period_length: 100,
            epoch_length: 10,
            step_length: 5,
        }
    }

    #[test]
    fn test_indices() {
        let time = config();
        assert_eq!(time.period_at(999), 0);
        assert_eq!(time.period_at(1_000), 0);
        assert_eq!(time.period_at(1_099), 0);
        assert_eq!(time.period_at(1_100), 1);
        assert_eq!(time.epoch_at(1_055), 5);
        assert_eq!(time.step_at(1_055), 11);
    }

    #[test]
    fn test_first_full_period_rounds_up() {
        let time = config();
        assert_eq!(time.first_full_period(1_000), 0);
        assert_eq!(time.first_full_period(1_001), 1);
        assert_eq!(time.first_full_period(1_099), 1);
        assert_eq!(time.first_full_period(1_100), 1);
        assert_eq!(time.first_full_period(1_101), 2);
    }

    #[test]
    fn test_period_start() {
        let time = config();
        assert_eq!(time.period_start(0), 1_000);
        assert_eq!(time.period_start(3), 1_300);
        assert_eq!(time.period_at(time.period_start(3)), 3);
    }

    #[test]
    fn test_zero_length_rejected() {
        let time = TimeConfig {
            period_length: 0,
            ..config()
        };
        assert!(time.validate().is_err());
    }
}
