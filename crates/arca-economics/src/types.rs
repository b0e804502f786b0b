use serde::{Deserialize, Serialize};
use std::fmt;

/// Basis-point denominator (100% = 10_000 bps).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Value in base units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn from_base_units(units: u64) -> Self {
        Self(units)
    }

    pub fn to_base_units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn checked_mul(&self, factor: u64) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Integer division, remainder discarded.
    pub fn div_floor(&self, divisor: u64) -> Self {
        if divisor == 0 {
            return Self::ZERO;
        }
        Self(self.0 / divisor)
    }

    /// `self * bps / 10_000`, rounded down. Never overflows.
    pub fn mul_bps(&self, bps: u64) -> Self {
        let scaled = self.0 as u128 * bps as u128 / BPS_DENOMINATOR as u128;
        Self(scaled.min(u64::MAX as u128) as u64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} units", self.0)
    }
}
