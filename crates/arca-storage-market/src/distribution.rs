//! Splitting slash proceeds and cancellation penalties.

use arca_economics::Amount;
use arca_types::AccountId;
use serde::{Deserialize, Serialize};

/// Where the proceeds of one slash go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashSplit {
    pub slashed: Amount,
    pub reporter: Option<AccountId>,
    pub reporter_reward: Amount,
    pub burned: Amount,
}

/// Pays `reporter_bps` of `slashed` to the reporter and burns the rest.
///
/// Authority slashes and quits pass no reporter. A node reporting its own
/// failure gets nothing.
pub fn split_slash(
    slashed: Amount,
    reporter: Option<AccountId>,
    slashed_node: AccountId,
    reporter_bps: u64,
) -> SlashSplit {
    let reporter = reporter.filter(|reporter| *reporter != slashed_node);
    let reporter_reward = match reporter {
        Some(_) => slashed.mul_bps(reporter_bps),
        None => Amount::ZERO,
    };

    SlashSplit {
        slashed,
        reporter,
        reporter_reward,
        burned: slashed.saturating_sub(reporter_reward),
    }
}

/// Splits `penalty` evenly; the last recipient absorbs the rounding remainder.
pub fn split_penalty(penalty: Amount, recipients: &[AccountId]) -> Vec<(AccountId, Amount)> {
    let Some((last, rest)) = recipients.split_last() else {
        return Vec::new();
    };

    let share = penalty.div_floor(recipients.len() as u64);
    let mut shares: Vec<(AccountId, Amount)> = rest.iter().map(|node| (*node, share)).collect();
    let distributed = share
        .checked_mul(rest.len() as u64)
        .unwrap_or(penalty);
    shares.push((*last, penalty.saturating_sub(distributed)));
    shares
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_share_and_burn() {
        let node = AccountId::derive(b"node");
        let reporter = AccountId::derive(b"reporter");

        let split = split_slash(Amount::from_base_units(1_000), Some(reporter), node, 1_000);
        assert_eq!(split.reporter_reward, Amount::from_base_units(100));
        assert_eq!(split.burned, Amount::from_base_units(900));

        let split = split_slash(Amount::from_base_units(1_000), None, node, 1_000);
        assert_eq!(split.reporter_reward, Amount::ZERO);
        assert_eq!(split.burned, Amount::from_base_units(1_000));
    }

    #[test]
    fn test_self_report_burns_everything() {
        let node = AccountId::derive(b"node");
        let split = split_slash(Amount::from_base_units(500), Some(node), node, 2_000);
        assert_eq!(split.reporter, None);
        assert_eq!(split.burned, Amount::from_base_units(500));
    }

    #[test]
    fn test_penalty_remainder_goes_to_last() {
        let nodes: Vec<AccountId> = [b"a", b"b", b"c"]
            .iter()
            .map(|n| AccountId::derive(*n))
            .collect();
        let shares = split_penalty(Amount::from_base_units(100), &nodes);

        assert_eq!(shares[0].1, Amount::from_base_units(33));
        assert_eq!(shares[1].1, Amount::from_base_units(33));
        assert_eq!(shares[2], (nodes[2], Amount::from_base_units(34)));
        assert!(split_penalty(Amount::from_base_units(5), &[]).is_empty());
    }
}
