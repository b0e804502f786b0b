use arca_types::TimeConfig;
use proptest::prelude::*;

prop_compose! {
    fn arb_time_config()
        (genesis in 0u64..1_000_000, period_length in 1u64..100_000) -> TimeConfig {
        TimeConfig {
            genesis,
            period_length,
            epoch_length: 1,
            step_length: 1,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Joining at `t` never earns for a period that started before `t`.
    #[test]
    fn prop_first_full_period_starts_at_or_after_join(
        time in arb_time_config(),
        offset in 0u64..10_000_000,
    ) {
        let joined_at = time.genesis + offset;
        let first = time.first_full_period(joined_at);
        let start = time.period_start(first);
        prop_assert!(start >= joined_at);
        prop_assert!(start - joined_at < time.period_length);
    }

    #[test]
    fn prop_period_start_roundtrip(time in arb_time_config(), period in 0u64..100_000) {
        let start = time.period_start(period);
        prop_assert_eq!(time.period_at(start), period);
        prop_assert_eq!(time.first_full_period(start), period);
    }
}

#[test]
fn test_boundary_join_earns_that_period() {
    let time = TimeConfig {
        genesis: 0,
        period_length: 86_400,
        epoch_length: 3_600,
        step_length: 60,
    };
    assert_eq!(time.first_full_period(86_400), 1);
    assert_eq!(time.first_full_period(86_399), 1);
    assert_eq!(time.first_full_period(0), 0);
}
