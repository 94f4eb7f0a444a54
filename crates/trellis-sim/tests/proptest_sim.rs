//! Property tests over whole simulated runs.

use proptest::prelude::*;
use trellis_core::{BoardChange, RevertPolicy};
use trellis_sim::{SimulationConfig, simulate};

fn arb_config(policy: RevertPolicy) -> impl Strategy<Value = SimulationConfig> {
    (
        any::<u64>(),
        1usize..10,
        1u64..96,
        0u8..=100,
        0u8..=30,
        0u8..=30,
        0u8..=40,
        0u8..=20,
    )
        .prop_map(
            move |(seed, task_count, steps, fail, external, reload, settle, miss)| SimulationConfig {
                seed,
                task_count,
                steps,
                fail_percent: fail,
                external_change_percent: external,
                reload_percent: reload,
                settle_percent: settle,
                miss_percent: miss,
                policy,
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn guarded_runs_never_violate_invariants(config in arb_config(RevertPolicy::Guarded)) {
        let result = simulate(config).unwrap();
        let oracle = result.check();
        prop_assert!(oracle.passed, "violations: {:?}", oracle.violations);
        prop_assert_eq!(result.stats.forced_clobbers, 0);
    }

    #[test]
    fn forced_runs_still_converge_after_reload(config in arb_config(RevertPolicy::Forced)) {
        let result = simulate(config).unwrap();
        prop_assert!(result.check().passed);
        prop_assert_eq!(result.stats.skipped_stale, 0);
        prop_assert_eq!(&result.final_board, &result.final_source);
    }

    #[test]
    fn every_move_settles_exactly_once(config in arb_config(RevertPolicy::Guarded)) {
        let result = simulate(config).unwrap();
        let s = result.stats;
        prop_assert_eq!(
            s.moves_begun,
            s.confirmed + s.reverted + s.skipped_stale + s.skipped_missing
        );

        let speculative_hits = result
            .changes
            .iter()
            .filter(|c| matches!(c, BoardChange::Speculative { revision: Some(_), .. }))
            .count();
        prop_assert_eq!(u64::try_from(speculative_hits).unwrap(), s.moves_begun);
    }
}
