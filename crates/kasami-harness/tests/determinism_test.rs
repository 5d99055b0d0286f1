//! Determinism and randomized safety tests for the scenario framework.
//!
//! Random schedules are driven by a seeded ChaCha20 RNG, so one seed always
//! produces the same interleaving and the same event log. Across seeds the
//! standard invariants must hold after every step and every request must be
//! served once the schedule drains.

use std::time::Duration;

use kasami_core::{ProcessConfig, ProcessId};
use kasami_harness::scenario::{Scenario, Step, WorldEvent, oracle};
use proptest::prelude::*;

fn random_events(process_count: usize, seed: u64, steps: usize) -> Vec<WorldEvent> {
    Scenario::new(process_count)
        .step(Step::Random { seed, steps })
        .oracle(oracle::all_served())
        .run()
        .expect("random schedule should succeed")
        .events()
        .to_vec()
}

#[test]
fn same_seed_same_event_log() {
    let first = random_events(4, 42, 300);
    assert!(!first.is_empty());

    for run in 1..10 {
        assert_eq!(random_events(4, 42, 300), first, "Run {} diverged from run 0", run);
    }
}

#[test]
fn different_seeds_explore_different_interleavings() {
    let logs: Vec<_> = (0..5).map(|seed| random_events(4, seed, 300)).collect();
    let distinct = logs.iter().enumerate().filter(|&(i, log)| !logs[..i].contains(log)).count();
    assert!(distinct > 1, "every seed produced the same schedule");
}

#[test]
fn random_schedules_serve_every_request() {
    for seed in 0..50 {
        let result = Scenario::new(5)
            .step(Step::Random { seed, steps: 500 })
            .oracle(oracle::all_served())
            .run();

        assert!(result.is_ok(), "seed {}: {:?}", seed, result.err());
    }
}

#[test]
fn random_schedules_with_resubmission_stay_safe() {
    let config = ProcessConfig::default().with_liveness_timeout(Duration::from_millis(20));

    for seed in 0..50 {
        let result = Scenario::new(4)
            .with_process_config(config.clone())
            .step(Step::Random { seed, steps: 500 })
            .oracle(Box::new(|world| {
                for process in world.processes() {
                    let id = process.id();
                    if world.entries(id) != world.requests(id) {
                        return Err(format!("{} not served", id));
                    }
                }
                Ok(())
            }))
            .run();

        assert!(result.is_ok(), "seed {}: {:?}", seed, result.err());
    }
}

#[test]
fn random_schedule_from_every_initial_holder() {
    for holder in 0..4 {
        let result = Scenario::new(4)
            .with_initial_holder(ProcessId::new(holder))
            .step(Step::Random { seed: u64::from(holder), steps: 300 })
            .oracle(oracle::all_served())
            .run();

        assert!(result.is_ok(), "holder {}: {:?}", holder, result.err());
    }
}

#[test]
fn prop_random_schedules_are_safe_and_live() {
    proptest!(|(n in 1usize..=6, seed in any::<u64>(), steps in 0usize..400)| {
        let result = Scenario::new(n)
            .step(Step::Random { seed, steps })
            .oracle(oracle::all_served())
            .run();

        prop_assert!(result.is_ok(), "{:?}", result.err());
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_replay_is_deterministic(n in 2usize..=5, seed in any::<u64>()) {
        prop_assert_eq!(random_events(n, seed, 200), random_events(n, seed, 200));
    }
}
