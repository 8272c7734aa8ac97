//! Property-based tests for core state machine types.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use chrono::Utc;
use proptest::prelude::*;
use switchyard::builder::{always, fan_out};
use switchyard::core::{RunHistory, State, StateSet, StepMode, StepRecord};
use switchyard::{state_enum, Context, ContextError, StateMachine};

state_enum! {
    enum TestState {
        Initial,
        Left,
        Right,
        Middle,
        Complete,
    }
    start: Initial
    done: Complete
}

const ALL: [TestState; 5] = [
    TestState::Initial,
    TestState::Left,
    TestState::Right,
    TestState::Middle,
    TestState::Complete,
];

prop_compose! {
    fn arbitrary_state()(variant in 0..5usize) -> TestState {
        ALL[variant]
    }
}

fn step(generation: usize, active: TestState, next: TestState) -> StepRecord<TestState> {
    let now = Utc::now();
    StepRecord {
        generation,
        mode: StepMode::Sequential,
        active: active.into(),
        next: next.into(),
        started_at: now,
        finished_at: now,
    }
}

proptest! {
    #[test]
    fn state_name_is_stable(state in arbitrary_state()) {
        let name1 = state.name();
        let name2 = state.name();
        prop_assert_eq!(name1, name2);
    }

    #[test]
    fn sentinels_are_exclusive(state in arbitrary_state()) {
        prop_assert_eq!(state.is_start(), state == TestState::Initial);
        prop_assert_eq!(state.is_done(), state == TestState::Complete);
        prop_assert!(!(state.is_start() && state.is_done()));
    }

    #[test]
    fn state_set_keeps_first_occurrences(
        states in prop::collection::vec(arbitrary_state(), 0..20)
    ) {
        let set: StateSet<TestState> = states.iter().copied().collect();

        let mut expected: Vec<TestState> = Vec::new();
        for state in &states {
            if !expected.contains(state) {
                expected.push(*state);
            }
        }

        prop_assert_eq!(set.as_slice(), expected.as_slice());
        prop_assert_eq!(set.is_concurrent(), expected.len() > 1);
        for state in &states {
            prop_assert!(set.contains(state));
        }
    }

    #[test]
    fn state_set_merge_is_idempotent(
        states in prop::collection::vec(arbitrary_state(), 0..10)
    ) {
        let set: StateSet<TestState> = states.into_iter().collect();
        let mut merged = set.clone();
        merged.merge(set.clone());
        prop_assert_eq!(merged, set);
    }

    #[test]
    fn context_first_insert_wins(key in "[a-z]{1,8}", first in any::<i64>(), second in any::<i64>()) {
        let ctx = Context::new();
        prop_assert!(ctx.insert(key.clone(), first));
        prop_assert!(!ctx.insert(key.clone(), second));
        prop_assert_eq!(ctx.get::<i64>(&key), Ok(first));
        prop_assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn context_never_returns_wrong_type(key in "[a-z]{1,8}", value in any::<u16>()) {
        let ctx = Context::new();
        ctx.insert(key.clone(), value);

        let mismatch = ctx.get::<String>(&key);
        prop_assert!(
            matches!(mismatch, Err(ContextError::TypeMismatch { .. })),
            "expected TypeMismatch, got {:?}",
            mismatch
        );
        prop_assert_eq!(ctx.get::<u16>(&key), Ok(value));
        prop_assert_eq!(ctx.type_of(&key), Some(std::any::type_name::<u16>()));
    }

    #[test]
    fn history_preserves_order(
        states in prop::collection::vec(arbitrary_state(), 1..10)
    ) {
        let mut history = RunHistory::new();
        for (i, state) in states.iter().enumerate() {
            history = history.record(step(i + 1, *state, TestState::Complete));
        }

        let visited: Vec<TestState> = history.visited().into_iter().copied().collect();
        prop_assert_eq!(visited, states);
    }

    #[test]
    fn history_record_is_pure(state1 in arbitrary_state(), state2 in arbitrary_state()) {
        let history = RunHistory::new();

        let new_history = history.record(step(1, state1, state2));

        // Original history unchanged
        prop_assert_eq!(history.steps().len(), 0);
        // New history has the step
        prop_assert_eq!(new_history.steps().len(), 1);
    }

    #[test]
    fn history_roundtrip_serialization(
        states in prop::collection::vec(arbitrary_state(), 0..5)
    ) {
        let mut history = RunHistory::new();
        for (i, state) in states.iter().enumerate() {
            history = history.record(step(i + 1, *state, TestState::Middle));
        }

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: RunHistory<TestState> = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(history.steps().len(), deserialized.steps().len());
        prop_assert_eq!(history.visited(), deserialized.visited());
    }

    #[test]
    fn self_loop_counts_generations(laps in 1u32..20) {
        let mut machine = StateMachine::new();
        machine.context().insert("laps", 0_u32);
        machine
            .on(TestState::Initial, move |ctx: &Context| {
                let done = ctx.with_mut("laps", |n: &mut u32| {
                    *n += 1;
                    *n >= laps
                })?;
                let next = if done { TestState::Complete } else { TestState::Initial };
                Ok(next.into())
            })
            .unwrap();

        let summary = machine.run().unwrap();

        prop_assert!(summary.is_done());
        prop_assert_eq!(summary.generations, laps as usize);
        prop_assert_eq!(machine.context().get::<u32>("laps"), Ok(laps));
    }

    #[test]
    fn fan_out_always_joins_to_done(
        branches in prop::collection::vec(
            prop::sample::select(vec![TestState::Left, TestState::Right, TestState::Middle]),
            1..6,
        ),
        workers in 1usize..4,
    ) {
        let targets: StateSet<TestState> = branches.into_iter().collect();
        let mut machine = StateMachine::new()
            .with_config(switchyard::EngineConfig::new().with_max_workers(workers));
        machine.on(TestState::Initial, fan_out(targets.clone())).unwrap();
        for state in &targets {
            machine.on(*state, always(TestState::Complete)).unwrap();
        }

        let summary = machine.run().unwrap();

        prop_assert!(summary.is_done());
        prop_assert_eq!(summary.generations, 2);
        prop_assert_eq!(summary.dispatched, 1 + targets.len());
        prop_assert_eq!(summary.final_states, StateSet::single(TestState::Complete));
    }
}
