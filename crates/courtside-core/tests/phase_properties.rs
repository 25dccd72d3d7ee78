//! Property tests for phase derivation.

use chrono::{Duration, TimeZone, Utc};
use courtside_core::session::control;
use courtside_core::{
    derive, derive_at_elapsed, CircuitSelection, CircuitSession, LocalCircuitTimer, Phase,
    SessionClock, SessionStatus, TimerParams,
};
use proptest::prelude::*;

fn params_strategy() -> impl Strategy<Value = TimerParams> {
    (1u64..=90, 0u64..=30, 1u32..=4, 1usize..=6)
        .prop_map(|(work, rest, rounds, stations)| TimerParams::new(work, rest, rounds, stations))
}

proptest! {
    #[test]
    fn local_timer_matches_timestamp_model(params in params_strategy()) {
        let mut timer = LocalCircuitTimer::new(params);
        timer.start();
        for elapsed in 1..=params.total_duration() + 2 {
            timer.tick();
            prop_assert_eq!(timer.state(), derive_at_elapsed(&params, elapsed, false));
        }
    }

    #[test]
    fn remaining_never_exceeds_phase_length(params in params_strategy(), elapsed in 0u64..2_000) {
        let state = derive_at_elapsed(&params, elapsed, false);
        match state.phase {
            Phase::Work => prop_assert!(state.remaining >= 1 && state.remaining <= params.work),
            Phase::Rest => prop_assert!(state.remaining >= 1 && state.remaining <= params.rest),
            Phase::Done => prop_assert_eq!(state.remaining, 0),
            Phase::Idle => prop_assert!(false, "running session derived Idle"),
        }
        prop_assert!(state.station_index < params.station_count);
        prop_assert!(state.round >= 1 && state.round <= params.rounds);
    }

    #[test]
    fn remaining_counts_down_within_a_phase(params in params_strategy(), elapsed in 0u64..2_000) {
        let a = derive_at_elapsed(&params, elapsed, false);
        let b = derive_at_elapsed(&params, elapsed + 1, false);
        let same_phase = a.phase == b.phase
            && a.station_index == b.station_index
            && a.round == b.round;
        if same_phase && a.phase != Phase::Done {
            prop_assert_eq!(b.remaining + 1, a.remaining);
        }
    }

    #[test]
    fn final_slot_has_no_trailing_rest(params in params_strategy()) {
        let last = derive_at_elapsed(&params, params.total_duration() - 1, false);
        prop_assert_eq!(last.phase, Phase::Work);
        prop_assert_eq!(last.remaining, 1);
        prop_assert_eq!(last.station_index, params.station_count - 1);
        prop_assert_eq!(last.round, params.rounds);
    }

    #[test]
    fn pause_then_resume_preserves_state(
        pause_at in 0i64..400,
        paused_for in 0i64..10_000,
        work in 1u64..60,
        rest in 0u64..20,
    ) {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        let selection = CircuitSelection {
            work,
            rest,
            rounds: 2,
            stations: vec!["a".into(), "b".into(), "c".into()],
        };
        let mut record = CircuitSession::default();
        record.apply(&control::start(&record, &selection, t0).unwrap());

        let paused_at = t0 + Duration::seconds(pause_at);
        let before = record.derive(paused_at);
        if let Some(patch) = control::pause(&record, paused_at) {
            record.apply(&patch);
        }
        let resumed_at = paused_at + Duration::seconds(paused_for);
        if let Some(patch) = control::resume(&record, resumed_at) {
            record.apply(&patch);
        }
        let after = record.derive(resumed_at);
        prop_assert_eq!(after.phase, before.phase);
        prop_assert_eq!(after.remaining, before.remaining);
        prop_assert_eq!(after.station_index, before.station_index);
        prop_assert_eq!(after.round, before.round);
    }

    #[test]
    fn derivation_is_idempotent(params in params_strategy(), offset in -50i64..2_000) {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        let clock = SessionClock {
            status: SessionStatus::Running,
            start_time: Some(t0),
            elapsed_at_pause: 0,
        };
        let now = t0 + Duration::seconds(offset);
        prop_assert_eq!(derive(&clock, &params, now), derive(&clock, &params, now));
    }
}
