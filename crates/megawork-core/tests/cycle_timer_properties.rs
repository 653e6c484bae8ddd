//! Property tests for the cycle timer.

use chrono::{DateTime, TimeDelta, Utc};
use megawork_core::timer::{default_origin, phase_changes, Phase};
use megawork_core::CycleTimer;
use proptest::prelude::*;

fn instant(offset_secs: i64) -> DateTime<Utc> {
    default_origin() + TimeDelta::seconds(offset_secs)
}

prop_compose! {
    fn timer_strategy()(
        work_secs in 1i64..4 * 3600,
        rest_secs in 1i64..2 * 3600,
        start_offset in -30 * 86_400i64..30 * 86_400,
        num_cycles in 1i64..12,
    ) -> CycleTimer {
        CycleTimer::new(
            TimeDelta::seconds(work_secs),
            TimeDelta::seconds(rest_secs),
            default_origin(),
            instant(start_offset),
            num_cycles,
        )
        .unwrap()
    }
}

proptest! {
    #[test]
    fn running_phase_has_remaining_within_duration(
        timer in timer_strategy(),
        offset in -60 * 86_400i64..60 * 86_400,
    ) {
        let cycle = timer.cycle_at(instant(offset));
        prop_assert_ne!(cycle.phase, Phase::Void);
        match cycle.phase {
            Phase::Rest => {
                prop_assert_eq!(cycle.phase_duration, timer.rest_duration());
                prop_assert!(cycle.phase_remaining > TimeDelta::zero());
                prop_assert!(cycle.phase_remaining <= cycle.phase_duration);
            }
            Phase::Work => {
                prop_assert_eq!(cycle.phase_duration, timer.work_duration());
                prop_assert!(cycle.phase_remaining > TimeDelta::zero());
                prop_assert!(cycle.phase_remaining <= cycle.phase_duration);
            }
            Phase::Done => {
                prop_assert_eq!(cycle.phase_duration, TimeDelta::zero());
                prop_assert_eq!(cycle.phase_remaining, TimeDelta::zero());
                prop_assert_eq!(cycle.number, timer.num_cycles());
            }
            Phase::Void => unreachable!(),
        }
    }

    #[test]
    fn reading_is_idempotent(timer in timer_strategy(), offset in -86_400i64..86_400) {
        let when = instant(offset);
        prop_assert_eq!(timer.cycle_at(when), timer.cycle_at(when));
    }

    #[test]
    fn numbers_never_decrease(
        timer in timer_strategy(),
        a in -60 * 86_400i64..60 * 86_400,
        step in 0i64..86_400,
    ) {
        let earlier = timer.cycle_at(instant(a));
        let later = timer.cycle_at(instant(a + step));
        prop_assert!(later.number >= earlier.number);
        prop_assert!(later.timer_id >= earlier.timer_id);
    }

    #[test]
    fn done_is_terminal(timer in timer_strategy(), extra in 0i64..365 * 86_400) {
        let end = timer.ends_at().unwrap();
        prop_assert_eq!(timer.cycle_at(end).phase, Phase::Done);
        prop_assert_eq!(timer.cycle_at(end + TimeDelta::seconds(extra)).phase, Phase::Done);
        prop_assert_ne!(timer.cycle_at(end - TimeDelta::nanoseconds(1)).phase, Phase::Done);
    }

    #[test]
    fn work_starts_exactly_after_rest(timer in timer_strategy()) {
        let first = timer.first_cycle();
        prop_assert_eq!(first.number, 1);
        // Walk to the end of the first rest phase, or the next one.
        let rest_end = match first.phase {
            Phase::Rest => timer.start_at() + first.phase_remaining,
            _ => timer.start_at() + first.phase_remaining + timer.rest_duration(),
        };
        let at_boundary = timer.cycle_at(rest_end);
        if at_boundary.phase != Phase::Done {
            prop_assert_eq!(at_boundary.phase, Phase::Work);
            prop_assert_eq!(at_boundary.phase_remaining, timer.work_duration());
            let before = timer.cycle_at(rest_end - TimeDelta::nanoseconds(1));
            prop_assert_eq!(before.phase, Phase::Rest);
        }
    }

    #[test]
    fn remaining_strictly_decreases_within_phase(
        timer in timer_strategy(),
        offset in -60 * 86_400i64..60 * 86_400,
        frac in 0.01f64..0.99,
    ) {
        let t1 = instant(offset);
        let first = timer.cycle_at(t1);
        prop_assume!(first.phase.is_running());

        // Step forward by a fraction of what is left, staying inside the phase.
        let left_ms = first.phase_remaining.num_milliseconds();
        let step = TimeDelta::milliseconds(((left_ms as f64 * frac) as i64).max(1));
        prop_assume!(step < first.phase_remaining);
        let second = timer.cycle_at(t1 + step);

        prop_assert_eq!(second.timer_id, first.timer_id);
        prop_assert_eq!(second.phase, first.phase);
        prop_assert!(second.phase_remaining < first.phase_remaining);
        prop_assert_eq!(first.phase_remaining - second.phase_remaining, step);
    }

    #[test]
    fn phase_changes_fire_only_on_difference(
        raw in proptest::collection::vec(0u8..4, 0..40),
    ) {
        let phases: Vec<Phase> = raw
            .iter()
            .map(|n| match n {
                0 => Phase::Void,
                1 => Phase::Rest,
                2 => Phase::Work,
                _ => Phase::Done,
            })
            .collect();
        let expected = phases.windows(2).filter(|w| w[0] != w[1]).count();
        let changes = phase_changes(&phases);
        prop_assert_eq!(changes.len(), expected);
        prop_assert!(changes.iter().all(|c| c.from != c.to));
    }
}

#[test]
fn documented_two_cycle_session() {
    let origin = default_origin();
    let timer = CycleTimer::new(
        TimeDelta::minutes(30),
        TimeDelta::minutes(10),
        origin,
        origin,
        2,
    )
    .unwrap();

    let expect = |minutes: i64, number: i64, phase: Phase, remaining: TimeDelta| {
        let cycle = timer.cycle_at(origin + TimeDelta::minutes(minutes));
        assert_eq!(
            (cycle.number, cycle.phase, cycle.phase_remaining),
            (number, phase, remaining),
            "at +{minutes}m"
        );
    };

    expect(0, 1, Phase::Rest, TimeDelta::minutes(10));
    expect(10, 1, Phase::Work, TimeDelta::minutes(30));
    expect(20, 1, Phase::Work, TimeDelta::minutes(20));
    expect(40, 2, Phase::Rest, TimeDelta::minutes(10));
    expect(240, 2, Phase::Done, TimeDelta::zero());

    let cycle = timer.cycle_at(origin + TimeDelta::minutes(13) + TimeDelta::seconds(33));
    assert_eq!(cycle.phase_remaining, TimeDelta::minutes(26) + TimeDelta::seconds(27));
}
