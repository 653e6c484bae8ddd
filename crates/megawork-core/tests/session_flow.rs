//! Integration tests for sessions persisted to a database file.

use chrono::{DateTime, TimeDelta, Utc};
use megawork_core::session::{
    CyclePlan, CycleReview, Debrief, Form, Preparation, SessionEvent, StartMode, Target,
};
use megawork_core::storage::TimerConfig;
use megawork_core::timer::default_origin;
use megawork_core::{Database, Event, SessionRunner, SessionState};

fn at(minutes: i64) -> DateTime<Utc> {
    default_origin() + TimeDelta::minutes(4000 + minutes)
}

fn short_config() -> TimerConfig {
    TimerConfig {
        work_min: 20,
        rest_min: 5,
        num_cycles: 3,
        ..TimerConfig::default()
    }
}

#[test]
fn test_session_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("megawork.db");

    let session_id = {
        let db = Database::open_at(&path).unwrap();
        let prep = Preparation {
            num_cycles: 1,
            start: StartMode::Now,
            accomplish: "refactor storage".into(),
            ..Default::default()
        };
        let (mut runner, _) = SessionRunner::start(&db, prep, &short_config(), at(0)).unwrap();
        runner
            .submit(
                SessionEvent::PlanSubmitted(CyclePlan {
                    accomplish: "split modules".into(),
                    ..Default::default()
                }),
                at(1),
            )
            .unwrap();
        runner.advance(at(10)).unwrap();
        assert_eq!(runner.state(), SessionState::Working { cycle: 1, timer_id: 160 });
        runner.session_id()
    };

    let db = Database::open_at(&path).unwrap();
    let mut runner = SessionRunner::current(&db).unwrap().unwrap();
    assert_eq!(runner.session_id(), session_id);
    assert_eq!(runner.timer().work_duration(), TimeDelta::minutes(20));
    assert_eq!(runner.timer().num_cycles(), 1);

    // 25 minute cycles: the only cycle is over by minute 30.
    let events = runner.advance(at(30)).unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::PhaseChanged { to: megawork_core::Phase::Done, .. }
    )));
    assert_eq!(runner.pending_form(), Some(Form::Review));

    runner
        .submit(
            SessionEvent::ReviewSubmitted(CycleReview {
                target: Target::Half,
                improve: "smaller steps".into(),
                ..Default::default()
            }),
            at(31),
        )
        .unwrap();
    assert_eq!(runner.state(), SessionState::Debriefing);

    runner
        .submit(
            SessionEvent::DebriefSubmitted(Debrief {
                target: Target::Yes,
                takeaways: "plan smaller".into(),
                ..Default::default()
            }),
            at(32),
        )
        .unwrap();

    let stored = db.session(session_id).unwrap().unwrap();
    assert_eq!(stored.status, "completed");
    assert_eq!(stored.debrief.unwrap().takeaways, "plan smaller");

    let cycles = db.session_cycles(session_id).unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].plan.accomplish, "split modules");
    assert_eq!(cycles[0].review.as_ref().unwrap().target, Target::Half);
}

#[test]
fn test_session_that_ends_while_planning_skips_to_debrief() {
    let db = Database::open_memory().unwrap();
    let prep = Preparation {
        num_cycles: 1,
        accomplish: "read papers".into(),
        ..Default::default()
    };
    let (mut runner, _) = SessionRunner::start(&db, prep, &short_config(), at(0)).unwrap();

    runner.advance(at(100)).unwrap();
    assert_eq!(runner.state(), SessionState::Debriefing);
    assert!(runner.cycles().unwrap().is_empty());
}

#[test]
fn test_newest_unfinished_session_is_current() {
    let db = Database::open_memory().unwrap();
    let prep = |text: &str| Preparation {
        num_cycles: 2,
        accomplish: text.into(),
        ..Default::default()
    };
    SessionRunner::start(&db, prep("first"), &short_config(), at(0)).unwrap();
    SessionRunner::start(&db, prep("second"), &short_config(), at(1)).unwrap();

    let current = SessionRunner::current(&db).unwrap().unwrap();
    assert_eq!(current.record().preparation.accomplish, "second");
    assert_eq!(db.sessions().unwrap().len(), 2);
}
