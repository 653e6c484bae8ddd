//! Drives a stored session.
//!
//! [`SessionRunner`] reads the timer at a caller-supplied instant, feeds the
//! resulting phase changes and user answers to the [`SessionMachine`],
//! carries out the effects against the database and persists the machine
//! after every step. Each step returns the [`Event`]s it produced.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::forms::{Form, Preparation, StartMode};
use super::machine::{Effect, SessionEvent, SessionMachine, SessionState};
use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::storage::{CycleRecord, Database, SessionRecord, TimerConfig};
use crate::timer::{next_cycle_start, Cycle, CycleTimer, PhaseWatcher};

pub struct SessionRunner<'db> {
    db: &'db Database,
    record: SessionRecord,
    timer: CycleTimer,
}

impl<'db> SessionRunner<'db> {
    /// Prepare and store a new session.
    ///
    /// # Errors
    /// Fails when the objective is blank, when the timer settings are
    /// rejected, or when the session cannot be stored. Nothing is written in
    /// the first two cases.
    pub fn start(
        db: &'db Database,
        prep: Preparation,
        config: &TimerConfig,
        now: DateTime<Utc>,
    ) -> Result<(Self, Vec<Event>)> {
        prep.validate()?;

        let start_at = match prep.start {
            StartMode::Now => now,
            StartMode::Group => next_cycle_start(
                config.origin,
                config.work_duration(),
                config.rest_duration(),
                now,
            ),
        };
        let timer = config.cycle_timer(start_at, Some(prep.num_cycles))?;

        let mut machine = SessionMachine::new();
        let effects = machine.handle(SessionEvent::Prepared(prep), &timer.first_cycle());
        machine.watcher = PhaseWatcher::starting_at(reading(&timer, now).phase);

        let mut record = None;
        let mut events = Vec::new();
        for effect in effects {
            match effect {
                Effect::CreateSession(prep) => {
                    let created = db.create_session(&prep, &timer, &machine)?;
                    info!(
                        session_id = created.id,
                        num_cycles = timer.num_cycles(),
                        start = prep.start.as_str(),
                        %start_at,
                        "session started"
                    );
                    events.push(Event::SessionStarted {
                        session_id: created.id,
                        num_cycles: timer.num_cycles(),
                        start: prep.start,
                        start_at,
                        at: now,
                    });
                    record = Some(created);
                }
                Effect::ShowForm(form) => debug!(form = form.as_str(), "awaiting form"),
                other => warn!(?other, "unexpected effect while preparing"),
            }
        }

        let record = record.ok_or_else(|| ValidationError::InvalidValue {
            field: "session".into(),
            message: "preparation did not create a session".into(),
        })?;
        Ok((Self { db, record, timer }, events))
    }

    /// Resume the latest session that has not completed.
    pub fn current(db: &'db Database) -> Result<Option<Self>> {
        match db.current_session()? {
            Some(record) => Ok(Some(Self::resume(db, record)?)),
            None => Ok(None),
        }
    }

    pub fn resume(db: &'db Database, record: SessionRecord) -> Result<Self> {
        let timer = record.timer()?;
        Ok(Self { db, record, timer })
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn session_id(&self) -> i64 {
        self.record.id
    }

    pub fn timer(&self) -> &CycleTimer {
        &self.timer
    }

    pub fn state(&self) -> SessionState {
        self.record.machine.state
    }

    pub fn pending_form(&self) -> Option<Form> {
        self.state().pending_form()
    }

    pub fn cycles(&self) -> Result<Vec<CycleRecord>> {
        self.db.session_cycles(self.record.id)
    }

    /// The timer reading the machine sees at `now`.
    pub fn cycle_at(&self, now: DateTime<Utc>) -> Cycle {
        reading(&self.timer, now)
    }

    /// Catch the machine up with the timer at `now`.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let cycle = self.cycle_at(now);
        let before = self.record.machine.watcher.last();
        let effects = self.record.machine.observe(&cycle);

        let mut events = Vec::new();
        if self.record.machine.watcher.last() != before {
            events.push(Event::PhaseChanged {
                from: before,
                to: cycle.phase,
                cycle: cycle.number,
                at: now,
            });
        }
        events.extend(self.apply(effects, now)?);
        self.save()?;
        Ok(events)
    }

    /// Catch up with the timer, then hand a user answer to the machine.
    ///
    /// # Errors
    /// Fails with a validation error when the session is not waiting for
    /// this kind of answer or a required field is blank.
    pub fn submit(&mut self, event: SessionEvent, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = self.advance(now)?;

        let form = match &event {
            SessionEvent::PlanSubmitted(plan) => {
                plan.validate()?;
                Form::Plan
            }
            SessionEvent::ReviewSubmitted(_) => Form::Review,
            SessionEvent::DebriefSubmitted(_) => Form::Debrief,
            SessionEvent::Prepared(_) | SessionEvent::PhaseChanged(_) => {
                return Err(ValidationError::InvalidValue {
                    field: "event".into(),
                    message: "only form answers can be submitted".into(),
                }
                .into())
            }
        };
        if self.pending_form() != Some(form) {
            return Err(ValidationError::InvalidValue {
                field: form.as_str().into(),
                message: format!(
                    "session is {}, not waiting for a {}",
                    self.state().name(),
                    form.as_str()
                ),
            }
            .into());
        }

        let cycle = self.cycle_at(now);
        let effects = self.record.machine.handle(event, &cycle);
        events.extend(self.apply(effects, now)?);
        self.save()?;
        Ok(events)
    }

    fn apply(&mut self, effects: Vec<Effect>, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let session_id = self.record.id;
        let mut events = Vec::new();
        for effect in effects {
            match effect {
                Effect::ShowForm(form) => debug!(session_id, form = form.as_str(), "awaiting form"),
                Effect::SaveCyclePlan {
                    timer_id,
                    number,
                    plan,
                } => {
                    self.db.create_cycle(session_id, timer_id, number, &plan)?;
                    debug!(session_id, cycle = number, "cycle planned");
                    events.push(Event::CyclePlanned {
                        session_id,
                        cycle: number,
                        plan,
                        at: now,
                    });
                }
                Effect::SaveCycleReview {
                    timer_id,
                    number,
                    review,
                } => {
                    self.db.review_cycle(session_id, timer_id, number, &review)?;
                    debug!(session_id, cycle = number, target = %review.target, "cycle reviewed");
                    events.push(Event::CycleReviewed {
                        session_id,
                        cycle: number,
                        review,
                        at: now,
                    });
                }
                Effect::SaveDebrief(debrief) => {
                    self.db.debrief_session(session_id, &debrief)?;
                    self.record.debrief = Some(debrief.clone());
                    events.push(Event::SessionCompleted {
                        session_id,
                        debrief,
                        at: now,
                    });
                }
                Effect::Finish => info!(session_id, "session completed"),
                Effect::CreateSession(_) => warn!(session_id, "session already exists"),
            }
        }
        Ok(events)
    }

    fn save(&mut self) -> Result<()> {
        self.db.save_machine(self.record.id, &self.record.machine)?;
        self.record.status = self.record.machine.state.name().to_string();
        Ok(())
    }
}

/// Before a group session begins the machine sees its first cycle, so the
/// plan is filed against the cycle the session joins.
fn reading(timer: &CycleTimer, now: DateTime<Utc>) -> Cycle {
    if now < timer.start_at() {
        timer.first_cycle()
    } else {
        timer.cycle_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::session::{CyclePlan, CycleReview, Debrief, Target};
    use crate::timer::{default_origin, Phase};
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        // A cycle boundary: 100 cycles of 40 minutes after the origin.
        default_origin() + TimeDelta::minutes(4000)
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        t0() + TimeDelta::minutes(minutes)
    }

    fn prep(start: StartMode) -> Preparation {
        Preparation {
            num_cycles: 2,
            start,
            accomplish: "finish the report".into(),
            ..Default::default()
        }
    }

    fn plan(text: &str) -> SessionEvent {
        SessionEvent::PlanSubmitted(CyclePlan {
            accomplish: text.into(),
            ..Default::default()
        })
    }

    #[test]
    fn start_stores_session_and_waits_for_plan() {
        let db = Database::open_memory().unwrap();
        let (runner, events) =
            SessionRunner::start(&db, prep(StartMode::Now), &TimerConfig::default(), t0()).unwrap();
        assert_eq!(runner.state(), SessionState::Planning { cycle: 1 });
        assert_eq!(runner.pending_form(), Some(Form::Plan));
        assert!(matches!(events[..], [Event::SessionStarted { num_cycles: 2, .. }]));

        let stored = db.current_session().unwrap().unwrap();
        assert_eq!(stored.id, runner.session_id());
        assert_eq!(stored.status, "planning");
    }

    #[test]
    fn blank_objective_or_bad_timer_stores_nothing() {
        let db = Database::open_memory().unwrap();
        let mut blank = prep(StartMode::Now);
        blank.accomplish.clear();
        let err = SessionRunner::start(&db, blank, &TimerConfig::default(), t0())
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::Validation(_)));

        let config = TimerConfig {
            rest_min: 0,
            ..TimerConfig::default()
        };
        let err = SessionRunner::start(&db, prep(StartMode::Now), &config, t0())
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::Timer(_)));
        assert!(db.sessions().unwrap().is_empty());
    }

    #[test]
    fn full_session_walkthrough() {
        let db = Database::open_memory().unwrap();
        let (mut runner, _) =
            SessionRunner::start(&db, prep(StartMode::Now), &TimerConfig::default(), t0()).unwrap();

        let events = runner.submit(plan("draft"), at(1)).unwrap();
        assert_eq!(runner.state(), SessionState::Resting { cycle: 1, timer_id: 100 });
        assert!(matches!(events[..], [Event::CyclePlanned { cycle: 1, .. }]));

        let events = runner.advance(at(15)).unwrap();
        assert_eq!(runner.state(), SessionState::Working { cycle: 1, timer_id: 100 });
        assert!(matches!(
            events[..],
            [Event::PhaseChanged {
                from: Phase::Rest,
                to: Phase::Work,
                ..
            }]
        ));

        runner.advance(at(45)).unwrap();
        assert_eq!(runner.pending_form(), Some(Form::Review));

        let review = CycleReview {
            target: Target::Yes,
            ..Default::default()
        };
        runner
            .submit(SessionEvent::ReviewSubmitted(review.clone()), at(46))
            .unwrap();
        assert_eq!(runner.state(), SessionState::Planning { cycle: 2 });

        runner.submit(plan("edit"), at(50)).unwrap();
        assert_eq!(runner.state(), SessionState::Working { cycle: 2, timer_id: 101 });

        runner.advance(at(85)).unwrap();
        assert_eq!(runner.state(), SessionState::Reviewing { cycle: 2, timer_id: 101 });
        runner
            .submit(SessionEvent::ReviewSubmitted(review.clone()), at(86))
            .unwrap();
        assert_eq!(runner.state(), SessionState::Debriefing);

        let debrief = Debrief {
            target: Target::Half,
            ..Default::default()
        };
        let events = runner
            .submit(SessionEvent::DebriefSubmitted(debrief.clone()), at(90))
            .unwrap();
        assert!(matches!(events[..], [Event::SessionCompleted { .. }]));
        assert!(runner.state().is_completed());

        let cycles = runner.cycles().unwrap();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].plan.accomplish, "draft");
        assert_eq!(cycles[1].review, Some(review));
        assert!(db.current_session().unwrap().is_none());
        assert_eq!(db.session(runner.session_id()).unwrap().unwrap().debrief, Some(debrief));
    }

    #[test]
    fn answer_out_of_turn_is_rejected() {
        let db = Database::open_memory().unwrap();
        let (mut runner, _) =
            SessionRunner::start(&db, prep(StartMode::Now), &TimerConfig::default(), t0()).unwrap();
        let err = runner
            .submit(SessionEvent::ReviewSubmitted(CycleReview::default()), at(1))
            .unwrap_err();
        assert!(err.to_string().contains("not waiting for a review"));
        assert!(runner.submit(plan("  "), at(1)).is_err());
        assert_eq!(runner.state(), SessionState::Planning { cycle: 1 });
    }

    #[test]
    fn group_start_files_plan_against_joined_cycle() {
        let db = Database::open_memory().unwrap();
        let config = TimerConfig::default();
        let (mut runner, _) =
            SessionRunner::start(&db, prep(StartMode::Group), &config, at(5)).unwrap();
        assert_eq!(runner.timer().start_at(), at(40));

        runner.submit(plan("join in"), at(6)).unwrap();
        assert_eq!(runner.state(), SessionState::Resting { cycle: 1, timer_id: 101 });
        assert!(runner.advance(at(39)).unwrap().is_empty());

        runner.advance(at(55)).unwrap();
        assert_eq!(runner.state(), SessionState::Working { cycle: 1, timer_id: 101 });
    }

    #[test]
    fn resume_continues_from_stored_machine() {
        let db = Database::open_memory().unwrap();
        let (mut runner, _) =
            SessionRunner::start(&db, prep(StartMode::Now), &TimerConfig::default(), t0()).unwrap();
        runner.submit(plan("draft"), at(1)).unwrap();
        runner.advance(at(15)).unwrap();
        drop(runner);

        let mut resumed = SessionRunner::current(&db).unwrap().unwrap();
        assert_eq!(resumed.state(), SessionState::Working { cycle: 1, timer_id: 100 });
        // Back during the next cycle's work phase, having missed the rest.
        resumed.advance(at(55)).unwrap();
        assert_eq!(resumed.state(), SessionState::Reviewing { cycle: 1, timer_id: 100 });
        assert_eq!(resumed.pending_form(), Some(Form::Review));
    }

    #[test]
    fn missed_work_while_resting_asks_for_review() {
        let db = Database::open_memory().unwrap();
        let mut three = prep(StartMode::Now);
        three.num_cycles = 3;
        let (mut runner, _) =
            SessionRunner::start(&db, three, &TimerConfig::default(), t0()).unwrap();
        runner.submit(plan("draft"), at(1)).unwrap();
        assert_eq!(runner.state(), SessionState::Resting { cycle: 1, timer_id: 100 });

        // Next check-in is during cycle 2's rest: cycle 1's work went by unseen.
        let events = runner.advance(at(45)).unwrap();
        assert!(events.is_empty());
        assert_eq!(runner.state(), SessionState::Reviewing { cycle: 1, timer_id: 100 });
        assert_eq!(runner.pending_form(), Some(Form::Review));

        runner
            .submit(SessionEvent::ReviewSubmitted(CycleReview::default()), at(46))
            .unwrap();
        assert_eq!(runner.state(), SessionState::Planning { cycle: 2 });
        runner.submit(plan("edit"), at(55)).unwrap();
        assert_eq!(runner.state(), SessionState::Working { cycle: 2, timer_id: 101 });
    }
}
