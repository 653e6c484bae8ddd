//! Session state machine.
//!
//! A session moves through preparation, a plan/work/review loop per cycle,
//! and a final debrief. Every move is decided by [`transition`], a pure
//! function from the current state, an event and the current timer cycle to
//! the next state plus the effects the caller must carry out.
//!
//! ```text
//! Preparing -> Planning -> (Resting -> Working | Working) -> Reviewing
//!                 ^                                             |
//!                 +---------------------------------------------+
//!                                                               v
//!                                             Debriefing -> Completed
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::forms::{CyclePlan, CycleReview, Debrief, Form, Preparation};
use crate::timer::{Cycle, Phase, PhaseChange, PhaseWatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Preparing,
    Planning { cycle: i64 },
    Resting { cycle: i64, timer_id: i64 },
    Working { cycle: i64, timer_id: i64 },
    Reviewing { cycle: i64, timer_id: i64 },
    Debriefing,
    Completed,
}

impl SessionState {
    /// The prompt this state is waiting on, if any.
    pub fn pending_form(&self) -> Option<Form> {
        match self {
            SessionState::Planning { .. } => Some(Form::Plan),
            SessionState::Reviewing { .. } => Some(Form::Review),
            SessionState::Debriefing => Some(Form::Debrief),
            SessionState::Preparing
            | SessionState::Resting { .. }
            | SessionState::Working { .. }
            | SessionState::Completed => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Preparing => "preparing",
            SessionState::Planning { .. } => "planning",
            SessionState::Resting { .. } => "resting",
            SessionState::Working { .. } => "working",
            SessionState::Reviewing { .. } => "reviewing",
            SessionState::Debriefing => "debriefing",
            SessionState::Completed => "completed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SessionState::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Prepared(Preparation),
    PlanSubmitted(CyclePlan),
    ReviewSubmitted(CycleReview),
    DebriefSubmitted(Debrief),
    PhaseChanged(PhaseChange),
}

/// Work the caller performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    CreateSession(Preparation),
    ShowForm(Form),
    SaveCyclePlan {
        timer_id: i64,
        number: i64,
        plan: CyclePlan,
    },
    SaveCycleReview {
        timer_id: i64,
        number: i64,
        review: CycleReview,
    },
    SaveDebrief(Debrief),
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: SessionState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }

    fn stay(state: SessionState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }
}

/// Decide the next state. `cycle` is the timer reading at the moment the
/// event is handled.
pub fn transition(state: SessionState, event: SessionEvent, cycle: &Cycle) -> Transition {
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        (S::Preparing, E::Prepared(prep)) => Transition::to(
            S::Planning {
                cycle: cycle.number,
            },
            vec![Effect::CreateSession(prep), Effect::ShowForm(Form::Plan)],
        ),

        (S::Planning { .. }, E::PlanSubmitted(plan)) => match cycle.phase {
            Phase::Done => debrief(),
            Phase::Work => Transition::to(
                S::Working {
                    cycle: cycle.number,
                    timer_id: cycle.timer_id,
                },
                vec![save_plan(cycle, plan)],
            ),
            Phase::Rest | Phase::Void => Transition::to(
                S::Resting {
                    cycle: cycle.number,
                    timer_id: cycle.timer_id,
                },
                vec![save_plan(cycle, plan)],
            ),
        },

        (S::Planning { .. } | S::Resting { .. }, E::PhaseChanged(change))
            if change.to == Phase::Done =>
        {
            debrief()
        }

        (S::Resting { cycle, timer_id }, E::PhaseChanged(change)) if change.to == Phase::Work => {
            Transition::stay(S::Working { cycle, timer_id })
        }

        (S::Working { cycle, timer_id }, E::PhaseChanged(change)) if change.from == Phase::Work => {
            Transition::to(
                S::Reviewing { cycle, timer_id },
                vec![Effect::ShowForm(Form::Review)],
            )
        }

        (S::Reviewing { cycle: number, timer_id }, E::ReviewSubmitted(review)) => {
            let save = Effect::SaveCycleReview {
                timer_id,
                number,
                review,
            };
            if cycle.phase == Phase::Done {
                Transition::to(S::Debriefing, vec![save, Effect::ShowForm(Form::Debrief)])
            } else {
                Transition::to(
                    S::Planning {
                        cycle: cycle.number,
                    },
                    vec![save, Effect::ShowForm(Form::Plan)],
                )
            }
        }

        (S::Debriefing, E::DebriefSubmitted(answers)) => Transition::to(
            S::Completed,
            vec![Effect::SaveDebrief(answers), Effect::Finish],
        ),

        (state, event) => {
            debug!(state = state.name(), ?event, "event ignored");
            Transition::stay(state)
        }
    }
}

fn save_plan(cycle: &Cycle, plan: CyclePlan) -> Effect {
    Effect::SaveCyclePlan {
        timer_id: cycle.timer_id,
        number: cycle.number,
        plan,
    }
}

fn debrief() -> Transition {
    Transition::to(SessionState::Debriefing, vec![Effect::ShowForm(Form::Debrief)])
}

/// Session state plus the phase watcher feeding it timer events.
///
/// Serialized alongside the session so a later process picks up where the
/// previous one stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMachine {
    pub state: SessionState,
    #[serde(default)]
    pub watcher: PhaseWatcher,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `event` and return the effects to carry out.
    pub fn handle(&mut self, event: SessionEvent, cycle: &Cycle) -> Vec<Effect> {
        let next = transition(self.state, event, cycle);
        if next.state != self.state {
            debug!(from = self.state.name(), to = next.state.name(), "session transition");
        }
        self.state = next.state;
        next.effects
    }

    /// Feed a timer reading.
    ///
    /// Fires a phase change when the phase differs from the last reading. A
    /// resting or working state whose cycle the reading has already moved
    /// past missed the end of that cycle's work phase, whatever the phase
    /// reads now, so it goes straight to the review of that cycle.
    pub fn observe(&mut self, cycle: &Cycle) -> Vec<Effect> {
        let change = self.watcher.observe(cycle);
        if let Some(effects) = self.catch_up(cycle) {
            return effects;
        }

        match change {
            Some(change) => {
                debug!(%change, cycle = cycle.number, "phase changed");
                self.handle(SessionEvent::PhaseChanged(change), cycle)
            }
            None => Vec::new(),
        }
    }

    /// Replay the work phase a stale resting or working state slept through.
    fn catch_up(&mut self, cycle: &Cycle) -> Option<Vec<Effect>> {
        let mut effects = Vec::new();
        match self.state {
            SessionState::Resting { timer_id, .. } if timer_id != cycle.timer_id => {
                let start_work = PhaseChange {
                    from: Phase::Rest,
                    to: Phase::Work,
                };
                effects.extend(self.handle(SessionEvent::PhaseChanged(start_work), cycle));
            }
            SessionState::Working { timer_id, .. } if timer_id != cycle.timer_id => {}
            _ => return None,
        }

        let end_work = PhaseChange {
            from: Phase::Work,
            to: cycle.phase,
        };
        debug!(change = %end_work, cycle = cycle.number, "missed end of work");
        effects.extend(self.handle(SessionEvent::PhaseChanged(end_work), cycle));
        Some(effects)
    }
}
