use std::fmt;

use serde::{Deserialize, Serialize};

use super::engine::Cycle;

/// What a session is doing at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No timer configured yet.
    #[default]
    Void,
    Rest,
    Work,
    /// Every cycle of the session has elapsed.
    Done,
}

impl Phase {
    /// Whether the phase has a duration and remaining time.
    pub fn is_running(self) -> bool {
        matches!(self, Phase::Rest | Phase::Work)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Void => "void",
            Phase::Rest => "rest",
            Phase::Work => "work",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change between two consecutively observed phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
}

impl PhaseChange {
    /// `Some` iff the phases differ.
    pub fn between(from: Phase, to: Phase) -> Option<Self> {
        (from != to).then_some(Self { from, to })
    }
}

impl fmt::Display for PhaseChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Remembers the last observed phase and reports each change exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseWatcher {
    last: Phase,
}

impl PhaseWatcher {
    /// A watcher that has seen nothing yet; the first running cycle it
    /// observes fires a change out of [`Phase::Void`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(phase: Phase) -> Self {
        Self { last: phase }
    }

    pub fn last(&self) -> Phase {
        self.last
    }

    pub fn observe_phase(&mut self, phase: Phase) -> Option<PhaseChange> {
        let change = PhaseChange::between(self.last, phase);
        self.last = phase;
        change
    }

    pub fn observe(&mut self, cycle: &Cycle) -> Option<PhaseChange> {
        self.observe_phase(cycle.phase)
    }
}

/// Changes between consecutive entries of `phases`.
pub fn phase_changes(phases: &[Phase]) -> Vec<PhaseChange> {
    phases
        .windows(2)
        .filter_map(|pair| PhaseChange::between(pair[0], pair[1]))
        .collect()
}
