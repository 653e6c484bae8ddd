use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{CyclePlan, CycleReview, Debrief, StartMode};
use crate::timer::{Cycle, Phase};

/// Every session milestone and timer reading produces an Event.
/// The CLI prints them; a live view streams snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: i64,
        num_cycles: i64,
        start: StartMode,
        start_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        cycle: i64,
        at: DateTime<Utc>,
    },
    CyclePlanned {
        session_id: i64,
        cycle: i64,
        plan: CyclePlan,
        at: DateTime<Utc>,
    },
    CycleReviewed {
        session_id: i64,
        cycle: i64,
        review: CycleReview,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        session_id: i64,
        debrief: Debrief,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: Phase,
        cycle: i64,
        num_cycles: i64,
        remaining_ms: u64,
        total_ms: u64,
        percent: Option<f64>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Snapshot of a timer reading taken at `at`.
    pub fn snapshot(cycle: &Cycle, num_cycles: i64, at: DateTime<Utc>) -> Self {
        Event::StateSnapshot {
            phase: cycle.phase,
            cycle: cycle.number,
            num_cycles,
            remaining_ms: millis(cycle.phase_remaining),
            total_ms: millis(cycle.phase_duration),
            percent: cycle.percent_complete(),
            at,
        }
    }
}

fn millis(d: chrono::TimeDelta) -> u64 {
    u64::try_from(d.num_milliseconds()).unwrap_or(0)
}
