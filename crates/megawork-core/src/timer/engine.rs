//! Cycle timer engine.
//!
//! The engine is a pure function of wall-clock time. It holds no mutable
//! state: given an instant it derives which cycle of the session that instant
//! falls in, whether the cycle is resting or working, and how much of the
//! phase is left.
//!
//! ## Cycle layout
//!
//! ```text
//! origin                                   start_at
//!   |-- rest --|------ work ------|-- rest --|------ work ------| ...
//!   raw 0                          raw 1 == cycle number 1
//! ```
//!
//! Phase boundaries are anchored to `origin`, not to `start_at`, so every
//! session sharing an origin rests and works at the same wall-clock marks.
//! `start_at` only decides which raw cycle counts as cycle number 1.
//!
//! ## Usage
//!
//! ```ignore
//! let timer = CycleTimer::new(work, rest, default_origin(), Utc::now(), 4)?;
//! let cycle = timer.current_cycle();
//! println!("{} {}", cycle.phase, cycle.phase_remaining);
//! ```

use chrono::{DateTime, TimeDelta, Utc};

use super::phase::Phase;
use crate::error::TimerConfigError;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Unix timestamp of the shared origin: 2022-05-31T01:00:00Z.
const ORIGIN_UNIX_SECS: i64 = 1_653_958_800;

/// The process-wide reference instant phase boundaries are aligned to.
///
/// With the default 10 minute rest and 30 minute work, rests start at
/// 01:00, 01:40, 02:20, ... UTC.
pub fn default_origin() -> DateTime<Utc> {
    DateTime::from_timestamp(ORIGIN_UNIX_SECS, 0).unwrap_or_default()
}

/// One classified instant of a session.
///
/// Computed fresh on every query; it carries no identity of its own beyond
/// `timer_id`, which storage uses to key per-cycle rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    /// Raw cycle index counted from the origin. May be negative.
    pub timer_id: i64,
    /// 1-based cycle number within the session. Clamped to the cycle count
    /// once the session is done.
    pub number: i64,
    pub phase: Phase,
    /// Configured length of the current phase. Zero when done or void.
    pub phase_duration: TimeDelta,
    /// Time left in the current phase at the query instant.
    pub phase_remaining: TimeDelta,
}

impl Default for Cycle {
    fn default() -> Self {
        Self {
            timer_id: 0,
            number: 0,
            phase: Phase::Void,
            phase_duration: TimeDelta::zero(),
            phase_remaining: TimeDelta::zero(),
        }
    }
}

impl Cycle {
    /// 0.0 .. 1.0 progress within the current phase.
    ///
    /// `None` unless the cycle is resting or working.
    pub fn percent_complete(&self) -> Option<f64> {
        if !self.phase.is_running() {
            return None;
        }
        let total = to_nanos(self.phase_duration);
        if total == 0 {
            return None;
        }
        Some(1.0 - to_nanos(self.phase_remaining) as f64 / total as f64)
    }

    /// Time already spent in the current phase.
    pub fn phase_elapsed(&self) -> TimeDelta {
        self.phase_duration - self.phase_remaining
    }
}

/// Immutable timer configuration for one session.
///
/// `CycleTimer::default()` is the never-configured timer: it classifies
/// every instant as [`Phase::Void`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTimer {
    work_duration: TimeDelta,
    rest_duration: TimeDelta,
    cycle_duration: TimeDelta,
    origin: DateTime<Utc>,
    start_at: DateTime<Utc>,
    num_cycles: i64,
}

impl Default for CycleTimer {
    fn default() -> Self {
        Self {
            work_duration: TimeDelta::zero(),
            rest_duration: TimeDelta::zero(),
            cycle_duration: TimeDelta::zero(),
            origin: default_origin(),
            start_at: default_origin(),
            num_cycles: 0,
        }
    }
}

impl CycleTimer {
    /// Build a timer for a session.
    ///
    /// # Errors
    /// Returns a [`TimerConfigError`] naming the parameter at fault when a
    /// duration or the cycle count is not positive, or when one cycle is too
    /// long to measure in nanoseconds.
    pub fn new(
        work_duration: TimeDelta,
        rest_duration: TimeDelta,
        origin: DateTime<Utc>,
        start_at: DateTime<Utc>,
        num_cycles: i64,
    ) -> Result<Self, TimerConfigError> {
        if work_duration <= TimeDelta::zero() {
            return Err(TimerConfigError::NonPositiveWork(work_duration));
        }
        if rest_duration <= TimeDelta::zero() {
            return Err(TimerConfigError::NonPositiveRest(rest_duration));
        }
        if num_cycles <= 0 {
            return Err(TimerConfigError::NonPositiveCycles(num_cycles));
        }
        let cycle_duration = rest_duration
            .checked_add(&work_duration)
            .filter(|d| d.num_nanoseconds().is_some())
            .ok_or(TimerConfigError::CycleTooLong {
                work: work_duration,
                rest: rest_duration,
            })?;

        Ok(Self {
            work_duration,
            rest_duration,
            cycle_duration,
            origin,
            start_at,
            num_cycles,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn work_duration(&self) -> TimeDelta {
        self.work_duration
    }

    pub fn rest_duration(&self) -> TimeDelta {
        self.rest_duration
    }

    pub fn cycle_duration(&self) -> TimeDelta {
        self.cycle_duration
    }

    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    pub fn num_cycles(&self) -> i64 {
        self.num_cycles
    }

    /// Classify `when` into a cycle and phase.
    pub fn cycle_at(&self, when: DateTime<Utc>) -> Cycle {
        let cycle_ns = to_nanos(self.cycle_duration);
        if cycle_ns == 0 {
            return Cycle::default();
        }

        let elapsed = to_nanos(when - self.origin);
        let timer_id = elapsed.div_euclid(cycle_ns);
        let pos = elapsed.rem_euclid(cycle_ns);
        let start_id = to_nanos(self.start_at - self.origin).div_euclid(cycle_ns);
        let number = timer_id - start_id + 1;

        let timer_id = saturate(timer_id);
        if number > i128::from(self.num_cycles) {
            return Cycle {
                timer_id,
                number: self.num_cycles,
                phase: Phase::Done,
                phase_duration: TimeDelta::zero(),
                phase_remaining: TimeDelta::zero(),
            };
        }

        // `pos` is below the cycle length, which was checked to fit in i64
        // nanoseconds at construction.
        let pos = TimeDelta::nanoseconds(pos as i64);
        let (phase, phase_duration, phase_remaining) = if pos < self.rest_duration {
            (Phase::Rest, self.rest_duration, self.rest_duration - pos)
        } else {
            (Phase::Work, self.work_duration, self.cycle_duration - pos)
        };

        Cycle {
            timer_id,
            number: saturate(number),
            phase,
            phase_duration,
            phase_remaining,
        }
    }

    /// The cycle at the current wall-clock instant.
    pub fn current_cycle(&self) -> Cycle {
        self.cycle_at(Utc::now())
    }

    /// The cycle the session begins in.
    pub fn first_cycle(&self) -> Cycle {
        self.cycle_at(self.start_at)
    }

    /// When the session reaches [`Phase::Done`].
    ///
    /// `None` for a never-configured timer or an end beyond chrono's range.
    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        let cycle_ns = to_nanos(self.cycle_duration);
        if cycle_ns == 0 {
            return None;
        }
        let start_id = to_nanos(self.start_at - self.origin).div_euclid(cycle_ns);
        let offset = (start_id + i128::from(self.num_cycles)) * cycle_ns;
        from_nanos(offset).and_then(|d| self.origin.checked_add_signed(d))
    }
}

/// Start instant for a session that joins the next shared cycle.
///
/// Returns `now` when it already sits on a cycle boundary, otherwise the
/// start of the following cycle relative to `origin`. Returns `now` for
/// durations that cannot form a cycle.
pub fn next_cycle_start(
    origin: DateTime<Utc>,
    work_duration: TimeDelta,
    rest_duration: TimeDelta,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let cycle_ns = to_nanos(work_duration) + to_nanos(rest_duration);
    if cycle_ns <= 0 {
        return now;
    }
    let pos = to_nanos(now - origin).rem_euclid(cycle_ns);
    if pos == 0 {
        return now;
    }
    i64::try_from(cycle_ns - pos)
        .ok()
        .and_then(|wait| now.checked_add_signed(TimeDelta::nanoseconds(wait)))
        .unwrap_or(now)
}

fn to_nanos(d: TimeDelta) -> i128 {
    i128::from(d.num_seconds()) * NANOS_PER_SEC + i128::from(d.subsec_nanos())
}

fn from_nanos(n: i128) -> Option<TimeDelta> {
    let secs = i64::try_from(n.div_euclid(NANOS_PER_SEC)).ok()?;
    let nanos = n.rem_euclid(NANOS_PER_SEC) as i64;
    TimeDelta::try_seconds(secs)?.checked_add(&TimeDelta::nanoseconds(nanos))
}

fn saturate(n: i128) -> i64 {
    n.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}
