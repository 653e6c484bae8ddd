//! Plain-text views of the timer and session.

use std::time::Duration;

use chrono::TimeDelta;

use crate::session::{CyclePlan, Preparation};
use crate::timer::{Cycle, Phase};

/// Width of the bar drawn by [`status_line`].
pub const BAR_WIDTH: usize = 40;

/// Remaining time rounded to whole seconds, e.g. `9m 27s`.
pub fn format_remaining(remaining: TimeDelta) -> String {
    let millis = remaining.num_milliseconds().max(0);
    // Round half up, as a countdown display reads.
    let secs = u64::try_from((millis + 500) / 1000).unwrap_or(0);
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

/// A `[####----]` bar `width` cells wide. `fraction` is clamped to `0..=1`.
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let filled = ((fraction * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// One line summarising a timer reading.
pub fn status_line(cycle: &Cycle, num_cycles: i64) -> String {
    match cycle.phase {
        Phase::Void => "no timer yet".to_string(),
        Phase::Done => format!("cycle {}/{} done", cycle.number, num_cycles),
        Phase::Rest | Phase::Work => format!(
            "cycle {}/{} {} {} {}",
            cycle.number,
            num_cycles,
            progress_bar(cycle.percent_complete().unwrap_or(0.0), BAR_WIDTH),
            cycle.phase,
            format_remaining(cycle.phase_remaining),
        ),
    }
}

/// The session objective followed by whichever preparation answers were
/// given.
pub fn session_view(prep: &Preparation) -> String {
    let mut lines = vec![format!("Session objective: {}", prep.accomplish)];
    push_field(&mut lines, "Why", &prep.important);
    push_field(&mut lines, "Completed", &prep.complete);
    push_field(&mut lines, "Distractions", &prep.distractions);
    push_field(&mut lines, "Measurable", &prep.measurable);
    push_field(&mut lines, "Notes", &prep.noteworthy);
    lines.join("\n")
}

pub fn cycle_plan_view(plan: &CyclePlan) -> String {
    let mut lines = vec![format!("Cycle objective: {}", plan.accomplish)];
    push_field(&mut lines, "First step", &plan.started);
    push_field(&mut lines, "Hazards", &plan.hazards);
    lines.push(format!("Energy: {} Morale: {}", plan.energy, plan.morale));
    lines.join("\n")
}

fn push_field(lines: &mut Vec<String>, label: &str, value: &str) {
    if !value.trim().is_empty() {
        lines.push(format!("{label}: {value}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Level;

    #[test]
    fn remaining_rounds_to_seconds() {
        assert_eq!(format_remaining(TimeDelta::milliseconds(567_400)), "9m 27s");
        assert_eq!(format_remaining(TimeDelta::milliseconds(1_600)), "2s");
        assert_eq!(format_remaining(TimeDelta::zero()), "0s");
        assert_eq!(format_remaining(TimeDelta::seconds(-5)), "0s");
    }

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(progress_bar(0.5, 10), "[#####-----]");
        assert_eq!(progress_bar(0.0, 4), "[----]");
        assert_eq!(progress_bar(2.0, 4), "[####]");
        assert_eq!(progress_bar(f64::NAN, 2), "[--]");
    }

    #[test]
    fn status_line_per_phase() {
        assert_eq!(status_line(&Cycle::default(), 2), "no timer yet");

        let rest = Cycle {
            timer_id: 25,
            number: 1,
            phase: Phase::Rest,
            phase_duration: TimeDelta::minutes(10),
            phase_remaining: TimeDelta::minutes(5),
        };
        let line = status_line(&rest, 2);
        assert!(line.starts_with("cycle 1/2 ["));
        assert!(line.ends_with("rest 5m"));

        let done = Cycle {
            phase: Phase::Done,
            number: 2,
            ..Cycle::default()
        };
        assert_eq!(status_line(&done, 2), "cycle 2/2 done");
    }

    #[test]
    fn views_skip_blank_answers() {
        let prep = Preparation {
            num_cycles: 2,
            accomplish: "ship it".into(),
            important: "deadline".into(),
            ..Default::default()
        };
        assert_eq!(session_view(&prep), "Session objective: ship it\nWhy: deadline");

        let plan = CyclePlan {
            accomplish: "tests".into(),
            hazards: "email".into(),
            energy: Level::High,
            ..Default::default()
        };
        assert_eq!(
            cycle_plan_view(&plan),
            "Cycle objective: tests\nHazards: email\nEnergy: high Morale: medium"
        );
    }
}
