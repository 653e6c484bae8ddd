//! Answers collected at session and cycle boundaries.
//!
//! Each prompt produces one of these structs by value. They carry no
//! identity; storage attaches them to session and cycle rows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How the session picks its first cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    /// Start a new cycle right away.
    #[default]
    Now,
    /// Join the next cycle shared by everyone on the same origin.
    Group,
}

impl StartMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StartMode::Now => "now",
            StartMode::Group => "group",
        }
    }
}

impl FromStr for StartMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "now" => Ok(Self::Now),
            "group" => Ok(Self::Group),
            other => Err(ValidationError::InvalidValue {
                field: "start".into(),
                message: format!("expected 'now' or 'group', got '{other}'"),
            }),
        }
    }
}

/// Self-reported energy or morale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    #[default]
    Medium,
    Low,
}

impl Level {
    pub fn score(self) -> i64 {
        match self {
            Level::High => 1,
            Level::Medium => 0,
            Level::Low => -1,
        }
    }

    pub fn from_score(score: i64) -> Self {
        match score {
            s if s > 0 => Level::High,
            0 => Level::Medium,
            _ => Level::Low,
        }
    }
}

impl FromStr for Level {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Level::High),
            "medium" => Ok(Level::Medium),
            "low" => Ok(Level::Low),
            other => Err(ValidationError::InvalidValue {
                field: "level".into(),
                message: format!("expected high, medium or low, got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::High => "high",
            Level::Medium => "medium",
            Level::Low => "low",
        })
    }
}

/// Whether a cycle or session hit what it set out to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Yes,
    Half,
    #[default]
    No,
}

impl Target {
    /// Completion percentage stored with the row.
    pub fn percent(self) -> i64 {
        match self {
            Target::Yes => 100,
            Target::Half => 50,
            Target::No => 0,
        }
    }

    pub fn from_percent(percent: i64) -> Self {
        match percent {
            p if p >= 100 => Target::Yes,
            p if p > 0 => Target::Half,
            _ => Target::No,
        }
    }
}

impl FromStr for Target {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yes" => Ok(Target::Yes),
            "half" => Ok(Target::Half),
            "no" => Ok(Target::No),
            other => Err(ValidationError::InvalidValue {
                field: "target".into(),
                message: format!("expected yes, half or no, got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Target::Yes => "yes",
            Target::Half => "half",
            Target::No => "no",
        })
    }
}

/// Which prompt the user should answer next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Form {
    Plan,
    Review,
    Debrief,
}

impl Form {
    pub fn as_str(self) -> &'static str {
        match self {
            Form::Plan => "plan",
            Form::Review => "review",
            Form::Debrief => "debrief",
        }
    }
}

/// Session preparation, answered once before the first cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preparation {
    pub num_cycles: i64,
    #[serde(default)]
    pub start: StartMode,
    pub accomplish: String,
    #[serde(default)]
    pub important: String,
    #[serde(default)]
    pub complete: String,
    #[serde(default)]
    pub distractions: String,
    #[serde(default)]
    pub measurable: String,
    #[serde(default)]
    pub noteworthy: String,
}

impl Preparation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        required("accomplish", &self.accomplish)
    }
}

/// Plan for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePlan {
    pub accomplish: String,
    #[serde(default)]
    pub started: String,
    #[serde(default)]
    pub hazards: String,
    #[serde(default)]
    pub energy: Level,
    #[serde(default)]
    pub morale: Level,
}

impl CyclePlan {
    pub fn validate(&self) -> Result<(), ValidationError> {
        required("accomplish", &self.accomplish)
    }
}

/// Review of a finished work phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReview {
    pub target: Target,
    #[serde(default)]
    pub noteworthy: String,
    #[serde(default)]
    pub distractions: String,
    #[serde(default)]
    pub improve: String,
}

/// Session debrief, answered once after the last cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debrief {
    pub target: Target,
    #[serde(default)]
    pub done: String,
    #[serde(default)]
    pub nextsteps: String,
    #[serde(default)]
    pub compare: String,
    #[serde(default)]
    pub bogged: String,
    #[serde(default)]
    pub replicate: String,
    #[serde(default)]
    pub takeaways: String,
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(())
}
