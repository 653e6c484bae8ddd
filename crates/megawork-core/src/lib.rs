//! # Megawork Core Library
//!
//! This library provides the core logic for Megawork, a timer that alternates
//! fixed-length rest and work phases across a bounded number of cycles and
//! collects a plan and a review for every cycle. The `megawork` CLI is a thin
//! layer over the same library.
//!
//! ## Architecture
//!
//! - **Timer**: a pure function of wall-clock time mapping any instant to a
//!   cycle number, phase and remaining time, aligned to a shared origin
//! - **Session**: a state machine deciding which prompt comes next, driven
//!   by phase changes and the user's answers
//! - **Storage**: SQLite-based session storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`CycleTimer`]: Phase timer, plus a polling [`Ticker`]
//! - [`SessionRunner`]: Session state machine bound to storage
//! - [`Database`]: Session and cycle persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod render;
pub mod session;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, TimerConfigError, ValidationError};
pub use events::Event;
pub use session::{SessionMachine, SessionRunner, SessionState};
pub use storage::{Config, Database};
pub use timer::{Cycle, CycleTimer, Phase, PhaseChange, PhaseWatcher, Ticker};
