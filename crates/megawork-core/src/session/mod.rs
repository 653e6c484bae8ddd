//! Work sessions: the answers collected along the way, the state machine
//! deciding which prompt comes next, and the runner that ties both to the
//! timer and storage.

mod forms;
mod machine;
mod runner;

pub use forms::{CyclePlan, CycleReview, Debrief, Form, Level, Preparation, StartMode, Target};
pub use machine::{transition, Effect, SessionEvent, SessionMachine, SessionState, Transition};
pub use runner::SessionRunner;
