mod engine;
mod phase;
mod ticker;

pub use engine::{default_origin, next_cycle_start, Cycle, CycleTimer};
pub use phase::{phase_changes, Phase, PhaseChange, PhaseWatcher};
pub use ticker::Ticker;
