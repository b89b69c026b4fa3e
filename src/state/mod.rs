//! Mode lifecycle and shared context
//!
//! The controller walks an explicit state machine:
//! - Idle: constructed, not yet started
//! - Prompting: asking which mode to run
//! - Running: exactly one mode loop is active on its worker
//! - ShuttingDown / Terminated: cleanup, then the absorbing final state

mod context;
mod machine;

pub use context::ContextStore;
pub use machine::{Controller, State};
