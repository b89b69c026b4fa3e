//! Mode worker threads and the fault boundary around them
//!
//! A mode loop runs on its own named thread. The controller blocks on
//! the join, so at most one worker is ever alive. Errors and panics from
//! the loop stop here: they are spoken to the user and reported as an
//! ordinary exit.

use std::any::Any;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info};

use super::{Mode, ModeExit, ModeLoop};
use crate::events::ExitReason;
use crate::services::Voice;

/// Unexpected failures inside a mode loop
#[derive(Debug, thiserror::Error)]
pub enum ModeError {
    #[error("{0}")]
    Fault(String),

    #[error("mode worker panicked: {0}")]
    Panicked(String),

    #[error("failed to spawn mode worker: {0}")]
    Spawn(String),
}

/// Result of one joined mode activation
#[derive(Debug)]
pub struct ModeOutcome {
    pub mode: Mode,
    pub generation: u64,
    pub duration: Duration,
    pub result: Result<ModeExit, ModeError>,
}

impl ModeOutcome {
    pub fn reason(&self) -> ExitReason {
        match &self.result {
            Ok(ModeExit::ExitCommand) => ExitReason::ExitCommand,
            Ok(ModeExit::Cancelled) => ExitReason::Cancelled,
            Ok(ModeExit::SourceClosed) => ExitReason::SourceClosed,
            Err(_) => ExitReason::Fault,
        }
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `session` on a worker thread and wait for it to finish
pub fn run_to_completion(session: ModeLoop, voice: &Voice) -> ModeOutcome {
    let mode = session.mode();
    let generation = session.generation();
    let started = Instant::now();

    // Cancelled before it began: no worker, nothing announced
    if session.is_cancelled() {
        info!(%mode, generation, "mode cancelled before start");
        return ModeOutcome {
            mode,
            generation,
            duration: started.elapsed(),
            result: Ok(ModeExit::Cancelled),
        };
    }

    let spawned = thread::Builder::new()
        .name(format!("mode-{}", mode.slug()))
        .spawn(move || session.run());

    let result = match spawned {
        Ok(handle) => match handle.join() {
            Ok(result) => result,
            Err(payload) => Err(ModeError::Panicked(panic_message(&payload))),
        },
        Err(e) => Err(ModeError::Spawn(e.to_string())),
    };

    if let Err(e) = &result {
        error!(%mode, generation, error = %e, "mode loop failed");
        voice.speak(&format!("An error occurred in {}: {}", mode.label(), e));
    }
    voice.speak(&format!("Exiting {}.", mode.label()));

    let duration = started.elapsed();
    info!(
        %mode,
        generation,
        duration_ms = duration.as_millis() as u64,
        "mode worker joined"
    );

    ModeOutcome {
        mode,
        generation,
        duration,
        result,
    }
}
