//! Line-oriented command source
//!
//! Speech recognition runs outside this process; any recognizer that
//! writes one utterance per line to our stdin can drive the orchestrator.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use super::{CollaboratorError, CommandSource};

pub struct StdinCommandSource {
    running: AtomicBool,
}

impl StdinCommandSource {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }
}

impl Default for StdinCommandSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSource for StdinCommandSource {
    fn listen(&self) -> Result<String, CollaboratorError> {
        let stdin = std::io::stdin();
        let mut line = String::new();

        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Err(CollaboratorError::Closed);
            }

            line.clear();
            if stdin.lock().read_line(&mut line)? == 0 {
                debug!("stdin reached end of input");
                return Err(CollaboratorError::Closed);
            }

            // An in-flight read that completes after stop() is discarded
            if !self.running.load(Ordering::SeqCst) {
                return Err(CollaboratorError::Closed);
            }

            let utterance = line.trim().to_lowercase();
            if !utterance.is_empty() {
                return Ok(utterance);
            }
        }
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
