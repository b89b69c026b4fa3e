//! Speech output adapters and the serialized output channel

use std::process::Command;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::{CollaboratorError, SpeechOutput};

/// Single speech output channel shared by the controller and mode workers.
///
/// Holding the lock for the whole utterance keeps two workers from
/// interleaving audio.
pub struct Voice {
    output: Box<dyn SpeechOutput>,
    lock: Mutex<()>,
}

impl Voice {
    pub fn new(output: Box<dyn SpeechOutput>) -> Self {
        Self {
            output,
            lock: Mutex::new(()),
        }
    }

    /// Speak `text`, blocking until done. Failures are logged, not returned.
    pub fn speak(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(text, "speaking");
        if let Err(e) = self.output.speak(text) {
            warn!(?e, text, "speech output failed");
        }
    }
}

/// Runs an external TTS program (`espeak`, `say`, ...) per utterance
pub struct ProcessSpeech {
    program: String,
    rate: u32,
}

impl ProcessSpeech {
    pub fn new(program: &str, rate: u32) -> Self {
        Self {
            program: program.to_string(),
            rate,
        }
    }

    fn rate_flag(&self) -> &'static str {
        // macOS `say` takes -r, espeak family takes -s
        if self.program.ends_with("say") {
            "-r"
        } else {
            "-s"
        }
    }
}

impl SpeechOutput for ProcessSpeech {
    fn speak(&self, text: &str) -> Result<(), CollaboratorError> {
        let status = Command::new(&self.program)
            .arg(self.rate_flag())
            .arg(self.rate.to_string())
            .arg("--")
            .arg(text)
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(CollaboratorError::Unavailable(
                "speech output",
                format!("{} exited with {}", self.program, status),
            ))
        }
    }
}

/// Prints utterances to stdout instead of speaking them
pub struct ConsoleSpeech;

impl SpeechOutput for ConsoleSpeech {
    fn speak(&self, text: &str) -> Result<(), CollaboratorError> {
        println!("» {}", text);
        Ok(())
    }
}
