//! Operating modes and the machinery that runs them
//!
//! Exactly one mode loop runs at a time, each on its own worker thread:
//! - Conversation: answers through the conversation engine
//! - Transcription: retypes what the user says into the focused window
//! - Controller: opens and closes applications
//! - Study: answers questions from the local document library

mod cancel;
mod session;
mod worker;

pub use cancel::CancelToken;
pub use session::{ModeExit, ModeLoop};
pub use worker::{run_to_completion, ModeError};

use serde::{Deserialize, Serialize};

use crate::intent::Intent;

/// Top-level operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Conversation,
    Transcription,
    Controller,
    Study,
    /// Terminal pseudo-mode, never run as a loop
    Shutdown,
}

impl Mode {
    /// Modes offered at the selection prompt, in match priority order
    pub const SELECTABLE: [Mode; 4] = [
        Mode::Conversation,
        Mode::Transcription,
        Mode::Controller,
        Mode::Study,
    ];

    /// Spoken name used in greetings and error notices
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Conversation => "Conversation Mode",
            Mode::Transcription => "Transcription Mode",
            Mode::Controller => "Controller Mode",
            Mode::Study => "Study Mode",
            Mode::Shutdown => "Shutdown",
        }
    }

    /// Short lowercase name, used for worker thread names
    pub fn slug(&self) -> &'static str {
        match self {
            Mode::Conversation => "conversation",
            Mode::Transcription => "transcription",
            Mode::Controller => "controller",
            Mode::Study => "study",
            Mode::Shutdown => "shutdown",
        }
    }

    /// Words that select this mode at the prompt (ordinal word, digit, name)
    pub fn selection_words(&self) -> &'static [&'static str] {
        match self {
            Mode::Conversation => &["one", "1", "conversation"],
            Mode::Transcription => &["two", "2", "transcription", "geek"],
            Mode::Controller => &["three", "3", "controller"],
            Mode::Study => &["four", "4", "study"],
            Mode::Shutdown => &["shutdown"],
        }
    }

    /// Intents this mode handles itself rather than dispatching
    pub fn native_intents(&self) -> &'static [Intent] {
        match self {
            Mode::Conversation => &[Intent::Converse],
            Mode::Transcription => &[Intent::Transcribe],
            Mode::Controller => &[Intent::OpenApplication, Intent::CloseApplication],
            Mode::Study => &[Intent::StudyQuery],
            Mode::Shutdown => &[],
        }
    }

    pub fn is_native(&self, intent: Intent) -> bool {
        self.native_intents().contains(&intent)
    }

    /// Spoken when the mode loop starts
    pub fn greeting(&self) -> &'static str {
        match self {
            Mode::Conversation => "Entering conversation mode.",
            Mode::Transcription => "Entering transcription mode. I will type what you say.",
            Mode::Controller => "Entering controller mode.",
            Mode::Study => "Entering study mode. You can ask me questions about your documents.",
            Mode::Shutdown => "Shutting down.",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_intent_table() {
        assert!(Mode::Conversation.is_native(Intent::Converse));
        assert!(Mode::Transcription.is_native(Intent::Transcribe));
        assert!(Mode::Controller.is_native(Intent::OpenApplication));
        assert!(Mode::Controller.is_native(Intent::CloseApplication));
        assert!(Mode::Study.is_native(Intent::StudyQuery));

        assert!(!Mode::Conversation.is_native(Intent::FaqQuery));
        assert!(!Mode::Study.is_native(Intent::SearchWeb));
        assert!(Mode::Shutdown.native_intents().is_empty());
    }

    #[test]
    fn test_selectable_excludes_shutdown() {
        assert!(!Mode::SELECTABLE.contains(&Mode::Shutdown));
        assert_eq!(Mode::SELECTABLE[0], Mode::Conversation);
        assert_eq!(Mode::SELECTABLE[3], Mode::Study);
    }
}
