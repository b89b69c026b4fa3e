//! Events module for mode lifecycle transitions
//!
//! Emitted by the controller and router on a broadcast channel so the
//! daemon (and tests) can observe mode activations without touching the
//! state machine.

use serde::{Deserialize, Serialize};

use crate::intent::Intent;
use crate::mode::Mode;

/// Why a mode loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// User said "exit"
    ExitCommand,
    /// The activation's cancellation signal was observed
    Cancelled,
    /// The command source ran dry
    SourceClosed,
    /// The loop failed unexpectedly
    Fault,
}

/// Events emitted during the mode lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModeEvent {
    /// Mode selection prompt spoken
    PromptIssued,

    /// Selection utterance did not name a mode
    SelectionRejected { utterance: String },

    /// Mode loop worker started
    ModeEntered {
        mode: Mode,
        /// Activation number of the bound cancellation signal
        generation: u64,
    },

    /// Mode loop worker exited and was joined
    ModeExited {
        mode: Mode,
        generation: u64,
        /// Duration in milliseconds that the mode was active
        duration_ms: u64,
        reason: ExitReason,
    },

    /// A command outside the active mode was serviced in place
    TaskDispatched { mode: Mode, intent: Intent },

    /// Shutdown cleanup started
    ShutdownStarted,
}

impl std::fmt::Display for ModeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeEvent::PromptIssued => write!(f, "PROMPT_ISSUED"),
            ModeEvent::SelectionRejected { utterance } => {
                write!(f, "SELECTION_REJECTED ({})", utterance)
            }
            ModeEvent::ModeEntered { mode, generation } => {
                write!(f, "MODE_ENTERED ({} #{})", mode, generation)
            }
            ModeEvent::ModeExited {
                mode,
                generation,
                duration_ms,
                reason,
            } => write!(
                f,
                "MODE_EXITED ({} #{}, {}ms, {:?})",
                mode, generation, duration_ms, reason
            ),
            ModeEvent::TaskDispatched { mode, intent } => {
                write!(f, "TASK_DISPATCHED ({} in {})", intent, mode)
            }
            ModeEvent::ShutdownStarted => write!(f, "SHUTDOWN_STARTED"),
        }
    }
}
