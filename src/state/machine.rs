//! Mode lifecycle state machine
//!
//! Drives Idle -> Prompting -> Running(mode) -> Prompting ... until the
//! user says "shutdown" (or a signal arrives), then ShuttingDown ->
//! Terminated. Mode switching is an explicit loop; a new worker is only
//! started after the previous one has been joined.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::ContextStore;
use crate::events::{ExitReason, ModeEvent};
use crate::intent::Router;
use crate::mode::{run_to_completion, CancelToken, Mode, ModeLoop};
use crate::services::{CollaboratorError, Services};

pub const MODE_PROMPT: &str = "Which mode would you like to choose? 1 for Conversation, \
    2 for Transcription, 3 for Controller, or 4 for Study. Say shutdown to exit.";
const INVALID_SELECTION: &str = "Invalid mode selected. Please try again.";

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed, not yet started
    Idle,
    /// Asking the user to pick a mode
    Prompting,
    /// A mode loop is running on its worker
    Running(Mode),
    /// Cleaning up before exit
    ShuttingDown,
    /// Absorbing final state
    Terminated,
}

impl Default for State {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Prompting => write!(f, "Prompting"),
            State::Running(mode) => write!(f, "Running({})", mode),
            State::ShuttingDown => write!(f, "ShuttingDown"),
            State::Terminated => write!(f, "Terminated"),
        }
    }
}

/// What a selection utterance asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Mode(Mode),
    Shutdown,
    Unrecognized,
}

/// Interpret an utterance heard at the mode prompt.
///
/// "shutdown" wins over everything; otherwise the first mode (in
/// Conversation, Transcription, Controller, Study order) whose ordinal
/// word, digit or name appears as a substring is selected.
pub fn parse_selection(utterance: &str) -> Selection {
    let lowered = utterance.to_lowercase();
    if lowered.contains("shutdown") {
        return Selection::Shutdown;
    }

    Mode::SELECTABLE
        .iter()
        .find(|mode| mode.selection_words().iter().any(|w| lowered.contains(w)))
        .map(|mode| Selection::Mode(*mode))
        .unwrap_or(Selection::Unrecognized)
}

/// State shared between the controller thread and shutdown handles
struct Shared {
    keep_listening: AtomicBool,
    active_token: Mutex<Option<CancelToken>>,
}

impl Shared {
    fn active_token(&self) -> std::sync::MutexGuard<'_, Option<CancelToken>> {
        self.active_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Requests shutdown from outside the controller thread (e.g. on SIGINT)
#[derive(Clone)]
pub struct ShutdownHandle {
    shared: Arc<Shared>,
    services: Arc<Services>,
}

impl ShutdownHandle {
    /// Stop listening, cancel the running mode and release command capture
    pub fn request_shutdown(&self) {
        info!("shutdown requested");
        self.shared.keep_listening.store(false, Ordering::SeqCst);
        if let Some(token) = self.shared.active_token().as_ref() {
            token.cancel();
        }
        self.services.commands.stop();
    }
}

/// The mode lifecycle controller
pub struct Controller {
    state: State,
    services: Arc<Services>,
    context: Arc<ContextStore>,
    router: Arc<Router>,
    events: broadcast::Sender<ModeEvent>,
    shared: Arc<Shared>,
    /// Source of cancellation token generations, never reused
    generations: AtomicU64,
}

impl Controller {
    pub fn new(
        services: Arc<Services>,
        context: Arc<ContextStore>,
        events: broadcast::Sender<ModeEvent>,
    ) -> Self {
        let router = Arc::new(Router::new(
            Arc::clone(&services),
            Arc::clone(&context),
            events.clone(),
        ));

        Self {
            state: State::Idle,
            services,
            context,
            router,
            events,
            shared: Arc::new(Shared {
                keep_listening: AtomicBool::new(true),
                active_token: Mutex::new(None),
            }),
            generations: AtomicU64::new(0),
        }
    }

    /// Get the current state
    pub fn state(&self) -> State {
        self.state
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shared: Arc::clone(&self.shared),
            services: Arc::clone(&self.services),
        }
    }

    /// Drive the state machine until it terminates. Blocks the calling thread.
    pub fn run(&mut self) {
        info!("controller started in Idle state");
        while self.state != State::Terminated {
            self.step();
        }
        info!("controller terminated");
    }

    /// Perform one transition
    fn step(&mut self) {
        let next = match self.state {
            State::Idle => State::Prompting,
            State::Prompting => self.prompt(),
            State::Running(mode) => self.run_mode(mode),
            State::ShuttingDown => self.shut_down(),
            State::Terminated => State::Terminated,
        };
        self.transition_to(next);
    }

    fn transition_to(&mut self, next: State) {
        if next != self.state {
            debug!(from = %self.state, to = %next, "state transition");
        }
        self.state = next;
    }

    fn keep_listening(&self) -> bool {
        self.shared.keep_listening.load(Ordering::SeqCst)
    }

    fn emit(&self, event: ModeEvent) {
        debug!(%event, "emitting event");
        let _ = self.events.send(event);
    }

    fn prompt(&mut self) -> State {
        if !self.keep_listening() {
            return State::ShuttingDown;
        }

        self.services.voice.speak(MODE_PROMPT);
        self.emit(ModeEvent::PromptIssued);

        let utterance = match self.services.commands.listen() {
            Ok(utterance) => utterance,
            Err(CollaboratorError::Closed) => {
                info!("command source closed at prompt");
                return State::ShuttingDown;
            }
            Err(e) => {
                error!(?e, "command capture failed at prompt");
                return State::ShuttingDown;
            }
        };

        match parse_selection(&utterance) {
            Selection::Mode(mode) => {
                info!(%mode, "mode selected");
                State::Running(mode)
            }
            Selection::Shutdown => State::ShuttingDown,
            Selection::Unrecognized => {
                warn!(%utterance, "unrecognized mode selection");
                self.emit(ModeEvent::SelectionRejected { utterance });
                self.services.voice.speak(INVALID_SELECTION);
                State::Prompting
            }
        }
    }

    fn run_mode(&mut self, mode: Mode) -> State {
        if let Some(stale) = self.context.active_mode() {
            warn!(%stale, "context still names an active mode, replacing it");
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancelToken::new(generation);
        *self.shared.active_token() = Some(token.clone());
        // A shutdown request may have landed before the token was bound
        if !self.keep_listening() {
            token.cancel();
        }

        self.context.set_active_mode(Some(mode));
        info!(%mode, generation, "entering mode");
        self.emit(ModeEvent::ModeEntered { mode, generation });

        let session = ModeLoop::new(
            mode,
            Arc::clone(&self.services),
            Arc::clone(&self.context),
            Arc::clone(&self.router),
            token,
        );
        let outcome = run_to_completion(session, &self.services.voice);

        *self.shared.active_token() = None;
        self.context.set_active_mode(None);

        let reason = outcome.reason();
        info!(
            mode = %outcome.mode,
            generation = outcome.generation,
            ?reason,
            last_command = ?self.context.last_command(),
            active_application = ?self.context.active_application().map(|app| app.name),
            "mode exited"
        );
        self.emit(ModeEvent::ModeExited {
            mode: outcome.mode,
            generation: outcome.generation,
            duration_ms: outcome.duration.as_millis() as u64,
            reason,
        });

        if reason == ExitReason::SourceClosed || !self.keep_listening() {
            State::ShuttingDown
        } else {
            State::Prompting
        }
    }

    fn shut_down(&mut self) -> State {
        info!("shutting down");
        self.emit(ModeEvent::ShutdownStarted);
        self.services.voice.speak("Shutting down.");

        self.shutdown_handle().request_shutdown();
        self.context.set_active_mode(None);
        State::Terminated
    }
}
