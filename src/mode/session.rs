//! The command loop shared by every mode
//!
//! Each iteration: check the cancellation signal, block for one utterance,
//! stop on "exit", otherwise route it. Cancellation is only observed at
//! iteration boundaries; a capture already in progress completes and its
//! utterance is discarded.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{CancelToken, Mode, ModeError};
use crate::intent::{is_exit_command, Intent, Route, Router};
use crate::services::{CollaboratorError, Services};
use crate::state::ContextStore;

const CONVERSATION_FALLBACK: &str = "I didn't understand that.";
const STUDY_FALLBACK: &str = "I couldn't find an answer in the documents.";

/// How a mode loop finished without faulting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeExit {
    ExitCommand,
    Cancelled,
    SourceClosed,
}

/// One activation of a mode, bound to its own cancellation token
pub struct ModeLoop {
    mode: Mode,
    services: Arc<Services>,
    context: Arc<ContextStore>,
    router: Arc<Router>,
    token: CancelToken,
}

impl ModeLoop {
    pub fn new(
        mode: Mode,
        services: Arc<Services>,
        context: Arc<ContextStore>,
        router: Arc<Router>,
        token: CancelToken,
    ) -> Self {
        Self {
            mode,
            services,
            context,
            router,
            token,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.token.generation()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn run(&self) -> Result<ModeExit, ModeError> {
        if self.token.is_cancelled() {
            debug!(mode = %self.mode, "cancelled before start");
            return Ok(ModeExit::Cancelled);
        }

        info!(mode = %self.mode, generation = self.token.generation(), "mode loop started");
        self.services.voice.speak(self.mode.greeting());

        loop {
            if self.token.is_cancelled() {
                return Ok(ModeExit::Cancelled);
            }

            let utterance = match self.services.commands.listen() {
                Ok(utterance) => utterance,
                Err(CollaboratorError::Closed) => return Ok(ModeExit::SourceClosed),
                Err(e) => return Err(ModeError::Fault(format!("command capture failed: {}", e))),
            };

            if self.token.is_cancelled() {
                debug!(%utterance, "discarding utterance captured after cancellation");
                return Ok(ModeExit::Cancelled);
            }

            let utterance = utterance.trim().to_lowercase();
            if utterance.is_empty() {
                continue;
            }

            self.context.set_last_command(Some(utterance.clone()));
            if is_exit_command(&utterance) {
                return Ok(ModeExit::ExitCommand);
            }

            let response = match self.router.route(&utterance, self.mode) {
                Route::Dispatched(response) => response,
                Route::Native(intent) => self.handle_native(intent, &utterance),
            };

            if let Some(text) = &response {
                self.services.voice.speak(text);
            }
            if let Err(e) = self
                .services
                .store
                .log_interaction(&utterance, response.as_deref().unwrap_or(""))
            {
                warn!(?e, "failed to log interaction");
            }
        }
    }

    /// The mode's own action for one of its native intents
    fn handle_native(&self, intent: Intent, utterance: &str) -> Option<String> {
        debug!(mode = %self.mode, %intent, "native command");
        match (self.mode, intent) {
            (Mode::Conversation, _) => Some(
                self.router
                    .converse(utterance)
                    .unwrap_or_else(|| CONVERSATION_FALLBACK.to_string()),
            ),
            (Mode::Transcription, _) => self.router.transcribe(utterance),
            (Mode::Controller, Intent::CloseApplication) => Some(self.router.close_application()),
            (Mode::Controller, _) => Some(self.router.open_application(utterance)),
            (Mode::Study, _) => Some(match self.router.study(utterance) {
                Ok(answer) => answer.unwrap_or_else(|| STUDY_FALLBACK.to_string()),
                Err(e) => {
                    warn!(?e, "document search failed");
                    "Sorry, the document library is unavailable right now.".to_string()
                }
            }),
            (Mode::Shutdown, _) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::sync::broadcast;

    use super::*;
    use crate::services::fakes::{Harness, ServicesBuilder};

    fn mode_loop(mode: Mode, builder: ServicesBuilder) -> (ModeLoop, Arc<ContextStore>, Harness) {
        let (services, harness) = builder.build();
        let context = Arc::new(ContextStore::new());
        let (tx, _rx) = broadcast::channel(16);
        let router = Arc::new(Router::new(
            Arc::clone(&services),
            Arc::clone(&context),
            tx,
        ));
        let token = CancelToken::new(1);
        (
            ModeLoop::new(mode, services, Arc::clone(&context), router, token),
            context,
            harness,
        )
    }

    #[test]
    fn test_exit_ends_loop() {
        let (session, context, harness) =
            mode_loop(Mode::Conversation, ServicesBuilder::script(&["hello", "exit", "never"]));

        assert_eq!(session.run().unwrap(), ModeExit::ExitCommand);
        assert_eq!(
            harness.speech.spoken(),
            vec!["Entering conversation mode.", "You said hello."]
        );
        assert_eq!(harness.source.remaining(), 1);
        assert_eq!(context.last_command().as_deref(), Some("exit"));
    }

    #[test]
    fn test_conversation_fallback() {
        let (session, _, harness) =
            mode_loop(Mode::Conversation, ServicesBuilder::script(&["gibberish"]));

        assert_eq!(session.run().unwrap(), ModeExit::SourceClosed);
        assert_eq!(harness.speech.spoken()[1], CONVERSATION_FALLBACK);
        assert_eq!(
            *harness.store.log.lock().unwrap(),
            vec![("gibberish".to_string(), CONVERSATION_FALLBACK.to_string())]
        );
    }

    #[test]
    fn test_controller_opens_calculator() {
        let mut builder = ServicesBuilder::script(&["open calculator", "exit"]);
        builder.installed_apps = vec!["Calculator".to_string()];
        let (session, context, harness) = mode_loop(Mode::Controller, builder);

        assert_eq!(session.run().unwrap(), ModeExit::ExitCommand);
        assert_eq!(*harness.apps.opened.lock().unwrap(), vec!["calculator".to_string()]);
        assert_eq!(
            context.active_application().map(|a| a.name),
            Some("calculator".to_string())
        );
        assert!(harness
            .speech
            .spoken()
            .contains(&"Opening calculator.".to_string()));
    }

    #[test]
    fn test_controller_without_match_keeps_running() {
        let (session, context, harness) = mode_loop(
            Mode::Controller,
            ServicesBuilder::script(&["open calculator", "close it", "exit"]),
        );

        assert_eq!(session.run().unwrap(), ModeExit::ExitCommand);
        assert_eq!(context.active_application(), None);
        assert!(harness.apps.closed.lock().unwrap().is_empty());
        assert_eq!(
            harness.speech.spoken()[1..].to_vec(),
            vec![
                "I couldn't find an application called calculator.",
                "No application is open.",
            ]
        );
    }

    #[test]
    fn test_faq_dispatch_from_any_mode() {
        for mode in Mode::SELECTABLE {
            let mut builder = ServicesBuilder::script(&["faq what are your hours"]);
            builder.faq = HashMap::new();
            let (session, context, harness) = mode_loop(mode, builder);
            context.set_active_mode(Some(mode));

            assert_eq!(session.run().unwrap(), ModeExit::SourceClosed);
            assert_eq!(
                harness.speech.spoken().last().map(String::as_str),
                Some("I couldn't find an answer to your question.")
            );
            assert_eq!(
                *harness.store.questions.lock().unwrap(),
                vec!["what are your hours".to_string()]
            );
            assert_eq!(context.active_mode(), Some(mode));
        }
    }

    #[test]
    fn test_transcription_types_native_text() {
        let (session, _, harness) = mode_loop(
            Mode::Transcription,
            ServicesBuilder::script(&["transcribe dear team", "exit"]),
        );

        session.run().unwrap();
        assert_eq!(*harness.typist.typed.lock().unwrap(), vec!["dear team".to_string()]);
        assert_eq!(harness.speech.spoken().len(), 1);
    }

    #[test]
    fn test_study_fallback() {
        let (session, _, harness) =
            mode_loop(Mode::Study, ServicesBuilder::script(&["study photosynthesis"]));

        session.run().unwrap();
        assert_eq!(harness.speech.spoken()[1], STUDY_FALLBACK);
    }

    #[test]
    fn test_cancelled_before_listen() {
        let (session, _, harness) =
            mode_loop(Mode::Conversation, ServicesBuilder::script(&["hello"]));
        session.token.cancel();

        assert_eq!(session.run().unwrap(), ModeExit::Cancelled);
        assert_eq!(harness.source.remaining(), 1);
        assert!(harness.store.log.lock().unwrap().is_empty());
        assert!(harness.speech.spoken().is_empty());
    }

    #[test]
    fn test_capture_in_flight_at_cancel_is_discarded() {
        let (session, _, harness) = mode_loop(
            Mode::Conversation,
            ServicesBuilder::script(&["hello", "how are you", "later"]),
        );
        harness.source.cancel_during(2, session.token.clone());

        assert_eq!(session.run().unwrap(), ModeExit::Cancelled);
        assert_eq!(
            harness.speech.spoken(),
            vec!["Entering conversation mode.", "You said hello."]
        );
        // Only the first utterance was acted on
        assert_eq!(harness.store.log.lock().unwrap().len(), 1);
        assert_eq!(harness.source.remaining(), 1);
    }
}
